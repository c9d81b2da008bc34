use log::info;
use nalgebra::{DMatrix, DVector};

type Mat = DMatrix<f32>;
type DVec = DVector<f32>;

/// Principal-component projection of a cells x features matrix.
pub struct PcaOut {
    /// cells x n_components principal scores
    pub projections: Mat,
    /// Fraction of total variance captured by each retained component
    pub explained_variance_ratio: DVec,
}

/// Project rows onto their top principal components.
///
/// Thin wrapper over a dense SVD of the column-centred matrix; meant for
/// moderate inputs (cells x selected genes, or diffusion coordinates).
pub fn run_pca(data: &Mat, n_components: usize) -> anyhow::Result<PcaOut> {
    let nn = data.nrows();
    let dd = data.ncols();
    anyhow::ensure!(nn >= 2, "need at least two rows for PCA, got {}", nn);
    anyhow::ensure!(n_components >= 1, "n_components must be positive");

    let mut centered = data.clone();
    for j in 0..dd {
        let mean = centered.column(j).mean();
        centered.column_mut(j).add_scalar_mut(-mean);
    }

    let svd = centered.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| anyhow::anyhow!("SVD did not produce left singular vectors"))?;
    let singular = &svd.singular_values;

    let rank = n_components.min(singular.len());
    let total: f32 = singular.iter().map(|s| s * s).sum();

    let mut projections = Mat::zeros(nn, rank);
    for j in 0..rank {
        projections
            .column_mut(j)
            .copy_from(&(u.column(j) * singular[j]));
    }

    let explained_variance_ratio = DVec::from_fn(rank, |j, _| {
        if total > 0.0 {
            singular[j] * singular[j] / total
        } else {
            0.0
        }
    });

    info!(
        "PCA kept {} of {} possible components ({:.1}% of variance)",
        rank,
        singular.len(),
        100.0 * explained_variance_ratio.sum()
    );

    Ok(PcaOut {
        projections,
        explained_variance_ratio,
    })
}
