use crate::spectral::DiffusionMap;

use log::info;
use nalgebra::DMatrix;

type Mat = DMatrix<f32>;

/// Pick an embedding dimensionality from the eigen-gap: the index of the
/// largest drop between consecutive sorted eigenvalues, plus one. When
/// that lands below 3 the top gap is too early to span a useful space, so
/// the second-largest gap is used instead.
pub fn eigen_gap_dimension(eigenvalues: &[f32]) -> anyhow::Result<usize> {
    anyhow::ensure!(
        eigenvalues.len() >= 3,
        "need at least 3 eigenvalues to locate a gap, got {}",
        eigenvalues.len()
    );

    let gaps: Vec<f32> = eigenvalues.windows(2).map(|w| w[0] - w[1]).collect();

    let mut order: Vec<usize> = (0..gaps.len()).collect();
    order.sort_by(|&a, &b| gaps[a].partial_cmp(&gaps[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut n_eigs = order[order.len() - 1] + 1;
    if n_eigs < 3 {
        n_eigs = order[order.len() - 2] + 1;
    }
    Ok(n_eigs)
}

/// Multiscale embedding: eigenvector columns `1..n_eigs` rescaled by
/// `lambda / (1 - lambda)`.
///
/// Column 0 (the stationary component, eigenvalue ~1) is always dropped.
/// With `n_eigs = None` the dimensionality comes from the eigen-gap
/// heuristic. Rows keep the ordering of the input point cloud.
pub fn multiscale_space(dm: &DiffusionMap, n_eigs: Option<usize>) -> anyhow::Result<Mat> {
    let evals = dm.eigenvalues.as_slice();

    let n_eigs = match n_eigs {
        Some(k) => k,
        None => {
            let k = eigen_gap_dimension(evals)?;
            info!("Eigen gap heuristic keeps {} components", k);
            k
        }
    };

    anyhow::ensure!(
        n_eigs >= 2 && n_eigs <= evals.len(),
        "need 2 <= n_eigs ({}) <= {} available components",
        n_eigs,
        evals.len()
    );

    let nn = dm.eigenvectors.nrows();
    let mut out = Mat::zeros(nn, n_eigs - 1);
    for j in 1..n_eigs {
        let lambda = evals[j];
        let scale = lambda / (1.0 - lambda);
        out.column_mut(j - 1)
            .copy_from(&(dm.eigenvectors.column(j) * scale));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::DiffusionMap;
    use approx::assert_abs_diff_eq;
    use nalgebra::DVector;
    use nalgebra_sparse::{CooMatrix, CscMatrix};

    fn dummy_map(eigenvalues: Vec<f32>, eigenvectors: Mat) -> DiffusionMap {
        let n = eigenvectors.nrows();
        let empty = CscMatrix::from(&CooMatrix::<f32>::new(n, n));
        DiffusionMap {
            transition: empty.clone(),
            kernel: empty,
            eigenvalues: DVector::from_vec(eigenvalues),
            eigenvectors,
        }
    }

    #[test]
    fn test_gap_at_late_index() {
        // largest drop between index 3 and 4 -> n_eigs = 4
        let vals = [1.0, 0.9, 0.8, 0.7, 0.3, 0.25, 0.2];
        assert_eq!(eigen_gap_dimension(&vals).unwrap(), 4);
    }

    #[test]
    fn test_small_top_gap_uses_second_gap() {
        // largest drop right after the trivial eigenvalue; the second
        // largest (between index 3 and 4) wins instead
        let vals = [1.0, 0.4, 0.38, 0.36, 0.1, 0.08];
        assert_eq!(eigen_gap_dimension(&vals).unwrap(), 4);
    }

    #[test]
    fn test_too_few_eigenvalues() {
        assert!(eigen_gap_dimension(&[1.0, 0.5]).is_err());
    }

    #[test]
    fn test_multiscale_scaling() {
        let evecs = Mat::from_row_slice(
            3,
            3,
            &[
                0.5, 1.0, 2.0, //
                0.5, 0.0, 1.0, //
                0.5, -1.0, 0.0, //
            ],
        );
        let dm = dummy_map(vec![1.0, 0.5, 0.25], evecs);

        let ms = multiscale_space(&dm, Some(3)).unwrap();
        assert_eq!(ms.nrows(), 3);
        assert_eq!(ms.ncols(), 2);

        // lambda/(1-lambda): 0.5 -> 1.0, 0.25 -> 1/3
        assert_abs_diff_eq!(ms[(0, 0)], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ms[(2, 0)], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ms[(0, 1)], 2.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_automatic_dimension() {
        let evecs = Mat::from_fn(4, 5, |i, j| (i + j) as f32 * 0.1);
        // obvious gap between index 2 and 3 -> n_eigs = 3 -> 2 columns
        let dm = dummy_map(vec![1.0, 0.9, 0.85, 0.2, 0.15], evecs);
        let ms = multiscale_space(&dm, None).unwrap();
        assert_eq!(ms.ncols(), 2);
    }

    #[test]
    fn test_n_eigs_out_of_range() {
        let evecs = Mat::zeros(4, 3);
        let dm = dummy_map(vec![1.0, 0.5, 0.2], evecs);
        assert!(multiscale_space(&dm, Some(1)).is_err());
        assert!(multiscale_space(&dm, Some(4)).is_err());
    }
}
