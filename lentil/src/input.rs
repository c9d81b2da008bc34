use crate::common::*;
use diffusion_util::delim_io::read_label_tsv;
use std::collections::HashMap;

/// Read a cell-type annotation file (cell name, label) and align it to
/// the data's row order; every data row must be annotated.
pub fn read_annotations(path: &str, row_names: &[Box<str>]) -> anyhow::Result<Vec<Box<str>>> {
    let pairs = read_label_tsv(path)?;

    let by_name: HashMap<&str, &Box<str>> = pairs
        .iter()
        .map(|(name, label)| (name.as_ref(), label))
        .collect();

    let n_missing = row_names
        .iter()
        .filter(|name| !by_name.contains_key(name.as_ref()))
        .count();
    anyhow::ensure!(
        n_missing == 0,
        "{} of {} cells have no annotation in {}",
        n_missing,
        row_names.len(),
        path
    );

    Ok(row_names
        .iter()
        .map(|name| (*by_name[name.as_ref()]).clone())
        .collect())
}

/// Unique labels in order of first appearance.
pub fn unique_labels(labels: &[Box<str>]) -> Vec<Box<str>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for label in labels {
        if seen.insert(label.as_ref()) {
            out.push(label.clone());
        }
    }
    out
}

/// Load the data matrix, optionally reducing it with PCA first.
pub fn load_points(data_file: &str, pca: Option<usize>) -> anyhow::Result<MatWithNames> {
    let MatWithNames { rows, cols, mat } = read_named_tsv(data_file)?;
    info!("Loaded {} cells x {} features", mat.nrows(), mat.ncols());

    match pca {
        Some(k) => {
            let out = diffusion_util::pca::run_pca(&mat, k)?;
            let kk = out.projections.ncols();
            info!(
                "PCA reduced to {} components ({:.1}% of variance)",
                kk,
                100.0 * out.explained_variance_ratio.sum()
            );
            let pc_names: Vec<Box<str>> = (0..kk)
                .map(|j| format!("pc_{}", j).into_boxed_str())
                .collect();
            Ok(MatWithNames {
                rows,
                cols: pc_names,
                mat: out.projections,
            })
        }
        None => Ok(MatWithNames { rows, cols, mat }),
    }
}
