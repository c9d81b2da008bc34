use crate::sparse_util::to_dense;
use crate::spectral::DiffusionMap;

use log::info;
use nalgebra::DMatrix;

type Mat = DMatrix<f32>;

pub const DEFAULT_IMPUTATION_STEPS: usize = 3;

/// Dense n-step matrix power by repeated squaring.
fn operator_power(t: &Mat, n_steps: usize) -> Mat {
    let n = t.nrows();
    if n_steps == 0 {
        return Mat::identity(n, n);
    }
    if n_steps == 1 {
        return t.clone();
    }

    let mut result = t.clone();
    let mut current = t.clone();
    let mut p = n_steps - 1;

    while p > 0 {
        if p % 2 == 1 {
            result = &result * &current;
        }
        current = &current * &current;
        p /= 2;
    }

    result
}

/// Smooth a data matrix by `n_steps` of diffusion: `T^n_steps * data`.
///
/// Rows of `data` must align with the point cloud the operator was built
/// on; row order is preserved. The operator power is dense, so memory
/// grows as n^2 -- bounding n and `n_steps` is the caller's
/// responsibility.
pub fn run_magic_imputation(
    data: &Mat,
    dm: &DiffusionMap,
    n_steps: usize,
) -> anyhow::Result<Mat> {
    anyhow::ensure!(
        data.nrows() == dm.transition.nrows(),
        "data rows ({}) must match the diffusion operator ({})",
        data.nrows(),
        dm.transition.nrows()
    );

    info!(
        "Imputing {} x {} matrix with {} diffusion steps",
        data.nrows(),
        data.ncols(),
        n_steps
    );

    let t = to_dense(&dm.transition);
    let t_steps = operator_power(&t, n_steps);
    Ok(t_steps * data)
}
