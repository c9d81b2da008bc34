use crate::sparse_util::{row_sums, scale_rows_cols};

use log::info;
use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;

type DVec = DVector<f32>;

/// Right-stochastic diffusion operator together with its degree-symmetrized
/// conjugate.
///
/// `conjugate = D^(-1/2) K D^(-1/2)` shares the spectrum of
/// `transition = D^(-1) K`, and its eigenvectors map back through
/// `inv_sqrt_degree`.
pub struct MarkovOperator {
    /// Row-stochastic transition matrix T; zero-degree rows stay zero
    pub transition: CscMatrix<f32>,
    /// Symmetric conjugate of T
    pub conjugate: CscMatrix<f32>,
    /// D^(-1/2) per row, 0 for zero-degree rows
    pub inv_sqrt_degree: DVec,
    /// Kernel after the optional density correction
    pub kernel: CscMatrix<f32>,
}

/// Normalize a symmetric affinity kernel into a Markov transition operator.
///
/// With `alpha > 0` the kernel is density-corrected first:
/// `K <- D^(-alpha) K D^(-alpha)` with the degree recomputed afterwards.
/// Rows with zero total affinity are left as zero rows of T rather than
/// renormalized; isolated points carry no probability mass.
pub fn markov_operator(kernel: CscMatrix<f32>, alpha: f32) -> MarkovOperator {
    let mut kernel = kernel;
    let mut degree = row_sums(&kernel);

    if alpha > 0.0 {
        let d_alpha: DVec = degree.map(|d| if d > 0.0 { d.powf(-alpha) } else { 0.0 });
        kernel = scale_rows_cols(&kernel, &d_alpha, &d_alpha);
        degree = row_sums(&kernel);
    }

    let n_isolated = degree.iter().filter(|&&d| d <= 0.0).count();
    if n_isolated > 0 {
        info!(
            "{} zero-degree rows remain zero rows of the operator",
            n_isolated
        );
    }

    let inv_degree: DVec = degree.map(|d| if d > 0.0 { 1.0 / d } else { 0.0 });
    let ones = DVec::from_element(kernel.ncols(), 1.0);
    let transition = scale_rows_cols(&kernel, &inv_degree, &ones);

    let inv_sqrt_degree: DVec = degree.map(|d| if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 });
    let conjugate = scale_rows_cols(&kernel, &inv_sqrt_degree, &inv_sqrt_degree);

    MarkovOperator {
        transition,
        conjugate,
        inv_sqrt_degree,
        kernel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse_util::{is_symmetric, to_dense};
    use approx::assert_abs_diff_eq;
    use nalgebra_sparse::CooMatrix;

    /// Symmetric 4-node kernel with node 3 isolated
    fn toy_kernel() -> CscMatrix<f32> {
        let mut coo = CooMatrix::new(4, 4);
        for &(i, j, v) in &[(0usize, 1usize, 1.0f32), (0, 2, 0.5), (1, 2, 2.0)] {
            coo.push(i, j, v);
            coo.push(j, i, v);
        }
        CscMatrix::from(&coo)
    }

    #[test]
    fn test_rows_are_stochastic() {
        let op = markov_operator(toy_kernel(), 0.0);
        let t = to_dense(&op.transition);
        for i in 0..3 {
            let s: f32 = t.row(i).iter().sum();
            assert_abs_diff_eq!(s, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_isolated_row_stays_zero() {
        let op = markov_operator(toy_kernel(), 0.0);
        let t = to_dense(&op.transition);
        let s: f32 = t.row(3).iter().sum();
        assert_abs_diff_eq!(s, 0.0);
        assert_abs_diff_eq!(op.inv_sqrt_degree[3], 0.0);
    }

    #[test]
    fn test_alpha_changes_the_operator() {
        let plain = markov_operator(toy_kernel(), 0.0);
        let corrected = markov_operator(toy_kernel(), 1.0);

        let t0 = to_dense(&plain.transition);
        let t1 = to_dense(&corrected.transition);
        let diff: f32 = (&t0 - &t1).iter().map(|x| x.abs()).sum();
        assert!(diff > 1e-4, "alpha normalization should alter T");

        // rows stay stochastic after the correction
        for i in 0..3 {
            let s: f32 = t1.row(i).iter().sum();
            assert_abs_diff_eq!(s, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_conjugate_is_symmetric_and_similar() {
        let op = markov_operator(toy_kernel(), 0.0);
        assert!(is_symmetric(&op.conjugate, 1e-6));

        // S = D^{1/2} T D^{-1/2} elementwise on the stored pattern
        let t = to_dense(&op.transition);
        let s = to_dense(&op.conjugate);
        for i in 0..3 {
            for j in 0..3 {
                let di = op.inv_sqrt_degree[i];
                let dj = op.inv_sqrt_degree[j];
                if di > 0.0 && dj > 0.0 {
                    assert_abs_diff_eq!(s[(i, j)], t[(i, j)] * dj / di, epsilon = 1e-5);
                }
            }
        }
    }
}
