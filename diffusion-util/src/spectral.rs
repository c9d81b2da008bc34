use crate::kernel::adaptive_kernel;
use crate::knn_graph::NeighborGraph;
use crate::operator::markov_operator;
use crate::sparse_util::{is_symmetric, mul_vec};

use log::info;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

type Mat = DMatrix<f32>;
type DVec = DVector<f32>;

/// The iterative eigensolver failed to reach its residual tolerance
/// within the Krylov budget.
#[derive(Debug, Clone)]
pub struct ConvergenceError {
    pub n_components: usize,
    pub subspace_dim: usize,
    pub tol: f32,
}

impl std::fmt::Display for ConvergenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "eigensolver did not resolve {} components within a {}-dimensional \
	     Krylov subspace (tol {:e}); retry with another seed, a larger \
	     subspace, or fewer components",
            self.n_components, self.subspace_dim, self.tol
        )
    }
}

impl std::error::Error for ConvergenceError {}

/// Diffusion map of a point cloud: the Markov transition operator and its
/// dominant eigenstructure.
///
/// Immutable once constructed; imputation, multiscale embedding, and the
/// extremal-cell search only read it.
#[derive(Debug)]
pub struct DiffusionMap {
    /// Row-stochastic transition operator (zero rows for isolated points)
    pub transition: CscMatrix<f32>,
    /// Affinity kernel after optional density correction
    pub kernel: CscMatrix<f32>,
    /// Eigenvalues sorted descending; the first is ~1 on a connected graph
    pub eigenvalues: DVec,
    /// Unit-norm eigenvector columns of the transition operator (n x m)
    pub eigenvectors: Mat,
}

/// Parameters for `build_diffusion_map`.
#[derive(Debug, Clone)]
pub struct DiffusionMapArgs {
    /// Number of diffusion components to extract
    pub n_components: usize,
    /// Number of nearest neighbours for graph construction
    pub knn: usize,
    /// Density-correction exponent (0 disables the correction)
    pub alpha: f32,
    /// Seed for the eigensolver start vector; None draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for DiffusionMapArgs {
    fn default() -> Self {
        Self {
            n_components: 10,
            knn: 30,
            alpha: 0.0,
            seed: None,
        }
    }
}

/// Build a diffusion map from a dense cells x features matrix using the
/// adaptive anisotropic kernel.
pub fn build_diffusion_map(points: &Mat, args: &DiffusionMapArgs) -> anyhow::Result<DiffusionMap> {
    info!("Building nearest neighbour graph ...");
    let graph = NeighborGraph::from_points(points, args.knn)?;
    let kernel = adaptive_kernel(&graph);
    decompose_kernel(kernel, args)
}

/// Build a diffusion map from a user-supplied affinity kernel, skipping
/// the neighbour search and kernel construction.
///
/// The kernel must be symmetric; the degree-conjugated solver relies on it
/// and a violation is reported instead of silently producing a complex
/// spectrum.
pub fn build_diffusion_map_from_kernel(
    kernel: CscMatrix<f32>,
    args: &DiffusionMapArgs,
) -> anyhow::Result<DiffusionMap> {
    anyhow::ensure!(
        kernel.nrows() == kernel.ncols(),
        "kernel must be square, got {} x {}",
        kernel.nrows(),
        kernel.ncols()
    );
    anyhow::ensure!(
        is_symmetric(&kernel, 1e-6),
        "user-supplied kernel must be symmetric"
    );
    decompose_kernel(kernel, args)
}

fn decompose_kernel(kernel: CscMatrix<f32>, args: &DiffusionMapArgs) -> anyhow::Result<DiffusionMap> {
    let nn = kernel.nrows();
    let mm = args.n_components;
    anyhow::ensure!(
        mm >= 2 && mm < nn,
        "need 2 <= n_components ({}) < n ({})",
        mm,
        nn
    );

    let op = markov_operator(kernel, args.alpha);

    info!("Decomposing the {} x {} diffusion operator ...", nn, nn);
    let solver = LanczosEigs::new(mm).with_seed(args.seed);
    let (eigenvalues, conj_vectors) = solver.compute(&op.conjugate)?;

    // Eigenvectors of T recovered from the symmetric conjugate: v = D^{-1/2} u,
    // re-normalized to unit columns. Isolated rows stay exactly zero.
    let mut eigenvectors = Mat::zeros(nn, mm);
    for j in 0..mm {
        let mut col = eigenvectors.column_mut(j);
        for i in 0..nn {
            col[i] = op.inv_sqrt_degree[i] * conj_vectors[(i, j)];
        }
        let norm = col.norm();
        if norm > 0.0 {
            col.scale_mut(1.0 / norm);
        }
    }

    info!(
        "Leading eigenvalues: {:?}",
        eigenvalues.iter().take(3).collect::<Vec<_>>()
    );

    Ok(DiffusionMap {
        transition: op.transition,
        kernel: op.kernel,
        eigenvalues,
        eigenvectors,
    })
}

/// Lanczos iteration with full reorthogonalization for the dominant
/// eigenpairs of a sparse symmetric matrix.
///
/// The Krylov subspace grows until the requested Ritz pairs meet the
/// residual tolerance `|beta * y_last| <= tol * max(1, |theta|)`, the
/// basis spans an invariant subspace, or the budget is exhausted. Ritz
/// pairs are selected by magnitude and returned sorted by value,
/// descending.
pub struct LanczosEigs {
    n_components: usize,
    max_subspace: Option<usize>,
    tol: f32,
    seed: Option<u64>,
}

impl LanczosEigs {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            max_subspace: None,
            tol: 1e-4,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_max_subspace(mut self, dim: usize) -> Self {
        self.max_subspace = Some(dim);
        self
    }

    /// Top eigenpairs of `matrix`: values descending, unit-norm vector
    /// columns. Fails with `ConvergenceError` when the budget runs out.
    pub fn compute(&self, matrix: &CscMatrix<f32>) -> anyhow::Result<(DVec, Mat)> {
        let nn = matrix.nrows();
        let mm = self.n_components;
        anyhow::ensure!(
            matrix.ncols() == nn,
            "matrix must be square, got {} x {}",
            nn,
            matrix.ncols()
        );
        anyhow::ensure!(mm >= 1 && mm <= nn, "need 1 <= n_components ({}) <= n ({})", mm, nn);

        let max_dim = self.max_subspace.unwrap_or((10 * mm).max(100)).min(nn);

        let mut rng = match self.seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_os_rng(),
        };

        // seeded random start vector
        let mut q0 = DVec::from_fn(nn, |_, _| rng.random::<f32>() - 0.5);
        let q0_norm = q0.norm();
        anyhow::ensure!(q0_norm > 0.0, "degenerate start vector");
        q0 /= q0_norm;

        let mut basis: Vec<DVec> = vec![q0];
        let mut alphas: Vec<f32> = Vec::new();
        let mut betas: Vec<f32> = Vec::new();

        loop {
            let j = alphas.len();
            let mut w = mul_vec(matrix, &basis[j]);
            let alpha = basis[j].dot(&w);
            alphas.push(alpha);

            w.axpy(-alpha, &basis[j], 1.0);
            if j > 0 {
                w.axpy(-betas[j - 1], &basis[j - 1], 1.0);
            }
            // full reorthogonalization against the whole basis
            for q_i in basis.iter() {
                let c = q_i.dot(&w);
                w.axpy(-c, q_i, 1.0);
            }

            let beta = w.norm();
            let dim = alphas.len();
            let invariant = beta <= f32::EPSILON * nn as f32;

            if dim >= mm {
                let (theta, vectors, selected) = ritz_pairs(&alphas, &betas, mm);
                let converged = invariant
                    || selected.iter().enumerate().all(|(rank, &idx)| {
                        (beta * vectors[(dim - 1, idx)]).abs()
                            <= self.tol * theta[rank].abs().max(1.0)
                    });
                if converged {
                    return Ok(assemble_ritz(&basis, &theta, &vectors, &selected));
                }
            }

            if invariant || dim >= max_dim {
                // an invariant subspace smaller than the request, or an
                // exhausted budget: report rather than return garbage
                return Err(ConvergenceError {
                    n_components: mm,
                    subspace_dim: dim,
                    tol: self.tol,
                }
                .into());
            }

            basis.push(&w / beta);
            betas.push(beta);
        }
    }
}

/// Eigen-decompose the projected tridiagonal matrix and select the
/// `n_select` Ritz values of largest magnitude, ordered by value
/// descending. Returns (values in final order, tridiagonal eigenvector
/// matrix, selected column indices in final order).
fn ritz_pairs(alphas: &[f32], betas: &[f32], n_select: usize) -> (Vec<f32>, Mat, Vec<usize>) {
    let dim = alphas.len();
    let mut tri = Mat::zeros(dim, dim);
    for (i, &a) in alphas.iter().enumerate() {
        tri[(i, i)] = a;
    }
    for (i, &b) in betas.iter().take(dim.saturating_sub(1)).enumerate() {
        tri[(i, i + 1)] = b;
        tri[(i + 1, i)] = b;
    }

    let eig = tri.symmetric_eigen();

    let mut order: Vec<usize> = (0..dim).collect();
    order.sort_by(|&a, &b| {
        eig.eigenvalues[b]
            .abs()
            .partial_cmp(&eig.eigenvalues[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut selected: Vec<usize> = order.into_iter().take(n_select).collect();
    selected.sort_by(|&a, &b| {
        eig.eigenvalues[b]
            .partial_cmp(&eig.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let theta: Vec<f32> = selected.iter().map(|&i| eig.eigenvalues[i]).collect();
    (theta, eig.eigenvectors, selected)
}

/// Lift the selected tridiagonal eigenvectors back through the Lanczos
/// basis: `u_k = Q y_k`.
fn assemble_ritz(basis: &[DVec], theta: &[f32], vectors: &Mat, selected: &[usize]) -> (DVec, Mat) {
    let nn = basis[0].len();
    let mm = selected.len();
    let mut out = Mat::zeros(nn, mm);

    for (col, &idx) in selected.iter().enumerate() {
        let mut u = DVec::zeros(nn);
        for (k, q_k) in basis.iter().enumerate() {
            u.axpy(vectors[(k, idx)], q_k, 1.0);
        }
        let norm = u.norm();
        if norm > 0.0 {
            u /= norm;
        }
        out.column_mut(col).copy_from(&u);
    }

    (DVec::from_vec(theta.to_vec()), out)
}
