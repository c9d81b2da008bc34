use crate::knn_graph::NeighborGraph;

use log::info;
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Per-row adaptive bandwidths: the distance to the `floor(knn/3)`-th
/// nearest neighbour (1-indexed), clamped to the row's population for
/// rows with fewer stored neighbours. For `knn < 3` the index is 0 and
/// wraps to the row's largest stored distance.
///
/// A non-positive bandwidth (duplicate points) falls back to 1.0 so the
/// exponential weight stays finite.
pub fn adaptive_bandwidths(graph: &NeighborGraph) -> Vec<f32> {
    let adaptive_k = graph.knn / 3;

    graph
        .rows
        .iter()
        .map(|row| {
            if row.is_empty() {
                return 1.0;
            }
            let mut dists: Vec<f32> = row.iter().map(|&(_, d)| d).collect();
            dists.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let sigma = if adaptive_k == 0 {
                dists[dists.len() - 1]
            } else {
                let kth = adaptive_k.min(dists.len());
                dists[kth - 1]
            };
            if sigma > 0.0 {
                sigma
            } else {
                1.0
            }
        })
        .collect()
}

/// Locally-scaled anisotropic affinity kernel `K = W + Wᵗ` where
/// `w(i→j) = exp(-d_ij / σ_i)` with the source row's bandwidth.
///
/// Both directions are pushed into the triplet buffer, and duplicate
/// entries sum on CSC conversion, so a mutual neighbour pair accumulates
/// the weight from each side. The result is symmetric with a zero
/// diagonal and entries in (0, 2].
pub fn adaptive_kernel(graph: &NeighborGraph) -> CscMatrix<f32> {
    let sigma = adaptive_bandwidths(graph);
    let nn = graph.n_nodes;

    let mut coo = CooMatrix::new(nn, nn);
    for (i, row) in graph.rows.iter().enumerate() {
        for &(j, d) in row {
            let w = (-d / sigma[i]).exp();
            coo.push(i, j, w);
            coo.push(j, i, w);
        }
    }

    let kernel = CscMatrix::from(&coo);
    info!(
        "Adaptive kernel: {} x {} with {} stored entries",
        nn,
        nn,
        kernel.nnz()
    );
    kernel
}
