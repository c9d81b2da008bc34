use crate::neighbor_index::CellIndex;

use indicatif::ParallelProgressIterator;
use log::info;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use rayon::prelude::*;

/// Directed k-nearest-neighbour distance graph over the rows of a point
/// matrix.
///
/// Row i holds the distances from cell i to at most `knn` of its nearest
/// other cells. The graph is intentionally asymmetric; symmetrization
/// happens downstream when the affinity kernel is built.
pub struct NeighborGraph {
    /// Per-row neighbour list `(column, distance)`, sorted by distance
    pub rows: Vec<Vec<(usize, f32)>>,
    /// Number of nodes (rows of the input matrix)
    pub n_nodes: usize,
    /// Requested neighbourhood size
    pub knn: usize,
}

impl NeighborGraph {
    /// Build the graph from a cells x features matrix.
    ///
    /// * `data` - dense matrix (n x d), each row a point
    /// * `knn` - number of nearest neighbours to keep per row
    pub fn from_points(data: &DMatrix<f32>, knn: usize) -> anyhow::Result<NeighborGraph> {
        let nn = data.nrows();
        anyhow::ensure!(nn > 1, "need at least two points, got {}", nn);
        anyhow::ensure!(knn > 0, "knn must be positive");

        info!("Indexing {} points in {} dimensions ...", nn, data.ncols());
        let index = CellIndex::from_rows(data);

        let nquery = knn.min(nn - 1);
        info!("Searching {} nearest neighbours per point ...", nquery);

        let rows: Vec<Vec<(usize, f32)>> = (0..nn)
            .into_par_iter()
            .progress_count(nn as u64)
            .map(|i| -> anyhow::Result<Vec<(usize, f32)>> {
                let (indices, distances) = index.search_others(i, nquery)?;
                let mut row: Vec<(usize, f32)> = indices.into_iter().zip(distances).collect();
                row.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
                Ok(row)
            })
            .collect::<anyhow::Result<_>>()?;

        let n_edges: usize = rows.iter().map(|r| r.len()).sum();
        info!("{} directed edges by kNN search", n_edges);

        Ok(NeighborGraph {
            rows,
            n_nodes: nn,
            knn,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.n_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// Sparse distance-matrix view of the graph (row i -> its neighbours).
    pub fn to_csc(&self) -> CscMatrix<f32> {
        let mut coo = CooMatrix::new(self.n_nodes, self.n_nodes);
        for (i, row) in self.rows.iter().enumerate() {
            for &(j, d) in row {
                coo.push(i, j, d);
            }
        }
        CscMatrix::from(&coo)
    }
}
