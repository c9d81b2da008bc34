use indicatif::ParallelProgressIterator;
use instant_distance::{Builder, HnswMap, Point, Search};
use nalgebra::DMatrix;
use rayon::prelude::*;

/// A cell's coordinates in expression or embedding space.
#[derive(Clone, Debug)]
pub struct CellPoint {
    pub coords: Vec<f32>,
}

impl Point for CellPoint {
    fn distance(&self, other: &Self) -> f32 {
        self.coords
            .iter()
            .zip(other.coords.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }
}

/// An HNSW dictionary over the rows of a cells x features matrix for
/// fast approximate nearest-neighbour lookup.
///
/// Row indices double as the point names, so search results come back as
/// row indices into the original matrix.
pub struct CellIndex {
    index: HnswMap<CellPoint, usize>,
    points: Vec<CellPoint>,
}

impl CellIndex {
    /// Index every row of `data` (cells x features).
    pub fn from_rows(data: &DMatrix<f32>) -> Self {
        let nn = data.nrows();

        let points: Vec<CellPoint> = (0..nn)
            .into_par_iter()
            .progress_count(nn as u64)
            .map(|i| CellPoint {
                coords: data.row(i).iter().cloned().collect(),
            })
            .collect();

        let index = Builder::default().build(points.clone(), (0..nn).collect());

        CellIndex { index, points }
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// The `knn` nearest neighbours of row `query`, excluding the query
    /// row itself. Results are ordered by increasing distance.
    pub fn search_others(&self, query: usize, knn: usize) -> anyhow::Result<(Vec<usize>, Vec<f32>)> {
        anyhow::ensure!(
            query < self.points.len(),
            "query row {} out of range ({} points)",
            query,
            self.points.len()
        );

        let mut search = Search::default();
        let mut indices = Vec::with_capacity(knn);
        let mut distances = Vec::with_capacity(knn);

        for hit in self.index.search(&self.points[query], &mut search) {
            let j = *hit.value;
            if j == query {
                continue;
            }
            indices.push(j);
            distances.push(hit.distance);
            if indices.len() == knn {
                break;
            }
        }

        Ok((indices, distances))
    }
}
