use log::{info, warn};
use nalgebra::{DMatrix, DVector};
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

type Mat = DMatrix<f32>;
type DVec = DVector<f32>;

/// No diffusion component extremum matched the requested cell type and no
/// fallback was configured.
#[derive(Debug, Clone)]
pub struct CellNotFound {
    pub celltype: Box<str>,
}

impl std::fmt::Display for CellNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no valid diffusion component found for cell type {}; \
	     consider increasing n_components or supplying a fallback seed \
	     for pseudotime-based detection",
            self.celltype
        )
    }
}

impl std::error::Error for CellNotFound {}

/// Which end of a diffusion component produced the hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremalDirection {
    Max,
    Min,
}

impl std::fmt::Display for ExtremalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtremalDirection::Max => write!(f, "max"),
            ExtremalDirection::Min => write!(f, "min"),
        }
    }
}

/// How an extremal cell was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremalOrigin {
    /// Extremum of a diffusion component
    Component {
        direction: ExtremalDirection,
        component: usize,
    },
    /// Pseudotime fallback from a random non-target start row
    Pseudotime { start_row: usize },
}

/// A cell at the extreme of the diffusion state space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtremalCell {
    pub row: usize,
    pub origin: ExtremalOrigin,
}

/// Tagged outcome of the per-category component scan, so batch drivers
/// branch on the tag instead of catching errors.
#[derive(Debug, Clone)]
pub enum ExtremalSearch {
    Found(ExtremalCell),
    NotFound { celltype: Box<str> },
}

/// Trajectory collaborator for the fallback path: a pseudotime value per
/// row of `points`, treating `start_row` as the unique root.
pub trait PseudotimeEstimator {
    fn pseudotime(&self, points: &Mat, start_row: usize) -> anyhow::Result<DVec>;
}

/// Pseudotime as Euclidean distance from the start row in the supplied
/// embedding. A deliberately small default; richer trajectory engines
/// plug in through the same trait.
pub struct EmbeddingDistance;

impl PseudotimeEstimator for EmbeddingDistance {
    fn pseudotime(&self, points: &Mat, start_row: usize) -> anyhow::Result<DVec> {
        anyhow::ensure!(
            start_row < points.nrows(),
            "start row {} out of range ({} rows)",
            start_row,
            points.nrows()
        );
        let root = points.row(start_row).into_owned();
        Ok(DVec::from_fn(points.nrows(), |i, _| {
            (points.row(i) - &root).norm()
        }))
    }
}

/// Randomized-restart fallback configuration. The point cloud the
/// collaborator walks over is threaded in explicitly; nothing is looked
/// up from ambient state.
pub struct FallbackSearch<'a> {
    /// Embedding rows aligned with the eigenvector matrix
    pub points: &'a Mat,
    /// Trajectory/pseudotime collaborator
    pub estimator: &'a dyn PseudotimeEstimator,
    /// Seed for the random start-row draw
    pub seed: u64,
}

fn argmax(xs: impl Iterator<Item = f32>) -> usize {
    let mut best = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (i, x) in xs.enumerate() {
        if x > best_val {
            best_val = x;
            best = i;
        }
    }
    best
}

fn argmin(xs: impl Iterator<Item = f32>) -> usize {
    argmax(xs.map(|x| -x))
}

/// Scan diffusion components in order, checking the argmax row and then
/// the argmin row of each column against the target label.
pub fn scan_components(eigenvectors: &Mat, labels: &[Box<str>], celltype: &str) -> ExtremalSearch {
    for dcomp in 0..eigenvectors.ncols() {
        let col = eigenvectors.column(dcomp);

        let ec = argmax(col.iter().cloned());
        if labels[ec].as_ref() == celltype {
            info!(
                "Using row {} for cell type {} (max of diffusion component {})",
                ec, celltype, dcomp
            );
            return ExtremalSearch::Found(ExtremalCell {
                row: ec,
                origin: ExtremalOrigin::Component {
                    direction: ExtremalDirection::Max,
                    component: dcomp,
                },
            });
        }

        let ec = argmin(col.iter().cloned());
        if labels[ec].as_ref() == celltype {
            info!(
                "Using row {} for cell type {} (min of diffusion component {})",
                ec, celltype, dcomp
            );
            return ExtremalSearch::Found(ExtremalCell {
                row: ec,
                origin: ExtremalOrigin::Component {
                    direction: ExtremalDirection::Min,
                    component: dcomp,
                },
            });
        }
    }

    ExtremalSearch::NotFound {
        celltype: celltype.into(),
    }
}

/// Locate the early/terminal cell for one cell type.
///
/// Scans the diffusion components first; when no extremum carries the
/// label, runs the pseudotime fallback if one is configured, and fails
/// with `CellNotFound` otherwise.
pub fn find_extremal_cell(
    eigenvectors: &Mat,
    labels: &[Box<str>],
    celltype: &str,
    fallback: Option<&FallbackSearch>,
) -> anyhow::Result<ExtremalCell> {
    anyhow::ensure!(
        labels.len() == eigenvectors.nrows(),
        "{} labels for {} rows",
        labels.len(),
        eigenvectors.nrows()
    );

    match scan_components(eigenvectors, labels, celltype) {
        ExtremalSearch::Found(cell) => Ok(cell),
        ExtremalSearch::NotFound { celltype } => match fallback {
            Some(fb) => fallback_terminal_cell(fb, labels, &celltype),
            None => Err(CellNotFound { celltype }.into()),
        },
    }
}

/// Pseudotime-based terminal cell detection: start the trajectory
/// collaborator from a seeded random row outside the target label and
/// take the target-labeled row it reaches last.
fn fallback_terminal_cell(
    fb: &FallbackSearch,
    labels: &[Box<str>],
    celltype: &str,
) -> anyhow::Result<ExtremalCell> {
    info!(
        "Falling back to pseudotime-based detection for cell type {}",
        celltype
    );

    let targets: Vec<usize> = (0..labels.len())
        .filter(|&i| labels[i].as_ref() == celltype)
        .collect();
    if targets.is_empty() {
        return Err(CellNotFound {
            celltype: celltype.into(),
        }
        .into());
    }

    let others: Vec<usize> = (0..labels.len())
        .filter(|&i| labels[i].as_ref() != celltype)
        .collect();
    anyhow::ensure!(
        !others.is_empty(),
        "every row carries label {}; no start candidates for the fallback",
        celltype
    );

    let mut rng = SmallRng::seed_from_u64(fb.seed);
    let Some(&start) = others.choose(&mut rng) else {
        anyhow::bail!("empty start candidate set");
    };

    let pt = fb.estimator.pseudotime(fb.points, start)?;
    anyhow::ensure!(
        pt.len() == labels.len(),
        "pseudotime collaborator returned {} values for {} rows",
        pt.len(),
        labels.len()
    );

    let best = targets
        .iter()
        .copied()
        .max_by(|&a, &b| pt[a].partial_cmp(&pt[b]).unwrap_or(std::cmp::Ordering::Equal))
        .expect("non-empty target set");

    info!(
        "Using row {} for cell type {} (latest pseudotime from random start {})",
        best, celltype, start
    );

    Ok(ExtremalCell {
        row: best,
        origin: ExtremalOrigin::Pseudotime { start_row: start },
    })
}

/// Batch extremal-cell search: one entry per resolvable cell type, input
/// order preserved. A cell type with no matching extremum (and no
/// successful fallback) is skipped with a warning instead of aborting the
/// batch; collaborator failures still propagate.
pub fn find_extremal_cells(
    eigenvectors: &Mat,
    labels: &[Box<str>],
    celltypes: &[Box<str>],
    fallback: Option<&FallbackSearch>,
) -> anyhow::Result<Vec<(Box<str>, ExtremalCell)>> {
    anyhow::ensure!(
        labels.len() == eigenvectors.nrows(),
        "{} labels for {} rows",
        labels.len(),
        eigenvectors.nrows()
    );

    let mut found = Vec::with_capacity(celltypes.len());

    for ct in celltypes {
        match scan_components(eigenvectors, labels, ct.as_ref()) {
            ExtremalSearch::Found(cell) => found.push((ct.clone(), cell)),
            ExtremalSearch::NotFound { celltype } => {
                let Some(fb) = fallback else {
                    warn!(
                        "No valid component found for cell type {}; skipping",
                        celltype
                    );
                    continue;
                };
                match fallback_terminal_cell(fb, labels, &celltype) {
                    Ok(cell) => found.push((ct.clone(), cell)),
                    Err(e) if e.is::<CellNotFound>() => {
                        warn!("Skipping cell type {}: {}", celltype, e);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<Box<str>> {
        names.iter().map(|&s| s.into()).collect()
    }

    /// 4 cells x 2 components; row 2 is the max of component 0,
    /// row 1 the min of component 0, row 3 the max of component 1
    fn toy_eigenvectors() -> Mat {
        Mat::from_row_slice(
            4,
            2,
            &[
                0.1, 0.2, //
                -0.9, 0.1, //
                0.8, -0.5, //
                0.3, 0.9, //
            ],
        )
    }

    #[test]
    fn test_planted_max_is_found() {
        let evecs = toy_eigenvectors();
        let labs = labels(&["A", "B", "T", "C"]);
        let cell = find_extremal_cell(&evecs, &labs, "T", None).unwrap();
        assert_eq!(cell.row, 2);
        assert_eq!(
            cell.origin,
            ExtremalOrigin::Component {
                direction: ExtremalDirection::Max,
                component: 0
            }
        );
    }

    #[test]
    fn test_planted_min_is_found() {
        let evecs = toy_eigenvectors();
        let labs = labels(&["A", "T", "B", "C"]);
        let cell = find_extremal_cell(&evecs, &labs, "T", None).unwrap();
        assert_eq!(cell.row, 1);
        assert_eq!(
            cell.origin,
            ExtremalOrigin::Component {
                direction: ExtremalDirection::Min,
                component: 0
            }
        );
    }

    #[test]
    fn test_later_component_is_scanned() {
        let evecs = toy_eigenvectors();
        let labs = labels(&["A", "B", "C", "T"]);
        let cell = find_extremal_cell(&evecs, &labs, "T", None).unwrap();
        assert_eq!(cell.row, 3);
        assert_eq!(
            cell.origin,
            ExtremalOrigin::Component {
                direction: ExtremalDirection::Max,
                component: 1
            }
        );
    }

    #[test]
    fn test_cell_not_found_without_fallback() {
        let evecs = toy_eigenvectors();
        // label T sits on row 0, never an extremum
        let labs = labels(&["T", "A", "B", "C"]);
        let err = find_extremal_cell(&evecs, &labs, "T", None).unwrap_err();
        let not_found = err
            .downcast_ref::<CellNotFound>()
            .expect("typed CellNotFound");
        assert_eq!(not_found.celltype.as_ref(), "T");
    }

    /// Deterministic fake collaborator recording the start row
    struct FixedPseudotime {
        values: Vec<f32>,
    }

    impl PseudotimeEstimator for FixedPseudotime {
        fn pseudotime(&self, _points: &Mat, _start_row: usize) -> anyhow::Result<DVec> {
            Ok(DVec::from_vec(self.values.clone()))
        }
    }

    #[test]
    fn test_fallback_picks_latest_target_cell() {
        let evecs = toy_eigenvectors();
        let labs = labels(&["T", "A", "B", "T"]);

        // T only sits on non-extremal rows, so the scan cannot resolve it
        let labs_hidden = labels(&["T", "A", "B", "C"]);
        let points = Mat::zeros(4, 2);
        let estimator = FixedPseudotime {
            values: vec![0.4, 0.1, 0.9, 0.2],
        };
        let fb = FallbackSearch {
            points: &points,
            estimator: &estimator,
            seed: 11,
        };

        let cell = find_extremal_cell(&evecs, &labs_hidden, "T", Some(&fb)).unwrap();
        // the only T row is row 0
        assert_eq!(cell.row, 0);
        assert!(matches!(cell.origin, ExtremalOrigin::Pseudotime { .. }));

        // with two T rows the larger pseudotime wins
        let estimator = FixedPseudotime {
            values: vec![0.4, 0.1, 0.9, 0.6],
        };
        let fb = FallbackSearch {
            points: &points,
            estimator: &estimator,
            seed: 11,
        };
        let evecs_no_t = Mat::from_row_slice(
            4,
            1,
            &[
                0.0, 1.0, -1.0, 0.0, //
            ],
        );
        let cell = find_extremal_cell(&evecs_no_t, &labs, "T", Some(&fb)).unwrap();
        assert_eq!(cell.row, 3);
    }

    #[test]
    fn test_fallback_start_is_not_target_and_seeded() {
        let labs = labels(&["A", "T", "A", "A"]);
        // no T extremum in a single constant-ish column
        let evecs = Mat::from_row_slice(4, 1, &[1.0, 0.0, -1.0, 0.5]);

        let points = Mat::from_row_slice(4, 1, &[0.0, 3.0, 1.0, 2.0]);
        let fb = FallbackSearch {
            points: &points,
            estimator: &EmbeddingDistance,
            seed: 5,
        };

        let c1 = find_extremal_cell(&evecs, &labs, "T", Some(&fb)).unwrap();
        let c2 = find_extremal_cell(&evecs, &labs, "T", Some(&fb)).unwrap();
        assert_eq!(c1, c2, "seeded fallback must be deterministic");

        assert_eq!(c1.row, 1, "only row 1 carries label T");
        let ExtremalOrigin::Pseudotime { start_row } = c1.origin else {
            panic!("expected pseudotime origin");
        };
        assert_ne!(labs[start_row].as_ref(), "T");
    }

    #[test]
    fn test_missing_label_fails_even_with_fallback() {
        let evecs = toy_eigenvectors();
        let labs = labels(&["A", "B", "C", "D"]);
        let points = Mat::zeros(4, 2);
        let fb = FallbackSearch {
            points: &points,
            estimator: &EmbeddingDistance,
            seed: 1,
        };
        let err = find_extremal_cell(&evecs, &labs, "T", Some(&fb)).unwrap_err();
        assert!(err.is::<CellNotFound>());
    }

    #[test]
    fn test_batch_partial_success() {
        let evecs = toy_eigenvectors();
        // A resolves (row 2 is max of component 0); B never matches
        let labs = labels(&["C", "D", "A", "E"]);
        let targets = labels(&["A", "B"]);

        let found = find_extremal_cells(&evecs, &labs, &targets, None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.as_ref(), "A");
        assert_eq!(found[0].1.row, 2);
    }

    #[test]
    fn test_batch_preserves_request_order() {
        let evecs = toy_eigenvectors();
        let labs = labels(&["X", "Y", "A", "B"]);
        let targets = labels(&["B", "A"]);

        let found = find_extremal_cells(&evecs, &labs, &targets, None).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0.as_ref(), "B");
        assert_eq!(found[1].0.as_ref(), "A");
    }
}
