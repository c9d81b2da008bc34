use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Dense copy of a sparse matrix.
pub fn to_dense(m: &CscMatrix<f32>) -> DMatrix<f32> {
    let mut out = DMatrix::zeros(m.nrows(), m.ncols());
    for (i, j, v) in m.triplet_iter() {
        out[(i, j)] += *v;
    }
    out
}

/// Row sums of a sparse matrix.
pub fn row_sums(m: &CscMatrix<f32>) -> DVector<f32> {
    let mut d = DVector::zeros(m.nrows());
    for (i, _, v) in m.triplet_iter() {
        d[i] += *v;
    }
    d
}

/// Rescale every stored entry: `out[i,j] = row[i] * m[i,j] * col[j]`.
///
/// Entries scaled to zero are dropped from the result.
pub fn scale_rows_cols(
    m: &CscMatrix<f32>,
    row: &DVector<f32>,
    col: &DVector<f32>,
) -> CscMatrix<f32> {
    let mut coo = CooMatrix::new(m.nrows(), m.ncols());
    for (i, j, v) in m.triplet_iter() {
        let w = row[i] * *v * col[j];
        if w != 0.0 {
            coo.push(i, j, w);
        }
    }
    CscMatrix::from(&coo)
}

/// `y = m * x` exploiting the column-major CSC layout.
pub fn mul_vec(m: &CscMatrix<f32>, x: &DVector<f32>) -> DVector<f32> {
    let mut y = DVector::zeros(m.nrows());
    for (j, col) in m.col_iter().enumerate() {
        let xj = x[j];
        if xj == 0.0 {
            continue;
        }
        for (&i, &v) in col.row_indices().iter().zip(col.values()) {
            y[i] += v * xj;
        }
    }
    y
}

/// Structural symmetry check with an elementwise tolerance.
///
/// The sparsity pattern must be symmetric as well; a stored explicit zero
/// opposite a missing entry counts as asymmetric.
pub fn is_symmetric(m: &CscMatrix<f32>, tol: f32) -> bool {
    if m.nrows() != m.ncols() {
        return false;
    }
    let mt = m.transpose();
    if m.nnz() != mt.nnz() {
        return false;
    }
    m.triplet_iter()
        .zip(mt.triplet_iter())
        .all(|((i1, j1, v1), (i2, j2, v2))| i1 == i2 && j1 == j2 && (v1 - v2).abs() <= tol)
}
