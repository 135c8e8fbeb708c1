//! Linear algebra helpers for covariance surgery.
//!
//! Public API:
//!     pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64>
//!     pub fn is_symmetric(m: &DMatrix<f64>, tol: f64) -> bool
//!     pub fn is_positive_semi_definite(m: &DMatrix<f64>, tol: f64) -> bool
//!     pub fn extract_block(m: &DMatrix<f64>, rows: &[usize], cols: &[usize]) -> DMatrix<f64>
//!     pub fn write_block(m: &mut DMatrix<f64>, indices: &[usize], block: &DMatrix<f64>)
//!     pub fn zero_cross_covariance(m: &mut DMatrix<f64>, indices: &[usize])
//!
//! The block helpers take explicit index lists rather than contiguous ranges because a
//! landmark's depth and bearing live in different groups of the covariance layout.

use nalgebra::DMatrix;
use nalgebra::linalg::SymmetricEigen;

/// Symmetrize a matrix: P ← 0.5 (P + Pᵀ)
///
/// Reduces round-off asymmetry accumulated by repeated covariance updates.
#[inline]
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (m + m.transpose())
}

/// Whether `m` is square and equal to its transpose up to `tol` (absolute, element-wise).
pub fn is_symmetric(m: &DMatrix<f64>, tol: f64) -> bool {
    if !m.is_square() {
        return false;
    }
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            if (m[(i, j)] - m[(j, i)]).abs() > tol {
                return false;
            }
        }
    }
    true
}

/// Whether the symmetric part of `m` has no eigenvalue below `-tol`.
pub fn is_positive_semi_definite(m: &DMatrix<f64>, tol: f64) -> bool {
    if !m.is_square() {
        return false;
    }
    let eig = SymmetricEigen::new(symmetrize(m));
    eig.eigenvalues.iter().all(|&lambda| lambda >= -tol)
}

/// Gather the sub-matrix `m[rows, cols]`.
pub fn extract_block(m: &DMatrix<f64>, rows: &[usize], cols: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), cols.len(), |r, c| m[(rows[r], cols[c])])
}

/// Scatter `block` into `m[indices, indices]`.
///
/// # Panics
/// If `block` is not `indices.len()` square.
pub fn write_block(m: &mut DMatrix<f64>, indices: &[usize], block: &DMatrix<f64>) {
    assert_eq!(
        block.shape(),
        (indices.len(), indices.len()),
        "write_block: block must be {0}x{0}",
        indices.len()
    );
    for (r, &row) in indices.iter().enumerate() {
        for (c, &col) in indices.iter().enumerate() {
            m[(row, col)] = block[(r, c)];
        }
    }
}

/// Zero every entry coupling `indices` to the rest of the matrix, in both directions.
///
/// Entries with both row and column in `indices` are left untouched.
///
/// # Panics
/// If `m` is not square or an index is out of bounds.
pub fn zero_cross_covariance(m: &mut DMatrix<f64>, indices: &[usize]) {
    assert!(m.is_square(), "zero_cross_covariance: matrix must be square");
    let n = m.nrows();
    assert!(
        indices.iter().all(|&k| k < n),
        "zero_cross_covariance: index out of bounds for {}x{} matrix",
        n,
        n
    );
    for k in 0..n {
        if indices.contains(&k) {
            continue;
        }
        for &i in indices {
            m[(i, k)] = 0.0;
            m[(k, i)] = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn filled(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| 1.0 + (i * n + j) as f64)
    }

    #[test]
    fn symmetrize_produces_symmetric_matrix() {
        let m = filled(4);
        assert!(!is_symmetric(&m, 1e-12));
        let s = symmetrize(&m);
        assert!(is_symmetric(&s, 1e-12));
        assert_approx_eq!(s[(0, 1)], 0.5 * (m[(0, 1)] + m[(1, 0)]));
    }

    #[test]
    fn non_square_is_not_symmetric() {
        assert!(!is_symmetric(&DMatrix::zeros(2, 3), 1e-12));
        assert!(!is_positive_semi_definite(&DMatrix::zeros(2, 3), 1e-12));
    }

    #[test]
    fn positive_semi_definite_check() {
        assert!(is_positive_semi_definite(&DMatrix::identity(3, 3), 1e-12));
        let mut m = DMatrix::identity(3, 3);
        m[(2, 2)] = -0.5;
        assert!(!is_positive_semi_definite(&m, 1e-12));
        m[(2, 2)] = 0.0;
        assert!(is_positive_semi_definite(&m, 1e-12));
    }

    #[test]
    fn write_then_extract_scattered_block() {
        let mut m = DMatrix::zeros(6, 6);
        let indices = [1, 4, 5];
        let block = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 5.0, 3.0, 5.0, 6.0]);
        write_block(&mut m, &indices, &block);
        assert_eq!(extract_block(&m, &indices, &indices), block);
        assert_eq!(m[(1, 4)], 2.0);
        assert_eq!(m[(5, 1)], 3.0);
        assert_eq!(m[(0, 0)], 0.0);
        assert_eq!(m[(2, 3)], 0.0);
    }

    #[test]
    #[should_panic]
    fn write_block_rejects_wrong_shape() {
        let mut m = DMatrix::zeros(4, 4);
        write_block(&mut m, &[0, 1], &DMatrix::identity(3, 3));
    }

    #[test]
    fn zero_cross_covariance_keeps_inner_block_and_rest() {
        let mut m = filled(6);
        let original = m.clone();
        let indices = [1, 4];
        zero_cross_covariance(&mut m, &indices);
        for i in 0..6 {
            for j in 0..6 {
                let i_in = indices.contains(&i);
                let j_in = indices.contains(&j);
                if i_in != j_in {
                    assert_eq!(m[(i, j)], 0.0);
                } else {
                    assert_eq!(m[(i, j)], original[(i, j)]);
                }
            }
        }
    }
}
