use nalgebra::{Matrix2, Matrix3, SymmetricEigen, Vector2, Vector3};
use num_traits::Float;

use crate::traits::Scalar;

/// Eigendecomposition of a 2x2 matrix.
///
/// The input is symmetrized before solving, so a matrix that is symmetric
/// only up to round-off produces a real spectrum rather than a spurious
/// complex pair. Eigenvalues come back in the solver's native order and may
/// be negative; the columns of the returned matrix are the matching
/// eigenvectors.
pub fn decompose_2<T: Scalar>(m: &Matrix2<T>) -> (Vector2<T>, Matrix2<T>) {
    let half = T::from_f64(0.5).unwrap();
    let eigen = SymmetricEigen::new((m + m.transpose()) * half);
    (eigen.eigenvalues, eigen.eigenvectors)
}

/// Eigendecomposition of a 3x3 matrix. See [`decompose_2`].
pub fn decompose_3<T: Scalar>(m: &Matrix3<T>) -> (Vector3<T>, Matrix3<T>) {
    let half = T::from_f64(0.5).unwrap();
    let eigen = SymmetricEigen::new((m + m.transpose()) * half);
    (eigen.eigenvalues, eigen.eigenvectors)
}

/// Rebuild `V * diag(values) * V^T` from eigenvalues and a
/// columns-as-eigenvectors matrix.
pub fn recompose_2<T: Scalar>(values: &Vector2<T>, vectors: &Matrix2<T>) -> Matrix2<T> {
    vectors * Matrix2::from_diagonal(values) * vectors.transpose()
}

/// Rebuild `V * diag(values) * V^T` for the 3x3 case.
pub fn recompose_3<T: Scalar>(values: &Vector3<T>, vectors: &Matrix3<T>) -> Matrix3<T> {
    vectors * Matrix3::from_diagonal(values) * vectors.transpose()
}

/// Ratio of the smallest to the largest eigenvalue magnitude.
///
/// 1 means isotropic, values near 0 mean strongly anisotropic. A zero
/// spectrum yields NaN (0/0); callers screen out the zero matrix first.
pub fn aspect_ratio<T: Scalar>(eigenvalues: &[T]) -> T {
    let mut min = Float::abs(eigenvalues[0]);
    let mut max = min;
    for &value in &eigenvalues[1..] {
        let value = Float::abs(value);
        min = Float::min(min, value);
        max = Float::max(max, value);
    }
    min / max
}

/// Exact equality-to-zero test on a component buffer, not an epsilon test.
/// The zero matrix is the "no metric information" state and must be
/// detected exactly.
pub fn is_zero<T: Scalar>(components: &[T]) -> bool {
    components.iter().all(|c| c.is_zero())
}
