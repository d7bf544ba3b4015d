use crate::Real;
use nalgebra::storage::StorageMut;
use nalgebra::{DMatrix, Dim, Matrix, SMatrix, Scalar};

/// Clones the upper triangle entries into the lower triangle entries.
///
/// The primary use case for this is to construct a full symmetric matrix from a symmetric
/// matrix represented only by its upper triangular entries.
pub(crate) fn clone_upper_to_lower<T, R, C, S>(matrix: &mut Matrix<T, R, C, S>)
where
    T: Scalar,
    R: Dim,
    C: Dim,
    S: StorageMut<T, R, C>,
{
    for j in 0..matrix.ncols() {
        for i in (j + 1)..matrix.nrows() {
            matrix[(i, j)] = matrix[(j, i)].clone();
        }
    }
}

/// Gathers `values[i]` for every index in `indices`.
pub fn extract_by_indices<V: Clone>(values: &[V], indices: &[usize]) -> Vec<V> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

fn to_dynamic<T: Real, const R: usize, const C: usize>(matrix: &SMatrix<T, R, C>) -> DMatrix<T> {
    DMatrix::from_column_slice(R, C, matrix.as_slice())
}

/// The measure `sqrt(det(J^T J))` of a Jacobian `J` with `S >= D`.
///
/// For square Jacobians this is `|det J|`.
pub fn jacobian_measure<T: Real, const S: usize, const D: usize>(jacobian: &SMatrix<T, S, D>) -> T {
    let gram = jacobian.transpose() * jacobian;
    let det = to_dynamic(&gram).determinant();
    if det <= T::zero() {
        T::zero()
    } else {
        det.sqrt()
    }
}

/// The `k`-dimensional measure `sqrt(det(J_a^T J_a))`, where `J_a` holds the columns of `J`
/// for the `k` active directions of a sub-element.
///
/// Vertices (no active direction) have measure one.
pub fn sub_jacobian_measure<T: Real, const S: usize, const D: usize>(jacobian: &SMatrix<T, S, D>, active: &[usize]) -> T {
    if active.is_empty() {
        return T::one();
    }
    let gram = DMatrix::from_fn(active.len(), active.len(), |a, b| {
        jacobian.column(active[a]).dot(&jacobian.column(active[b]))
    });
    let det = gram.determinant();
    if det <= T::zero() {
        T::zero()
    } else {
        det.sqrt()
    }
}

/// `J (J^T J)^{-1}`, which reduces to `J^{-T}` for square Jacobians.
///
/// Returns `None` if the Jacobian does not have full column rank.
pub fn inverse_jacobian_transpose<T: Real, const S: usize, const D: usize>(
    jacobian: &SMatrix<T, S, D>,
) -> Option<SMatrix<T, S, D>> {
    let gram = jacobian.transpose() * jacobian;
    let inverse = to_dynamic(&gram).try_inverse()?;
    let inverse = SMatrix::<T, D, D>::from_column_slice(inverse.as_slice());
    Some(jacobian * inverse)
}
