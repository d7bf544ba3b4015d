//! Bernstein polynomials on the unit interval.
//!
//! $B^q_i(x) = \binom{q}{i} x^i (1 - x)^{q - i}$ for $i = 0, \dots, q$.
use crate::Real;
use nalgebra::DMatrix;
use num::integer::binomial;

/// Values of all Bernstein polynomials of the given degree at the given points.
///
/// Returns a `(degree + 1) x points.len()` matrix.
pub fn evaluate<T: Real>(degree: usize, points: &[T]) -> DMatrix<T> {
    DMatrix::from_fn(degree + 1, points.len(), |i, q| {
        let x = points[q];
        T::from_count(binomial(degree, i)) * x.powi(i as i32) * (T::one() - x).powi((degree - i) as i32)
    })
}

/// First derivatives of all Bernstein polynomials of the given degree at the given points.
pub fn evaluate_derivatives<T: Real>(degree: usize, points: &[T]) -> DMatrix<T> {
    if degree == 0 {
        return DMatrix::zeros(1, points.len());
    }
    // d/dx B^q_i = q (B^{q-1}_{i-1} - B^{q-1}_i)
    let lower = evaluate(degree - 1, points);
    let q = T::from_count(degree);
    DMatrix::from_fn(degree + 1, points.len(), |i, p| {
        let left = if i > 0 { lower[(i - 1, p)] } else { T::zero() };
        let right = if i < degree { lower[(i, p)] } else { T::zero() };
        q * (left - right)
    })
}

/// The mass matrix $\int_0^1 B^q_i B^q_j \, dx$ in closed form.
pub fn mass_matrix_1d<T: Real>(degree: usize) -> DMatrix<T> {
    let q = degree;
    DMatrix::from_fn(q + 1, q + 1, |i, j| {
        let numerator = T::from_count(binomial(q, i)) * T::from_count(binomial(q, j));
        let denominator = T::from_count(2 * q + 1) * T::from_count(binomial(2 * q, i + j));
        numerator / denominator
    })
}
