//! Tensor-product quadrature on the unit cube.
use crate::tensor_index::{compute_weight_dyn, flat_to_tensor_dyn_into};
use crate::Real;
use igafem_quadrature::univariate::gauss_unit;
use serde::{Deserialize, Serialize};

/// A tensor-product quadrature rule on `[0, 1]^k` for runtime rank `k`.
///
/// The rule is stored as one univariate rule per direction. Flat point indices enumerate the
/// tensor grid with direction 0 fastest. A rule of rank zero has a single point with weight one
/// and is used for vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorProductQuadrature<T> {
    points: Vec<Vec<T>>,
    weights: Vec<Vec<T>>,
}

fn gauss_on_unit_interval<T: Real>(n: usize) -> (Vec<T>, Vec<T>) {
    let (weights, points) = gauss_unit(n);
    (
        points.into_iter().map(|[x]| T::from_f64_lossy(x)).collect(),
        weights.into_iter().map(T::from_f64_lossy).collect(),
    )
}

impl<T: Real> TensorProductQuadrature<T> {
    /// Gauss rule of the given rank with the same number of points in every direction.
    ///
    /// # Panics
    ///
    /// Panics if zero points are requested.
    pub fn gauss(num_points_per_direction: usize, rank: usize) -> Self {
        Self::gauss_with_sizes(&vec![num_points_per_direction; rank])
    }

    /// Gauss rule with `sizes[i]` points along direction `i`.
    pub fn gauss_with_sizes(sizes: &[usize]) -> Self {
        let (points, weights) = sizes.iter().map(|&n| gauss_on_unit_interval(n)).unzip();
        Self { points, weights }
    }

    /// Builds a rule from per-direction univariate points and weights.
    ///
    /// # Panics
    ///
    /// Panics if the number of directions or the number of points in a direction differ.
    pub fn from_univariate(points: Vec<Vec<T>>, weights: Vec<Vec<T>>) -> Self {
        assert_eq!(points.len(), weights.len(), "points and weights must have the same rank");
        for (p, w) in points.iter().zip(&weights) {
            assert_eq!(p.len(), w.len(), "each direction needs one weight per point");
        }
        Self { points, weights }
    }

    pub fn rank(&self) -> usize {
        self.points.len()
    }

    pub fn num_points_direction(&self, direction: usize) -> usize {
        self.points[direction].len()
    }

    pub fn num_points_per_direction(&self) -> Vec<usize> {
        self.points.iter().map(Vec::len).collect()
    }

    pub fn num_points(&self) -> usize {
        self.points.iter().map(Vec::len).product()
    }

    pub fn points_direction(&self, direction: usize) -> &[T] {
        &self.points[direction]
    }

    pub fn weights_direction(&self, direction: usize) -> &[T] {
        &self.weights[direction]
    }

    /// Coordinates of all points in flat order, each of length `rank`.
    pub fn flat_points(&self) -> Vec<Vec<T>> {
        let sizes = self.num_points_per_direction();
        let stride = compute_weight_dyn(&sizes);
        let mut index = vec![0; self.rank()];
        (0..self.num_points())
            .map(|flat| {
                flat_to_tensor_dyn_into(flat, &stride, &mut index);
                index
                    .iter()
                    .enumerate()
                    .map(|(d, &i)| self.points[d][i])
                    .collect()
            })
            .collect()
    }

    /// Weights of all points in flat order.
    pub fn flat_weights(&self) -> Vec<T> {
        let sizes = self.num_points_per_direction();
        let stride = compute_weight_dyn(&sizes);
        let mut index = vec![0; self.rank()];
        (0..self.num_points())
            .map(|flat| {
                flat_to_tensor_dyn_into(flat, &stride, &mut index);
                index
                    .iter()
                    .enumerate()
                    .fold(T::one(), |w, (d, &i)| w * self.weights[d][i])
            })
            .collect()
    }

    pub fn integrate(&self, mut f: impl FnMut(&[T]) -> T) -> T {
        self.flat_points()
            .iter()
            .zip(self.flat_weights())
            .fold(T::zero(), |acc, (x, w)| acc + w * f(x))
    }
}
