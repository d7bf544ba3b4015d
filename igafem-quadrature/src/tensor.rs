//! Tensor-product rules on the unit cube `[0, 1]^D`.

use crate::univariate::gauss_unit;
use crate::Rule;

/// A tensor-product Gauss rule on `[0, 1]^D` with `num_points[i]` points along direction `i`.
///
/// Points are enumerated with direction 0 varying fastest.
///
/// # Panics
///
/// Panics if any direction requests zero points.
pub fn tensor_gauss<const D: usize>(num_points: [usize; D]) -> Rule<D> {
    let rules: Vec<_> = num_points.iter().map(|&n| gauss_unit(n)).collect();
    let total: usize = num_points.iter().product();

    let mut weights = Vec::with_capacity(total);
    let mut points = Vec::with_capacity(total);
    let mut index = [0; D];
    for _ in 0..total {
        let mut w = 1.0;
        let mut p = [0.0; D];
        for d in 0..D {
            let (rule_weights, rule_points) = &rules[d];
            w *= rule_weights[index[d]];
            p[d] = rule_points[index[d]][0];
        }
        weights.push(w);
        points.push(p);

        // Mixed-radix increment, direction 0 fastest
        for d in 0..D {
            index[d] += 1;
            if index[d] < num_points[d] {
                break;
            }
            index[d] = 0;
        }
    }

    (weights, points)
}

/// A tensor-product Gauss rule on `[0, 1]^D` with the same number of points in every direction.
pub fn cube_gauss<const D: usize>(num_points_per_dim: usize) -> Rule<D> {
    tensor_gauss([num_points_per_dim; D])
}
