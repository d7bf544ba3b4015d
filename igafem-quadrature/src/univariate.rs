//! Quadrature rules for the one-dimensional domains `[-1, 1]` and `[0, 1]`.

use crate::{Error, Rule};
use std::f64::consts::PI;

/// Legendre polynomial $p_n$ evaluated at a point, along with $p_{n-1}$.
///
/// The derivative formula is singular at |x| == 1, so this is only suitable for the open
/// interval (-1, 1).
#[derive(Debug, Default)]
struct Legendre {
    n: usize,
    x: f64,
    p_n: f64,
    p_prev: f64,
}

impl Legendre {
    fn at(n: usize, x: f64) -> Self {
        // (m + 1) P_{m + 1}(x) = (2m + 1) x P_m(x) - m P_{m - 1}(x)
        let (mut p_n, mut p_prev) = (1.0, 0.0);
        for m in 0..n {
            let m = m as f64;
            let p_next = ((2.0 * m + 1.0) * x * p_n - m * p_prev) / (m + 1.0);
            p_prev = p_n;
            p_n = p_next;
        }
        Self { n, x, p_n, p_prev }
    }

    fn value(&self) -> f64 {
        self.p_n
    }

    fn derivative(&self) -> f64 {
        let n = self.n as f64;
        n * (self.x * self.p_n - self.p_prev) / (self.x * self.x - 1.0)
    }
}

/// Gauss-Legendre quadrature with `num_points` points on `[-1, 1]`.
///
/// Given `n` points, the rule integrates polynomials of degree up to `2n - 1` exactly.
/// Points are returned in increasing order.
pub fn try_gauss(num_points: usize) -> Result<Rule<1>, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::ZeroPoints);
    }

    let num_unique = (n + 1) / 2;
    let mut points = vec![[0.0]; n];
    let mut weights = vec![0.0; n];

    for i in 0..num_unique {
        // Chebyshev-like initial guess for the i-th largest root, refined by Newton iterations
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..100 {
            let p = Legendre::at(n, x);
            let dx = -p.value() / p.derivative();
            x += dx;
            if dx.abs() <= 1e-15 {
                break;
            }
        }
        let dp = Legendre::at(n, x).derivative();
        let w = 2.0 / ((1.0 - x * x) * dp * dp);

        points[i] = [-x];
        weights[i] = w;
        points[n - 1 - i] = [x];
        weights[n - 1 - i] = w;
    }

    Ok((weights, points))
}

/// Gauss-Legendre quadrature with `num_points` points on `[-1, 1]`.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule<1> {
    try_gauss(num_points).expect("number of points must be positive")
}

/// Gauss-Legendre quadrature with `num_points` points on the unit interval `[0, 1]`.
///
/// The weights sum to one.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss_unit(num_points: usize) -> Rule<1> {
    let (weights, points) = gauss(num_points);
    let weights = weights.into_iter().map(|w| 0.5 * w).collect();
    let points = points.into_iter().map(|[x]| [0.5 * (x + 1.0)]).collect();
    (weights, points)
}
