use crate::{Error, Real, Result};
use nalgebra::DMatrix;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A non-decreasing knot vector together with the polynomial degree of its B-splines.
///
/// Knot vectors built by [`KnotVector::open`] are open (clamped): the end knots are repeated
/// `degree + 1` times, so the first and last basis functions interpolate at the domain ends.
/// Knot vectors built by [`KnotVector::periodic`] continue the breakpoints periodically past
/// both ends instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnotVector<T> {
    knots: Vec<T>,
    degree: usize,
}

impl<T: Real> KnotVector<T> {
    pub fn new(knots: Vec<T>, degree: usize) -> Result<Self> {
        if knots.len() < 2 * (degree + 1) {
            return Err(Error::InvalidKnots {
                direction: 0,
                reason: format!("degree {degree} needs at least {} knots, got {}", 2 * (degree + 1), knots.len()),
            });
        }
        if knots.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(Error::InvalidKnots {
                direction: 0,
                reason: "knots must be non-decreasing".to_string(),
            });
        }
        Ok(Self { knots, degree })
    }

    /// Open knot vector over the given breakpoints, with every interior breakpoint repeated
    /// `interior_multiplicity` times.
    ///
    /// # Panics
    ///
    /// Panics if fewer than two breakpoints are given or the multiplicity is zero.
    pub fn open(breakpoints: &[T], degree: usize, interior_multiplicity: usize) -> Self {
        assert!(breakpoints.len() >= 2, "need at least two breakpoints");
        assert!(interior_multiplicity > 0, "interior multiplicity must be positive");
        let last = breakpoints.len() - 1;
        let mut knots = Vec::new();
        for (i, &x) in breakpoints.iter().enumerate() {
            let repetitions = if i == 0 || i == last { degree + 1 } else { interior_multiplicity };
            knots.extend(std::iter::repeat(x).take(repetitions));
        }
        Self { knots, degree }
    }

    /// Knot vector over the given breakpoints, extended by `degree` knots on each side so that
    /// the knot spacing continues periodically.
    ///
    /// On the `n` intervals between the breakpoints it carries `n + degree` basis functions, and
    /// functions `i` and `i + n` are restrictions of the same periodic function.
    ///
    /// # Panics
    ///
    /// Panics unless there are more intervals than the degree.
    pub fn periodic(breakpoints: &[T], degree: usize) -> Self {
        let n = breakpoints.len().saturating_sub(1);
        assert!(n > degree, "periodic degree {degree} needs more than {n} intervals");
        let length = breakpoints[n] - breakpoints[0];
        let knots = breakpoints[n - degree..n]
            .iter()
            .map(|&x| x - length)
            .chain(breakpoints.iter().copied())
            .chain(breakpoints[1..=degree].iter().map(|&x| x + length))
            .collect();
        Self { knots, degree }
    }

    pub fn knots(&self) -> &[T] {
        &self.knots
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn num_basis(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    /// Index `i` of the knot span `[u_i, u_{i+1})` containing `u`.
    ///
    /// The upper end of the domain is assigned to the last non-empty span.
    pub fn find_span(&self, u: T) -> usize {
        let n = self.num_basis() - 1;
        let p = self.degree;
        let knots = &self.knots;
        if u >= knots[n + 1] {
            return n;
        }
        if u <= knots[p] {
            return p;
        }
        let (mut low, mut high) = (p, n + 1);
        let mut mid = (low + high) / 2;
        while u < knots[mid] || u >= knots[mid + 1] {
            if u < knots[mid] {
                high = mid;
            } else {
                low = mid;
            }
            mid = (low + high) / 2;
        }
        mid
    }

    /// Values and derivatives up to order `num_derivatives` of the `degree + 1` basis functions
    /// that are non-zero on span `span`, evaluated at `u`.
    ///
    /// Entry `(k, j)` is the `k`-th derivative of basis function `span - degree + j`.
    /// Derivatives of order higher than the degree are zero.
    pub fn basis_functions_with_derivatives(&self, span: usize, u: T, num_derivatives: usize) -> DMatrix<T> {
        let p = self.degree;
        let knots = &self.knots;
        let n = num_derivatives.min(p);
        let mut ders = DMatrix::zeros(num_derivatives + 1, p + 1);

        // ndu stores basis functions in its upper triangle and knot differences in its lower
        let mut ndu = DMatrix::zeros(p + 1, p + 1);
        let mut left = vec![T::zero(); p + 1];
        let mut right = vec![T::zero(); p + 1];
        ndu[(0, 0)] = T::one();
        for j in 1..=p {
            left[j] = u - knots[span + 1 - j];
            right[j] = knots[span + j] - u;
            let mut saved = T::zero();
            for r in 0..j {
                ndu[(j, r)] = right[r + 1] + left[j - r];
                let temp = ndu[(r, j - 1)] / ndu[(j, r)];
                ndu[(r, j)] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[(j, j)] = saved;
        }
        for j in 0..=p {
            ders[(0, j)] = ndu[(j, p)];
        }

        let p_signed = p as isize;
        let mut a = DMatrix::zeros(2, p + 1);
        for r in 0..=p {
            let r_signed = r as isize;
            let (mut s1, mut s2) = (0, 1);
            a[(0, 0)] = T::one();
            for k in 1..=n {
                let k_signed = k as isize;
                let mut d = T::zero();
                let rk = r_signed - k_signed;
                let pk = p_signed - k_signed;
                if rk >= 0 {
                    a[(s2, 0)] = a[(s1, 0)] / ndu[((pk + 1) as usize, rk as usize)];
                    d = a[(s2, 0)] * ndu[(rk as usize, pk as usize)];
                }
                let j1 = if rk >= -1 { 1 } else { -rk };
                let j2 = if r_signed - 1 <= pk { k_signed - 1 } else { p_signed - r_signed };
                for j in j1..=j2 {
                    let j = j as usize;
                    let col = (rk + j as isize) as usize;
                    a[(s2, j)] = (a[(s1, j)] - a[(s1, j - 1)]) / ndu[((pk + 1) as usize, col)];
                    d += a[(s2, j)] * ndu[(col, pk as usize)];
                }
                if r_signed <= pk {
                    a[(s2, k)] = -a[(s1, k - 1)] / ndu[((pk + 1) as usize, r)];
                    d += a[(s2, k)] * ndu[(r, pk as usize)];
                }
                ders[(k, r)] = d;
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        let mut factor = T::from_count(p);
        for k in 1..=n {
            for j in 0..=p {
                ders[(k, j)] *= factor;
            }
            factor *= T::from_count(p - k);
        }
        ders
    }

    /// Values of all basis functions at `u`, as a dense vector of length `num_basis`.
    pub fn evaluate_all(&self, u: T) -> Vec<T> {
        let span = self.find_span(u);
        let local = self.basis_functions_with_derivatives(span, u, 0);
        let mut values = vec![T::zero(); self.num_basis()];
        for j in 0..=self.degree {
            values[span - self.degree + j] = local[(0, j)];
        }
        values
    }

    /// Greville abscissae: averages of `degree` consecutive interior knots per basis function.
    ///
    /// For degree zero the midpoints of the supports are used.
    #[replace_float_literals(T::from_f64_lossy(literal))]
    pub fn greville_abscissae(&self) -> Vec<T> {
        let p = self.degree;
        (0..self.num_basis())
            .map(|i| {
                if p == 0 {
                    (self.knots[i] + self.knots[i + 1]) / 2.0
                } else {
                    let sum = self.knots[i + 1..=i + p]
                        .iter()
                        .fold(T::zero(), |acc, &k| acc + k);
                    sum / T::from_count(p)
                }
            })
            .collect()
    }

    /// The knot vector with the given knots merged in.
    pub fn with_inserted(&self, new_knots: &[T]) -> Self {
        let mut knots: Vec<T> = self.knots.iter().chain(new_knots).copied().collect();
        knots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        Self {
            knots,
            degree: self.degree,
        }
    }
}
