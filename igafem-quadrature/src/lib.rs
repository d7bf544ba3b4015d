//! Gauss quadrature rules for tensor-product reference cells.
//!
//! Rules are provided both on the classical reference interval `[-1, 1]` and on the unit
//! interval `[0, 1]`, which is the reference cell used by `igafem` for every grid element.
//! Multi-dimensional rules are tensor products of univariate rules, enumerated with the
//! first coordinate direction varying fastest.
//!
//! The crate is independent of `igafem` and only deals in `f64`.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod tensor;
pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A rule with zero points was requested.
    ZeroPoints,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroPoints => write!(f, "A quadrature rule needs at least one point"),
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule, stored as `(weights, points)`.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// Approximates the integral of `f` with the given rule.
pub fn integrate<const D: usize>(rule: &Rule<D>, f: impl Fn(&Point<D>) -> f64) -> f64 {
    let (weights, points) = rule;
    weights
        .iter()
        .zip(points)
        .map(|(w, p)| w * f(p))
        .sum()
}
