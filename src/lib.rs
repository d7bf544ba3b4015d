//! Isogeometric analysis on tensor-product patches.
//!
//! A patch is described by a [`Grid`](grid::Grid) of parametric elements, a spline
//! [`ReferenceSpace`](basis::ReferenceSpace) on that grid (B-spline or NURBS), and a geometric
//! [`IgMapping`](geometry::IgMapping) into physical space. Discrete fields are
//! [`IgFunction`](function::IgFunction)s. Per-element values are computed by cache handlers
//! (`reset`, `init_cache`, `fill_cache`) and consumed by the element assemblers in
//! [`assembly`], including the sum-factorized mass matrix in [`sum_factorization`].

pub mod assembly;
pub mod basis;
pub mod cache;
pub mod error;
pub mod flags;
pub mod function;
pub mod geometry;
pub mod grid;
pub mod grid_element;
pub mod handler;
pub mod knot_insertion;
pub mod multi_array;
pub mod quadrature;
pub mod sum_factorization;
pub mod tensor_index;
pub mod unit_element;
pub mod util;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use igafem_traits::Real;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid knots in direction {direction}: {reason}")]
    InvalidKnots { direction: usize, reason: String },
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("weight {index} must be positive")]
    NonPositiveWeight { index: usize },
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("NURBS support is disabled (enable the `nurbs` feature)")]
    NurbsDisabled,
    #[error("point lies outside the parametric domain along direction {direction}")]
    PointOutsideDomain { direction: usize },
    #[error("singular matrix encountered in {0}")]
    SingularMatrix(&'static str),
    #[error("refinement does not apply to this grid")]
    IncompatibleRefinement,
    #[error("invalid linear constraint: {0}")]
    InvalidConstraint(&'static str),
    #[error("{0} is not defined on the space of the mapping")]
    IncompatibleSpace(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
