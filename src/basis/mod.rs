//! Spline bases on tensor-product grids and their element-wise evaluation.
//!
//! [`BSplineSpace`] and [`NurbsSpace`] are combined in the closed enum [`ReferenceSpace`].
//! Element values (basis functions, parametric gradients and Hessians at quadrature points)
//! are cached on [`SpaceElement`] accessors by a [`SpaceElementHandler`].
pub mod bernstein;
mod bspline;
mod handler;
mod knot_vector;
mod nurbs;
mod reference_space;
mod values;

pub use bspline::*;
pub use handler::*;
pub use knot_vector::*;
pub use nurbs::*;
pub use reference_space::*;
pub use values::*;
