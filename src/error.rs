//! Functionality for error estimation.
use crate::assembly::global::assemble_scalar;
use crate::assembly::local::{impl_space_connectivity, ElementScalarAssembler, PhysicalElementCursor};
use crate::basis::ValueTable;
use crate::flags::BasisFlags;
use crate::function::IgFunction;
use crate::geometry::IgMapping;
use crate::quadrature::TensorProductQuadrature;
use crate::util::extract_by_indices;
use crate::{Error, Real};
use nalgebra::{Point, SVector};

/// Estimate the squared $L^2$ error $\norm{u_h - u}^2_{L^2(K)}$ on one element.
///
/// `u_h_element` holds the coefficients of the element's basis functions and `u` the exact
/// solution at the quadrature points.
///
/// # Panics
///
/// Panics if the lengths of the arguments are inconsistent with the basis table.
pub fn estimate_element_l2_error_squared<T: Real>(
    basis_values: &ValueTable<T>,
    w_measures: &[T],
    u_h_element: &[T],
    u: &[T],
) -> T {
    assert_eq!(basis_values.num_functions(), u_h_element.len());
    assert_eq!(basis_values.num_points(), w_measures.len());
    assert_eq!(w_measures.len(), u.len());

    let u_h = basis_values.linear_combination(u_h_element);
    w_measures
        .iter()
        .zip(u_h)
        .zip(u)
        .fold(T::zero(), |acc, ((&w, u_h), &u)| {
            let error = u_h - u;
            acc + w * error * error
        })
}

/// Estimate the squared $H^1$ *seminorm* error $\seminorm{u_h - u}^2_{H^1(K)}$ on one element
/// from physical basis gradients.
///
/// # Panics
///
/// Panics if the lengths of the arguments are inconsistent with the gradient table.
pub fn estimate_element_h1_seminorm_error_squared<T: Real, const S: usize>(
    basis_gradients: &ValueTable<SVector<T, S>>,
    w_measures: &[T],
    u_h_element: &[T],
    u_grad: &[SVector<T, S>],
) -> T {
    assert_eq!(basis_gradients.num_functions(), u_h_element.len());
    assert_eq!(basis_gradients.num_points(), w_measures.len());
    assert_eq!(w_measures.len(), u_grad.len());

    let u_h_grad = basis_gradients.linear_combination(u_h_element);
    w_measures
        .iter()
        .zip(u_h_grad)
        .zip(u_grad)
        .fold(T::zero(), |acc, ((&w, u_h_grad), u_grad)| {
            acc + w * (u_h_grad - u_grad).norm_squared()
        })
}

enum ExactSolution<'a, T: Real, const S: usize> {
    Value(Box<dyn Fn(&Point<T, S>) -> T + 'a>),
    Gradient(Box<dyn Fn(&Point<T, S>) -> SVector<T, S> + 'a>),
}

/// Squared element errors of a discrete field against an exact solution.
struct ElementErrorAssembler<'a, T: Real, const D: usize, const S: usize> {
    cursor: PhysicalElementCursor<'a, T, D, S>,
    u_h: &'a IgFunction<T, D>,
    exact: ExactSolution<'a, T, S>,
}

impl<'a, T: Real, const D: usize, const S: usize> ElementErrorAssembler<'a, T, D, S> {
    fn new(
        mapping: &'a IgMapping<T, D, S>,
        u_h: &'a IgFunction<T, D>,
        exact: ExactSolution<'a, T, S>,
        quadrature: &TensorProductQuadrature<T>,
    ) -> Result<Self, Error> {
        // The basis is evaluated on the mapping's space, so the coefficients must belong to it
        if u_h.space() != mapping.space() {
            return Err(Error::IncompatibleSpace("discrete solution"));
        }
        let flags = match exact {
            ExactSolution::Value(_) => BasisFlags::VALUE,
            ExactSolution::Gradient(_) => BasisFlags::GRADIENT,
        };
        Ok(Self {
            cursor: PhysicalElementCursor::new(mapping, flags, quadrature),
            u_h,
            exact,
        })
    }
}

impl_space_connectivity!(ElementErrorAssembler);

impl<'a, T: Real, const D: usize, const S: usize> ElementScalarAssembler<T> for ElementErrorAssembler<'a, T, D, S> {
    fn assemble_element_scalar(&self, element_index: usize) -> eyre::Result<T> {
        self.cursor.with_element(element_index, |element| {
            let u_h_element = extract_by_indices(self.u_h.coefficients(), &element.local_to_global());
            let points = element.element_points();
            let error = match &self.exact {
                ExactSolution::Value(u) => {
                    let u: Vec<T> = points.iter().map(|x| u(x)).collect();
                    estimate_element_l2_error_squared(
                        element.element_values(),
                        element.element_w_measures(),
                        &u_h_element,
                        &u,
                    )
                }
                ExactSolution::Gradient(u_grad) => {
                    let u_grad: Vec<SVector<T, S>> = points.iter().map(|x| u_grad(x)).collect();
                    estimate_element_h1_seminorm_error_squared(
                        element.element_gradients(),
                        element.element_w_measures(),
                        &u_h_element,
                        &u_grad,
                    )
                }
            };
            Ok(error)
        })
    }
}

/// Estimate the $L^2$ error $\norm{u_h - u}_{L^2(\Omega)}$ of a field on the physical domain
/// of `mapping`.
///
/// `u_h` must be defined on the space of the mapping.
pub fn estimate_l2_error<'a, T: Real, const D: usize, const S: usize>(
    mapping: &'a IgMapping<T, D, S>,
    u_h: &'a IgFunction<T, D>,
    u: impl Fn(&Point<T, S>) -> T + 'a,
    quadrature: &TensorProductQuadrature<T>,
) -> eyre::Result<T> {
    let assembler = ElementErrorAssembler::new(mapping, u_h, ExactSolution::Value(Box::new(u)), quadrature)?;
    Ok(assemble_scalar(&assembler)?.sqrt())
}

/// Estimate the $H^1$ seminorm error $\seminorm{u_h - u}_{H^1(\Omega)}$, given the gradient of
/// the exact solution.
pub fn estimate_h1_seminorm_error<'a, T: Real, const D: usize, const S: usize>(
    mapping: &'a IgMapping<T, D, S>,
    u_h: &'a IgFunction<T, D>,
    u_grad: impl Fn(&Point<T, S>) -> SVector<T, S> + 'a,
    quadrature: &TensorProductQuadrature<T>,
) -> eyre::Result<T> {
    let assembler =
        ElementErrorAssembler::new(mapping, u_h, ExactSolution::Gradient(Box::new(u_grad)), quadrature)?;
    Ok(assemble_scalar(&assembler)?.sqrt())
}
