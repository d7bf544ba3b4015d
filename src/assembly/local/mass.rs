use crate::assembly::local::{impl_space_connectivity, ElementMatrixAssembler, PhysicalElementCursor};
use crate::basis::ValueTable;
use crate::flags::BasisFlags;
use crate::geometry::IgMapping;
use crate::quadrature::TensorProductQuadrature;
use crate::util::clone_upper_to_lower;
use crate::Real;
use nalgebra::{DMatrixViewMut, Point};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A wrapper type for a number that represents a *density*.
///
/// This is primarily used as a parameter for mass matrix construction.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Density<T>(pub T);

impl<T: Real> Default for Density<T> {
    fn default() -> Self {
        Density(T::zero())
    }
}

impl<T: Display> Display for Density<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Density({})", self.0)
    }
}

/// Element mass matrices `int rho phi_i phi_j dx` over the physical domain of a mapping,
/// integrated with a fixed tensor-product rule.
pub struct ElementMassAssembler<'a, T: Real, const D: usize, const S: usize> {
    cursor: PhysicalElementCursor<'a, T, D, S>,
    density: Box<dyn Fn(&Point<T, S>) -> Density<T> + 'a>,
}

impl<'a, T: Real, const D: usize, const S: usize> ElementMassAssembler<'a, T, D, S> {
    /// Assembler with unit density.
    pub fn new(mapping: &'a IgMapping<T, D, S>, quadrature: &TensorProductQuadrature<T>) -> Self {
        Self {
            cursor: PhysicalElementCursor::new(mapping, BasisFlags::VALUE, quadrature),
            density: Box::new(|_| Density(T::one())),
        }
    }

    pub fn with_uniform_density(self, density: Density<T>) -> Self {
        self.with_density(move |_| density)
    }

    pub fn with_density(self, density: impl Fn(&Point<T, S>) -> Density<T> + 'a) -> Self {
        Self {
            density: Box::new(density),
            ..self
        }
    }
}

impl_space_connectivity!(ElementMassAssembler);

impl<'a, T: Real, const D: usize, const S: usize> ElementMatrixAssembler<T> for ElementMassAssembler<'a, T, D, S> {
    fn assemble_element_matrix_into(&self, element_index: usize, output: DMatrixViewMut<T>) -> eyre::Result<()> {
        self.cursor.with_element(element_index, |element| {
            let density: Vec<T> = element
                .element_points()
                .iter()
                .map(|x| (self.density)(x).0)
                .collect();
            assemble_element_mass_matrix(output, element.element_values(), element.element_w_measures(), &density)
        })
    }
}

/// Assembles the element mass matrix from basis values at quadrature points.
///
/// Given $N$ basis functions on an element $K$, the element mass matrix is
///
/// $$
/// M^K_{IJ} := \int_{K} \rho(x) \\, \phi_I(x) \\, \phi_J(x) \\, \mathrm{d} V \qquad I, J = 1, \dots, N,
/// $$
///
/// approximated by $\sum_q w_q |J_q| \rho(x_q) \phi_I(x_q) \phi_J(x_q)$, where `w_measures`
/// holds the products $w_q |J_q|$.
///
/// # Panics
///
/// Panics if the number of quadrature points differs between the arguments, or if the output
/// is not $N \times N$.
#[allow(non_snake_case)]
pub fn assemble_element_mass_matrix<T: Real>(
    mut output: DMatrixViewMut<T>,
    basis_values: &ValueTable<T>,
    w_measures: &[T],
    density: &[T],
) -> eyre::Result<()> {
    let n = basis_values.num_functions();
    assert_eq!(basis_values.num_points(), w_measures.len());
    assert_eq!(w_measures.len(), density.len());
    assert_eq!(output.nrows(), n, "Output matrix dimension mismatch");
    assert_eq!(output.ncols(), n, "Output matrix dimension mismatch");

    output.fill(T::zero());
    for (q, (&w, &rho)) in w_measures.iter().zip(density).enumerate() {
        let scale = w * rho;
        for I in 0..n {
            // Fill only upper triangle, then copy over lower half at the end
            let phi_I = *basis_values.get(I, q);
            for J in I..n {
                output[(I, J)] += scale * phi_I * *basis_values.get(J, q);
            }
        }
    }
    clone_upper_to_lower(&mut output);
    Ok(())
}
