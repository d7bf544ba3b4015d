use crate::assembly::local::{impl_space_connectivity, ElementMatrixAssembler, PhysicalElementCursor};
use crate::basis::ValueTable;
use crate::flags::BasisFlags;
use crate::geometry::IgMapping;
use crate::quadrature::TensorProductQuadrature;
use crate::util::clone_upper_to_lower;
use crate::Real;
use nalgebra::{DMatrixViewMut, Point, SVector};

/// Element stiffness matrices of the Laplace operator, `int a grad phi_i . grad phi_j dx`.
pub struct ElementStiffnessAssembler<'a, T: Real, const D: usize, const S: usize> {
    cursor: PhysicalElementCursor<'a, T, D, S>,
    coefficient: Box<dyn Fn(&Point<T, S>) -> T + 'a>,
}

impl<'a, T: Real, const D: usize, const S: usize> ElementStiffnessAssembler<'a, T, D, S> {
    pub fn new(mapping: &'a IgMapping<T, D, S>, quadrature: &TensorProductQuadrature<T>) -> Self {
        Self {
            cursor: PhysicalElementCursor::new(mapping, BasisFlags::GRADIENT, quadrature),
            coefficient: Box::new(|_| T::one()),
        }
    }

    /// Scalar diffusion coefficient `a(x)`.
    pub fn with_coefficient(self, coefficient: impl Fn(&Point<T, S>) -> T + 'a) -> Self {
        Self {
            coefficient: Box::new(coefficient),
            ..self
        }
    }
}

impl_space_connectivity!(ElementStiffnessAssembler);

impl<'a, T: Real, const D: usize, const S: usize> ElementMatrixAssembler<T>
    for ElementStiffnessAssembler<'a, T, D, S>
{
    fn assemble_element_matrix_into(&self, element_index: usize, output: DMatrixViewMut<T>) -> eyre::Result<()> {
        self.cursor.with_element(element_index, |element| {
            let coefficient: Vec<T> = element
                .element_points()
                .iter()
                .map(|x| (self.coefficient)(x))
                .collect();
            assemble_element_stiffness_matrix(
                output,
                element.element_gradients(),
                element.element_w_measures(),
                &coefficient,
            )
        })
    }
}

/// Assembles $A^K_{IJ} = \sum_q w_q |J_q| a(x_q) \nabla \phi_I(x_q) \cdot \nabla \phi_J(x_q)$
/// from physical gradients at the quadrature points.
///
/// # Panics
///
/// Panics if the number of quadrature points differs between the arguments, or if the output
/// has the wrong dimensions.
#[allow(non_snake_case)]
pub fn assemble_element_stiffness_matrix<T: Real, const S: usize>(
    mut output: DMatrixViewMut<T>,
    gradients: &ValueTable<SVector<T, S>>,
    w_measures: &[T],
    coefficient: &[T],
) -> eyre::Result<()> {
    let n = gradients.num_functions();
    assert_eq!(gradients.num_points(), w_measures.len());
    assert_eq!(w_measures.len(), coefficient.len());
    assert_eq!(output.nrows(), n, "Output matrix dimension mismatch");
    assert_eq!(output.ncols(), n, "Output matrix dimension mismatch");

    output.fill(T::zero());
    for (q, (&w, &a)) in w_measures.iter().zip(coefficient).enumerate() {
        let scale = w * a;
        for I in 0..n {
            let grad_I = gradients.get(I, q);
            for J in I..n {
                output[(I, J)] += scale * grad_I.dot(gradients.get(J, q));
            }
        }
    }
    clone_upper_to_lower(&mut output);
    Ok(())
}
