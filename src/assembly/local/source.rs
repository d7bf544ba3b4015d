use crate::assembly::local::{impl_space_connectivity, ElementVectorAssembler, PhysicalElementCursor};
use crate::basis::ValueTable;
use crate::flags::BasisFlags;
use crate::geometry::IgMapping;
use crate::quadrature::TensorProductQuadrature;
use crate::Real;
use nalgebra::{DVectorViewMut, Point};

/// Element load vectors `int f phi_i dx` for a scalar source `f(x)` in physical coordinates.
pub struct ElementSourceAssembler<'a, T: Real, const D: usize, const S: usize> {
    cursor: PhysicalElementCursor<'a, T, D, S>,
    source: Box<dyn Fn(&Point<T, S>) -> T + 'a>,
}

impl<'a, T: Real, const D: usize, const S: usize> ElementSourceAssembler<'a, T, D, S> {
    pub fn new(
        mapping: &'a IgMapping<T, D, S>,
        quadrature: &TensorProductQuadrature<T>,
        source: impl Fn(&Point<T, S>) -> T + 'a,
    ) -> Self {
        Self {
            cursor: PhysicalElementCursor::new(mapping, BasisFlags::VALUE, quadrature),
            source: Box::new(source),
        }
    }

    /// Evaluates the source term at a physical point.
    pub fn source(&self, x: &Point<T, S>) -> T {
        (self.source)(x)
    }
}

impl_space_connectivity!(ElementSourceAssembler);

impl<'a, T: Real, const D: usize, const S: usize> ElementVectorAssembler<T> for ElementSourceAssembler<'a, T, D, S> {
    fn assemble_element_vector_into(&self, element_index: usize, output: DVectorViewMut<T>) -> eyre::Result<()> {
        self.cursor.with_element(element_index, |element| {
            let source: Vec<T> = element
                .element_points()
                .iter()
                .map(|x| self.source(x))
                .collect();
            assemble_element_source_vector(output, element.element_values(), element.element_w_measures(), &source)
        })
    }
}

/// Assembles $b^K_I = \sum_q w_q |J_q| f(x_q) \phi_I(x_q)$.
///
/// # Panics
///
/// Panics if the number of quadrature points differs between the arguments, or if the output
/// length does not match the number of basis functions.
pub fn assemble_element_source_vector<T: Real>(
    mut output: DVectorViewMut<T>,
    basis_values: &ValueTable<T>,
    w_measures: &[T],
    source: &[T],
) -> eyre::Result<()> {
    let n = basis_values.num_functions();
    assert_eq!(basis_values.num_points(), w_measures.len());
    assert_eq!(w_measures.len(), source.len());
    assert_eq!(output.len(), n, "Output vector dimension mismatch");

    output.fill(T::zero());
    for (q, (&w, &f)) in w_measures.iter().zip(source).enumerate() {
        for i in 0..n {
            output[i] += w * f * *basis_values.get(i, q);
        }
    }
    Ok(())
}
