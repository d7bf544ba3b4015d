use crate::basis::ReferenceSpace;
use crate::flags::BasisFlags;
use crate::geometry::{IgMapping, PhysicalSpaceElement, PhysicalSpaceHandler};
use crate::grid::ACTIVE;
use crate::quadrature::TensorProductQuadrature;
use crate::Real;
use nalgebra::{DMatrixViewMut, DVectorViewMut, Scalar};
use std::cell::RefCell;

mod mass;
mod source;
mod stiffness;

pub use mass::*;
pub use source::*;
pub use stiffness::*;

/// Element-to-dof connectivity of a scalar field discretization.
pub trait ElementConnectivityAssembler {
    fn num_elements(&self) -> usize;

    fn num_dofs(&self) -> usize;

    fn element_dof_count(&self, element_index: usize) -> usize;

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize);
}

/// Elements are the active elements of the grid, dofs are the basis functions of the space.
impl<T: Real, const D: usize> ElementConnectivityAssembler for ReferenceSpace<T, D> {
    fn num_elements(&self) -> usize {
        self.num_active_elements()
    }

    fn num_dofs(&self) -> usize {
        self.num_basis()
    }

    fn element_dof_count(&self, _element_index: usize) -> usize {
        self.num_basis_per_element()
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        let element = self
            .grid()
            .element_tensor_index(self.active_element(element_index));
        output.copy_from_slice(&self.element_dofs(&element));
    }
}

pub trait ElementMatrixAssembler<T: Scalar>: ElementConnectivityAssembler {
    fn assemble_element_matrix_into(&self, element_index: usize, output: DMatrixViewMut<T>) -> eyre::Result<()>;
}

pub trait ElementVectorAssembler<T: Scalar>: ElementConnectivityAssembler {
    fn assemble_element_vector_into(&self, element_index: usize, output: DVectorViewMut<T>) -> eyre::Result<()>;
}

pub trait ElementScalarAssembler<T: Scalar>: ElementConnectivityAssembler {
    fn assemble_element_scalar(&self, element_index: usize) -> eyre::Result<T>;
}

/// A physical element accessor that is moved to the requested element and filled on demand.
///
/// Element assemblers take `&self`, so the accessor lives in a `RefCell`.
#[derive(Debug)]
pub(crate) struct PhysicalElementCursor<'a, T: Real, const D: usize, const S: usize> {
    mapping: &'a IgMapping<T, D, S>,
    handler: PhysicalSpaceHandler<'a, T, D, S>,
    element: RefCell<PhysicalSpaceElement<'a, T, D, S>>,
}

impl<'a, T: Real, const D: usize, const S: usize> PhysicalElementCursor<'a, T, D, S> {
    pub fn new(mapping: &'a IgMapping<T, D, S>, flags: BasisFlags, quadrature: &TensorProductQuadrature<T>) -> Self {
        let mut handler = PhysicalSpaceHandler::new(mapping);
        handler.reset_element(flags, quadrature);
        let mut element = handler.begin(ACTIVE);
        handler.init_element_cache(&mut element);
        Self {
            mapping,
            handler,
            element: RefCell::new(element),
        }
    }

    pub fn space(&self) -> &'a ReferenceSpace<T, D> {
        self.mapping.space()
    }

    /// Fills the values of the `element_index`-th active element and passes them to `f`.
    pub fn with_element<R>(
        &self,
        element_index: usize,
        f: impl FnOnce(&PhysicalSpaceElement<'a, T, D, S>) -> eyre::Result<R>,
    ) -> eyre::Result<R> {
        let mut element = self.element.borrow_mut();
        element.move_to(self.space().active_element(element_index));
        self.handler.fill_element_cache(&mut element)?;
        f(&element)
    }
}

macro_rules! impl_space_connectivity {
    ($assembler:ident) => {
        impl<'a, T: crate::Real, const D: usize, const S: usize>
            crate::assembly::local::ElementConnectivityAssembler for $assembler<'a, T, D, S>
        {
            fn num_elements(&self) -> usize {
                crate::assembly::local::ElementConnectivityAssembler::num_elements(self.cursor.space())
            }

            fn num_dofs(&self) -> usize {
                crate::assembly::local::ElementConnectivityAssembler::num_dofs(self.cursor.space())
            }

            fn element_dof_count(&self, element_index: usize) -> usize {
                crate::assembly::local::ElementConnectivityAssembler::element_dof_count(
                    self.cursor.space(),
                    element_index,
                )
            }

            fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
                crate::assembly::local::ElementConnectivityAssembler::populate_element_dofs(
                    self.cursor.space(),
                    output,
                    element_index,
                )
            }
        }
    };
}

pub(crate) use impl_space_connectivity;
