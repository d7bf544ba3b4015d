use crate::basis::{ElementBasisValues, ReferenceSpace, UnivariateValues, ValueTable};
use crate::cache::SubElementCache;
use crate::flags::BasisFlags;
use crate::grid_element::GridElement;
use crate::handler::GridElementHandler;
use crate::quadrature::TensorProductQuadrature;
use crate::tensor_index::TensorIndex;
use crate::Real;
use nalgebra::{Point, SMatrix, SVector};

/// Basis values stored for one sub-element.
#[derive(Debug, Clone)]
pub struct BasisValues<T: Real, const D: usize> {
    pub tables: ElementBasisValues<T, D>,
    pub univariate: UnivariateValues<T>,
}

impl<T: Real, const D: usize> Default for BasisValues<T, D> {
    fn default() -> Self {
        Self {
            tables: ElementBasisValues::default(),
            univariate: UnivariateValues::default(),
        }
    }
}

/// Accessor to the elements of a spline space.
///
/// Wraps a [`GridElement`] and adds a cache of basis function values filled by a
/// [`SpaceElementHandler`]. Local function `i` of the tables corresponds to global function
/// `local_to_global()[i]`.
#[derive(Debug, Clone)]
pub struct SpaceElement<'s, T: Real, const D: usize> {
    space: &'s ReferenceSpace<T, D>,
    grid_element: GridElement<'s, T, D>,
    cache: SubElementCache<BasisValues<T, D>>,
}

impl<'s, T: Real, const D: usize> SpaceElement<'s, T, D> {
    pub(crate) fn new(space: &'s ReferenceSpace<T, D>, grid_element: GridElement<'s, T, D>) -> Self {
        Self {
            space,
            grid_element,
            cache: SubElementCache::default(),
        }
    }

    pub fn space(&self) -> &'s ReferenceSpace<T, D> {
        self.space
    }

    pub fn grid_element(&self) -> &GridElement<'s, T, D> {
        &self.grid_element
    }

    pub fn flat_index(&self) -> usize {
        self.grid_element.flat_index()
    }

    pub fn tensor_index(&self) -> &TensorIndex<D> {
        self.grid_element.tensor_index()
    }

    pub fn is_past_the_end(&self) -> bool {
        self.grid_element.is_past_the_end()
    }

    pub fn advance(&mut self) {
        self.grid_element.advance()
    }

    pub fn move_to(&mut self, flat_index: usize) {
        self.grid_element.move_to(flat_index)
    }

    /// Global indices of the functions that do not vanish on the current element.
    pub fn local_to_global(&self) -> Vec<usize> {
        self.space.element_dofs(self.tensor_index())
    }

    pub fn num_local_functions(&self) -> usize {
        self.space.num_basis_per_element()
    }

    pub fn values(&self, k: usize, j: usize) -> &ValueTable<T> {
        &self.cache.get(k, j).tables.values
    }

    /// Parametric gradients.
    pub fn gradients(&self, k: usize, j: usize) -> &ValueTable<SVector<T, D>> {
        &self.cache.get(k, j).tables.gradients
    }

    /// Parametric Hessians.
    pub fn hessians(&self, k: usize, j: usize) -> &ValueTable<SMatrix<T, D, D>> {
        &self.cache.get(k, j).tables.hessians
    }

    pub fn element_values(&self) -> &ValueTable<T> {
        self.values(D, 0)
    }

    pub fn element_gradients(&self) -> &ValueTable<SVector<T, D>> {
        self.gradients(D, 0)
    }

    pub fn element_hessians(&self) -> &ValueTable<SMatrix<T, D, D>> {
        self.hessians(D, 0)
    }

    /// Univariate tables on the element; filled when [`BasisFlags::UNIVARIATE`] is requested.
    pub fn element_univariate(&self) -> &UnivariateValues<T> {
        &self.cache.get(D, 0).univariate
    }

    /// Quadrature points in parametric coordinates.
    pub fn element_points(&self) -> &[Point<T, D>] {
        self.grid_element.element_points()
    }

    pub fn element_w_measures(&self) -> &[T] {
        self.grid_element.element_w_measures()
    }

    pub fn is_filled(&self, k: usize, j: usize) -> bool {
        self.cache.is_filled(k, j)
    }
}

/// Fills basis values on [`SpaceElement`]s. Grid quantities are delegated to a
/// [`GridElementHandler`].
#[derive(Debug, Clone)]
pub struct SpaceElementHandler<'s, T: Real, const D: usize> {
    space: &'s ReferenceSpace<T, D>,
    grid_handler: GridElementHandler<'s, T, D>,
    flags: Vec<BasisFlags>,
}

impl<'s, T: Real, const D: usize> SpaceElementHandler<'s, T, D> {
    pub fn new(space: &'s ReferenceSpace<T, D>) -> Self {
        Self {
            space,
            grid_handler: GridElementHandler::new(space.grid()),
            flags: vec![BasisFlags::NONE; D + 1],
        }
    }

    pub fn space(&self) -> &'s ReferenceSpace<T, D> {
        self.space
    }

    pub fn grid_handler(&self) -> &GridElementHandler<'s, T, D> {
        &self.grid_handler
    }

    pub fn flags(&self, k: usize) -> BasisFlags {
        self.flags[k]
    }

    pub fn quadrature(&self, k: usize) -> &TensorProductQuadrature<T> {
        self.grid_handler.quadrature(k)
    }

    /// Requests basis quantities on sub-elements of dimension `k`.
    pub fn reset(&mut self, flags: BasisFlags, k: usize, quadrature: &TensorProductQuadrature<T>) {
        self.grid_handler.reset(flags.grid_flags(), k, quadrature);
        self.flags[k] = flags;
    }

    pub fn reset_element(&mut self, flags: BasisFlags, quadrature: &TensorProductQuadrature<T>) {
        self.reset(flags, D, quadrature)
    }

    /// Allocates the tables requested for sub-elements of dimension `k`.
    pub fn init_cache(&self, element: &mut SpaceElement<'s, T, D>, k: usize) {
        debug_assert!(std::ptr::eq(element.space, self.space), "accessor belongs to another space");
        self.grid_handler.init_cache(&mut element.grid_element, k);
        let num_points = self.grid_handler.quadrature(k).num_points();
        let num_functions = self.space.num_basis_per_element();
        let flags = self.flags[k];
        for j in 0..self.space.grid().unit_element().num_sub_elements(k) {
            let values = element.cache.allocate(k, j);
            values.tables.resize(num_functions, num_points, flags);
        }
    }

    /// Fills grid and basis values of sub-element `(k, j)` for the current element.
    ///
    /// Tensor tables are only evaluated for the requested [`BasisFlags::VALUE`],
    /// [`BasisFlags::GRADIENT`] and [`BasisFlags::HESSIAN`]. Univariate tables are filled on the
    /// element itself when [`BasisFlags::UNIVARIATE`] is set, with derivatives up to the order
    /// requested for the tensor tables.
    ///
    /// # Panics
    ///
    /// Panics if [`init_cache`](Self::init_cache) was not called for `k`.
    pub fn fill_cache(&self, element: &mut SpaceElement<'s, T, D>, k: usize, j: usize) {
        let SpaceElement {
            grid_element, cache, ..
        } = element;
        self.grid_handler.fill_cache(grid_element, k, j);
        let flags = self.flags[k];
        let index = *grid_element.tensor_index();
        let values = cache.begin_fill(k, j, grid_element.flat_index());
        self.space
            .evaluate_at_unit_points(&index, grid_element.unit_points(k, j), flags, &mut values.tables);
        if flags.contains(BasisFlags::UNIVARIATE) && k == D {
            let num_derivatives = if flags.contains(BasisFlags::HESSIAN) {
                2
            } else if flags.contains(BasisFlags::GRADIENT) {
                1
            } else {
                0
            };
            self.space.bspline().element_univariate_values_into(
                &index,
                self.grid_handler.quadrature(k),
                num_derivatives,
                &mut values.univariate,
            );
        }
    }

    pub fn init_element_cache(&self, element: &mut SpaceElement<'s, T, D>) {
        self.init_cache(element, D)
    }

    pub fn fill_element_cache(&self, element: &mut SpaceElement<'s, T, D>) {
        self.fill_cache(element, D, 0)
    }
}
