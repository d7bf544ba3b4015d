//! Cache handler for grid elements.
use crate::flags::GridFlags;
use crate::grid::Grid;
use crate::grid_element::GridElement;
use crate::quadrature::TensorProductQuadrature;
use crate::unit_element::SubElement;
use crate::Real;
use log::trace;
use nalgebra::Point;
use std::array;

/// Lifts a point of a `k`-dimensional sub-element's reference cell into the element's
/// reference cell `[0, 1]^D`.
pub fn lift_to_element<T: Real, const D: usize>(sub_element: &SubElement, point: &[T]) -> Point<T, D> {
    debug_assert_eq!(point.len(), sub_element.dim());
    let mut lifted = [T::zero(); D];
    for (&d, &x) in sub_element.active_directions().iter().zip(point) {
        lifted[d] = x;
    }
    for (&d, &side) in sub_element
        .constant_directions()
        .iter()
        .zip(sub_element.constant_values())
    {
        lifted[d] = if side == 0 { T::zero() } else { T::one() };
    }
    Point::from(lifted)
}

/// Computes and caches grid quantities (points, weights, measures) on element accessors.
///
/// A handler is configured per sub-element dimension `k` with [`reset`](Self::reset). After
/// that, [`init_cache`](Self::init_cache) allocates the cache of an accessor and stores the
/// element-invariant data (reference points and weights), and [`fill_cache`](Self::fill_cache)
/// computes the element-dependent data for the element the accessor currently points to.
///
/// The handler itself is immutable during traversal; all mutable state lives in the accessor.
#[derive(Debug, Clone)]
pub struct GridElementHandler<'g, T, const D: usize> {
    grid: &'g Grid<T, D>,
    // Interval lengths per direction
    lengths: [Vec<T>; D],
    // Indexed by sub-element dimension
    flags: Vec<GridFlags>,
    quadratures: Vec<Option<TensorProductQuadrature<T>>>,
}

impl<'g, T: Real, const D: usize> GridElementHandler<'g, T, D> {
    pub fn new(grid: &'g Grid<T, D>) -> Self {
        let lengths = array::from_fn(|d| {
            grid.knot_coordinates(d)
                .windows(2)
                .map(|pair| pair[1] - pair[0])
                .collect()
        });
        Self {
            grid,
            lengths,
            flags: vec![GridFlags::NONE; D + 1],
            quadratures: vec![None; D + 1],
        }
    }

    pub fn grid(&self) -> &'g Grid<T, D> {
        self.grid
    }

    /// Interval lengths along `direction`.
    pub fn lengths(&self, direction: usize) -> &[T] {
        &self.lengths[direction]
    }

    /// Requests the given quantities on sub-elements of dimension `k`, evaluated with the given
    /// rule of rank `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k > D` or the rule does not have rank `k`.
    pub fn reset(&mut self, flags: GridFlags, k: usize, quadrature: &TensorProductQuadrature<T>) {
        assert!(k <= D, "sub-element dimension {k} exceeds grid dimension {D}");
        assert_eq!(quadrature.rank(), k, "quadrature rank must match the sub-element dimension");
        trace!("Grid handler reset: k = {k}, flags = {flags:?}, {} points", quadrature.num_points());
        self.flags[k] = flags;
        self.quadratures[k] = Some(quadrature.clone());
    }

    /// Shorthand for [`reset`](Self::reset) on the element itself (`k = D`).
    pub fn reset_element(&mut self, flags: GridFlags, quadrature: &TensorProductQuadrature<T>) {
        self.reset(flags, D, quadrature)
    }

    pub fn flags(&self, k: usize) -> GridFlags {
        self.flags[k]
    }

    /// The rule set for dimension `k`.
    ///
    /// # Panics
    ///
    /// Panics if [`reset`](Self::reset) was not called for `k`.
    pub fn quadrature(&self, k: usize) -> &TensorProductQuadrature<T> {
        self.quadratures[k]
            .as_ref()
            .unwrap_or_else(|| panic!("grid handler not reset for sub-element dimension {k}"))
    }

    /// Allocates the cache for all sub-elements of dimension `k` and stores the
    /// element-invariant reference points and weights.
    pub fn init_cache(&self, element: &mut GridElement<'g, T, D>, k: usize) {
        debug_assert!(std::ptr::eq(element.grid(), self.grid), "accessor belongs to another grid");
        let quadrature = self.quadrature(k);
        let flags = self.flags[k];
        let reference_points = quadrature.flat_points();
        let weights = quadrature.flat_weights();
        let n = quadrature.num_points();
        let unit_element = self.grid.unit_element();

        for j in 0..unit_element.num_sub_elements(k) {
            let sub_element = unit_element.sub_element(k, j);
            let values = element.cache_mut().allocate(k, j);
            values.unit_points.clear();
            values
                .unit_points
                .extend(reference_points.iter().map(|x| lift_to_element(sub_element, x)));
            values.weights.clear();
            values.weights.extend_from_slice(&weights);
            values.points.resize(
                if flags.contains(GridFlags::POINT) { n } else { 0 },
                Point::origin(),
            );
            values.w_measures.resize(
                if flags.contains(GridFlags::W_MEASURE) { n } else { 0 },
                T::zero(),
            );
        }
    }

    /// Computes the element-dependent values of sub-element `(k, j)` for the element the
    /// accessor points to.
    ///
    /// # Panics
    ///
    /// Panics if [`init_cache`](Self::init_cache) was not called for `k`.
    pub fn fill_cache(&self, element: &mut GridElement<'g, T, D>, k: usize, j: usize) {
        let flags = self.flags[k];
        let index = *element.tensor_index();
        let lengths: [T; D] = array::from_fn(|d| self.lengths[d][index[d]]);
        let lower = element.lower_corner();
        let sub_element = self.grid.unit_element().sub_element(k, j);
        let measure = sub_element
            .active_directions()
            .iter()
            .fold(T::one(), |acc, &d| acc * lengths[d]);
        let flat = element.flat_index();

        let values = element.cache_mut().begin_fill(k, j, flat);
        values.lengths = lengths;
        values.measure = measure;
        if flags.contains(GridFlags::POINT) {
            for (x, xi) in values.points.iter_mut().zip(&values.unit_points) {
                *x = Point::from(array::from_fn(|d| lower[d] + xi[d] * lengths[d]));
            }
        }
        if flags.contains(GridFlags::W_MEASURE) {
            for (wm, &w) in values.w_measures.iter_mut().zip(&values.weights) {
                *wm = w * measure;
            }
        }
    }

    pub fn init_element_cache(&self, element: &mut GridElement<'g, T, D>) {
        self.init_cache(element, D)
    }

    pub fn fill_element_cache(&self, element: &mut GridElement<'g, T, D>) {
        self.fill_cache(element, D, 0)
    }
}
