//! Cursor-style accessors to the elements of a [`Grid`].
use crate::cache::SubElementCache;
use crate::grid::Grid;
use crate::tensor_index::TensorIndex;
use crate::Real;
use nalgebra::Point;
use numeric_literals::replace_float_literals;
use std::array;
use std::cmp::Ordering;

/// Values stored by a grid element handler for one sub-element.
#[derive(Debug, Clone)]
pub struct GridValues<T: Real, const D: usize> {
    /// Quadrature points in the reference cell `[0, 1]^D` (lifted from the sub-element).
    pub unit_points: Vec<Point<T, D>>,
    /// Quadrature points in parametric coordinates.
    pub points: Vec<Point<T, D>>,
    pub weights: Vec<T>,
    pub measure: T,
    pub w_measures: Vec<T>,
    /// Side lengths of the element along every direction.
    pub lengths: [T; D],
}

impl<T: Real, const D: usize> Default for GridValues<T, D> {
    fn default() -> Self {
        Self {
            unit_points: Vec::new(),
            points: Vec::new(),
            weights: Vec::new(),
            measure: T::zero(),
            w_measures: Vec::new(),
            lengths: [T::zero(); D],
        }
    }
}

/// A cursor over the elements of a grid that carry a given property.
///
/// The accessor borrows the grid and carries a value cache that is populated by a
/// [`GridElementHandler`](crate::handler::GridElementHandler). Advancing the cursor does not
/// clear the cache; cached values are only meaningful after `fill_cache` has been called for
/// the current element.
///
/// Accessors compare by flat index. Comparing accessors of different grids is a usage error
/// and is caught by a debug assertion.
#[derive(Debug, Clone)]
pub struct GridElement<'g, T: Real, const D: usize> {
    grid: &'g Grid<T, D>,
    property: &'g str,
    elements: &'g [usize],
    position: usize,
    flat_index: usize,
    tensor_index: TensorIndex<D>,
    cache: SubElementCache<GridValues<T, D>>,
}

impl<'g, T: Real, const D: usize> GridElement<'g, T, D> {
    pub(crate) fn new(grid: &'g Grid<T, D>, property: &'g str, elements: &'g [usize], position: usize) -> Self {
        let mut element = Self {
            grid,
            property,
            elements,
            position,
            flat_index: 0,
            tensor_index: [0; D],
            cache: SubElementCache::default(),
        };
        element.update_indices();
        element
    }

    fn update_indices(&mut self) {
        if let Some(&flat) = self.elements.get(self.position) {
            self.flat_index = flat;
            self.tensor_index = self.grid.element_tensor_index(flat);
        } else {
            self.flat_index = self.grid.num_elements();
            self.tensor_index = [0; D];
        }
    }

    pub fn grid(&self) -> &'g Grid<T, D> {
        self.grid
    }

    /// The property this accessor iterates over.
    pub fn property(&self) -> &'g str {
        self.property
    }

    pub fn flat_index(&self) -> usize {
        self.flat_index
    }

    pub fn tensor_index(&self) -> &TensorIndex<D> {
        &self.tensor_index
    }

    pub fn is_past_the_end(&self) -> bool {
        self.position >= self.elements.len()
    }

    /// Moves to the next element with the same property.
    pub fn advance(&mut self) {
        if !self.is_past_the_end() {
            self.position += 1;
            self.update_indices();
        }
    }

    /// Points the accessor to the element with the given flat index.
    ///
    /// # Panics
    ///
    /// Panics if the element does not carry the accessor's property.
    pub fn move_to(&mut self, flat_index: usize) {
        let position = self.elements.binary_search(&flat_index).unwrap_or_else(|_| {
            panic!(
                "element {flat_index} does not have property \"{}\"",
                self.property
            )
        });
        self.position = position;
        self.update_indices();
    }

    fn assert_dereferenceable(&self) {
        assert!(!self.is_past_the_end(), "past-the-end element accessor cannot be dereferenced");
    }

    /// Parametric coordinates of the `i`-th vertex (direction 0 fastest).
    pub fn vertex(&self, i: usize) -> Point<T, D> {
        self.assert_dereferenceable();
        let offset = self.grid.unit_element().vertex(i);
        Point::from(array::from_fn(|d| {
            self.grid.knot_coordinates(d)[self.tensor_index[d] + offset[d]]
        }))
    }

    /// Lower corner of the element.
    pub fn lower_corner(&self) -> Point<T, D> {
        self.vertex(0)
    }

    #[replace_float_literals(T::from_f64_lossy(literal))]
    pub fn center(&self) -> Point<T, D> {
        self.assert_dereferenceable();
        Point::from(array::from_fn(|d| {
            let knots = self.grid.knot_coordinates(d);
            let i = self.tensor_index[d];
            (knots[i] + knots[i + 1]) / 2.0
        }))
    }

    /// Side lengths along every direction.
    pub fn side_lengths(&self) -> [T; D] {
        self.assert_dereferenceable();
        array::from_fn(|d| {
            let knots = self.grid.knot_coordinates(d);
            let i = self.tensor_index[d];
            knots[i + 1] - knots[i]
        })
    }

    /// Side lengths along the active directions of the `id`-th sub-element of dimension `k`.
    pub fn sub_element_side_lengths(&self, k: usize, id: usize) -> Vec<T> {
        let lengths = self.side_lengths();
        self.grid
            .unit_element()
            .sub_element(k, id)
            .active_directions()
            .iter()
            .map(|&d| lengths[d])
            .collect()
    }

    /// Parametric measure of the element.
    pub fn measure(&self) -> T {
        self.side_lengths()
            .iter()
            .fold(T::one(), |acc, &length| acc * length)
    }

    /// Parametric measure of a sub-element: product of its side lengths along active directions.
    ///
    /// The measure of a vertex is one.
    pub fn sub_element_measure(&self, k: usize, id: usize) -> T {
        self.sub_element_side_lengths(k, id)
            .into_iter()
            .fold(T::one(), |acc, length| acc * length)
    }

    /// Whether `point` (parametric coordinates) lies in the closed element.
    pub fn is_point_inside(&self, point: &Point<T, D>) -> bool {
        let lower = self.vertex(0);
        let lengths = self.side_lengths();
        (0..D).all(|d| point[d] >= lower[d] && point[d] <= lower[d] + lengths[d])
    }

    /// Whether any face of the element lies on the domain boundary.
    pub fn is_boundary(&self) -> bool {
        let faces = self.grid.unit_element().num_sub_elements(D - 1);
        (0..faces).any(|face| self.is_boundary_sub_element(D - 1, face))
    }

    /// Whether the `id`-th sub-element of dimension `k` lies on the domain boundary.
    ///
    /// This holds if, in any of its constant directions, the sub-element sits on the side of
    /// the first or last interval facing the domain boundary.
    pub fn is_boundary_sub_element(&self, k: usize, id: usize) -> bool {
        self.assert_dereferenceable();
        let sub = self.grid.unit_element().sub_element(k, id);
        sub.constant_directions()
            .iter()
            .zip(sub.constant_values())
            .any(|(&d, &side)| {
                let last = self.grid.num_intervals(d) - 1;
                (side == 0 && self.tensor_index[d] == 0) || (side == 1 && self.tensor_index[d] == last)
            })
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.grid.element_has_property(self.flat_index, property)
    }

    pub fn cache(&self) -> &SubElementCache<GridValues<T, D>> {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut SubElementCache<GridValues<T, D>> {
        &mut self.cache
    }

    fn values(&self, k: usize, j: usize) -> &GridValues<T, D> {
        self.cache.get(k, j)
    }

    pub fn points(&self, k: usize, j: usize) -> &[Point<T, D>] {
        &self.values(k, j).points
    }

    pub fn unit_points(&self, k: usize, j: usize) -> &[Point<T, D>] {
        &self.values(k, j).unit_points
    }

    pub fn weights(&self, k: usize, j: usize) -> &[T] {
        &self.values(k, j).weights
    }

    pub fn w_measures(&self, k: usize, j: usize) -> &[T] {
        &self.values(k, j).w_measures
    }

    pub fn cached_measure(&self, k: usize, j: usize) -> T {
        self.values(k, j).measure
    }

    pub fn element_points(&self) -> &[Point<T, D>] {
        self.points(D, 0)
    }

    pub fn element_unit_points(&self) -> &[Point<T, D>] {
        self.unit_points(D, 0)
    }

    pub fn element_weights(&self) -> &[T] {
        self.weights(D, 0)
    }

    pub fn element_w_measures(&self) -> &[T] {
        self.w_measures(D, 0)
    }
}

impl<'g, T: Real, const D: usize> PartialEq for GridElement<'g, T, D> {
    fn eq(&self, other: &Self) -> bool {
        debug_assert!(
            std::ptr::eq(self.grid, other.grid),
            "comparing accessors of different grids"
        );
        self.flat_index == other.flat_index
    }
}

impl<'g, T: Real, const D: usize> PartialOrd for GridElement<'g, T, D> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        debug_assert!(
            std::ptr::eq(self.grid, other.grid),
            "comparing accessors of different grids"
        );
        self.flat_index.partial_cmp(&other.flat_index)
    }
}
