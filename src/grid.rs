//! Tensor-product grids over a box-shaped parametric domain.
use crate::grid_element::GridElement;
use crate::tensor_index::{TensorIndex, TensorSize};
use crate::unit_element::UnitElement;
use crate::{Error, Real, Result};
use log::debug;
use std::array;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Name of the element property that every element has when the grid is created.
pub const ACTIVE: &str = "active";

/// An axis-aligned tensor-product partition of a box into elements.
///
/// Each direction is described by a strictly increasing sequence of breakpoints
/// ("knot coordinates" without repetitions). Elements are enumerated with direction 0 fastest.
///
/// Elements may be tagged with named properties. Every element starts out with the
/// [`ACTIVE`] property, and element iteration is always filtered by a property.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T, const D: usize> {
    knots: [Vec<T>; D],
    // Sorted, unique flat element indices per property
    properties: BTreeMap<String, Vec<usize>>,
    unit_element: UnitElement,
}

/// Description of a refinement: which directions received knots, which knots, and the grid
/// as it was before the refinement.
///
/// Objects built on a grid (spaces, mappings, functions) update themselves from this
/// descriptor; see [`RefinementObserver`].
#[derive(Debug, Clone, PartialEq)]
pub struct GridRefinement<T, const D: usize> {
    refined_directions: [bool; D],
    inserted_knots: [Vec<T>; D],
    previous: Grid<T, D>,
}

impl<T: Real, const D: usize> GridRefinement<T, D> {
    pub fn refined_directions(&self) -> &[bool; D] {
        &self.refined_directions
    }

    /// Knots inserted along `direction`, in increasing order.
    pub fn inserted_knots(&self, direction: usize) -> &[T] {
        &self.inserted_knots[direction]
    }

    /// The grid before refinement.
    pub fn previous(&self) -> &Grid<T, D> {
        &self.previous
    }

    /// Fails with [`Error::IncompatibleRefinement`] unless `grid` has the breakpoints this
    /// refinement started from.
    pub fn check_applies_to(&self, grid: &Grid<T, D>) -> Result<()> {
        if grid.knots != self.previous.knots {
            return Err(Error::IncompatibleRefinement);
        }
        Ok(())
    }

    /// Forwards the refinement to every observer, in order.
    ///
    /// Stops at the first observer that fails.
    pub fn notify(&self, observers: &mut [&mut dyn RefinementObserver<T, D>]) -> Result<()> {
        for observer in observers.iter_mut() {
            observer.on_refinement(self)?;
        }
        Ok(())
    }
}

/// An object whose internal data depends on the knots of a grid.
///
/// After a grid is refined, the driver hands the returned [`GridRefinement`] to each dependent
/// object, which must update itself before returning.
pub trait RefinementObserver<T: Real, const D: usize> {
    fn on_refinement(&mut self, refinement: &GridRefinement<T, D>) -> Result<()>;
}

fn check_breakpoints<T: Real>(direction: usize, knots: &[T]) -> Result<()> {
    if knots.len() < 2 {
        return Err(Error::InvalidKnots {
            direction,
            reason: format!("need at least 2 breakpoints, got {}", knots.len()),
        });
    }
    if let Some(i) = knots.iter().position(|k| !k.is_finite()) {
        return Err(Error::InvalidKnots {
            direction,
            reason: format!("breakpoint {i} is not finite"),
        });
    }
    if let Some(i) = knots.windows(2).position(|pair| pair[0] >= pair[1]) {
        return Err(Error::InvalidKnots {
            direction,
            reason: format!("breakpoints are not strictly increasing at position {}", i + 1),
        });
    }
    Ok(())
}

impl<T: Real, const D: usize> Grid<T, D> {
    /// Creates a grid from per-direction breakpoints.
    ///
    /// Fails with [`Error::InvalidKnots`] if a sequence has fewer than two entries or is not
    /// strictly increasing.
    pub fn from_knot_coordinates(knots: [Vec<T>; D]) -> Result<Self> {
        assert!(D >= 1, "grids need at least one direction");
        for (direction, direction_knots) in knots.iter().enumerate() {
            check_breakpoints(direction, direction_knots)?;
        }
        let num_elements: usize = knots.iter().map(|k| k.len() - 1).product();
        let mut properties = BTreeMap::new();
        properties.insert(ACTIVE.to_string(), (0..num_elements).collect());
        Ok(Self {
            knots,
            properties,
            unit_element: UnitElement::new(D),
        })
    }

    /// A uniform grid on the unit cube `[0, 1]^D`.
    ///
    /// # Panics
    ///
    /// Panics if any direction requests zero intervals.
    pub fn uniform(num_intervals: [usize; D]) -> Self {
        Self::uniform_box([T::zero(); D], [T::one(); D], num_intervals)
            .expect("the unit cube with positive interval counts is a valid grid")
    }

    /// A uniform grid on the box `[min, max]`.
    pub fn uniform_box(min: [T; D], max: [T; D], num_intervals: [usize; D]) -> Result<Self> {
        let knots = array::from_fn(|d| {
            let n = num_intervals[d];
            (0..=n)
                .map(|i| min[d] + (max[d] - min[d]) * T::from_count(i) / T::from_count(n.max(1)))
                .collect()
        });
        Self::from_knot_coordinates(knots)
    }

    pub fn dim(&self) -> usize {
        D
    }

    pub fn num_intervals(&self, direction: usize) -> usize {
        self.knots[direction].len() - 1
    }

    pub fn num_intervals_per_direction(&self) -> TensorSize<D> {
        TensorSize::new(array::from_fn(|d| self.num_intervals(d)))
    }

    pub fn num_elements(&self) -> usize {
        self.num_intervals_per_direction().flat_size()
    }

    /// Breakpoints along `direction`, strictly increasing.
    pub fn knot_coordinates(&self, direction: usize) -> &[T] {
        &self.knots[direction]
    }

    pub fn all_knot_coordinates(&self) -> &[Vec<T>; D] {
        &self.knots
    }

    pub fn unit_element(&self) -> &UnitElement {
        &self.unit_element
    }

    pub fn element_tensor_index(&self, flat: usize) -> TensorIndex<D> {
        self.num_intervals_per_direction().flat_to_tensor(flat)
    }

    pub fn element_flat_index(&self, index: &TensorIndex<D>) -> usize {
        self.num_intervals_per_direction().tensor_to_flat(index)
    }

    /// Whether any side of the element lies on the boundary of the domain.
    pub fn is_boundary_element(&self, flat: usize) -> bool {
        let index = self.element_tensor_index(flat);
        (0..D).any(|d| index[d] == 0 || index[d] + 1 == self.num_intervals(d))
    }

    /// Lower and upper corner of the parametric domain.
    pub fn bounding_box(&self) -> ([T; D], [T; D]) {
        let min = array::from_fn(|d| self.knots[d][0]);
        let max = array::from_fn(|d| self.knots[d][self.knots[d].len() - 1]);
        (min, max)
    }

    /// Interval of `direction` containing the coordinate `x`.
    ///
    /// Intervals are half-open, except that the upper end of the domain belongs to the last
    /// interval.
    pub fn locate_interval(&self, direction: usize, x: T) -> Result<usize> {
        let knots = &self.knots[direction];
        if x < knots[0] || x > knots[knots.len() - 1] {
            return Err(Error::PointOutsideDomain { direction });
        }
        let upper = knots.partition_point(|&k| k <= x);
        Ok(upper.saturating_sub(1).min(knots.len() - 2))
    }

    /// Flat index of the element containing `point`.
    pub fn locate_element(&self, point: &[T; D]) -> Result<usize> {
        let mut index = [0; D];
        for d in 0..D {
            index[d] = self.locate_interval(d, point[d])?;
        }
        Ok(self.element_flat_index(&index))
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.properties.contains_key(property)
    }

    /// Adds an (initially empty) element property. Existing properties are left unchanged.
    pub fn add_property(&mut self, property: &str) {
        self.properties.entry(property.to_string()).or_default();
    }

    /// Adds or removes the given elements from a property, creating the property if needed.
    pub fn set_property_status(&mut self, property: &str, elements: impl IntoIterator<Item = usize>, status: bool) {
        let num_elements = self.num_elements();
        let list = self.properties.entry(property.to_string()).or_default();
        let mut set: BTreeSet<usize> = list.iter().copied().collect();
        for element in elements {
            assert!(element < num_elements, "element {element} out of range");
            if status {
                set.insert(element);
            } else {
                set.remove(&element);
            }
        }
        *list = set.into_iter().collect();
    }

    /// Flat indices of the elements with the given property, in increasing order.
    ///
    /// # Panics
    ///
    /// Panics if the property does not exist.
    pub fn elements_with_property(&self, property: &str) -> &[usize] {
        self.properties
            .get(property)
            .unwrap_or_else(|| panic!("unknown element property \"{property}\""))
    }

    pub fn element_has_property(&self, flat: usize, property: &str) -> bool {
        self.properties
            .get(property)
            .map(|list| list.binary_search(&flat).is_ok())
            .unwrap_or(false)
    }

    /// Accessor to the first element with the given property.
    ///
    /// # Panics
    ///
    /// Panics if the property does not exist.
    pub fn begin(&self, property: &str) -> GridElement<'_, T, D> {
        let (name, list) = self.property_entry(property);
        GridElement::new(self, name, list, 0)
    }

    /// Past-the-end accessor for the given property.
    pub fn end(&self, property: &str) -> GridElement<'_, T, D> {
        let (name, list) = self.property_entry(property);
        GridElement::new(self, name, list, list.len())
    }

    /// Iterates over accessors to all elements with the given property, in flat order.
    ///
    /// Each accessor starts with an empty cache. For repeated cache filling, advance a single
    /// accessor obtained from [`Grid::begin`] instead.
    pub fn elements<'a>(&'a self, property: &str) -> impl Iterator<Item = GridElement<'a, T, D>> + 'a {
        let (name, list) = self.property_entry(property);
        (0..list.len()).map(move |position| GridElement::new(self, name, list, position))
    }

    fn property_entry(&self, property: &str) -> (&str, &[usize]) {
        let (name, list) = self
            .properties
            .get_key_value(property)
            .unwrap_or_else(|| panic!("unknown element property \"{property}\""));
        (name.as_str(), list.as_slice())
    }

    /// Inserts new breakpoints and returns the refinement descriptor.
    ///
    /// New breakpoints must be finite, lie strictly inside the domain and must not coincide
    /// with existing breakpoints or with each other. Element properties are inherited by the
    /// children of each refined element.
    pub fn insert_knots(&mut self, new_knots: [Vec<T>; D]) -> Result<GridRefinement<T, D>> {
        let mut inserted_knots = new_knots;
        for (direction, knots) in inserted_knots.iter_mut().enumerate() {
            if knots.iter().any(|k| !k.is_finite()) {
                return Err(Error::InvalidKnots {
                    direction,
                    reason: "inserted knots must be finite".to_string(),
                });
            }
            knots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            let existing = &self.knots[direction];
            let (lower, upper) = (existing[0], existing[existing.len() - 1]);
            for (i, &x) in knots.iter().enumerate() {
                if x <= lower || x >= upper {
                    return Err(Error::InvalidKnots {
                        direction,
                        reason: "inserted knots must lie strictly inside the domain".to_string(),
                    });
                }
                if existing.contains(&x) || (i > 0 && knots[i - 1] == x) {
                    return Err(Error::InvalidKnots {
                        direction,
                        reason: "inserted knots must be distinct from each other and from existing breakpoints"
                            .to_string(),
                    });
                }
            }
        }

        let refinement = GridRefinement {
            refined_directions: array::from_fn(|d| !inserted_knots[d].is_empty()),
            inserted_knots,
            previous: self.clone(),
        };
        self.refine_from(&refinement);
        Ok(refinement)
    }

    /// Subdivides every interval into `num_subdivisions` equal parts.
    ///
    /// # Panics
    ///
    /// Panics if `num_subdivisions` is zero.
    pub fn refine_uniform(&mut self, num_subdivisions: usize) -> GridRefinement<T, D> {
        assert!(num_subdivisions > 0, "number of subdivisions must be positive");
        let n = T::from_count(num_subdivisions);
        let new_knots = array::from_fn(|d| {
            self.knots[d]
                .windows(2)
                .flat_map(|pair| (1..num_subdivisions).map(move |i| pair[0] + (pair[1] - pair[0]) * T::from_count(i) / n))
                .collect()
        });
        self.insert_knots(new_knots)
            .expect("subdivision points are interior and distinct")
    }

    /// Replays a refinement that was produced on an identical copy of this grid.
    pub fn apply_refinement(&mut self, refinement: &GridRefinement<T, D>) -> Result<()> {
        refinement.check_applies_to(self)?;
        self.refine_from(refinement);
        Ok(())
    }

    fn refine_from(&mut self, refinement: &GridRefinement<T, D>) {
        let previous = &refinement.previous;
        for d in 0..D {
            if refinement.refined_directions[d] {
                let mut merged: Vec<T> = previous.knots[d]
                    .iter()
                    .chain(&refinement.inserted_knots[d])
                    .copied()
                    .collect();
                merged.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
                self.knots[d] = merged;
            }
        }
        debug!(
            "Refined grid: {:?} intervals -> {:?} intervals",
            previous.num_intervals_per_direction().extents(),
            self.num_intervals_per_direction().extents()
        );

        // Each new interval lies inside exactly one old interval
        let parent_interval: [Vec<usize>; D] = array::from_fn(|d| {
            let old = &previous.knots[d];
            self.knots[d]
                .windows(2)
                .map(|pair| old.partition_point(|&k| k <= pair[0]) - 1)
                .collect()
        });
        let new_size = self.num_intervals_per_direction();
        let old_size = previous.num_intervals_per_direction();
        let parents: Vec<usize> = new_size
            .indices()
            .map(|index| old_size.tensor_to_flat(&array::from_fn(|d| parent_interval[d][index[d]])))
            .collect();

        for list in self.properties.values_mut() {
            let old_list = std::mem::take(list);
            *list = parents
                .iter()
                .enumerate()
                .filter(|(_, parent)| old_list.binary_search(parent).is_ok())
                .map(|(child, _)| child)
                .collect();
        }
    }
}
