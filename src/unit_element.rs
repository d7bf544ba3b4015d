//! Topology of the reference cell `[0, 1]^D` and its sub-elements.
//!
//! A `k`-dimensional sub-element (face, edge, vertex, ...) is described by the `D - k`
//! directions in which it is constant and the value (0 or 1) taken in each of them.
//! Sub-elements of a given dimension are enumerated by constant-direction sets in
//! lexicographic order, and within each set by the constant values with the first constant
//! direction varying fastest. Faces are therefore numbered `2 * direction + side` and
//! vertices follow the tensor ordering with direction 0 fastest.
use itertools::Itertools;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubElement {
    active_directions: Vec<usize>,
    constant_directions: Vec<usize>,
    constant_values: Vec<usize>,
}

impl SubElement {
    pub fn dim(&self) -> usize {
        self.active_directions.len()
    }

    pub fn active_directions(&self) -> &[usize] {
        &self.active_directions
    }

    pub fn constant_directions(&self) -> &[usize] {
        &self.constant_directions
    }

    /// Constant coordinate values (0 or 1), matching `constant_directions`.
    pub fn constant_values(&self) -> &[usize] {
        &self.constant_values
    }

    /// Side (0 or 1) of the sub-element in `direction`, or `None` if the direction is active.
    pub fn side(&self, direction: usize) -> Option<usize> {
        self.constant_directions
            .iter()
            .position(|&d| d == direction)
            .map(|i| self.constant_values[i])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitElement {
    dim: usize,
    // Indexed by sub-element dimension
    sub_elements: Vec<Vec<SubElement>>,
}

impl UnitElement {
    pub fn new(dim: usize) -> Self {
        let sub_elements = (0..=dim)
            .map(|k| enumerate_sub_elements(dim, k))
            .collect();
        Self { dim, sub_elements }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_sub_elements(&self, k: usize) -> usize {
        self.sub_elements[k].len()
    }

    /// The `id`-th sub-element of dimension `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k > dim` or `id` is out of range.
    pub fn sub_element(&self, k: usize, id: usize) -> &SubElement {
        assert!(k <= self.dim, "sub-element dimension {k} exceeds cell dimension {}", self.dim);
        let candidates = &self.sub_elements[k];
        assert!(
            id < candidates.len(),
            "sub-element id {id} out of range for dimension {k} ({} available)",
            candidates.len()
        );
        &candidates[id]
    }

    pub fn sub_elements(&self, k: usize) -> &[SubElement] {
        &self.sub_elements[k]
    }

    /// Reference-cell coordinates of the `i`-th vertex.
    pub fn vertex(&self, i: usize) -> Vec<usize> {
        let vertex = self.sub_element(0, i);
        let mut coords = vec![0; self.dim];
        for (&d, &v) in vertex.constant_directions.iter().zip(&vertex.constant_values) {
            coords[d] = v;
        }
        coords
    }
}

fn enumerate_sub_elements(dim: usize, k: usize) -> Vec<SubElement> {
    let num_constant = dim - k;
    let constant_direction_sets: Vec<Vec<usize>> = if num_constant == 0 {
        vec![Vec::new()]
    } else {
        (0..dim).combinations(num_constant).collect()
    };

    let mut result = Vec::new();
    for constant_directions in constant_direction_sets {
        let active_directions: Vec<usize> = (0..dim)
            .filter(|d| !constant_directions.contains(d))
            .collect();
        for bits in 0..(1usize << num_constant) {
            let constant_values = (0..num_constant).map(|i| (bits >> i) & 1).collect();
            result.push(SubElement {
                active_directions: active_directions.clone(),
                constant_directions: constant_directions.clone(),
                constant_values,
            });
        }
    }
    result
}
