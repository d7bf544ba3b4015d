//! Dense tensors of runtime rank.
use crate::tensor_index::{compute_weight_dyn, flat_to_tensor_dyn_into, tensor_to_flat_dyn};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A dense tensor of runtime rank stored with direction 0 varying fastest.
///
/// Used for control nets (one entry per basis function of a tensor-product space), for
/// tabulated function values on tensor quadrature grids and for the intermediate tensors of
/// the sum-factorization contraction chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiArray<V> {
    sizes: Vec<usize>,
    weights: Vec<usize>,
    data: Vec<V>,
}

impl<V: Clone> MultiArray<V> {
    pub fn from_elem(sizes: &[usize], value: V) -> Self {
        let len = sizes.iter().product();
        Self {
            sizes: sizes.to_vec(),
            weights: compute_weight_dyn(sizes),
            data: vec![value; len],
        }
    }
}

impl<V> MultiArray<V> {
    /// Wraps flat data laid out with direction 0 fastest.
    ///
    /// # Panics
    ///
    /// Panics if the data length is not the product of the sizes.
    pub fn from_vec(sizes: &[usize], data: Vec<V>) -> Self {
        assert_eq!(
            data.len(),
            sizes.iter().product::<usize>(),
            "data length must match the tensor size"
        );
        Self {
            sizes: sizes.to_vec(),
            weights: compute_weight_dyn(sizes),
            data,
        }
    }

    pub fn rank(&self) -> usize {
        self.sizes.len()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn weights(&self) -> &[usize] {
        &self.weights
    }

    pub fn flat_size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[V] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [V] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<V> {
        self.data
    }

    pub fn flat_index(&self, index: &[usize]) -> usize {
        debug_assert!(index.iter().zip(&self.sizes).all(|(i, n)| i < n));
        tensor_to_flat_dyn(index, &self.weights)
    }

    pub fn tensor_index_into(&self, flat: usize, index: &mut [usize]) {
        flat_to_tensor_dyn_into(flat, &self.weights, index)
    }

    pub fn get(&self, index: &[usize]) -> &V {
        &self.data[self.flat_index(index)]
    }

    pub fn get_mut(&mut self, index: &[usize]) -> &mut V {
        let flat = self.flat_index(index);
        &mut self.data[flat]
    }

    /// Flat offsets of the first entry of every line along `direction`.
    ///
    /// A line along `direction` starting at offset `s` consists of the entries
    /// `s + k * weights[direction]` for `k in 0..sizes[direction]`.
    pub fn line_starts(&self, direction: usize) -> impl Iterator<Item = usize> + '_ {
        let stride = self.weights[direction];
        let extent = self.sizes[direction];
        (0..self.data.len()).filter(move |flat| (flat / stride) % extent == 0)
    }

    /// Copies out the line along `direction` that starts at `start`.
    pub fn line(&self, direction: usize, start: usize) -> Vec<V>
    where
        V: Clone,
    {
        let stride = self.weights[direction];
        (0..self.sizes[direction])
            .map(|k| self.data[start + k * stride].clone())
            .collect()
    }

    pub fn map<U>(&self, f: impl FnMut(&V) -> U) -> MultiArray<U> {
        MultiArray {
            sizes: self.sizes.clone(),
            weights: self.weights.clone(),
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl<V> Index<usize> for MultiArray<V> {
    type Output = V;

    fn index(&self, flat: usize) -> &V {
        &self.data[flat]
    }
}

impl<V> IndexMut<usize> for MultiArray<V> {
    fn index_mut(&mut self, flat: usize) -> &mut V {
        &mut self.data[flat]
    }
}
