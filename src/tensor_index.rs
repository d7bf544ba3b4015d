//! Conversions between flat indices and tensor (multi-) indices.
//!
//! All tensor-product quantities in the crate (elements of a grid, basis functions of a
//! space, quadrature points of a tensor rule) are enumerated with direction 0 varying
//! fastest. For extents `n`, the strides ("weights") are `w[0] = 1` and
//! `w[i] = w[i - 1] * n[i - 1]`, and the flat index of `t` is `sum_i t[i] * w[i]`.
//!
//! Out-of-range inputs are caller errors and are only checked in debug builds.

use std::ops::Index;

/// A tensor index with one component per direction.
pub type TensorIndex<const D: usize> = [usize; D];

/// Per-direction extents of a tensor-product index space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TensorSize<const D: usize>([usize; D]);

impl<const D: usize> TensorSize<D> {
    pub fn new(extents: [usize; D]) -> Self {
        Self(extents)
    }

    /// Same extent in every direction.
    pub fn uniform(extent: usize) -> Self {
        Self([extent; D])
    }

    pub fn extents(&self) -> &[usize; D] {
        &self.0
    }

    /// Total number of entries, i.e. the product of all extents.
    pub fn flat_size(&self) -> usize {
        self.0.iter().product()
    }

    pub fn weight(&self) -> [usize; D] {
        compute_weight(self)
    }

    pub fn tensor_to_flat(&self, index: &TensorIndex<D>) -> usize {
        debug_assert!(
            index.iter().zip(&self.0).all(|(i, n)| i < n),
            "tensor index {index:?} out of range for extents {:?}",
            self.0
        );
        tensor_to_flat(index, &self.weight())
    }

    pub fn flat_to_tensor(&self, flat: usize) -> TensorIndex<D> {
        debug_assert!(flat < self.flat_size(), "flat index {flat} out of range");
        flat_to_tensor(flat, &self.weight())
    }

    /// All tensor indices in increasing flat order.
    pub fn indices(&self) -> impl Iterator<Item = TensorIndex<D>> {
        let weight = self.weight();
        (0..self.flat_size()).map(move |flat| flat_to_tensor(flat, &weight))
    }
}

impl<const D: usize> Index<usize> for TensorSize<D> {
    type Output = usize;

    fn index(&self, direction: usize) -> &usize {
        &self.0[direction]
    }
}

impl<const D: usize> From<[usize; D]> for TensorSize<D> {
    fn from(extents: [usize; D]) -> Self {
        Self(extents)
    }
}

/// Computes the strides for the given extents.
pub fn compute_weight<const D: usize>(size: &TensorSize<D>) -> [usize; D] {
    let mut weight = [0; D];
    compute_weight_dyn_into(size.extents(), &mut weight);
    weight
}

pub fn tensor_to_flat<const D: usize>(index: &TensorIndex<D>, weight: &[usize; D]) -> usize {
    tensor_to_flat_dyn(index, weight)
}

pub fn flat_to_tensor<const D: usize>(flat: usize, weight: &[usize; D]) -> TensorIndex<D> {
    let mut index = [0; D];
    flat_to_tensor_dyn_into(flat, weight, &mut index);
    index
}

/// Runtime-rank version of [`compute_weight`].
pub fn compute_weight_dyn(extents: &[usize]) -> Vec<usize> {
    let mut weight = vec![0; extents.len()];
    compute_weight_dyn_into(extents, &mut weight);
    weight
}

fn compute_weight_dyn_into(extents: &[usize], weight: &mut [usize]) {
    debug_assert_eq!(extents.len(), weight.len());
    let mut stride = 1;
    for (w, n) in weight.iter_mut().zip(extents) {
        *w = stride;
        stride *= n;
    }
}

/// Runtime-rank version of [`tensor_to_flat`].
pub fn tensor_to_flat_dyn(index: &[usize], weight: &[usize]) -> usize {
    debug_assert_eq!(index.len(), weight.len());
    index.iter().zip(weight).map(|(i, w)| i * w).sum()
}

/// Runtime-rank version of [`flat_to_tensor`], writing into `index`.
///
/// The weights must be non-decreasing strides as produced by [`compute_weight_dyn`].
pub fn flat_to_tensor_dyn_into(flat: usize, weight: &[usize], index: &mut [usize]) {
    debug_assert_eq!(index.len(), weight.len());
    let mut remainder = flat;
    for (i, &w) in index.iter_mut().zip(weight).rev() {
        *i = remainder / w;
        remainder %= w;
    }
}
