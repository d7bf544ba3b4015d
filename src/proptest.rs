//! `proptest` strategies for grids, spaces and tensor indices.
use crate::basis::{BSplineSpace, NurbsSpace};
use crate::grid::Grid;
use crate::tensor_index::{TensorIndex, TensorSize};
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use nalgebra::Point;
use std::array;

/// Tensor sizes with every extent in `1..=max_extent`.
pub fn tensor_size<const D: usize>(max_extent: usize) -> impl Strategy<Value = TensorSize<D>> {
    vec(1..=max_extent, D).prop_map(|extents| TensorSize::new(array::from_fn(|d| extents[d])))
}

/// A tensor size together with a valid tensor index into it.
pub fn tensor_size_and_index<const D: usize>(
    max_extent: usize,
) -> impl Strategy<Value = (TensorSize<D>, TensorIndex<D>)> {
    tensor_size::<D>(max_extent).prop_flat_map(|size| {
        let index = size
            .extents()
            .iter()
            .map(|&n| 0..n)
            .collect::<Vec<_>>()
            .prop_map(|index| array::from_fn(|d| index[d]));
        (Just(size), index)
    })
}

/// Strictly increasing breakpoints in `[-10, 10]` with between 2 and `max_breakpoints` entries.
///
/// Consecutive breakpoints are at least `0.01` apart, so intervals are never degenerate.
pub fn breakpoints(max_breakpoints: usize) -> impl Strategy<Value = Vec<f64>> {
    (-10.0..0.0, vec(0.01..2.0, 1..max_breakpoints)).prop_map(|(start, increments)| {
        let mut breaks = Vec::with_capacity(increments.len() + 1);
        breaks.push(start);
        for h in increments {
            let next = breaks[breaks.len() - 1] + h;
            breaks.push(next);
        }
        breaks
    })
}

/// Non-uniform grids with at most `max_intervals` intervals per direction.
pub fn grid<const D: usize>(max_intervals: usize) -> impl Strategy<Value = Grid<f64, D>> {
    vec(breakpoints(max_intervals + 1), D).prop_map(|knots| {
        let knots = array::from_fn(|d| knots[d].clone());
        Grid::from_knot_coordinates(knots).expect("strategy produces strictly increasing breakpoints")
    })
}

/// B-spline spaces with degrees in `1..=max_degree` on grids from [`grid`].
pub fn bspline_space<const D: usize>(
    max_degree: usize,
    max_intervals: usize,
) -> impl Strategy<Value = BSplineSpace<f64, D>> {
    (grid::<D>(max_intervals), vec(1..=max_degree, D))
        .prop_map(|(grid, degrees)| BSplineSpace::new(grid, array::from_fn(|d| degrees[d])))
}

/// NURBS spaces with weights in `[0.5, 2]`.
pub fn nurbs_space<const D: usize>(
    max_degree: usize,
    max_intervals: usize,
) -> impl Strategy<Value = NurbsSpace<f64, D>> {
    bspline_space::<D>(max_degree, max_intervals).prop_flat_map(|space| {
        let n = space.num_basis();
        (Just(space), vec(0.5..2.0, n)).prop_map(|(space, weights)| {
            NurbsSpace::new(space, weights).expect("strategy produces positive weights of matching length")
        })
    })
}

/// Points inside the bounding box of `grid`, including its boundary.
pub fn point_in_grid<const D: usize>(grid: &Grid<f64, D>) -> impl Strategy<Value = Point<f64, D>> {
    let (min, max) = grid.bounding_box();
    vec(0.0..=1.0, D)
        .prop_map(move |t: Vec<f64>| Point::from(array::from_fn(|d| (min[d] + t[d] * (max[d] - min[d])).min(max[d]))))
}
