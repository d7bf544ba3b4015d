use igafem::basis::{BSplineSpace, NurbsSpace, ReferenceSpace};
use igafem::function::IgFunction;
use igafem::geometry::{control_points_from_fn, IgMapping};
use igafem::grid::{Grid, RefinementObserver};
use igafem::proptest::{bspline_space, nurbs_space};
use igafem::Error;
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point, Vector2};
use proptest::prelude::*;
use std::array;
use util::unit_lattice_midpoints;

fn sample_points<const D: usize>(grid: &Grid<f64, D>, n: usize) -> Vec<Point<f64, D>> {
    let (min, max) = grid.bounding_box();
    unit_lattice_midpoints::<D>(n)
        .into_iter()
        .map(|t| Point::from(array::from_fn(|d| min[d] + t[d] * (max[d] - min[d]))))
        .collect()
}

/// A curved annulus-like mapping on a quadratic space.
fn curved_mapping(space: impl Into<ReferenceSpace<f64, 2>>) -> IgMapping<f64, 2, 2> {
    let space = space.into();
    let control_points = control_points_from_fn(&space, |[i, j]| {
        let (i, j) = (i as f64, j as f64);
        Vector2::new(i + 0.1 * j * j, j - 0.2 * i + 0.05 * i * j)
    });
    IgMapping::new(space, control_points).unwrap()
}

fn assert_same_mapping(before: &IgMapping<f64, 2, 2>, after: &IgMapping<f64, 2, 2>, points: &[Point<f64, 2>]) {
    let (x0, x1) = (
        before.evaluate_at_points(points).unwrap(),
        after.evaluate_at_points(points).unwrap(),
    );
    let (j0, j1) = (
        before.jacobians_at_points(points).unwrap(),
        after.jacobians_at_points(points).unwrap(),
    );
    for q in 0..points.len() {
        assert_scalar_eq!((x0[q] - x1[q]).norm(), 0.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!((j0[q] - j1[q]).norm(), 0.0, comp = abs, tol = 1e-10);
    }
}

#[test]
fn bspline_mapping_keeps_its_shape() {
    let space = BSplineSpace::new(Grid::uniform([2, 3]), [2, 2]);
    let original = curved_mapping(space);
    let mut refined = original.clone();
    let refinement = refined
        .insert_knots([vec![0.25, 0.8], vec![0.1]])
        .unwrap();

    assert_eq!(refinement.refined_directions(), &[true, true]);
    assert_eq!(refined.space().num_basis_per_direction().extents(), &[6, 6]);
    assert_eq!(refined.control_points().len(), 36);
    assert_same_mapping(&original, &refined, &sample_points(original.space().grid(), 7));
}

#[test]
fn nurbs_mapping_keeps_its_shape() {
    let bspline = BSplineSpace::new(Grid::uniform([2, 2]), [2, 2]);
    let weights = (0..bspline.num_basis())
        .map(|i| 1.0 + 0.3 * (i as f64).cos())
        .collect();
    let original = curved_mapping(NurbsSpace::new(bspline, weights).unwrap());
    let mut refined = original.clone();
    refined.insert_knots([vec![0.3], vec![0.6, 0.7]]).unwrap();

    assert!(refined.space().has_weights());
    assert_eq!(refined.space().num_basis(), 5 * 6);
    assert_same_mapping(&original, &refined, &sample_points(original.space().grid(), 7));
}

#[test]
fn reduced_continuity_space_keeps_its_shape() {
    let space = BSplineSpace::with_multiplicity(Grid::uniform([2, 2]), [2, 2], [2, 1]).unwrap();
    let original = curved_mapping(space);
    let mut refined = original.clone();
    refined.insert_knots([vec![0.25], vec![0.25]]).unwrap();

    // Direction 0 receives the new knot twice
    assert_eq!(refined.space().num_basis_per_direction().extents(), &[7, 5]);
    assert_same_mapping(&original, &refined, &sample_points(original.space().grid(), 6));
}

#[test]
fn observers_follow_a_uniform_refinement() {
    let bspline = BSplineSpace::new(Grid::uniform([2, 2]), [2, 2]);
    let weights = (0..bspline.num_basis()).map(|i| 1.0 + 0.1 * i as f64).collect();
    let space = ReferenceSpace::from(NurbsSpace::new(bspline, weights).unwrap());
    let mut mapping = curved_mapping(space.clone());
    let coefficients = (0..space.num_basis()).map(|i| (i as f64).sqrt()).collect();
    let mut function = IgFunction::new(space, coefficients).unwrap();
    let (mapping_before, function_before) = (mapping.clone(), function.clone());

    let mut grid = mapping.space().grid().clone();
    let refinement = grid.refine_uniform(2);
    refinement
        .notify(&mut [&mut mapping as &mut dyn RefinementObserver<f64, 2>, &mut function])
        .unwrap();

    assert_eq!(mapping.space().grid(), &grid);
    assert_eq!(function.space().grid(), &grid);
    assert_eq!(function.coefficients().len(), 36);

    let points = sample_points(&grid, 6);
    assert_same_mapping(&mapping_before, &mapping, &points);
    let (f0, f1) = (
        function_before.evaluate_at_points(&points).unwrap(),
        function.evaluate_at_points(&points).unwrap(),
    );
    for (a, b) in f0.iter().zip(&f1) {
        assert_scalar_eq!(*a, *b, comp = abs, tol = 1e-12);
    }
}

#[test]
fn refinement_of_another_grid_is_rejected() {
    let mut function = IgFunction::<f64, 1>::zero(BSplineSpace::new(Grid::uniform([2]), [1]));
    let mut other = Grid::<f64, 1>::uniform([3]);
    let refinement = other.refine_uniform(2);
    assert_eq!(function.refine_h(&refinement), Err(Error::IncompatibleRefinement));
}

fn assert_function_preserved(function: IgFunction<f64, 2>) -> Result<(), TestCaseError> {
    let mut refined = function.clone();
    let mut grid = function.space().grid().clone();
    let refinement = grid.refine_uniform(2);
    refined.refine_h(&refinement).unwrap();

    let points = sample_points(&grid, 5);
    let (f0, f1) = (
        function.evaluate_at_points(&points).unwrap(),
        refined.evaluate_at_points(&points).unwrap(),
    );
    let (g0, g1) = (
        function.gradients_at_points(&points).unwrap(),
        refined.gradients_at_points(&points).unwrap(),
    );
    for q in 0..points.len() {
        prop_assert!((f0[q] - f1[q]).abs() <= 1e-10);
        prop_assert!((g0[q] - g1[q]).norm() <= 1e-7 * (1.0 + g0[q].norm()));
    }
    Ok(())
}

proptest! {
    #[test]
    fn bspline_function_refinement_preserves_values(space in bspline_space::<2>(3, 3)) {
        let coefficients = (0..space.num_basis()).map(|i| (0.7 * i as f64).sin()).collect();
        assert_function_preserved(IgFunction::new(space, coefficients).unwrap())?;
    }

    #[test]
    fn nurbs_function_refinement_preserves_values(space in nurbs_space::<2>(3, 3)) {
        let coefficients = (0..space.num_basis()).map(|i| (0.7 * i as f64).sin()).collect();
        assert_function_preserved(IgFunction::new(space, coefficients).unwrap())?;
    }
}
