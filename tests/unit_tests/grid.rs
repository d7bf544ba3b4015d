use igafem::grid::{Grid, ACTIVE};
use igafem::Error;
use nalgebra::Point2;

#[test]
fn boundary_classification_of_3x3_grid() {
    let grid = Grid::<f64, 2>::uniform([3, 3]);
    let boundary: Vec<usize> = (0..grid.num_elements())
        .filter(|&e| grid.is_boundary_element(e))
        .collect();
    assert_eq!(boundary.len(), 8);
    assert!(!grid.is_boundary_element(4));

    let accessor_flags: Vec<bool> = grid.elements(ACTIVE).map(|e| e.is_boundary()).collect();
    assert_eq!(accessor_flags.iter().filter(|&&b| b).count(), 8);
    assert!(!accessor_flags[4]);
}

#[test]
fn boundary_faces_of_corner_element() {
    let grid = Grid::<f64, 2>::uniform([3, 3]);
    let mut element = grid.begin(ACTIVE);
    assert_eq!(element.flat_index(), 0);
    // Faces are numbered 2 * direction + side
    assert!(element.is_boundary_sub_element(1, 0));
    assert!(!element.is_boundary_sub_element(1, 1));
    assert!(element.is_boundary_sub_element(1, 2));
    assert!(!element.is_boundary_sub_element(1, 3));

    element.move_to(4);
    assert_eq!(element.tensor_index(), &[1, 1]);
    assert!((0..4).all(|face| !element.is_boundary_sub_element(1, face)));
}

#[test]
fn traversal_visits_elements_in_flat_order() {
    let grid = Grid::<f64, 3>::uniform([2, 3, 2]);
    let mut element = grid.begin(ACTIVE);
    let end = grid.end(ACTIVE);
    let mut visited = Vec::new();
    while element != end {
        visited.push(element.flat_index());
        element.advance();
    }
    assert!(element.is_past_the_end());
    assert_eq!(visited, (0..12).collect::<Vec<_>>());
}

#[test]
fn element_geometry() {
    let grid = Grid::from_knot_coordinates([vec![0.0, 0.5, 2.0], vec![-1.0, 1.0]]).unwrap();
    let mut element = grid.begin(ACTIVE);
    element.move_to(1);
    assert_eq!(element.vertex(0), Point2::new(0.5, -1.0));
    assert_eq!(element.vertex(3), Point2::new(2.0, 1.0));
    assert_eq!(element.center(), Point2::new(1.25, 0.0));
    assert_eq!(element.measure(), 3.0);
    assert_eq!(element.sub_element_measure(1, 0), 2.0);
    assert_eq!(element.sub_element_measure(1, 2), 1.5);
    assert!(element.is_point_inside(&Point2::new(0.5, 0.0)));
    assert!(!element.is_point_inside(&Point2::new(0.25, 0.0)));
}

#[test]
fn locate_points_including_upper_boundary() {
    let grid = Grid::from_knot_coordinates([vec![0.0, 0.5, 1.0], vec![0.0, 0.25, 0.5, 1.0]]).unwrap();
    assert_eq!(grid.locate_element(&[0.1, 0.1]).unwrap(), 0);
    assert_eq!(grid.locate_element(&[0.75, 0.3]).unwrap(), 3);
    assert_eq!(grid.locate_element(&[1.0, 1.0]).unwrap(), 5);
    assert_eq!(
        grid.locate_element(&[1.5, 0.0]),
        Err(Error::PointOutsideDomain { direction: 0 })
    );
}

#[test]
fn refinement_replays_on_identical_copy() {
    let mut grid = Grid::<f64, 2>::uniform([2, 1]);
    let mut copy = grid.clone();
    let refinement = grid.refine_uniform(2);
    assert_eq!(grid.num_intervals_per_direction().extents(), &[4, 2]);
    assert_eq!(refinement.refined_directions(), &[true, true]);
    assert_eq!(refinement.inserted_knots(0), &[0.25, 0.75]);

    copy.apply_refinement(&refinement).unwrap();
    assert_eq!(copy, grid);

    let mut other = Grid::<f64, 2>::uniform([3, 1]);
    assert_eq!(other.apply_refinement(&refinement), Err(Error::IncompatibleRefinement));
}

#[test]
fn inserting_existing_breakpoint_fails() {
    let mut grid = Grid::<f64, 1>::uniform([2]);
    assert!(matches!(
        grid.insert_knots([vec![0.5]]),
        Err(Error::InvalidKnots { direction: 0, .. })
    ));
    assert_eq!(grid.num_elements(), 2);
}
