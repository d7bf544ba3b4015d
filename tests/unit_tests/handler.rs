use igafem::basis::{BSplineSpace, ReferenceSpace, SpaceElementHandler};
use igafem::flags::{BasisFlags, GridFlags, MappingFlags};
use igafem::geometry::{IgMapping, MappingElementHandler};
use igafem::grid::{Grid, ACTIVE};
use igafem::handler::GridElementHandler;
use igafem::quadrature::TensorProductQuadrature;
use matrixcompare::assert_scalar_eq;
use nalgebra::Point2;

#[test]
fn grid_cache_fill_is_idempotent() {
    let grid = Grid::from_knot_coordinates([vec![0.0, 0.5, 2.0], vec![0.0, 1.0, 3.0]]).unwrap();
    let quadrature = TensorProductQuadrature::gauss(3, 2);
    let mut handler = GridElementHandler::new(&grid);
    handler.reset_element(GridFlags::POINT | GridFlags::W_MEASURE, &quadrature);

    let mut element = grid.begin(ACTIVE);
    handler.init_element_cache(&mut element);
    element.move_to(3);
    handler.fill_element_cache(&mut element);
    let points = element.element_points().to_vec();
    let w_measures = element.element_w_measures().to_vec();

    handler.fill_element_cache(&mut element);
    assert_eq!(element.element_points(), points.as_slice());
    assert_eq!(element.element_w_measures(), w_measures.as_slice());

    // Element 3 is [0.5, 2] x [1, 3]
    assert_scalar_eq!(w_measures.iter().sum::<f64>(), 3.0, comp = abs, tol = 1e-14);
    assert!(points.iter().all(|x| element.is_point_inside(x)));
}

#[test]
fn cache_follows_the_accessor() {
    let grid = Grid::<f64, 2>::uniform([2, 2]);
    let quadrature = TensorProductQuadrature::gauss(1, 2);
    let mut handler = GridElementHandler::new(&grid);
    handler.reset_element(GridFlags::POINT, &quadrature);

    let mut element = grid.begin(ACTIVE);
    handler.init_element_cache(&mut element);
    let mut centers = Vec::new();
    while !element.is_past_the_end() {
        handler.fill_element_cache(&mut element);
        centers.push(element.element_points()[0]);
        element.advance();
    }
    let expected = [
        Point2::new(0.25, 0.25),
        Point2::new(0.75, 0.25),
        Point2::new(0.25, 0.75),
        Point2::new(0.75, 0.75),
    ];
    assert_eq!(centers.len(), expected.len());
    for (x, y) in centers.iter().zip(&expected) {
        assert_scalar_eq!((x - y).norm(), 0.0, comp = abs, tol = 1e-15);
    }
}

#[test]
fn face_quadrature_points_lie_on_the_face() {
    let grid = Grid::<f64, 2>::uniform([2, 2]);
    let quadrature = TensorProductQuadrature::gauss(2, 1);
    let mut handler = GridElementHandler::new(&grid);
    handler.reset(GridFlags::POINT | GridFlags::W_MEASURE, 1, &quadrature);

    let mut element = grid.begin(ACTIVE);
    handler.init_cache(&mut element, 1);
    element.move_to(3);
    // Face 1 is the side x = 1 of element [0.5, 1] x [0.5, 1]
    handler.fill_cache(&mut element, 1, 1);
    assert!(element.points(1, 1).iter().all(|x| x[0] == 1.0));
    let measure: f64 = element.w_measures(1, 1).iter().sum();
    assert_scalar_eq!(measure, 0.5, comp = abs, tol = 1e-15);
}

#[test]
fn basis_cache_fill_is_idempotent() {
    let space = ReferenceSpace::from(BSplineSpace::new(Grid::<f64, 2>::uniform([3, 2]), [2, 1]));
    let quadrature = TensorProductQuadrature::gauss(3, 2);
    let mut handler = SpaceElementHandler::new(&space);
    handler.reset_element(BasisFlags::VALUE | BasisFlags::GRADIENT, &quadrature);

    let mut element = space.begin(ACTIVE);
    handler.init_element_cache(&mut element);
    element.move_to(4);
    handler.fill_element_cache(&mut element);
    let values = element.element_values().clone();
    let gradients = element.element_gradients().clone();
    handler.fill_element_cache(&mut element);
    assert_eq!(element.element_values(), &values);
    assert_eq!(element.element_gradients(), &gradients);
    assert_eq!(element.local_to_global(), space.element_dofs(&[1, 1]));
}

#[test]
fn unrequested_tables_stay_empty() {
    let space = ReferenceSpace::from(BSplineSpace::new(Grid::<f64, 2>::uniform([2, 2]), [2, 2]));
    let quadrature = TensorProductQuadrature::gauss(3, 2);
    let mut handler = SpaceElementHandler::new(&space);
    handler.reset_element(BasisFlags::VALUE, &quadrature);
    let mut element = space.begin(ACTIVE);
    handler.init_element_cache(&mut element);
    handler.fill_element_cache(&mut element);
    assert_eq!(element.element_values().num_functions(), 9);
    assert_eq!(element.element_values().num_points(), 9);
    assert!(element.element_gradients().is_empty());
    assert!(element.element_hessians().is_empty());

    // Univariate tables only, as requested by sum factorization
    handler.reset_element(BasisFlags::UNIVARIATE, &quadrature);
    handler.init_element_cache(&mut element);
    handler.fill_element_cache(&mut element);
    assert!(element.element_values().is_empty());
    assert!(element.element_gradients().is_empty());
    assert_eq!(element.element_univariate().table(0, 0).shape(), (3, 3));

    let mapping = IgMapping::<f64, 2, 2>::identity(space.clone());
    let mut handler = MappingElementHandler::new(&mapping);
    handler.reset_element(MappingFlags::W_MEASURE, &quadrature);
    let mut element = mapping.begin(ACTIVE);
    handler.init_element_cache(&mut element);
    handler.fill_element_cache(&mut element).unwrap();
    assert_eq!(element.element_w_measures().len(), 9);
    assert!(element.element_points().is_empty());
    assert!(element.element_hessians().is_empty());
    assert!(element.element_inverse_jacobians_transpose().is_empty());
}

#[test]
fn filling_reuses_the_allocated_buffers() {
    let space = ReferenceSpace::from(BSplineSpace::new(Grid::<f64, 2>::uniform([3, 2]), [2, 1]));
    let mapping = IgMapping::<f64, 2, 2>::identity(space);
    let quadrature = TensorProductQuadrature::gauss(3, 2);
    let mut handler = MappingElementHandler::new(&mapping);
    handler.reset_element(MappingFlags::POINT | MappingFlags::W_MEASURE, &quadrature);

    let mut element = mapping.begin(ACTIVE);
    handler.init_element_cache(&mut element);
    handler.fill_element_cache(&mut element).unwrap();
    let points = element.element_points().as_ptr();
    let w_measures = element.element_w_measures().as_ptr();
    element.advance();
    while !element.is_past_the_end() {
        handler.fill_element_cache(&mut element).unwrap();
        assert_eq!(element.element_points().as_ptr(), points);
        assert_eq!(element.element_w_measures().as_ptr(), w_measures);
        element.advance();
    }
}
