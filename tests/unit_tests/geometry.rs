use igafem::basis::{BSplineSpace, ReferenceSpace};
use igafem::flags::{BasisFlags, MappingFlags};
use igafem::geometry::{control_points_from_fn, IgMapping, MappingElementHandler, PhysicalSpaceHandler};
use igafem::grid::{Grid, ACTIVE};
use igafem::quadrature::TensorProductQuadrature;
use igafem::Error;
use matrixcompare::assert_scalar_eq;
use nalgebra::{Matrix2, Matrix3x2, Point2, Vector2, Vector3};

fn quadratic_space() -> ReferenceSpace<f64, 2> {
    BSplineSpace::new(Grid::uniform_box([0.0, -1.0], [2.0, 1.0], [2, 3]).unwrap(), [2, 2]).into()
}

#[test]
fn identity_mapping_has_unit_jacobian() {
    let mapping = IgMapping::<f64, 2, 2>::identity(quadratic_space());
    let quadrature = TensorProductQuadrature::gauss(3, 2);
    let mut handler = MappingElementHandler::new(&mapping);
    handler.reset_element(
        MappingFlags::POINT | MappingFlags::JACOBIAN | MappingFlags::W_MEASURE,
        &quadrature,
    );

    let mut element = mapping.begin(ACTIVE);
    handler.init_element_cache(&mut element);
    let mut total = 0.0;
    while !element.is_past_the_end() {
        handler.fill_element_cache(&mut element).unwrap();
        for jacobian in element.element_jacobians() {
            assert_scalar_eq!((jacobian - Matrix2::identity()).norm(), 0.0, comp = abs, tol = 1e-12);
        }
        for &measure in element.element_measures() {
            assert_scalar_eq!(measure, 1.0, comp = abs, tol = 1e-12);
        }
        let grid_points = element.space_element().grid_element().element_points();
        for (x, u) in element.element_points().iter().zip(grid_points) {
            assert_scalar_eq!((x - u).norm(), 0.0, comp = abs, tol = 1e-12);
        }
        total += element.element_w_measures().iter().sum::<f64>();
        element.advance();
    }
    assert_scalar_eq!(total, 4.0, comp = abs, tol = 1e-12);
}

#[test]
fn affine_mapping_scales_measures() {
    let space = quadratic_space();
    let a = Matrix2::new(2.0, 0.5, 0.0, 3.0);
    let b = Vector2::new(1.0, -2.0);
    let mut mapping = IgMapping::<f64, 2, 2>::identity(space);
    for p in mapping.control_points_mut() {
        *p = a * *p + b;
    }

    let points = [Point2::new(0.3, 0.1), Point2::new(1.9, -0.7)];
    let images = mapping.evaluate_at_points(&points).unwrap();
    let jacobians = mapping.jacobians_at_points(&points).unwrap();
    for ((u, x), jacobian) in points.iter().zip(&images).zip(&jacobians) {
        assert_scalar_eq!((a * u.coords + b - x.coords).norm(), 0.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!((jacobian - a).norm(), 0.0, comp = abs, tol = 1e-12);
    }
    for hessians in mapping.hessians_at_points(&points).unwrap() {
        assert!(hessians.iter().all(|h| h.norm() < 1e-10));
    }

    let quadrature = TensorProductQuadrature::gauss(3, 2);
    let mut handler = MappingElementHandler::new(&mapping);
    handler.reset_element(MappingFlags::W_MEASURE, &quadrature);
    let mut element = mapping.begin(ACTIVE);
    handler.init_element_cache(&mut element);
    let mut area = 0.0;
    while !element.is_past_the_end() {
        handler.fill_element_cache(&mut element).unwrap();
        area += element.element_w_measures().iter().sum::<f64>();
        element.advance();
    }
    assert_scalar_eq!(area, 4.0 * a.determinant(), comp = abs, tol = 1e-11);
}

#[test]
fn surface_measure_of_a_tilted_plane() {
    // z = x + 2y over the unit square has area sqrt(6)
    let space: ReferenceSpace<f64, 2> = BSplineSpace::new(Grid::uniform([2, 2]), [1, 1]).into();
    let control_points = control_points_from_fn(&space, |[i, j]| {
        let (x, y) = (i as f64 / 2.0, j as f64 / 2.0);
        Vector3::new(x, y, x + 2.0 * y)
    });
    let surface = IgMapping::<f64, 2, 3>::new(space, control_points).unwrap();

    let jacobian = surface.jacobians_at_points(&[Point2::new(0.4, 0.4)]).unwrap()[0];
    assert_scalar_eq!(
        (jacobian - Matrix3x2::new(1.0, 0.0, 0.0, 1.0, 1.0, 2.0)).norm(),
        0.0,
        comp = abs,
        tol = 1e-12
    );

    let quadrature = TensorProductQuadrature::gauss(2, 2);
    let mut handler = MappingElementHandler::new(&surface);
    handler.reset_element(MappingFlags::W_MEASURE | MappingFlags::INVERSE_JACOBIAN_TRANSPOSE, &quadrature);
    let mut element = surface.begin(ACTIVE);
    handler.init_element_cache(&mut element);
    let mut area = 0.0;
    while !element.is_past_the_end() {
        handler.fill_element_cache(&mut element).unwrap();
        area += element.element_w_measures().iter().sum::<f64>();
        // Pseudo-inverse: J^T (J (J^T J)^{-1}) = I
        for (j, g) in element
            .element_jacobians()
            .iter()
            .zip(element.element_inverse_jacobians_transpose())
        {
            assert_scalar_eq!((j.transpose() * g - Matrix2::identity()).norm(), 0.0, comp = abs, tol = 1e-12);
        }
        element.advance();
    }
    assert_scalar_eq!(area, 6.0f64.sqrt(), comp = abs, tol = 1e-12);
}

#[test]
fn physical_gradients_of_the_coordinate_functions() {
    let space = quadratic_space();
    let control_points = control_points_from_fn(&space, |[i, j]| {
        let (i, j) = (i as f64, j as f64);
        Vector2::new(i + 0.2 * j * j, j + 0.1 * i * i)
    });
    let mapping = IgMapping::new(space, control_points).unwrap();
    let x_coefficients: Vec<f64> = mapping.control_points().iter().map(|p| p.x).collect();
    let y_coefficients: Vec<f64> = mapping.control_points().iter().map(|p| p.y).collect();

    let quadrature = TensorProductQuadrature::gauss(3, 2);
    let mut handler = PhysicalSpaceHandler::new(&mapping);
    handler.reset_element(BasisFlags::GRADIENT, &quadrature);
    let mut element = handler.begin(ACTIVE);
    handler.init_element_cache(&mut element);
    while !element.is_past_the_end() {
        handler.fill_element_cache(&mut element).unwrap();
        let dofs = element.local_to_global();
        let gradients = element.element_gradients();
        let x_local: Vec<f64> = dofs.iter().map(|&i| x_coefficients[i]).collect();
        let y_local: Vec<f64> = dofs.iter().map(|&i| y_coefficients[i]).collect();
        let grad_x = gradients.linear_combination(&x_local);
        let grad_y = gradients.linear_combination(&y_local);
        for (gx, gy) in grad_x.iter().zip(&grad_y) {
            assert_scalar_eq!((gx - Vector2::x()).norm(), 0.0, comp = abs, tol = 1e-11);
            assert_scalar_eq!((gy - Vector2::y()).norm(), 0.0, comp = abs, tol = 1e-11);
        }

        // Physical values are the reference values
        let values = element.element_values();
        assert_eq!(values.num_functions(), 9);
        for q in 0..values.num_points() {
            let sum: f64 = (0..9).map(|i| *values.get(i, q)).sum();
            assert_scalar_eq!(sum, 1.0, comp = abs, tol = 1e-12);
        }
        element.advance();
    }
}

/// Face lengths and unit outward normals of a single-element mapping.
fn face_lengths_and_normals(mapping: &IgMapping<f64, 2, 2>) -> Vec<(f64, Vec<Vector2<f64>>)> {
    let quadrature = TensorProductQuadrature::gauss(2, 1);
    let mut handler = MappingElementHandler::new(mapping);
    handler.reset(MappingFlags::W_MEASURE | MappingFlags::OUTER_NORMAL, 1, &quadrature);
    let mut element = mapping.begin(ACTIVE);
    handler.init_cache(&mut element, 1);
    (0..4)
        .map(|face| {
            handler.fill_cache(&mut element, 1, face).unwrap();
            let length = element.face_w_measures(face).iter().sum();
            (length, element.face_outer_normals(face).to_vec())
        })
        .collect()
}

#[test]
fn face_measures_of_a_stretched_square() {
    // F(u, v) = (2u, v): the faces u = const keep length 1, the faces v = const have length 2
    let space: ReferenceSpace<f64, 2> = BSplineSpace::new(Grid::uniform([1, 1]), [1, 1]).into();
    let control_points = control_points_from_fn(&space, |[i, j]| Vector2::new(2.0 * i as f64, j as f64));
    let mapping = IgMapping::new(space, control_points).unwrap();

    let faces = face_lengths_and_normals(&mapping);
    let expected_lengths = [1.0, 1.0, 2.0, 2.0];
    let expected_normals = [-Vector2::x(), Vector2::x(), -Vector2::y(), Vector2::y()];
    for ((length, normals), (&l, n)) in faces.iter().zip(expected_lengths.iter().zip(&expected_normals)) {
        assert_scalar_eq!(*length, l, comp = abs, tol = 1e-14);
        for normal in normals {
            assert_scalar_eq!((normal - n).norm(), 0.0, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn face_measures_and_normals_of_a_trapezoid() {
    // Bilinear map onto the trapezoid (0, 0), (2, 0), (1, 1), (0, 1): F(u, v) = (u (2 - v), v)
    let space: ReferenceSpace<f64, 2> = BSplineSpace::new(Grid::uniform([1, 1]), [1, 1]).into();
    let control_points = control_points_from_fn(&space, |[i, j]| {
        let (u, v) = (i as f64, j as f64);
        Vector2::new(u * (2.0 - v), v)
    });
    let mapping = IgMapping::new(space, control_points).unwrap();

    let faces = face_lengths_and_normals(&mapping);
    let slanted = Vector2::new(1.0, 1.0) / 2f64.sqrt();
    let expected = [
        (1.0, -Vector2::x()),
        (2f64.sqrt(), slanted),
        (2.0, -Vector2::y()),
        (1.0, Vector2::y()),
    ];
    for ((length, normals), (l, n)) in faces.iter().zip(&expected) {
        assert_scalar_eq!(*length, *l, comp = abs, tol = 1e-13);
        assert_eq!(normals.len(), 2);
        for normal in normals {
            assert_scalar_eq!((normal - n).norm(), 0.0, comp = abs, tol = 1e-13);
        }
    }

    // Physical gradients of the coordinate functions on the slanted face
    let x_coefficients: Vec<f64> = mapping.control_points().iter().map(|p| p.x).collect();
    let quadrature = TensorProductQuadrature::gauss(2, 1);
    let mut handler = PhysicalSpaceHandler::new(&mapping);
    handler.reset(BasisFlags::GRADIENT, 1, &quadrature);
    let mut element = handler.begin(ACTIVE);
    handler.init_cache(&mut element, 1);
    handler.fill_cache(&mut element, 1, 1).unwrap();
    let dofs = element.local_to_global();
    let x_local: Vec<f64> = dofs.iter().map(|&i| x_coefficients[i]).collect();
    for grad_x in element.gradients(1, 1).linear_combination(&x_local) {
        assert_scalar_eq!((grad_x - Vector2::x()).norm(), 0.0, comp = abs, tol = 1e-12);
    }
}

#[test]
#[should_panic(expected = "outer normals are only defined on faces")]
fn outer_normals_need_faces() {
    let mapping = IgMapping::<f64, 2, 2>::identity(quadratic_space());
    let mut handler = MappingElementHandler::new(&mapping);
    handler.reset_element(MappingFlags::OUTER_NORMAL, &TensorProductQuadrature::gauss(2, 2));
}

#[test]
fn degenerate_mapping_has_no_inverse_jacobian() {
    let space = quadratic_space();
    let n = space.num_basis();
    let collapsed = IgMapping::<f64, 2, 2>::new(space, vec![Vector2::new(1.0, 1.0); n]).unwrap();
    let quadrature = TensorProductQuadrature::gauss(2, 2);
    let mut handler = MappingElementHandler::new(&collapsed);
    handler.reset_element(MappingFlags::INVERSE_JACOBIAN_TRANSPOSE, &quadrature);
    let mut element = collapsed.begin(ACTIVE);
    handler.init_element_cache(&mut element);
    assert!(matches!(
        handler.fill_element_cache(&mut element),
        Err(Error::SingularMatrix(_))
    ));
}

#[test]
fn control_point_count_is_checked() {
    let space = quadratic_space();
    assert!(matches!(
        IgMapping::<f64, 2, 2>::new(space, vec![Vector2::zeros(); 3]),
        Err(Error::DimensionMismatch { expected: 20, actual: 3, .. })
    ));
}
