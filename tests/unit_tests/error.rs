use igafem::assembly::global::{apply_homogeneous_dirichlet, CholeskySolver, CsrAssembler, LinearSolver, VectorAssembler};
use igafem::assembly::local::{ElementSourceAssembler, ElementStiffnessAssembler};
use igafem::basis::BSplineSpace;
use igafem::error::{estimate_h1_seminorm_error, estimate_l2_error};
use igafem::function::IgFunction;
use igafem::geometry::IgMapping;
use igafem::grid::Grid;
use igafem::quadrature::TensorProductQuadrature;
use igafem::Error;
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point2, Vector2};
use std::f64::consts::PI;

fn u_exact(x: &Point2<f64>) -> f64 {
    (PI * x.x).sin() * (PI * x.y).sin()
}

fn u_exact_gradient(x: &Point2<f64>) -> Vector2<f64> {
    PI * Vector2::new(
        (PI * x.x).cos() * (PI * x.y).sin(),
        (PI * x.x).sin() * (PI * x.y).cos(),
    )
}

/// Solves `-laplace(u) = f` on the unit square with homogeneous Dirichlet conditions and
/// returns the L2 and H1 seminorm errors.
fn solve_poisson(num_intervals: usize, degree: usize) -> (f64, f64) {
    let space = BSplineSpace::new(Grid::uniform([num_intervals; 2]), [degree; 2]);
    let mapping = IgMapping::<f64, 2, 2>::identity(space.clone());
    let quadrature = TensorProductQuadrature::gauss(degree + 2, 2);

    let mut stiffness = CsrAssembler::<f64>::default()
        .assemble(&ElementStiffnessAssembler::new(&mapping, &quadrature))
        .unwrap();
    let source = |x: &Point2<f64>| 2.0 * PI * PI * u_exact(x);
    let mut rhs = VectorAssembler::<f64>::default()
        .assemble_vector(&ElementSourceAssembler::new(&mapping, &quadrature, source))
        .unwrap();

    let boundary = space.boundary_dofs();
    apply_homogeneous_dirichlet(&mut stiffness, &mut rhs, &boundary);
    let solution = CholeskySolver.solve(&stiffness, &rhs).unwrap();
    for &i in &boundary {
        assert_scalar_eq!(solution[i], 0.0, comp = abs, tol = 1e-14);
    }

    let u_h = IgFunction::new(space, solution.as_slice().to_vec()).unwrap();
    let l2 = estimate_l2_error(&mapping, &u_h, u_exact, &quadrature).unwrap();
    let h1 = estimate_h1_seminorm_error(&mapping, &u_h, u_exact_gradient, &quadrature).unwrap();
    (l2, h1)
}

#[test]
fn exact_field_has_no_error() {
    // x + 2y is reproduced by the Greville coefficients of a linear space
    let space = BSplineSpace::new(Grid::uniform([3, 2]), [2, 1]);
    let mapping = IgMapping::<f64, 2, 2>::identity(space.clone());
    let coefficients = mapping.control_points().iter().map(|p| p.x + 2.0 * p.y).collect();
    let u_h = IgFunction::new(space, coefficients).unwrap();
    let quadrature = TensorProductQuadrature::gauss(3, 2);

    let l2 = estimate_l2_error(&mapping, &u_h, |x: &Point2<f64>| x.x + 2.0 * x.y, &quadrature).unwrap();
    let h1 = estimate_h1_seminorm_error(&mapping, &u_h, |_: &Point2<f64>| Vector2::new(1.0, 2.0), &quadrature).unwrap();
    assert_scalar_eq!(l2, 0.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(h1, 0.0, comp = abs, tol = 1e-12);

    // The zero field has the norm of the exact solution as error
    let zero = IgFunction::zero(mapping.space().clone());
    let l2 = estimate_l2_error(&mapping, &zero, |_: &Point2<f64>| 3.0, &quadrature).unwrap();
    assert_scalar_eq!(l2, 3.0, comp = abs, tol = 1e-12);
}

#[test]
fn mismatched_field_is_rejected() {
    let space = BSplineSpace::new(Grid::uniform([2, 2]), [2, 2]);
    let mapping = IgMapping::<f64, 2, 2>::identity(space);
    let quadrature = TensorProductQuadrature::gauss(3, 2);
    let other = IgFunction::zero(BSplineSpace::new(Grid::uniform([2, 2]), [1, 1]));
    let error = estimate_l2_error(&mapping, &other, |_: &Point2<f64>| 0.0, &quadrature).unwrap_err();
    assert!(matches!(error.downcast_ref::<Error>(), Some(Error::IncompatibleSpace(_))));

    // Same number of basis functions (4 x 4) on a different grid
    let same_size = IgFunction::zero(BSplineSpace::new(Grid::uniform([3, 3]), [1, 1]));
    assert_eq!(same_size.space().num_basis(), mapping.space().num_basis());
    let error = estimate_h1_seminorm_error(&mapping, &same_size, |_: &Point2<f64>| Vector2::zeros(), &quadrature)
        .unwrap_err();
    assert!(matches!(error.downcast_ref::<Error>(), Some(Error::IncompatibleSpace(_))));
}

#[test]
fn poisson_converges_at_optimal_rates() {
    let degree = 2;
    let errors: Vec<(f64, f64)> = [4, 8, 16].iter().map(|&n| solve_poisson(n, degree)).collect();
    for pair in errors.windows(2) {
        let (l2_coarse, h1_coarse) = pair[0];
        let (l2_fine, h1_fine) = pair[1];
        let l2_rate = (l2_coarse / l2_fine).log2();
        let h1_rate = (h1_coarse / h1_fine).log2();
        assert!(l2_rate > degree as f64 + 0.5, "L2 rate {l2_rate}");
        assert!(h1_rate > degree as f64 - 0.5, "H1 rate {h1_rate}");
    }
    assert!(errors[2].0 < 1e-3);
}
