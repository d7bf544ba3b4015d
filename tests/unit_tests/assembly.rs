use igafem::assembly::global::{
    apply_dirichlet_values, apply_homogeneous_dirichlet, CholeskySolver, CsrAssembler, LinearSolver, VectorAssembler,
};
use igafem::assembly::local::{
    assemble_element_mass_matrix, assemble_element_stiffness_matrix, ElementMassAssembler, ElementSourceAssembler,
    ElementStiffnessAssembler,
};
use igafem::basis::{BSplineSpace, ValueTable};
use igafem::geometry::IgMapping;
use igafem::grid::Grid;
use igafem::quadrature::TensorProductQuadrature;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, Point2, Vector1, Vector2};

/// A quadrilateral with vertices (0, 0), (2, 0), (2, 1) and (0, 2), area 3.
fn quadrilateral() -> IgMapping<f64, 2, 2> {
    let space = BSplineSpace::new(Grid::uniform([3, 2]), [2, 2]);
    let corners = [
        Vector2::new(0.0, 0.0),
        Vector2::new(2.0, 0.0),
        Vector2::new(0.0, 2.0),
        Vector2::new(2.0, 1.0),
    ];
    let mut mapping: IgMapping<f64, 2, 2> = IgMapping::identity(space);
    // Bilinear blend of the corners evaluated at the Greville points
    for p in mapping.control_points_mut() {
        let (u, v) = (p.x, p.y);
        *p = corners[0] * ((1.0 - u) * (1.0 - v))
            + corners[1] * (u * (1.0 - v))
            + corners[2] * ((1.0 - u) * v)
            + corners[3] * (u * v);
    }
    mapping
}

#[test]
fn element_mass_matrix_from_values() {
    // Two linear functions at the two-point Gauss rule on [0, 1]
    let (a, b) = (0.5 - 0.5 / 3f64.sqrt(), 0.5 + 0.5 / 3f64.sqrt());
    let mut values = ValueTable::new(2, 2, 0.0);
    *values.get_mut(0, 0) = 1.0 - a;
    *values.get_mut(0, 1) = 1.0 - b;
    *values.get_mut(1, 0) = a;
    *values.get_mut(1, 1) = b;

    let mut output = DMatrix::zeros(2, 2);
    assemble_element_mass_matrix(output.as_view_mut(), &values, &[0.5, 0.5], &[1.0, 1.0]).unwrap();
    let expected = DMatrix::from_row_slice(2, 2, &[1.0 / 3.0, 1.0 / 6.0, 1.0 / 6.0, 1.0 / 3.0]);
    assert_matrix_eq!(output, expected, comp = abs, tol = 1e-14);
}

#[test]
fn element_stiffness_matrix_from_gradients() {
    let mut gradients = ValueTable::new(2, 1, Vector1::zeros());
    *gradients.get_mut(0, 0) = Vector1::new(-2.0);
    *gradients.get_mut(1, 0) = Vector1::new(2.0);

    let mut output = DMatrix::zeros(2, 2);
    assemble_element_stiffness_matrix(output.as_view_mut(), &gradients, &[0.5], &[1.0]).unwrap();
    let expected = DMatrix::from_row_slice(2, 2, &[2.0, -2.0, -2.0, 2.0]);
    assert_matrix_eq!(output, expected, comp = abs, tol = 1e-14);
}

#[test]
fn global_mass_matrix_integrates_the_area() {
    let mapping = quadrilateral();
    let quadrature = TensorProductQuadrature::gauss(4, 2);
    let assembler = ElementMassAssembler::new(&mapping, &quadrature);
    let csr = CsrAssembler::<f64>::default();
    let mass = csr.assemble(&assembler).unwrap();

    assert_eq!(mass.pattern(), &csr.assemble_pattern(&assembler));
    assert_eq!(mass.nrows(), mapping.space().num_basis());
    let dense = DMatrix::from(&mass);
    assert_matrix_eq!(dense, dense.transpose(), comp = abs, tol = 1e-14);

    let ones = DVector::repeat(mass.nrows(), 1.0);
    assert_scalar_eq!(ones.dot(&(&dense * &ones)), 3.0, comp = abs, tol = 1e-12);
}

#[test]
fn global_stiffness_matrix_annihilates_constants() {
    let mapping = quadrilateral();
    let quadrature = TensorProductQuadrature::gauss(4, 2);
    let stiffness = CsrAssembler::<f64>::default()
        .assemble(&ElementStiffnessAssembler::new(&mapping, &quadrature))
        .unwrap();
    let dense = DMatrix::from(&stiffness);

    let ones = DVector::repeat(dense.nrows(), 1.0);
    assert!((&dense * &ones).amax() < 1e-12);

    // The coordinate function x has unit gradient, so its energy is the area
    let x = DVector::from_iterator(dense.nrows(), mapping.control_points().iter().map(|p| p.x));
    assert_scalar_eq!(x.dot(&(&dense * &x)), 3.0, comp = abs, tol = 1e-10);
}

#[test]
fn load_vector_integrates_the_source() {
    let mapping = quadrilateral();
    let quadrature = TensorProductQuadrature::gauss(4, 2);
    let vectors = VectorAssembler::<f64>::default();

    let constant = vectors
        .assemble_vector(&ElementSourceAssembler::new(&mapping, &quadrature, |_: &Point2<f64>| 2.0))
        .unwrap();
    assert_scalar_eq!(constant.sum(), 6.0, comp = abs, tol = 1e-12);

    // First moment of the quadrilateral, computed by splitting it into two triangles
    let linear = vectors
        .assemble_vector(&ElementSourceAssembler::new(&mapping, &quadrature, |x: &Point2<f64>| x.x))
        .unwrap();
    assert_scalar_eq!(linear.sum(), 2.0 * 2.0 / 3.0 + 1.0 * 4.0 / 3.0, comp = abs, tol = 1e-12);

    // Assembling into an existing vector accumulates
    let mut accumulated = constant.clone();
    vectors
        .assemble_vector_into(&mut accumulated, &ElementSourceAssembler::new(&mapping, &quadrature, |_: &Point2<f64>| 2.0))
        .unwrap();
    assert_matrix_eq!(accumulated, 2.0 * constant, comp = abs, tol = 1e-14);
}

#[test]
fn dirichlet_dofs_are_decoupled() {
    let space = BSplineSpace::<f64, 2>::new(Grid::uniform([2, 2]), [1, 1]);
    let mapping = IgMapping::<f64, 2, 2>::identity(space.clone());
    let quadrature = TensorProductQuadrature::gauss(2, 2);
    let mut stiffness = CsrAssembler::<f64>::default()
        .assemble(&ElementStiffnessAssembler::new(&mapping, &quadrature))
        .unwrap();
    let mut rhs = DVector::repeat(9, 1.0);

    let boundary = space.boundary_dofs();
    apply_homogeneous_dirichlet(&mut stiffness, &mut rhs, &boundary);

    let dense = DMatrix::from(&stiffness);
    let scale = dense[(0, 0)];
    assert!(scale > 0.0);
    for &i in &boundary {
        assert_eq!(rhs[i], 0.0);
        for j in 0..9 {
            let expected = if i == j { scale } else { 0.0 };
            assert_eq!(dense[(i, j)], expected);
            assert_eq!(dense[(j, i)], expected);
        }
    }
    assert_eq!(rhs[4], 1.0);
    assert!(dense[(4, 4)] > 0.0);
}

#[test]
fn linear_boundary_values_are_reproduced() {
    // The harmonic function u = 1 + x - 2y is in the bilinear space, so imposing its boundary
    // values recovers it exactly in the interior
    let space = BSplineSpace::<f64, 2>::new(Grid::uniform([3, 3]), [1, 1]);
    let mapping = IgMapping::<f64, 2, 2>::identity(space.clone());
    let quadrature = TensorProductQuadrature::gauss(2, 2);
    let mut stiffness = CsrAssembler::<f64>::default()
        .assemble(&ElementStiffnessAssembler::new(&mapping, &quadrature))
        .unwrap();
    let exact: Vec<f64> = mapping
        .control_points()
        .iter()
        .map(|p| 1.0 + p.x - 2.0 * p.y)
        .collect();
    let boundary = space.boundary_dofs();
    let values: Vec<f64> = boundary.iter().map(|&i| exact[i]).collect();
    let mut rhs = DVector::zeros(space.num_basis());
    apply_dirichlet_values(&mut stiffness, &mut rhs, &boundary, &values);

    let solution = CholeskySolver.solve(&stiffness, &rhs).unwrap();
    for (u, u_exact) in solution.iter().zip(&exact) {
        assert_scalar_eq!(*u, *u_exact, comp = abs, tol = 1e-12);
    }
}
