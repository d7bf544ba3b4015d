use igafem::assembly::global::CsrAssembler;
use igafem::assembly::local::{Density, ElementConnectivityAssembler, ElementMassAssembler, ElementMatrixAssembler};
use igafem::basis::{BSplineSpace, NurbsSpace, ReferenceSpace};
use igafem::geometry::IgMapping;
use igafem::grid::Grid;
use igafem::quadrature::TensorProductQuadrature;
use igafem::sum_factorization::{BernsteinProjection, SumFactorizationMassAssembler};
use igafem::Error;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, Matrix2, Matrix3, Vector2, Vector3};

fn element_matrices(assembler: &dyn ElementMatrixAssembler<f64>) -> Vec<DMatrix<f64>> {
    (0..assembler.num_elements())
        .map(|e| {
            let n = assembler.element_dof_count(e);
            let mut matrix = DMatrix::zeros(n, n);
            assembler
                .assemble_element_matrix_into(e, matrix.as_view_mut())
                .unwrap();
            matrix
        })
        .collect()
}

fn assert_same_element_matrices(expected: &dyn ElementMatrixAssembler<f64>, actual: &dyn ElementMatrixAssembler<f64>) {
    let expected = element_matrices(expected);
    let actual = element_matrices(actual);
    assert_eq!(expected.len(), actual.len());
    for (m_direct, m_factorized) in expected.iter().zip(&actual) {
        assert_matrix_eq!(*m_factorized, *m_direct, comp = abs, tol = 1e-10);
    }
}

fn affine_mapping_2d() -> IgMapping<f64, 2, 2> {
    // Six elements, no two of the same size
    let grid = Grid::from_knot_coordinates([vec![0.0, 0.2, 0.55, 1.0], vec![0.0, 0.35, 1.0]]).unwrap();
    let space = BSplineSpace::new(grid, [2, 2]);
    let mut mapping = IgMapping::identity(space);
    let a = Matrix2::new(1.5, 0.3, -0.2, 0.8);
    for p in mapping.control_points_mut() {
        *p = a * *p + Vector2::new(0.5, 1.0);
    }
    mapping
}

fn curved_mapping_2d() -> IgMapping<f64, 2, 2> {
    let space = BSplineSpace::new(
        Grid::from_knot_coordinates([vec![0.0, 0.4, 1.0], vec![0.0, 0.5, 1.0]]).unwrap(),
        [2, 2],
    );
    let mut mapping = IgMapping::identity(space);
    for (k, p) in mapping.control_points_mut().iter_mut().enumerate() {
        let k = k as f64;
        *p += 0.03 * Vector2::new((3.0 * k).cos(), (5.0 * k).sin());
    }
    mapping
}

#[test]
fn bernstein_mass_matrix_is_the_kronecker_product() {
    let projection = BernsteinProjection::<f64>::new(1, 2).unwrap();
    let m1 = projection.mass_matrix_1d().clone();
    let expected = DMatrix::from_row_slice(2, 2, &[1.0 / 3.0, 1.0 / 6.0, 1.0 / 6.0, 1.0 / 3.0]);
    assert_matrix_eq!(m1, expected, comp = abs, tol = 1e-14);
    assert_matrix_eq!(*projection.mass_matrix(), m1.kronecker(&m1), comp = abs, tol = 1e-14);
    assert_eq!(projection.num_functions(), 4);
}

#[test]
fn affine_mapping_matches_direct_assembly() {
    let mapping = affine_mapping_2d();
    let direct = ElementMassAssembler::new(&mapping, &TensorProductQuadrature::gauss(4, 2));
    let factorized = SumFactorizationMassAssembler::new(&mapping).unwrap();
    assert_eq!(factorized.projection().degree(), 2);
    assert_eq!(factorized.num_elements(), 6);
    assert_same_element_matrices(&direct, &factorized);

    // Element areas scale with the element sizes
    let areas: Vec<f64> = element_matrices(&factorized).iter().map(|m| m.sum()).collect();
    let det = Matrix2::new(1.5, 0.3, -0.2, 0.8).determinant();
    let sizes = [(0.2, 0.35), (0.35, 0.35), (0.45, 0.35), (0.2, 0.65), (0.35, 0.65), (0.45, 0.65)];
    for (area, (hx, hy)) in areas.iter().zip(sizes) {
        assert_scalar_eq!(*area, det * hx * hy, comp = abs, tol = 1e-12);
    }
}

#[test]
fn curved_mapping_matches_direct_assembly() {
    // The Jacobian determinant of a biquadratic map is at most cubic in each direction
    let mapping = curved_mapping_2d();
    let direct = ElementMassAssembler::new(&mapping, &TensorProductQuadrature::gauss(5, 2));
    let factorized = SumFactorizationMassAssembler::with_projection_degree(&mapping, 3).unwrap();
    assert_same_element_matrices(&direct, &factorized);
}

#[test]
fn variable_coefficient_matches_direct_assembly() {
    let mapping = affine_mapping_2d();
    let direct = ElementMassAssembler::new(&mapping, &TensorProductQuadrature::gauss(4, 2))
        .with_density(|x| Density(1.0 + x.x - 0.5 * x.y));
    let factorized = SumFactorizationMassAssembler::new(&mapping)
        .unwrap()
        .with_coefficient(|x| 1.0 + x.x - 0.5 * x.y);
    assert_same_element_matrices(&direct, &factorized);
}

#[test]
fn three_dimensional_mapping_matches_direct_assembly() {
    let space = BSplineSpace::new(Grid::uniform([2, 1, 2]), [1, 2, 2]);
    let mut mapping = IgMapping::<f64, 3, 3>::identity(space);
    let a = Matrix3::new(1.0, 0.2, 0.0, 0.0, 2.0, 0.1, 0.3, 0.0, 0.5);
    for p in mapping.control_points_mut() {
        *p = a * *p + Vector3::new(0.0, 1.0, -1.0);
    }
    let direct = ElementMassAssembler::new(&mapping, &TensorProductQuadrature::gauss(4, 3))
        .with_uniform_density(Density(2.5));
    let factorized = SumFactorizationMassAssembler::new(&mapping)
        .unwrap()
        .with_coefficient(|_| 2.5);
    assert_same_element_matrices(&direct, &factorized);
}

#[test]
fn global_matrix_integrates_the_area() {
    let mapping = curved_mapping_2d();
    let factorized = SumFactorizationMassAssembler::with_projection_degree(&mapping, 3).unwrap();
    let direct = ElementMassAssembler::new(&mapping, &TensorProductQuadrature::gauss(5, 2));
    let assembler = CsrAssembler::<f64>::default();
    let m_factorized = assembler.assemble(&factorized).unwrap();
    let m_direct = assembler.assemble(&direct).unwrap();

    assert_eq!(m_factorized.pattern(), m_direct.pattern());
    // Partition of unity: the sum of all entries is the area of the domain
    let total: f64 = m_factorized.values().iter().sum();
    let expected: f64 = m_direct.values().iter().sum();
    assert_scalar_eq!(total, expected, comp = abs, tol = 1e-12);
    assert_matrix_eq!(DMatrix::from(&m_factorized), DMatrix::from(&m_direct), comp = abs, tol = 1e-10);
}

#[test]
fn rational_spaces_are_not_supported() {
    let bspline = BSplineSpace::<f64, 2>::new(Grid::uniform([2, 2]), [2, 2]);
    let n = bspline.num_basis();
    let space = ReferenceSpace::from(NurbsSpace::new(bspline, vec![1.0; n]).unwrap());
    let mapping = IgMapping::<f64, 2, 2>::identity(space);
    assert!(matches!(
        SumFactorizationMassAssembler::new(&mapping),
        Err(Error::NotImplemented(_))
    ));
}
