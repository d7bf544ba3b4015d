use igafem_quadrature::integrate;
use igafem_quadrature::univariate::{gauss, gauss_unit, try_gauss};
use igafem_quadrature::Error;

use matrixcompare::assert_scalar_eq;

#[test]
fn gauss_rules_satisfy_expected_accuracy() {
    for n in 1..=60 {
        let expected_polynomial_degree = 2 * n - 1;
        let rule = gauss(n);

        assert!(rule.0.iter().all(|&w| w > 0.0));
        assert!(rule.1.windows(2).all(|pair| pair[0][0] < pair[1][0]));

        for alpha in 0..=expected_polynomial_degree as i32 {
            let monomial_integral = (1.0 - (-1.0f64).powi(alpha + 1)) / (alpha as f64 + 1.0);
            let estimated_integral = integrate(&rule, |x| x[0].powi(alpha));
            assert_scalar_eq!(estimated_integral, monomial_integral, comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn unit_gauss_rules_integrate_on_unit_interval() {
    for n in 1..=12 {
        let rule = gauss_unit(n);
        assert!(rule.1.iter().all(|&[x]| x > 0.0 && x < 1.0));
        for alpha in 0..=(2 * n - 1) as i32 {
            let estimated_integral = integrate(&rule, |x| x[0].powi(alpha));
            assert_scalar_eq!(estimated_integral, 1.0 / (alpha as f64 + 1.0), comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn zero_point_rule_is_an_error() {
    assert_eq!(try_gauss(0), Err(Error::ZeroPoints));
}
