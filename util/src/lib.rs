/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

/// A deterministic set of sample points in the open unit cube `(0, 1)^D`.
///
/// The points are the midpoints of a uniform `n^D` lattice, enumerated with direction 0 fastest.
/// Useful for comparing evaluations before and after an operation that should not change them.
pub fn unit_lattice_midpoints<const D: usize>(n: usize) -> Vec<[f64; D]> {
    let total = n.pow(D as u32);
    (0..total)
        .map(|flat| {
            let mut remainder = flat;
            let mut point = [0.0; D];
            for coord in point.iter_mut() {
                *coord = ((remainder % n) as f64 + 0.5) / n as f64;
                remainder /= n;
            }
            point
        })
        .collect()
}
