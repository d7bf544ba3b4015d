//! Knot insertion (Boehm's algorithm) for control nets of tensor-product splines.
//!
//! Inserting knots does not change the represented function; it only enlarges the knot
//! vector and recomputes the control values. Rational splines are refined in projective
//! (homogeneous) coordinates, see [`Projective`].
use crate::basis::{BSplineSpace, KnotVector, ReferenceSpace};
use crate::grid::GridRefinement;
use crate::multi_array::MultiArray;
use crate::Real;
use log::debug;
use std::ops::{Add, Mul};

/// Anything that can be blended by knot insertion: scalars, control points, projective pairs.
pub trait ControlValue<T>: Clone + Add<Output = Self> + Mul<T, Output = Self> {}

impl<T, V> ControlValue<T> for V where V: Clone + Add<Output = V> + Mul<T, Output = V> {}

/// A control value together with its weight, stored as `(w * point, w)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projective<V, T> {
    pub point: V,
    pub weight: T,
}

impl<V, T> Projective<V, T>
where
    T: Real,
    V: Mul<T, Output = V>,
{
    /// Lifts a Euclidean value with the given weight.
    pub fn from_euclidean(value: V, weight: T) -> Self {
        Self {
            point: value * weight,
            weight,
        }
    }

    /// Projects back, dividing by the weight.
    pub fn into_euclidean(self) -> V {
        let inverse = T::one() / self.weight;
        self.point * inverse
    }
}

impl<V: Add<Output = V>, T: Real> Add for Projective<V, T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            point: self.point + rhs.point,
            weight: self.weight + rhs.weight,
        }
    }
}

impl<V: Mul<T, Output = V>, T: Real> Mul<T> for Projective<V, T> {
    type Output = Self;

    fn mul(self, rhs: T) -> Self {
        Self {
            point: self.point * rhs,
            weight: self.weight * rhs,
        }
    }
}

/// Inserts `new_knots` (sorted, each inside the domain) into a univariate spline.
///
/// Returns the refined knot vector and the `control.len() + new_knots.len()` new control values.
///
/// # Panics
///
/// Panics if the number of control values does not match the knot vector.
pub fn insert_knots_1d<T, V>(knot_vector: &KnotVector<T>, control: &[V], new_knots: &[T]) -> (KnotVector<T>, Vec<V>)
where
    T: Real,
    V: ControlValue<T>,
{
    assert_eq!(
        control.len(),
        knot_vector.num_basis(),
        "one control value per basis function required"
    );
    if new_knots.is_empty() {
        return (knot_vector.clone(), control.to_vec());
    }

    let p = knot_vector.degree();
    let u = knot_vector.knots();
    let x = new_knots;
    let n = knot_vector.num_basis() - 1;
    let m = n + p + 1;
    let r = x.len() - 1;
    let a = knot_vector.find_span(x[0]);
    let b = knot_vector.find_span(x[r]) + 1;

    let mut ubar = vec![T::zero(); m + r + 2];
    let mut q = vec![control[0].clone(); n + r + 2];
    for j in 0..=a - p {
        q[j] = control[j].clone();
    }
    for j in b - 1..=n {
        q[j + r + 1] = control[j].clone();
    }
    ubar[..=a].copy_from_slice(&u[..=a]);
    for j in b + p..=m {
        ubar[j + r + 1] = u[j];
    }

    let mut i = b + p - 1;
    let mut k = b + p + r;
    for j in (0..=r).rev() {
        while x[j] <= u[i] && i > a {
            q[k - p - 1] = control[i - p - 1].clone();
            ubar[k] = u[i];
            k -= 1;
            i -= 1;
        }
        q[k - p - 1] = q[k - p].clone();
        for l in 1..=p {
            let index = k - p + l;
            let alpha = ubar[k + l] - x[j];
            if alpha == T::zero() {
                q[index - 1] = q[index].clone();
            } else {
                let alpha = alpha / (ubar[k + l] - u[i + l - p]);
                q[index - 1] = q[index - 1].clone() * alpha + q[index].clone() * (T::one() - alpha);
            }
        }
        ubar[k] = x[j];
        k = k.saturating_sub(1);
    }

    let refined = KnotVector::new(ubar, p).expect("knot insertion preserves a valid knot vector");
    (refined, q)
}

/// Inserts `new_knots` into a periodic spline of maximal smoothness over `breakpoints`, with
/// one control value per interval.
///
/// New knots must lie strictly inside the domain and differ from the breakpoints. Returns the
/// refined breakpoints and control values.
///
/// # Panics
///
/// Panics if the number of control values does not match the number of intervals.
pub fn insert_periodic_knots_1d<T, V>(breakpoints: &[T], degree: usize, control: &[V], new_knots: &[T]) -> (Vec<T>, Vec<V>)
where
    T: Real,
    V: ControlValue<T>,
{
    let mut breakpoints = breakpoints.to_vec();
    let mut control = control.to_vec();
    let p = degree as isize;
    for &x in new_knots {
        let n = breakpoints.len() - 1;
        assert_eq!(control.len(), n, "one control value per interval required");
        let length = breakpoints[n] - breakpoints[0];
        let n_signed = n as isize;
        // Knot t(i) of the periodically continued sequence with t(0) the first breakpoint,
        // and the control value of the function supported from t(i)
        let knot = |i: isize| {
            let shift = T::from_f64_lossy(i.div_euclid(n_signed) as f64) * length;
            breakpoints[i.rem_euclid(n_signed) as usize] + shift
        };
        let value = |i: isize| control[(i + p).rem_euclid(n_signed) as usize].clone();

        let k = breakpoints.partition_point(|&b| b <= x) as isize - 1;
        let mut refined = vec![control[0].clone(); n + 1];
        for i in k - n_signed + 1..=k + 1 {
            let q = if i <= k - p {
                value(i)
            } else if i > k {
                value(i - 1)
            } else {
                let alpha = (x - knot(i)) / (knot(i + p) - knot(i));
                value(i) * alpha + value(i - 1) * (T::one() - alpha)
            };
            refined[(i + p).rem_euclid(n_signed + 1) as usize] = q;
        }
        breakpoints.insert((k + 1) as usize, x);
        control = refined;
    }
    (breakpoints, control)
}

/// Replaces every line of `net` along `direction` by `refine_line(line)`, which must return
/// `new_len` values.
fn refine_lines<V: Clone>(
    net: &MultiArray<V>,
    direction: usize,
    new_len: usize,
    mut refine_line: impl FnMut(&[V]) -> Vec<V>,
) -> MultiArray<V> {
    let mut sizes = net.sizes().to_vec();
    sizes[direction] = new_len;
    let mut data: Vec<Option<V>> = vec![None; sizes.iter().product()];
    let weights = crate::tensor_index::compute_weight_dyn(&sizes);
    let mut index = vec![0; net.rank()];

    for start in net.line_starts(direction) {
        let refined_line = refine_line(&net.line(direction, start));
        assert_eq!(refined_line.len(), new_len, "refined line has the wrong length");
        net.tensor_index_into(start, &mut index);
        let new_start = crate::tensor_index::tensor_to_flat_dyn(&index, &weights);
        for (l, value) in refined_line.into_iter().enumerate() {
            data[new_start + l * weights[direction]] = Some(value);
        }
    }

    let data = data
        .into_iter()
        .map(|value| value.expect("every entry lies on exactly one line"))
        .collect();
    MultiArray::from_vec(&sizes, data)
}

/// Applies univariate knot insertion to every line of a control net along `direction`.
pub fn insert_knots_in_direction<T, V>(
    knot_vector: &KnotVector<T>,
    net: &MultiArray<V>,
    direction: usize,
    new_knots: &[T],
) -> (KnotVector<T>, MultiArray<V>)
where
    T: Real,
    V: ControlValue<T>,
{
    if new_knots.is_empty() {
        return (knot_vector.clone(), net.clone());
    }
    let mut refined_knots = knot_vector.clone();
    let new_len = net.sizes()[direction] + new_knots.len();
    let refined = refine_lines(net, direction, new_len, |line| {
        let (kv, refined_line) = insert_knots_1d(knot_vector, line, new_knots);
        refined_knots = kv;
        refined_line
    });
    (refined_knots, refined)
}

/// Refines a tensor-product control net of `space` by inserting `new_knots[d]` in every
/// direction `d`, periodic directions included.
///
/// The net is laid out with direction 0 fastest and must have one entry per basis function.
pub fn refine_control_net<T, V, const D: usize>(
    space: &BSplineSpace<T, D>,
    net: &MultiArray<V>,
    new_knots: &[Vec<T>; D],
) -> MultiArray<V>
where
    T: Real,
    V: ControlValue<T>,
{
    assert_eq!(net.rank(), D, "control net rank must match the dimension");
    let mut refined_net = net.clone();
    for d in 0..D {
        if new_knots[d].is_empty() {
            continue;
        }
        refined_net = if space.is_periodic(d) {
            let breakpoints = space.grid().knot_coordinates(d);
            let new_len = refined_net.sizes()[d] + new_knots[d].len();
            refine_lines(&refined_net, d, new_len, |line| {
                insert_periodic_knots_1d(breakpoints, space.degrees()[d], line, &new_knots[d]).1
            })
        } else {
            insert_knots_in_direction(space.knot_vector(d), &refined_net, d, &new_knots[d]).1
        };
    }
    debug!(
        "Refined control net: {:?} -> {:?} control values per direction",
        net.sizes(),
        refined_net.sizes()
    );
    refined_net
}

/// Coefficients of the same field after the space has followed `refinement`.
///
/// Must be called before the space itself is refined. For rational spaces the coefficients are
/// lifted to projective coordinates with the current weights, refined, and projected back.
pub fn refine_coefficients<T, V, const D: usize>(
    space: &ReferenceSpace<T, D>,
    coefficients: &[V],
    refinement: &GridRefinement<T, D>,
) -> Vec<V>
where
    T: Real,
    V: ControlValue<T>,
{
    let bspline = space.bspline();
    let insertions = bspline.knot_insertions(refinement);
    let size = bspline.num_basis_per_direction();
    match space.weights() {
        None => {
            let net = MultiArray::from_vec(size.extents(), coefficients.to_vec());
            refine_control_net(bspline, &net, &insertions).into_vec()
        }
        Some(weights) => {
            let lifted = coefficients
                .iter()
                .zip(weights)
                .map(|(c, &w)| Projective::from_euclidean(c.clone(), w))
                .collect();
            let net = MultiArray::from_vec(size.extents(), lifted);
            refine_control_net(bspline, &net, &insertions)
                .into_vec()
                .into_iter()
                .map(Projective::into_euclidean)
                .collect()
        }
    }
}
