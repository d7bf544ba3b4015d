use crate::flags::BasisFlags;
use crate::Real;
use nalgebra::{DMatrix, SMatrix, SVector};
use std::fmt::Debug;

/// A quantity that basis functions provide at a point: a value, a gradient or a Hessian.
///
/// Field values are linear combinations of these, which only requires a zero element and
/// scaled accumulation.
pub trait BasisDerivative<T: Real>: Copy + Debug + PartialEq {
    fn zero() -> Self;

    fn add_scaled(&mut self, scale: T, other: &Self);
}

impl<T: Real> BasisDerivative<T> for T {
    fn zero() -> Self {
        T::zero()
    }

    fn add_scaled(&mut self, scale: T, other: &Self) {
        *self += scale * *other;
    }
}

impl<T: Real, const R: usize, const C: usize> BasisDerivative<T> for SMatrix<T, R, C> {
    fn zero() -> Self {
        SMatrix::zeros()
    }

    fn add_scaled(&mut self, scale: T, other: &Self) {
        *self += other * scale;
    }
}

/// Values of `num_functions` functions at `num_points` points, stored function-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable<V> {
    num_functions: usize,
    num_points: usize,
    data: Vec<V>,
}

impl<V> Default for ValueTable<V> {
    fn default() -> Self {
        Self {
            num_functions: 0,
            num_points: 0,
            data: Vec::new(),
        }
    }
}

impl<V: Clone> ValueTable<V> {
    pub fn new(num_functions: usize, num_points: usize, value: V) -> Self {
        Self {
            num_functions,
            num_points,
            data: vec![value; num_functions * num_points],
        }
    }

    /// Changes the shape, reusing the existing allocation where possible.
    pub fn resize(&mut self, num_functions: usize, num_points: usize, value: V) {
        self.num_functions = num_functions;
        self.num_points = num_points;
        self.data.clear();
        self.data.resize(num_functions * num_points, value);
    }
}

impl<V> ValueTable<V> {
    pub fn num_functions(&self) -> usize {
        self.num_functions
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, function: usize, point: usize) -> &V {
        &self.data[function * self.num_points + point]
    }

    pub fn get_mut(&mut self, function: usize, point: usize) -> &mut V {
        &mut self.data[function * self.num_points + point]
    }

    /// Values of one function at all points.
    pub fn function(&self, function: usize) -> &[V] {
        let start = function * self.num_points;
        &self.data[start..start + self.num_points]
    }

    /// `output[q] = sum_i coefficients[i] * table[i][q]`.
    ///
    /// # Panics
    ///
    /// Panics if the number of coefficients differs from the number of functions.
    pub fn linear_combination<T>(&self, coefficients: &[T]) -> Vec<V>
    where
        T: Real,
        V: BasisDerivative<T>,
    {
        let mut output = vec![V::zero(); self.num_points];
        self.linear_combination_into(coefficients, &mut output);
        output
    }

    pub fn linear_combination_into<T>(&self, coefficients: &[T], output: &mut [V])
    where
        T: Real,
        V: BasisDerivative<T>,
    {
        assert_eq!(coefficients.len(), self.num_functions, "one coefficient per function required");
        assert_eq!(output.len(), self.num_points, "one output entry per point required");
        output.fill(V::zero());
        for (i, &c) in coefficients.iter().enumerate() {
            for (out, v) in output.iter_mut().zip(self.function(i)) {
                out.add_scaled(c, v);
            }
        }
    }

    /// Linear combination with vector-valued coefficients.
    ///
    /// Returns, per point, one combined quantity per coefficient component. For values this is
    /// the point itself; for gradients, the rows of the Jacobian.
    pub fn vector_linear_combination<T, const S: usize>(&self, coefficients: &[SVector<T, S>]) -> Vec<[V; S]>
    where
        T: Real,
        V: BasisDerivative<T>,
    {
        assert_eq!(coefficients.len(), self.num_functions, "one coefficient per function required");
        let mut output = vec![[V::zero(); S]; self.num_points];
        for (i, c) in coefficients.iter().enumerate() {
            for (out, v) in output.iter_mut().zip(self.function(i)) {
                for s in 0..S {
                    out[s].add_scaled(c[s], v);
                }
            }
        }
        output
    }
}

/// Basis values, parametric gradients and parametric Hessians of the functions that are
/// non-zero on one element, at a set of points.
///
/// Tables that were not requested are left empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementBasisValues<T: Real, const D: usize> {
    pub values: ValueTable<T>,
    pub gradients: ValueTable<SVector<T, D>>,
    pub hessians: ValueTable<SMatrix<T, D, D>>,
}

impl<T: Real, const D: usize> Default for ElementBasisValues<T, D> {
    fn default() -> Self {
        Self {
            values: ValueTable::default(),
            gradients: ValueTable::default(),
            hessians: ValueTable::default(),
        }
    }
}

impl<T: Real, const D: usize> ElementBasisValues<T, D> {
    /// Shapes the tables requested by `flags` and empties the others.
    pub(crate) fn resize(&mut self, num_functions: usize, num_points: usize, flags: BasisFlags) {
        let rows = |flag| if flags.contains(flag) { num_functions } else { 0 };
        self.values
            .resize(rows(BasisFlags::VALUE), num_points, T::zero());
        self.gradients
            .resize(rows(BasisFlags::GRADIENT), num_points, SVector::zeros());
        self.hessians
            .resize(rows(BasisFlags::HESSIAN), num_points, SMatrix::zeros());
    }
}

/// Univariate basis tables of one element at the points of a tensor rule.
///
/// `tables[d][k]` is the `(degree_d + 1) x n_d` matrix of `k`-th parametric derivatives of
/// the univariate functions in direction `d`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnivariateValues<T: Real> {
    pub tables: Vec<Vec<DMatrix<T>>>,
}

impl<T: Real> Default for UnivariateValues<T> {
    fn default() -> Self {
        Self { tables: Vec::new() }
    }
}

impl<T: Real> UnivariateValues<T> {
    pub fn table(&self, direction: usize, derivative: usize) -> &DMatrix<T> {
        &self.tables[direction][derivative]
    }
}
