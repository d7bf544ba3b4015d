//! Sum-factorized assembly of weighted element mass matrices.
//!
//! On an element $K$ with tensor-product basis functions $\phi_\alpha = \prod_d \phi^d_{\alpha_d}$,
//! the weighted mass matrix
//!
//! $$
//! M_{\alpha\beta} = \int_K g \, \phi_\alpha \phi_\beta \, \mathrm{d}u
//! $$
//!
//! is computed by first projecting the weight $g$ (the coefficient times the geometric measure)
//! onto a tensor-product Bernstein basis $B_\theta$ of degree $q$ on the element,
//! $g \approx \sum_\theta K_\theta B_\theta$, which gives
//!
//! $$
//! M_{\alpha\beta} = \sum_\theta K_\theta \prod_d I_d(\theta_d, \alpha_d, \beta_d), \qquad
//! I_d(\lambda, \mu_1, \mu_2) = \int B^q_\lambda \, \phi^d_{\mu_1} \phi^d_{\mu_2}.
//! $$
//!
//! The product is evaluated as a chain of one-dimensional contractions, one direction at a time,
//! instead of a loop over all quadrature points of the element.
use crate::assembly::local::{ElementConnectivityAssembler, ElementMatrixAssembler};
use crate::basis::{bernstein, UnivariateValues};
use crate::flags::{BasisFlags, MappingFlags};
use crate::geometry::{IgMapping, MappingElement, MappingElementHandler};
use crate::grid::ACTIVE;
use crate::multi_array::MultiArray;
use crate::quadrature::TensorProductQuadrature;
use crate::tensor_index::{compute_weight_dyn, flat_to_tensor_dyn_into, tensor_to_flat_dyn};
use crate::util::jacobian_measure;
use crate::{Error, Real, Result};
use log::debug;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, Point};
use std::array;
use std::cell::RefCell;

/// Bernstein mass matrices and projection quadrature for a fixed degree and dimension.
///
/// Immutable after construction and shared by all elements.
#[derive(Debug, Clone, PartialEq)]
pub struct BernsteinProjection<T: Real> {
    degree: usize,
    dim: usize,
    quadrature: TensorProductQuadrature<T>,
    mass_1d: DMatrix<T>,
    mass: DMatrix<T>,
    inverse_mass: DMatrix<T>,
    // Bernstein values at the projection points, (degree + 1) x (degree + 1)
    values_1d: DMatrix<T>,
}

impl<T: Real> BernsteinProjection<T> {
    /// Fails with [`Error::SingularMatrix`] if the Bernstein mass matrix cannot be inverted.
    pub fn new(degree: usize, dim: usize) -> Result<Self> {
        assert!(dim >= 1, "projection needs at least one direction");
        let mass_1d = bernstein::mass_matrix_1d::<T>(degree);
        let inverse_1d = mass_1d
            .clone()
            .try_inverse()
            .ok_or(Error::SingularMatrix("Bernstein mass matrix"))?;
        let mut mass = mass_1d.clone();
        let mut inverse_mass = inverse_1d.clone();
        for _ in 1..dim {
            mass = mass_1d.kronecker(&mass);
            inverse_mass = inverse_1d.kronecker(&inverse_mass);
        }
        let quadrature = TensorProductQuadrature::gauss(degree + 1, dim);
        let values_1d = bernstein::evaluate(degree, quadrature.points_direction(0));
        debug!(
            "Bernstein projection: degree {degree}, dim {dim}, {} functions",
            inverse_mass.nrows()
        );
        Ok(Self {
            degree,
            dim,
            quadrature,
            mass_1d,
            mass,
            inverse_mass,
            values_1d,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_functions_1d(&self) -> usize {
        self.degree + 1
    }

    pub fn num_functions(&self) -> usize {
        self.num_functions_1d().pow(self.dim as u32)
    }

    /// The rule on `[0, 1]^dim` at whose points the projected function is sampled.
    pub fn quadrature(&self) -> &TensorProductQuadrature<T> {
        &self.quadrature
    }

    pub fn mass_matrix_1d(&self) -> &DMatrix<T> {
        &self.mass_1d
    }

    /// Mass matrix of the tensor-product Bernstein basis on the unit cube.
    pub fn mass_matrix(&self) -> &DMatrix<T> {
        &self.mass
    }

    pub fn inverse_mass_matrix(&self) -> &DMatrix<T> {
        &self.inverse_mass
    }

    /// Weighted Bernstein values `w_q B_theta(x_q) h` of one direction of an element with side
    /// length `length`.
    pub fn weighted_values_1d(&self, length: T) -> DMatrix<T> {
        let weights = self.quadrature.weights_direction(0);
        DMatrix::from_fn(self.values_1d.nrows(), self.values_1d.ncols(), |theta, q| {
            weights[q] * self.values_1d[(theta, q)] * length
        })
    }

    /// Projects a function, sampled at the projection points of an element with the given
    /// side lengths, onto the Bernstein basis of the element.
    ///
    /// `values` is laid out on the tensor grid of projection points with direction 0 fastest.
    /// The returned coefficients are indexed by Bernstein tensor index.
    pub fn project(&self, values: &MultiArray<T>, lengths: &[T]) -> Result<MultiArray<T>> {
        let n = self.num_functions_1d();
        if values.sizes() != vec![n; self.dim].as_slice() {
            return Err(Error::DimensionMismatch {
                what: "projection samples",
                expected: self.num_functions(),
                actual: values.flat_size(),
            });
        }
        if lengths.len() != self.dim {
            return Err(Error::DimensionMismatch {
                what: "element side lengths",
                expected: self.dim,
                actual: lengths.len(),
            });
        }
        let weighted: Vec<DMatrix<T>> = lengths
            .iter()
            .map(|&h| self.weighted_values_1d(h))
            .collect();
        let sizes = vec![n; self.dim];
        let weights = compute_weight_dyn(&sizes);
        let mut index = vec![0; self.dim];
        let rhs = DVector::from_fn(self.num_functions(), |theta, _| {
            flat_to_tensor_dyn_into(theta, &weights, &mut index);
            integrate_rhs(values, &weighted, &index)
        });
        let measure = lengths.iter().fold(T::one(), |acc, &h| acc * h);
        let coefficients = &self.inverse_mass * rhs / measure;
        Ok(MultiArray::from_vec(&sizes, coefficients.as_slice().to_vec()))
    }
}

/// Integrates `gamma` against the tensor-product Bernstein function with the given index.
///
/// `weighted_bernstein[d]` holds the quadrature-weighted Bernstein values of direction `d`
/// (functions by points). The tensor is reduced one axis at a time, starting from the last.
pub fn integrate_rhs<T: Real>(gamma: &MultiArray<T>, weighted_bernstein: &[DMatrix<T>], bernstein_index: &[usize]) -> T {
    let rank = gamma.rank();
    assert_eq!(weighted_bernstein.len(), rank, "one weighted table per direction required");
    assert_eq!(bernstein_index.len(), rank, "Bernstein index rank must match");
    let mut current = gamma.data().to_vec();
    for d in (0..rank).rev() {
        let n = gamma.sizes()[d];
        let prefix = current.len() / n;
        let row = weighted_bernstein[d].row(bernstein_index[d]);
        current = (0..prefix)
            .map(|i| (0..n).fold(T::zero(), |acc, q| acc + current[i + prefix * q] * row[q]))
            .collect();
    }
    current[0]
}

/// The tensors `I[d](lambda, mu_1, mu_2) = sum_q w_q B_lambda(x_q) h_d phi_mu1(x_q) phi_mu2(x_q)`.
///
/// `phi_1d[d]` holds the univariate values of the element functions of direction `d` at the
/// points of `quadrature`, which must integrate polynomials of degree
/// `bernstein_degree + 2 p_d` exactly.
pub fn compute_i_tensors<T: Real>(
    phi_1d: &[DMatrix<T>],
    quadrature: &TensorProductQuadrature<T>,
    bernstein_degree: usize,
    lengths: &[T],
) -> Vec<MultiArray<T>> {
    let n_theta = bernstein_degree + 1;
    phi_1d
        .iter()
        .enumerate()
        .map(|(d, phi)| {
            let points = quadrature.points_direction(d);
            let weights = quadrature.weights_direction(d);
            let b = bernstein::evaluate::<T>(bernstein_degree, points);
            let n_mu = phi.nrows();
            let mut i_tensor = MultiArray::from_elem(&[n_theta, n_mu, n_mu], T::zero());
            let mut flat = 0;
            for mu2 in 0..n_mu {
                for mu1 in 0..n_mu {
                    for lambda in 0..n_theta {
                        i_tensor[flat] = (0..points.len()).fold(T::zero(), |acc, q| {
                            acc + weights[q] * b[(lambda, q)] * lengths[d] * phi[(mu1, q)] * phi[(mu2, q)]
                        });
                        flat += 1;
                    }
                }
            }
            i_tensor
        })
        .collect()
}

/// Contracts the projected coefficients `k` with the tensors `I` into the element mass matrix.
///
/// The contraction runs over directions `0, 1, ...` in turn. After `d` steps the intermediate
/// tensor is indexed by the remaining Bernstein indices followed by the pairs
/// `(alpha_0, beta_0), ..., (alpha_{d-1}, beta_{d-1})`. Only the upper triangle is computed in
/// the last step and then mirrored.
pub fn sum_factorization_mass_matrix<T: Real>(
    k: &MultiArray<T>,
    i_tensors: &[MultiArray<T>],
    num_basis_per_direction: &[usize],
) -> DMatrix<T> {
    let dim = k.rank();
    assert!(dim >= 1, "coefficients need at least one direction");
    assert_eq!(i_tensors.len(), dim, "one I tensor per direction required");
    assert_eq!(num_basis_per_direction.len(), dim);
    let n_theta = k.sizes()[0];

    let mut current = k.data().to_vec();
    for (d, i_tensor) in i_tensors.iter().enumerate().take(dim - 1) {
        let n = num_basis_per_direction[d];
        let rest = current.len() / n_theta;
        let mut next = vec![T::zero(); rest * n * n];
        for ab in 0..n * n {
            for r in 0..rest {
                next[r + rest * ab] = (0..n_theta).fold(T::zero(), |acc, theta| {
                    acc + current[theta + n_theta * r] * i_tensor[theta + n_theta * ab]
                });
            }
        }
        current = next;
    }

    // Final step: only pairs with alpha <= beta
    let last = dim - 1;
    let n_last = num_basis_per_direction[last];
    let i_last = &i_tensors[last];
    let weights = compute_weight_dyn(num_basis_per_direction);
    let pair_sizes: Vec<usize> = num_basis_per_direction[..last]
        .iter()
        .flat_map(|&n| [n, n])
        .collect();
    let pair_weights = compute_weight_dyn(&pair_sizes);
    let num_basis: usize = num_basis_per_direction.iter().product();
    let mut alpha = vec![0; dim];
    let mut beta = vec![0; dim];
    let mut pair = vec![0; 2 * last];
    let mut output = DMatrix::zeros(num_basis, num_basis);
    for a in 0..num_basis {
        flat_to_tensor_dyn_into(a, &weights, &mut alpha);
        for b in a..num_basis {
            flat_to_tensor_dyn_into(b, &weights, &mut beta);
            for e in 0..last {
                pair[2 * e] = alpha[e];
                pair[2 * e + 1] = beta[e];
            }
            let r = tensor_to_flat_dyn(&pair, &pair_weights);
            let ab = alpha[last] + n_last * beta[last];
            let value = (0..n_theta).fold(T::zero(), |acc, theta| {
                acc + current[theta + n_theta * r] * i_last[theta + n_theta * ab]
            });
            output[(a, b)] = value;
            output[(b, a)] = value;
        }
    }
    output
}

/// Number of Gauss points per direction that integrates `B^q phi^p phi^p` exactly.
pub fn num_quadrature_points(space_degree: usize, bernstein_degree: usize) -> usize {
    space_degree + (bernstein_degree + 2) / 2
}

/// Element mass matrices `int f phi_i phi_j dx` over a mapped B-spline patch, computed by sum
/// factorization.
///
/// The integrand weight `g = (f o F) |det DF|` is projected onto Bernstein polynomials of the
/// configured degree on each element; the result is exact when `g` is such a polynomial.
pub struct SumFactorizationMassAssembler<'a, T: Real, const D: usize, const S: usize> {
    mapping: &'a IgMapping<T, D, S>,
    projection: BernsteinProjection<T>,
    quadrature: TensorProductQuadrature<T>,
    handler: MappingElementHandler<'a, T, D, S>,
    element: RefCell<MappingElement<'a, T, D, S>>,
    coefficient: Box<dyn Fn(&Point<T, S>) -> T + 'a>,
}

impl<'a, T: Real, const D: usize, const S: usize> SumFactorizationMassAssembler<'a, T, D, S> {
    /// Assembler with unit coefficient and the Bernstein degree equal to the largest space degree.
    ///
    /// Fails with [`Error::NotImplemented`] for rational spaces.
    pub fn new(mapping: &'a IgMapping<T, D, S>) -> Result<Self> {
        let degree = mapping
            .space()
            .bspline()
            .degrees()
            .iter()
            .copied()
            .max()
            .unwrap_or(0);
        Self::with_projection_degree(mapping, degree)
    }

    pub fn with_projection_degree(mapping: &'a IgMapping<T, D, S>, degree: usize) -> Result<Self> {
        if mapping.space().has_weights() {
            return Err(Error::NotImplemented("sum factorization for rational spaces"));
        }
        let projection = BernsteinProjection::new(degree, D)?;
        let degrees = mapping.space().bspline().degrees();
        let sizes: Vec<usize> = (0..D)
            .map(|d| num_quadrature_points(degrees[d], degree))
            .collect();
        let quadrature = TensorProductQuadrature::gauss_with_sizes(&sizes);
        let mut handler = MappingElementHandler::new(mapping);
        handler.reset_with_basis(MappingFlags::NONE, BasisFlags::UNIVARIATE, D, &quadrature);
        let mut element = mapping.begin(ACTIVE);
        handler.init_element_cache(&mut element);
        Ok(Self {
            mapping,
            projection,
            quadrature,
            handler,
            element: RefCell::new(element),
            coefficient: Box::new(|_| T::one()),
        })
    }

    pub fn with_coefficient(self, coefficient: impl Fn(&Point<T, S>) -> T + 'a) -> Self {
        Self {
            coefficient: Box::new(coefficient),
            ..self
        }
    }

    pub fn projection(&self) -> &BernsteinProjection<T> {
        &self.projection
    }

    /// Samples `(f o F) |det DF|` at the projection points of the current element.
    fn sample_weight(&self, element_index: [usize; D]) -> Result<MultiArray<T>> {
        let grid = self.mapping.space().grid();
        let rule = self.projection.quadrature();
        let points: Vec<Point<T, D>> = rule
            .flat_points()
            .iter()
            .map(|xi| {
                Point::from(array::from_fn(|d| {
                    let breaks = grid.knot_coordinates(d);
                    let (a, b) = (breaks[element_index[d]], breaks[element_index[d] + 1]);
                    a + xi[d] * (b - a)
                }))
            })
            .collect();
        let images = self.mapping.evaluate_at_points(&points)?;
        let jacobians = self.mapping.jacobians_at_points(&points)?;
        let values = images
            .iter()
            .zip(&jacobians)
            .map(|(x, j)| (self.coefficient)(x) * jacobian_measure(j))
            .collect();
        Ok(MultiArray::from_vec(&rule.num_points_per_direction(), values))
    }

    /// The element mass matrix of the element with the given flat index.
    pub fn element_mass_matrix(&self, flat_index: usize) -> Result<DMatrix<T>> {
        let mut element = self.element.borrow_mut();
        element.move_to(flat_index);
        self.handler.fill_element_cache(&mut element)?;
        let tensor_index = *element.space_element().tensor_index();
        let lengths = element.space_element().grid_element().side_lengths();
        let univariate: &UnivariateValues<T> = element.space_element().element_univariate();

        let samples = self.sample_weight(tensor_index)?;
        let k = self.projection.project(&samples, &lengths)?;
        let phi_1d: Vec<DMatrix<T>> = (0..D).map(|d| univariate.table(d, 0).clone()).collect();
        let i_tensors = compute_i_tensors(&phi_1d, &self.quadrature, self.projection.degree(), &lengths);
        let num_basis: Vec<usize> = phi_1d.iter().map(|phi| phi.nrows()).collect();
        Ok(sum_factorization_mass_matrix(&k, &i_tensors, &num_basis))
    }
}

impl<'a, T: Real, const D: usize, const S: usize> ElementConnectivityAssembler
    for SumFactorizationMassAssembler<'a, T, D, S>
{
    fn num_elements(&self) -> usize {
        self.mapping.space().num_elements()
    }

    fn num_dofs(&self) -> usize {
        self.mapping.space().num_dofs()
    }

    fn element_dof_count(&self, element_index: usize) -> usize {
        self.mapping.space().element_dof_count(element_index)
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        self.mapping
            .space()
            .populate_element_dofs(output, element_index)
    }
}

impl<'a, T: Real, const D: usize, const S: usize> ElementMatrixAssembler<T>
    for SumFactorizationMassAssembler<'a, T, D, S>
{
    fn assemble_element_matrix_into(&self, element_index: usize, mut output: DMatrixViewMut<T>) -> eyre::Result<()> {
        let flat_index = self.mapping.space().active_element(element_index);
        let matrix = self.element_mass_matrix(flat_index)?;
        output.copy_from(&matrix);
        Ok(())
    }
}
