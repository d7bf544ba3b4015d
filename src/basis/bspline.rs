use crate::basis::{ElementBasisValues, KnotVector, UnivariateValues};
use crate::flags::BasisFlags;
use crate::grid::{Grid, GridRefinement};
use crate::quadrature::TensorProductQuadrature;
use crate::tensor_index::{TensorIndex, TensorSize};
use crate::{Error, Real, Result};
use log::debug;
use nalgebra::{DMatrix, Point};
use std::array;

/// A tensor-product B-spline space on a grid.
///
/// In every direction `d` the space uses an open knot vector over the grid breakpoints with
/// end knots repeated `degree[d] + 1` times and interior breakpoints repeated
/// `interior_multiplicity[d]` times (`1` gives maximal smoothness `C^{p-1}`).
///
/// A periodic direction instead uses a [`KnotVector::periodic`] with maximal smoothness, and
/// identifies the functions that wrap around the end of the domain with the first ones, which
/// leaves one function per interval.
///
/// Global basis functions are numbered in tensor order with direction 0 fastest. On every
/// element the `prod (p_d + 1)` non-vanishing functions are numbered the same way.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineSpace<T: Real, const D: usize> {
    grid: Grid<T, D>,
    degrees: [usize; D],
    interior_multiplicity: [usize; D],
    periodic: [bool; D],
    knot_vectors: [KnotVector<T>; D],
}

impl<T: Real, const D: usize> BSplineSpace<T, D> {
    /// Maximally smooth space of the given degrees.
    pub fn new(grid: Grid<T, D>, degrees: [usize; D]) -> Self {
        Self::with_multiplicity(grid, degrees, [1; D]).expect("multiplicity one is valid for every degree")
    }

    /// Space with the given interior knot multiplicities.
    ///
    /// Fails with [`Error::InvalidKnots`] unless `1 <= interior_multiplicity[d] <= degrees[d] + 1`.
    pub fn with_multiplicity(grid: Grid<T, D>, degrees: [usize; D], interior_multiplicity: [usize; D]) -> Result<Self> {
        for d in 0..D {
            let m = interior_multiplicity[d];
            if m == 0 || m > degrees[d] + 1 {
                return Err(Error::InvalidKnots {
                    direction: d,
                    reason: format!(
                        "interior multiplicity {m} not in 1..={} for degree {}",
                        degrees[d] + 1,
                        degrees[d]
                    ),
                });
            }
        }
        let knot_vectors =
            array::from_fn(|d| KnotVector::open(grid.knot_coordinates(d), degrees[d], interior_multiplicity[d]));
        Ok(Self {
            grid,
            degrees,
            interior_multiplicity,
            periodic: [false; D],
            knot_vectors,
        })
    }

    /// Maximally smooth space that is periodic in the marked directions.
    ///
    /// Fails with [`Error::InvalidKnots`] if a periodic direction does not have more intervals
    /// than its degree.
    pub fn periodic(grid: Grid<T, D>, degrees: [usize; D], periodic: [bool; D]) -> Result<Self> {
        for d in (0..D).filter(|&d| periodic[d]) {
            let num_intervals = grid.num_intervals(d);
            if num_intervals <= degrees[d] {
                return Err(Error::InvalidKnots {
                    direction: d,
                    reason: format!(
                        "periodic degree {} needs more than {num_intervals} intervals",
                        degrees[d]
                    ),
                });
            }
        }
        let knot_vectors = array::from_fn(|d| {
            let breakpoints = grid.knot_coordinates(d);
            if periodic[d] {
                KnotVector::periodic(breakpoints, degrees[d])
            } else {
                KnotVector::open(breakpoints, degrees[d], 1)
            }
        });
        debug!("Periodic B-spline space, periodic directions {periodic:?}");
        Ok(Self {
            grid,
            degrees,
            interior_multiplicity: [1; D],
            periodic,
            knot_vectors,
        })
    }

    pub fn grid(&self) -> &Grid<T, D> {
        &self.grid
    }

    pub fn degrees(&self) -> &[usize; D] {
        &self.degrees
    }

    pub fn interior_multiplicity(&self) -> &[usize; D] {
        &self.interior_multiplicity
    }

    pub fn periodicity(&self) -> &[bool; D] {
        &self.periodic
    }

    pub fn is_periodic(&self, direction: usize) -> bool {
        self.periodic[direction]
    }

    pub fn knot_vector(&self, direction: usize) -> &KnotVector<T> {
        &self.knot_vectors[direction]
    }

    pub fn knot_vectors(&self) -> &[KnotVector<T>; D] {
        &self.knot_vectors
    }

    pub fn num_basis_per_direction(&self) -> TensorSize<D> {
        TensorSize::new(array::from_fn(|d| {
            let unwrapped = self.knot_vectors[d].num_basis();
            if self.periodic[d] {
                unwrapped - self.degrees[d]
            } else {
                unwrapped
            }
        }))
    }

    pub fn num_basis(&self) -> usize {
        self.num_basis_per_direction().flat_size()
    }

    /// Number of functions per direction that do not vanish on an element.
    pub fn num_basis_per_element_direction(&self) -> TensorSize<D> {
        TensorSize::new(array::from_fn(|d| self.degrees[d] + 1))
    }

    pub fn num_basis_per_element(&self) -> usize {
        self.num_basis_per_element_direction().flat_size()
    }

    /// Knot span index of interval `interval` in direction `direction`.
    fn span(&self, direction: usize, interval: usize) -> usize {
        self.degrees[direction] + interval * self.interior_multiplicity[direction]
    }

    /// Index of the first univariate function that is non-zero on the given interval, before
    /// periodic identification.
    pub fn first_function(&self, direction: usize, interval: usize) -> usize {
        interval * self.interior_multiplicity[direction]
    }

    /// Global indices of the functions that do not vanish on the element, in local order.
    pub fn element_dofs(&self, element: &TensorIndex<D>) -> Vec<usize> {
        let global_size = self.num_basis_per_direction();
        self.num_basis_per_element_direction()
            .indices()
            .map(|local| {
                let global = array::from_fn(|d| (self.first_function(d, element[d]) + local[d]) % global_size[d]);
                global_size.tensor_to_flat(&global)
            })
            .collect()
    }

    /// Functions that are non-zero on the face `face = 2 * direction + side` of the domain.
    ///
    /// Faces across a periodic direction are not part of the boundary and have no functions.
    pub fn face_dofs(&self, face: usize) -> Vec<usize> {
        assert!(face < 2 * D, "face {face} out of range for dimension {D}");
        let (direction, side) = (face / 2, face % 2);
        if self.periodic[direction] {
            return Vec::new();
        }
        let size = self.num_basis_per_direction();
        let fixed = if side == 0 { 0 } else { size[direction] - 1 };
        size.indices()
            .enumerate()
            .filter(|(_, index)| index[direction] == fixed)
            .map(|(flat, _)| flat)
            .collect()
    }

    /// Functions that are non-zero somewhere on the boundary of the domain, sorted.
    pub fn boundary_dofs(&self) -> Vec<usize> {
        let size = self.num_basis_per_direction();
        size.indices()
            .enumerate()
            .filter(|(_, index)| (0..D).any(|d| !self.periodic[d] && (index[d] == 0 || index[d] + 1 == size[d])))
            .map(|(flat, _)| flat)
            .collect()
    }

    /// Greville abscissae per direction.
    ///
    /// In periodic directions the abscissae of the first functions may lie before the start of
    /// the domain.
    pub fn greville_abscissae(&self) -> [Vec<T>; D] {
        let size = self.num_basis_per_direction();
        array::from_fn(|d| {
            let mut abscissae = self.knot_vectors[d].greville_abscissae();
            abscissae.truncate(size[d]);
            abscissae
        })
    }

    /// Parametric coordinate of the unit coordinate `x` on interval `interval` of `direction`.
    fn parametric_coordinate(&self, direction: usize, interval: usize, x: T) -> T {
        let breaks = self.grid.knot_coordinates(direction);
        breaks[interval] + x * (breaks[interval + 1] - breaks[interval])
    }

    /// Univariate derivative tables of the element's functions in `direction` at the unit
    /// coordinates `x`. Entry `[k][(l, q)]` is the `k`-th parametric derivative of local function
    /// `l` at point `q`.
    ///
    /// Matrices of `tables` are overwritten in place when their shape already fits.
    pub fn evaluate_univariate_into(
        &self,
        direction: usize,
        interval: usize,
        x: &[T],
        num_derivatives: usize,
        tables: &mut Vec<DMatrix<T>>,
    ) {
        let kv = &self.knot_vectors[direction];
        let span = self.span(direction, interval);
        let p = self.degrees[direction];
        tables.truncate(num_derivatives + 1);
        for table in tables.iter_mut() {
            if table.shape() != (p + 1, x.len()) {
                *table = DMatrix::zeros(p + 1, x.len());
            }
        }
        tables.resize(num_derivatives + 1, DMatrix::zeros(p + 1, x.len()));
        for (q, &xq) in x.iter().enumerate() {
            let u = self.parametric_coordinate(direction, interval, xq);
            let ders = kv.basis_functions_with_derivatives(span, u, num_derivatives);
            for (k, table) in tables.iter_mut().enumerate() {
                for l in 0..=p {
                    table[(l, q)] = ders[(k, l)];
                }
            }
        }
    }

    /// Values and parametric derivatives of the element's functions at points of the
    /// reference cell `[0, 1]^D`.
    ///
    /// Only the tables requested by [`BasisFlags::VALUE`], [`BasisFlags::GRADIENT`] and
    /// [`BasisFlags::HESSIAN`] are computed; the others are left empty.
    pub fn evaluate_at_unit_points(
        &self,
        element: &TensorIndex<D>,
        unit_points: &[Point<T, D>],
        flags: BasisFlags,
        output: &mut ElementBasisValues<T, D>,
    ) {
        let local_size = self.num_basis_per_element_direction();
        output.resize(local_size.flat_size(), unit_points.len(), flags);
        let (values, gradients, hessians) = (
            flags.contains(BasisFlags::VALUE),
            flags.contains(BasisFlags::GRADIENT),
            flags.contains(BasisFlags::HESSIAN),
        );
        if !(values || gradients || hessians) {
            return;
        }
        let num_derivatives = if hessians {
            2
        } else if gradients {
            1
        } else {
            0
        };

        for (q, xi) in unit_points.iter().enumerate() {
            // ders[d] is (num_derivatives + 1) x (p_d + 1)
            let ders: [DMatrix<T>; D] = array::from_fn(|d| {
                let u = self.parametric_coordinate(d, element[d], xi[d]);
                self.knot_vectors[d].basis_functions_with_derivatives(self.span(d, element[d]), u, num_derivatives)
            });
            for (i, local) in local_size.indices().enumerate() {
                // Product with the derivative orders given per direction
                let product = |orders: [usize; D]| (0..D).fold(T::one(), |acc, d| acc * ders[d][(orders[d], local[d])]);
                if values {
                    *output.values.get_mut(i, q) = product([0; D]);
                }
                if gradients {
                    let gradient = output.gradients.get_mut(i, q);
                    for a in 0..D {
                        let mut orders = [0; D];
                        orders[a] = 1;
                        gradient[a] = product(orders);
                    }
                }
                if hessians {
                    let hessian = output.hessians.get_mut(i, q);
                    for a in 0..D {
                        for b in a..D {
                            let mut orders = [0; D];
                            orders[a] += 1;
                            orders[b] += 1;
                            let value = product(orders);
                            hessian[(a, b)] = value;
                            hessian[(b, a)] = value;
                        }
                    }
                }
            }
        }
    }

    /// Univariate tables of the element's functions at the points of a tensor rule, per
    /// direction and derivative order.
    ///
    /// # Panics
    ///
    /// Panics if the rule does not have rank `D`.
    pub fn element_univariate_values(
        &self,
        element: &TensorIndex<D>,
        quadrature: &TensorProductQuadrature<T>,
        num_derivatives: usize,
    ) -> UnivariateValues<T> {
        let mut output = UnivariateValues::default();
        self.element_univariate_values_into(element, quadrature, num_derivatives, &mut output);
        output
    }

    /// Writes the univariate tables into `output`, reusing its storage.
    pub fn element_univariate_values_into(
        &self,
        element: &TensorIndex<D>,
        quadrature: &TensorProductQuadrature<T>,
        num_derivatives: usize,
        output: &mut UnivariateValues<T>,
    ) {
        assert_eq!(quadrature.rank(), D, "univariate tables need a rule of full rank");
        output.tables.resize_with(D, Vec::new);
        for (d, tables) in output.tables.iter_mut().enumerate() {
            self.evaluate_univariate_into(d, element[d], quadrature.points_direction(d), num_derivatives, tables);
        }
    }

    /// The space restricted to the `K`-dimensional sub-element `id` of the domain, together
    /// with the global index of every function of the sub-space.
    ///
    /// Only functions that do not vanish on the sub-element survive the restriction. Since the
    /// knot vectors are open, these are exactly the functions whose index is the first (side 0)
    /// or last (side 1) in every constant direction. Periodic directions stay periodic on the
    /// sub-space, while a sub-element that is constant in a periodic direction is rejected.
    pub fn sub_space<const K: usize>(&self, id: usize) -> Result<(BSplineSpace<T, K>, Vec<usize>)> {
        if K == 0 || K > D {
            return Err(Error::NotImplemented("sub-spaces must have dimension between 1 and the space dimension"));
        }
        let sub_element = self.grid.unit_element().sub_element(K, id);
        if sub_element
            .constant_directions()
            .iter()
            .any(|&d| self.periodic[d])
        {
            return Err(Error::NotImplemented("sub-spaces across a periodic direction"));
        }
        let active = sub_element.active_directions();
        let breakpoints: [Vec<T>; K] = array::from_fn(|i| self.grid.knot_coordinates(active[i]).to_vec());
        let grid = Grid::from_knot_coordinates(breakpoints)?;
        let degrees = array::from_fn(|i| self.degrees[active[i]]);
        let periodic: [bool; K] = array::from_fn(|i| self.periodic[active[i]]);
        let space = if periodic.iter().any(|&p| p) {
            BSplineSpace::periodic(grid, degrees, periodic)?
        } else {
            BSplineSpace::with_multiplicity(grid, degrees, array::from_fn(|i| self.interior_multiplicity[active[i]]))?
        };

        let size = self.num_basis_per_direction();
        let mut global = [0; D];
        for (&d, &side) in sub_element
            .constant_directions()
            .iter()
            .zip(sub_element.constant_values())
        {
            global[d] = if side == 0 { 0 } else { size[d] - 1 };
        }
        let dof_map = space
            .num_basis_per_direction()
            .indices()
            .map(|sub_index| {
                for (i, &d) in active.iter().enumerate() {
                    global[d] = sub_index[i];
                }
                size.tensor_to_flat(&global)
            })
            .collect();
        Ok((space, dof_map))
    }

    /// Knots to insert into each knot vector so that it matches the refined grid.
    ///
    /// Every new breakpoint is repeated with the interior multiplicity of its direction.
    pub fn knot_insertions(&self, refinement: &GridRefinement<T, D>) -> [Vec<T>; D] {
        array::from_fn(|d| {
            let m = self.interior_multiplicity[d];
            refinement
                .inserted_knots(d)
                .iter()
                .flat_map(|&x| std::iter::repeat(x).take(m))
                .collect()
        })
    }

    /// Follows a refinement of the underlying grid.
    pub fn refine_h(&mut self, refinement: &GridRefinement<T, D>) -> Result<()> {
        let insertions = self.knot_insertions(refinement);
        self.grid.apply_refinement(refinement)?;
        for (d, knots) in insertions.iter().enumerate() {
            if knots.is_empty() {
                continue;
            }
            self.knot_vectors[d] = if self.periodic[d] {
                KnotVector::periodic(self.grid.knot_coordinates(d), self.degrees[d])
            } else {
                self.knot_vectors[d].with_inserted(knots)
            };
        }
        debug!(
            "Refined B-spline space: {} basis functions on {} elements",
            self.num_basis(),
            self.grid.num_elements()
        );
        Ok(())
    }
}
