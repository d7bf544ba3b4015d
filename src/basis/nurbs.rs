use crate::basis::{BSplineSpace, ElementBasisValues};
use crate::flags::BasisFlags;
use crate::grid::{Grid, GridRefinement};
use crate::knot_insertion::refine_control_net;
use crate::multi_array::MultiArray;
use crate::tensor_index::TensorIndex;
use crate::{Error, Real, Result};
use nalgebra::{Point, SMatrix, SVector};
use numeric_literals::replace_float_literals;

/// A NURBS space: a B-spline space with one positive weight per basis function.
///
/// The rational functions are `R_i = w_i N_i / W` with the weight function `W = sum_j w_j N_j`.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsSpace<T: Real, const D: usize> {
    bspline: BSplineSpace<T, D>,
    weights: Vec<T>,
}

impl<T: Real, const D: usize> NurbsSpace<T, D> {
    /// Fails with [`Error::NurbsDisabled`] when the crate is built without the `nurbs` feature,
    /// with [`Error::DimensionMismatch`] if there is not one weight per function and with
    /// [`Error::NonPositiveWeight`] if a weight is not positive.
    pub fn new(bspline: BSplineSpace<T, D>, weights: Vec<T>) -> Result<Self> {
        if cfg!(not(feature = "nurbs")) {
            return Err(Error::NurbsDisabled);
        }
        if weights.len() != bspline.num_basis() {
            return Err(Error::DimensionMismatch {
                what: "NURBS weights",
                expected: bspline.num_basis(),
                actual: weights.len(),
            });
        }
        if let Some(index) = weights.iter().position(|&w| w <= T::zero()) {
            return Err(Error::NonPositiveWeight { index });
        }
        Ok(Self { bspline, weights })
    }

    pub fn bspline(&self) -> &BSplineSpace<T, D> {
        &self.bspline
    }

    pub fn grid(&self) -> &Grid<T, D> {
        self.bspline.grid()
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn num_basis(&self) -> usize {
        self.bspline.num_basis()
    }

    /// Rational values and parametric derivatives at points of the reference cell.
    ///
    /// The polynomial tables are evaluated into `output` and transformed in place by the
    /// quotient rule, so polynomial values (and gradients, for Hessians) are always present.
    #[replace_float_literals(T::from_f64_lossy(literal))]
    pub fn evaluate_at_unit_points(
        &self,
        element: &TensorIndex<D>,
        unit_points: &[Point<T, D>],
        flags: BasisFlags,
        output: &mut ElementBasisValues<T, D>,
    ) {
        let hessians = flags.contains(BasisFlags::HESSIAN);
        let gradients = hessians || flags.contains(BasisFlags::GRADIENT);
        if !(gradients || flags.contains(BasisFlags::VALUE)) {
            self.bspline
                .evaluate_at_unit_points(element, unit_points, flags, output);
            return;
        }
        let mut polynomial_flags = BasisFlags::VALUE;
        if gradients {
            polynomial_flags |= BasisFlags::GRADIENT;
        }
        if hessians {
            polynomial_flags |= BasisFlags::HESSIAN;
        }
        self.bspline
            .evaluate_at_unit_points(element, unit_points, polynomial_flags, output);
        let dofs = self.bspline.element_dofs(element);

        for q in 0..unit_points.len() {
            // Weight function W and its derivatives at the point
            let mut w = T::zero();
            let mut dw = SVector::<T, D>::zeros();
            let mut hw = SMatrix::<T, D, D>::zeros();
            for (i, &dof) in dofs.iter().enumerate() {
                let w_i = self.weights[dof];
                w += w_i * *output.values.get(i, q);
                if gradients {
                    dw += output.gradients.get(i, q) * w_i;
                }
                if hessians {
                    hw += output.hessians.get(i, q) * w_i;
                }
            }

            let w_inv = T::one() / w;
            let w_inv2 = w_inv * w_inv;
            for (i, &dof) in dofs.iter().enumerate() {
                let w_i = self.weights[dof];
                let n = *output.values.get(i, q);
                *output.values.get_mut(i, q) = w_i * n * w_inv;
                if gradients {
                    let dn: SVector<T, D> = *output.gradients.get(i, q);
                    *output.gradients.get_mut(i, q) = (dn * w_inv - dw * (n * w_inv2)) * w_i;
                    if hessians {
                        let hn: SMatrix<T, D, D> = *output.hessians.get(i, q);
                        let mixed = dn * dw.transpose() + dw * dn.transpose();
                        let hessian = hn * w_inv - mixed * w_inv2 - hw * (n * w_inv2)
                            + dw * dw.transpose() * (2.0 * n * w_inv2 * w_inv);
                        *output.hessians.get_mut(i, q) = hessian * w_i;
                    }
                }
            }
        }
    }

    /// Follows a refinement of the underlying grid. The weights are refined by knot insertion,
    /// so the rational functions span a superset of the previous space.
    pub fn refine_h(&mut self, refinement: &GridRefinement<T, D>) -> Result<()> {
        refinement.check_applies_to(self.bspline.grid())?;
        let insertions = self.bspline.knot_insertions(refinement);
        let net = MultiArray::from_vec(
            self.bspline.num_basis_per_direction().extents(),
            self.weights.clone(),
        );
        let refined = refine_control_net(&self.bspline, &net, &insertions);
        self.bspline.refine_h(refinement)?;
        self.weights = refined.into_vec();
        Ok(())
    }
}
