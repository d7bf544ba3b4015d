//! Scalar fields on the parametric domain.
use crate::basis::{ReferenceSpace, SpaceElement, SpaceElementHandler};
use crate::cache::SubElementCache;
use crate::flags::{BasisFlags, FunctionFlags};
use crate::grid::{GridRefinement, RefinementObserver};
use crate::knot_insertion::refine_coefficients;
use crate::quadrature::TensorProductQuadrature;
use crate::util::extract_by_indices;
use crate::{Error, Real, Result};
use nalgebra::{Point, SMatrix, SVector};

/// A scalar spline field `f = sum_i c_i phi_i` over a reference space.
///
/// Gradients and Hessians are taken with respect to the parametric coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct IgFunction<T: Real, const D: usize> {
    space: ReferenceSpace<T, D>,
    coefficients: Vec<T>,
}

impl<T: Real, const D: usize> IgFunction<T, D> {
    pub fn new(space: impl Into<ReferenceSpace<T, D>>, coefficients: Vec<T>) -> Result<Self> {
        let space = space.into();
        if coefficients.len() != space.num_basis() {
            return Err(Error::DimensionMismatch {
                what: "function coefficients",
                expected: space.num_basis(),
                actual: coefficients.len(),
            });
        }
        Ok(Self { space, coefficients })
    }

    pub fn zero(space: impl Into<ReferenceSpace<T, D>>) -> Self {
        let space = space.into();
        let coefficients = vec![T::zero(); space.num_basis()];
        Self { space, coefficients }
    }

    pub fn space(&self) -> &ReferenceSpace<T, D> {
        &self.space
    }

    pub fn coefficients(&self) -> &[T] {
        &self.coefficients
    }

    pub fn coefficients_mut(&mut self) -> &mut [T] {
        &mut self.coefficients
    }

    /// Values at arbitrary parametric points.
    pub fn evaluate_at_points(&self, points: &[Point<T, D>]) -> Result<Vec<T>> {
        let mut output = vec![T::zero(); points.len()];
        for group in self.space.evaluate_at_points(points, BasisFlags::VALUE)? {
            let local = extract_by_indices(&self.coefficients, &self.space.element_dofs(&group.element));
            let values = group.values.values.linear_combination(&local);
            for (&i, value) in group.point_indices.iter().zip(values) {
                output[i] = value;
            }
        }
        Ok(output)
    }

    /// Parametric gradients at arbitrary parametric points.
    pub fn gradients_at_points(&self, points: &[Point<T, D>]) -> Result<Vec<SVector<T, D>>> {
        let mut output = vec![SVector::zeros(); points.len()];
        for group in self.space.evaluate_at_points(points, BasisFlags::GRADIENT)? {
            let local = extract_by_indices(&self.coefficients, &self.space.element_dofs(&group.element));
            let gradients = group.values.gradients.linear_combination(&local);
            for (&i, gradient) in group.point_indices.iter().zip(gradients) {
                output[i] = gradient;
            }
        }
        Ok(output)
    }

    /// Parametric Hessians at arbitrary parametric points.
    pub fn hessians_at_points(&self, points: &[Point<T, D>]) -> Result<Vec<SMatrix<T, D, D>>> {
        let mut output = vec![SMatrix::zeros(); points.len()];
        for group in self.space.evaluate_at_points(points, BasisFlags::HESSIAN)? {
            let local = extract_by_indices(&self.coefficients, &self.space.element_dofs(&group.element));
            let hessians = group.values.hessians.linear_combination(&local);
            for (&i, hessian) in group.point_indices.iter().zip(hessians) {
                output[i] = hessian;
            }
        }
        Ok(output)
    }

    /// Inserts the knots of a grid refinement without changing the field.
    pub fn refine_h(&mut self, refinement: &GridRefinement<T, D>) -> Result<()> {
        refinement.check_applies_to(self.space.grid())?;
        let coefficients = refine_coefficients(&self.space, &self.coefficients, refinement);
        self.space.refine_h(refinement)?;
        self.coefficients = coefficients;
        Ok(())
    }

    pub fn begin(&self, property: &str) -> FunctionElement<'_, T, D> {
        FunctionElement {
            function: self,
            space_element: self.space.begin(property),
            cache: SubElementCache::default(),
        }
    }
}

impl<T: Real, const D: usize> RefinementObserver<T, D> for IgFunction<T, D> {
    fn on_refinement(&mut self, refinement: &GridRefinement<T, D>) -> Result<()> {
        self.refine_h(refinement)
    }
}

/// Field values stored for one sub-element.
#[derive(Debug, Clone)]
pub struct FunctionValues<T: Real, const D: usize> {
    pub values: Vec<T>,
    pub gradients: Vec<SVector<T, D>>,
    pub hessians: Vec<SMatrix<T, D, D>>,
}

impl<T: Real, const D: usize> Default for FunctionValues<T, D> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            gradients: Vec::new(),
            hessians: Vec::new(),
        }
    }
}

impl<T: Real, const D: usize> FunctionValues<T, D> {
    fn resize(&mut self, num_points: usize, flags: FunctionFlags) {
        let len = |flag| if flags.contains(flag) { num_points } else { 0 };
        self.values.resize(len(FunctionFlags::VALUE), T::zero());
        self.gradients
            .resize(len(FunctionFlags::GRADIENT), SVector::zeros());
        self.hessians
            .resize(len(FunctionFlags::HESSIAN), SMatrix::zeros());
    }
}

/// Element accessor of an [`IgFunction`].
#[derive(Debug, Clone)]
pub struct FunctionElement<'f, T: Real, const D: usize> {
    function: &'f IgFunction<T, D>,
    space_element: SpaceElement<'f, T, D>,
    cache: SubElementCache<FunctionValues<T, D>>,
}

impl<'f, T: Real, const D: usize> FunctionElement<'f, T, D> {
    pub fn function(&self) -> &'f IgFunction<T, D> {
        self.function
    }

    pub fn space_element(&self) -> &SpaceElement<'f, T, D> {
        &self.space_element
    }

    pub fn flat_index(&self) -> usize {
        self.space_element.flat_index()
    }

    pub fn is_past_the_end(&self) -> bool {
        self.space_element.is_past_the_end()
    }

    pub fn advance(&mut self) {
        self.space_element.advance()
    }

    pub fn move_to(&mut self, flat_index: usize) {
        self.space_element.move_to(flat_index)
    }

    pub fn values(&self, k: usize, j: usize) -> &[T] {
        &self.cache.get(k, j).values
    }

    pub fn gradients(&self, k: usize, j: usize) -> &[SVector<T, D>] {
        &self.cache.get(k, j).gradients
    }

    pub fn hessians(&self, k: usize, j: usize) -> &[SMatrix<T, D, D>] {
        &self.cache.get(k, j).hessians
    }

    pub fn element_values(&self) -> &[T] {
        self.values(D, 0)
    }

    pub fn element_gradients(&self) -> &[SVector<T, D>] {
        self.gradients(D, 0)
    }

    pub fn element_hessians(&self) -> &[SMatrix<T, D, D>] {
        self.hessians(D, 0)
    }
}

/// Fills field values on [`FunctionElement`]s.
#[derive(Debug, Clone)]
pub struct FunctionElementHandler<'f, T: Real, const D: usize> {
    function: &'f IgFunction<T, D>,
    space_handler: SpaceElementHandler<'f, T, D>,
    flags: Vec<FunctionFlags>,
}

impl<'f, T: Real, const D: usize> FunctionElementHandler<'f, T, D> {
    pub fn new(function: &'f IgFunction<T, D>) -> Self {
        Self {
            function,
            space_handler: SpaceElementHandler::new(&function.space),
            flags: vec![FunctionFlags::NONE; D + 1],
        }
    }

    pub fn reset(&mut self, flags: FunctionFlags, k: usize, quadrature: &TensorProductQuadrature<T>) {
        self.space_handler.reset(flags.basis_flags(), k, quadrature);
        self.flags[k] = flags;
    }

    pub fn reset_element(&mut self, flags: FunctionFlags, quadrature: &TensorProductQuadrature<T>) {
        self.reset(flags, D, quadrature)
    }

    pub fn init_cache(&self, element: &mut FunctionElement<'f, T, D>, k: usize) {
        self.space_handler.init_cache(&mut element.space_element, k);
        let num_points = self.space_handler.quadrature(k).num_points();
        for j in 0..self.function.space.grid().unit_element().num_sub_elements(k) {
            element
                .cache
                .allocate(k, j)
                .resize(num_points, self.flags[k]);
        }
    }

    /// Fills the field values of sub-element `(k, j)` into the buffers sized by
    /// [`init_cache`](Self::init_cache).
    pub fn fill_cache(&self, element: &mut FunctionElement<'f, T, D>, k: usize, j: usize) {
        let FunctionElement {
            space_element, cache, ..
        } = element;
        self.space_handler.fill_cache(space_element, k, j);
        let flags = self.flags[k];
        let local = extract_by_indices(&self.function.coefficients, &space_element.local_to_global());
        let values = cache.begin_fill(k, j, space_element.flat_index());
        if flags.contains(FunctionFlags::VALUE) {
            space_element
                .values(k, j)
                .linear_combination_into(&local, &mut values.values);
        }
        if flags.contains(FunctionFlags::GRADIENT) {
            space_element
                .gradients(k, j)
                .linear_combination_into(&local, &mut values.gradients);
        }
        if flags.contains(FunctionFlags::HESSIAN) {
            space_element
                .hessians(k, j)
                .linear_combination_into(&local, &mut values.hessians);
        }
    }

    pub fn init_element_cache(&self, element: &mut FunctionElement<'f, T, D>) {
        self.init_cache(element, D)
    }

    pub fn fill_element_cache(&self, element: &mut FunctionElement<'f, T, D>) {
        self.fill_cache(element, D, 0)
    }
}
