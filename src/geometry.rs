//! Geometric mappings from the parametric domain into physical space, and the push-forward of
//! basis functions through them.
use crate::basis::{ReferenceSpace, SpaceElement, SpaceElementHandler, ValueTable};
use crate::cache::SubElementCache;
use crate::flags::{BasisFlags, MappingFlags};
use crate::grid::{GridRefinement, RefinementObserver};
use crate::knot_insertion::refine_coefficients;
use crate::quadrature::TensorProductQuadrature;
use crate::util::{extract_by_indices, inverse_jacobian_transpose, sub_jacobian_measure};
use crate::{Error, Real, Result};
use log::debug;
use nalgebra::{Point, SMatrix, SVector};

/// A spline mapping `F: [domain in R^D] -> R^S`, `F = sum_i P_i phi_i` with control points `P_i`.
#[derive(Debug, Clone, PartialEq)]
pub struct IgMapping<T: Real, const D: usize, const S: usize> {
    space: ReferenceSpace<T, D>,
    control_points: Vec<SVector<T, S>>,
}

fn jacobian_from_rows<T: Real, const D: usize, const S: usize>(rows: &[SVector<T, D>; S]) -> SMatrix<T, S, D> {
    SMatrix::from_fn(|s, d| rows[s][d])
}

impl<T: Real, const D: usize, const S: usize> IgMapping<T, D, S> {
    pub fn new(space: impl Into<ReferenceSpace<T, D>>, control_points: Vec<SVector<T, S>>) -> Result<Self> {
        let space = space.into();
        if control_points.len() != space.num_basis() {
            return Err(Error::DimensionMismatch {
                what: "mapping control points",
                expected: space.num_basis(),
                actual: control_points.len(),
            });
        }
        Ok(Self { space, control_points })
    }

    /// The mapping whose control points are the Greville abscissae, padded with zeros for
    /// `S > D`.
    ///
    /// For B-spline spaces this reproduces the parametric coordinates exactly.
    ///
    /// # Panics
    ///
    /// Panics if `S < D`.
    pub fn identity(space: impl Into<ReferenceSpace<T, D>>) -> Self {
        assert!(S >= D, "identity mapping needs S >= D");
        let space = space.into();
        let greville = space.bspline().greville_abscissae();
        let control_points = space
            .num_basis_per_direction()
            .indices()
            .map(|index| SVector::from_fn(|s, _| if s < D { greville[s][index[s]] } else { T::zero() }))
            .collect();
        Self { space, control_points }
    }

    pub fn space(&self) -> &ReferenceSpace<T, D> {
        &self.space
    }

    pub fn control_points(&self) -> &[SVector<T, S>] {
        &self.control_points
    }

    pub fn control_points_mut(&mut self) -> &mut [SVector<T, S>] {
        &mut self.control_points
    }

    /// Physical images of arbitrary parametric points.
    pub fn evaluate_at_points(&self, points: &[Point<T, D>]) -> Result<Vec<Point<T, S>>> {
        let mut output = vec![Point::origin(); points.len()];
        for group in self.space.evaluate_at_points(points, BasisFlags::VALUE)? {
            let local = extract_by_indices(&self.control_points, &self.space.element_dofs(&group.element));
            let images = group.values.values.vector_linear_combination(&local);
            for (&i, image) in group.point_indices.iter().zip(images) {
                output[i] = Point::from(image);
            }
        }
        Ok(output)
    }

    /// Jacobians `dF/du` at arbitrary parametric points.
    pub fn jacobians_at_points(&self, points: &[Point<T, D>]) -> Result<Vec<SMatrix<T, S, D>>> {
        let mut output = vec![SMatrix::zeros(); points.len()];
        for group in self.space.evaluate_at_points(points, BasisFlags::GRADIENT)? {
            let local = extract_by_indices(&self.control_points, &self.space.element_dofs(&group.element));
            let rows = group.values.gradients.vector_linear_combination(&local);
            for (&i, rows) in group.point_indices.iter().zip(rows) {
                output[i] = jacobian_from_rows(&rows);
            }
        }
        Ok(output)
    }

    /// Hessians of every physical component at arbitrary parametric points.
    pub fn hessians_at_points(&self, points: &[Point<T, D>]) -> Result<Vec<[SMatrix<T, D, D>; S]>> {
        let mut output = vec![[SMatrix::zeros(); S]; points.len()];
        for group in self.space.evaluate_at_points(points, BasisFlags::HESSIAN)? {
            let local = extract_by_indices(&self.control_points, &self.space.element_dofs(&group.element));
            let hessians = group.values.hessians.vector_linear_combination(&local);
            for (&i, hessian) in group.point_indices.iter().zip(hessians) {
                output[i] = hessian;
            }
        }
        Ok(output)
    }

    /// Inserts the knots of a grid refinement. The geometry is unchanged.
    pub fn refine_h(&mut self, refinement: &GridRefinement<T, D>) -> Result<()> {
        refinement.check_applies_to(self.space.grid())?;
        let control_points = refine_coefficients(&self.space, &self.control_points, refinement);
        self.space.refine_h(refinement)?;
        self.control_points = control_points;
        debug!("Refined mapping: {} control points", self.control_points.len());
        Ok(())
    }

    /// Inserts breakpoints into the mapping's own grid and returns the refinement, so that other
    /// objects defined on the same grid can follow it.
    pub fn insert_knots(&mut self, knots: [Vec<T>; D]) -> Result<GridRefinement<T, D>> {
        let mut grid = self.space.grid().clone();
        let refinement = grid.insert_knots(knots)?;
        self.refine_h(&refinement)?;
        Ok(refinement)
    }

    pub fn begin(&self, property: &str) -> MappingElement<'_, T, D, S> {
        MappingElement {
            mapping: self,
            space_element: self.space.begin(property),
            cache: SubElementCache::default(),
        }
    }
}

impl<T: Real, const D: usize, const S: usize> RefinementObserver<T, D> for IgMapping<T, D, S> {
    fn on_refinement(&mut self, refinement: &GridRefinement<T, D>) -> Result<()> {
        self.refine_h(refinement)
    }
}

/// Mapping values stored for one sub-element.
#[derive(Debug, Clone)]
pub struct MappingValues<T: Real, const D: usize, const S: usize> {
    pub points: Vec<Point<T, S>>,
    pub jacobians: Vec<SMatrix<T, S, D>>,
    pub hessians: Vec<[SMatrix<T, D, D>; S]>,
    /// `sqrt(det(J_a^T J_a))` per point, where `J_a` restricts `J` to the directions the
    /// sub-element spans.
    pub measures: Vec<T>,
    /// Measures times the quadrature weights and the parametric sub-element measure.
    pub w_measures: Vec<T>,
    pub inverse_jacobians_transpose: Vec<SMatrix<T, S, D>>,
    /// Unit outward normals of a face, tangent to the mapped manifold when `S > D`.
    pub outer_normals: Vec<SVector<T, S>>,
}

impl<T: Real, const D: usize, const S: usize> MappingValues<T, D, S> {
    fn resize(&mut self, num_points: usize, flags: MappingFlags) {
        let len = |requested: bool| if requested { num_points } else { 0 };
        self.points
            .resize(len(flags.contains(MappingFlags::POINT)), Point::origin());
        self.jacobians
            .resize(len(flags.needs_jacobian()), SMatrix::zeros());
        self.hessians
            .resize(len(flags.contains(MappingFlags::HESSIAN)), [SMatrix::zeros(); S]);
        self.measures.resize(
            len(flags.intersects(MappingFlags::MEASURE | MappingFlags::W_MEASURE)),
            T::zero(),
        );
        self.w_measures
            .resize(len(flags.contains(MappingFlags::W_MEASURE)), T::zero());
        self.inverse_jacobians_transpose
            .resize(len(flags.needs_inverse_jacobian()), SMatrix::zeros());
        self.outer_normals
            .resize(len(flags.contains(MappingFlags::OUTER_NORMAL)), SVector::zeros());
    }
}

impl<T: Real, const D: usize, const S: usize> Default for MappingValues<T, D, S> {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            jacobians: Vec::new(),
            hessians: Vec::new(),
            measures: Vec::new(),
            w_measures: Vec::new(),
            inverse_jacobians_transpose: Vec::new(),
            outer_normals: Vec::new(),
        }
    }
}

/// Element accessor of an [`IgMapping`].
#[derive(Debug, Clone)]
pub struct MappingElement<'m, T: Real, const D: usize, const S: usize> {
    mapping: &'m IgMapping<T, D, S>,
    space_element: SpaceElement<'m, T, D>,
    cache: SubElementCache<MappingValues<T, D, S>>,
}

impl<'m, T: Real, const D: usize, const S: usize> MappingElement<'m, T, D, S> {
    pub fn mapping(&self) -> &'m IgMapping<T, D, S> {
        self.mapping
    }

    pub fn space_element(&self) -> &SpaceElement<'m, T, D> {
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

    pub fn values(&self, k: usize, j: usize) -> &MappingValues<T, D, S> {
        self.cache.get(k, j)
    }

    pub fn element_points(&self) -> &[Point<T, S>] {
        &self.values(D, 0).points
    }

    pub fn element_jacobians(&self) -> &[SMatrix<T, S, D>] {
        &self.values(D, 0).jacobians
    }

    pub fn element_hessians(&self) -> &[[SMatrix<T, D, D>; S]] {
        &self.values(D, 0).hessians
    }

    pub fn element_measures(&self) -> &[T] {
        &self.values(D, 0).measures
    }

    pub fn element_w_measures(&self) -> &[T] {
        &self.values(D, 0).w_measures
    }

    pub fn element_inverse_jacobians_transpose(&self) -> &[SMatrix<T, S, D>] {
        &self.values(D, 0).inverse_jacobians_transpose
    }

    /// Outward normals at the quadrature points of face `face`.
    pub fn face_outer_normals(&self, face: usize) -> &[SVector<T, S>] {
        &self.values(D - 1, face).outer_normals
    }

    pub fn face_w_measures(&self, face: usize) -> &[T] {
        &self.values(D - 1, face).w_measures
    }
}

/// Fills mapping values on [`MappingElement`]s.
#[derive(Debug, Clone)]
pub struct MappingElementHandler<'m, T: Real, const D: usize, const S: usize> {
    mapping: &'m IgMapping<T, D, S>,
    space_handler: SpaceElementHandler<'m, T, D>,
    flags: Vec<MappingFlags>,
}

impl<'m, T: Real, const D: usize, const S: usize> MappingElementHandler<'m, T, D, S> {
    pub fn new(mapping: &'m IgMapping<T, D, S>) -> Self {
        Self {
            mapping,
            space_handler: SpaceElementHandler::new(&mapping.space),
            flags: vec![MappingFlags::NONE; D + 1],
        }
    }

    pub fn mapping(&self) -> &'m IgMapping<T, D, S> {
        self.mapping
    }

    pub fn flags(&self, k: usize) -> MappingFlags {
        self.flags[k]
    }

    /// Requests mapping quantities on sub-elements of dimension `k`. Additional basis
    /// quantities (for instance for a push-forward) can be requested with `extra_basis_flags`.
    ///
    /// # Panics
    ///
    /// Panics if [`MappingFlags::OUTER_NORMAL`] is requested on anything but faces.
    pub fn reset_with_basis(
        &mut self,
        flags: MappingFlags,
        extra_basis_flags: BasisFlags,
        k: usize,
        quadrature: &TensorProductQuadrature<T>,
    ) {
        assert!(
            !flags.contains(MappingFlags::OUTER_NORMAL) || k + 1 == D,
            "outer normals are only defined on faces"
        );
        self.space_handler
            .reset(flags.basis_flags() | extra_basis_flags, k, quadrature);
        self.flags[k] = flags;
    }

    pub fn reset(&mut self, flags: MappingFlags, k: usize, quadrature: &TensorProductQuadrature<T>) {
        self.reset_with_basis(flags, BasisFlags::NONE, k, quadrature)
    }

    pub fn reset_element(&mut self, flags: MappingFlags, quadrature: &TensorProductQuadrature<T>) {
        self.reset(flags, D, quadrature)
    }

    pub fn init_cache(&self, element: &mut MappingElement<'m, T, D, S>, k: usize) {
        self.space_handler.init_cache(&mut element.space_element, k);
        let num_points = self.space_handler.quadrature(k).num_points();
        for j in 0..self.mapping.space.grid().unit_element().num_sub_elements(k) {
            element
                .cache
                .allocate(k, j)
                .resize(num_points, self.flags[k]);
        }
    }

    /// Fills the mapping values of sub-element `(k, j)` for the current element, overwriting
    /// the buffers sized by [`init_cache`](Self::init_cache).
    ///
    /// Fails with [`Error::SingularMatrix`] if inverse Jacobians are requested and the
    /// Jacobian is rank deficient at a quadrature point.
    pub fn fill_cache(&self, element: &mut MappingElement<'m, T, D, S>, k: usize, j: usize) -> Result<()> {
        let MappingElement {
            space_element, cache, ..
        } = element;
        self.space_handler.fill_cache(space_element, k, j);
        let flags = self.flags[k];
        let sub_element = self.mapping.space.grid().unit_element().sub_element(k, j);
        let local = extract_by_indices(&self.mapping.control_points, &space_element.local_to_global());
        let values = cache.begin_fill(k, j, space_element.flat_index());

        if flags.contains(MappingFlags::POINT) {
            let basis = space_element.values(k, j);
            for (q, x) in values.points.iter_mut().enumerate() {
                x.coords = local
                    .iter()
                    .enumerate()
                    .fold(SVector::zeros(), |acc, (i, c)| acc + c * *basis.get(i, q));
            }
        }
        if flags.needs_jacobian() {
            let gradients = space_element.gradients(k, j);
            for (q, jacobian) in values.jacobians.iter_mut().enumerate() {
                *jacobian = local
                    .iter()
                    .enumerate()
                    .fold(SMatrix::zeros(), |acc, (i, c)| acc + c * gradients.get(i, q).transpose());
            }
        }
        if flags.contains(MappingFlags::HESSIAN) {
            let basis_hessians = space_element.hessians(k, j);
            for (q, hessian) in values.hessians.iter_mut().enumerate() {
                *hessian = [SMatrix::zeros(); S];
                for (i, c) in local.iter().enumerate() {
                    let h = basis_hessians.get(i, q);
                    for s in 0..S {
                        hessian[s] += h * c[s];
                    }
                }
            }
        }
        if flags.intersects(MappingFlags::MEASURE | MappingFlags::W_MEASURE) {
            let active = sub_element.active_directions();
            for (measure, jacobian) in values.measures.iter_mut().zip(&values.jacobians) {
                *measure = sub_jacobian_measure(jacobian, active);
            }
        }
        if flags.contains(MappingFlags::W_MEASURE) {
            let grid_w_measures = space_element.grid_element().w_measures(k, j);
            for ((w_measure, &m), &w) in values
                .w_measures
                .iter_mut()
                .zip(&values.measures)
                .zip(grid_w_measures)
            {
                *w_measure = m * w;
            }
        }
        if flags.needs_inverse_jacobian() {
            for (inverse, jacobian) in values
                .inverse_jacobians_transpose
                .iter_mut()
                .zip(&values.jacobians)
            {
                *inverse = inverse_jacobian_transpose(jacobian).ok_or(Error::SingularMatrix("mapping Jacobian"))?;
            }
        }
        if flags.contains(MappingFlags::OUTER_NORMAL) {
            // Column `dir` of J^{-T} is orthogonal to the face tangents and points towards
            // increasing u_dir.
            let direction = sub_element.constant_directions()[0];
            let sign = if sub_element.constant_values()[0] == 0 {
                -T::one()
            } else {
                T::one()
            };
            for (normal, inverse) in values
                .outer_normals
                .iter_mut()
                .zip(&values.inverse_jacobians_transpose)
            {
                let conormal = inverse.column(direction);
                *normal = conormal * (sign / conormal.norm());
            }
        }
        Ok(())
    }

    pub fn init_element_cache(&self, element: &mut MappingElement<'m, T, D, S>) {
        self.init_cache(element, D)
    }

    pub fn fill_element_cache(&self, element: &mut MappingElement<'m, T, D, S>) -> Result<()> {
        self.fill_cache(element, D, 0)
    }
}

/// Basis functions pushed forward to the physical domain: `phi(F(u)) = phi_hat(u)` with
/// physical gradients `J (J^T J)^{-1} grad phi_hat`.
#[derive(Debug, Clone)]
pub struct PhysicalSpaceElement<'m, T: Real, const D: usize, const S: usize> {
    mapping_element: MappingElement<'m, T, D, S>,
    gradients: SubElementCache<ValueTable<SVector<T, S>>>,
}

impl<'m, T: Real, const D: usize, const S: usize> PhysicalSpaceElement<'m, T, D, S> {
    pub fn mapping_element(&self) -> &MappingElement<'m, T, D, S> {
        &self.mapping_element
    }

    pub fn flat_index(&self) -> usize {
        self.mapping_element.flat_index()
    }

    pub fn is_past_the_end(&self) -> bool {
        self.mapping_element.is_past_the_end()
    }

    pub fn advance(&mut self) {
        self.mapping_element.advance()
    }

    pub fn move_to(&mut self, flat_index: usize) {
        self.mapping_element.move_to(flat_index)
    }

    pub fn local_to_global(&self) -> Vec<usize> {
        self.mapping_element.space_element().local_to_global()
    }

    pub fn num_local_functions(&self) -> usize {
        self.mapping_element.space_element().num_local_functions()
    }

    pub fn element_values(&self) -> &ValueTable<T> {
        self.mapping_element.space_element().element_values()
    }

    /// Physical gradients on sub-element `(k, j)`.
    pub fn gradients(&self, k: usize, j: usize) -> &ValueTable<SVector<T, S>> {
        self.gradients.get(k, j)
    }

    pub fn element_gradients(&self) -> &ValueTable<SVector<T, S>> {
        self.gradients(D, 0)
    }

    pub fn element_points(&self) -> &[Point<T, S>] {
        self.mapping_element.element_points()
    }

    pub fn element_w_measures(&self) -> &[T] {
        self.mapping_element.element_w_measures()
    }
}

/// Handler for [`PhysicalSpaceElement`]s on the space of a mapping.
#[derive(Debug, Clone)]
pub struct PhysicalSpaceHandler<'m, T: Real, const D: usize, const S: usize> {
    mapping_handler: MappingElementHandler<'m, T, D, S>,
    flags: Vec<BasisFlags>,
}

impl<'m, T: Real, const D: usize, const S: usize> PhysicalSpaceHandler<'m, T, D, S> {
    pub fn new(mapping: &'m IgMapping<T, D, S>) -> Self {
        Self {
            mapping_handler: MappingElementHandler::new(mapping),
            flags: vec![BasisFlags::NONE; D + 1],
        }
    }

    pub fn begin(&self, property: &str) -> PhysicalSpaceElement<'m, T, D, S> {
        PhysicalSpaceElement {
            mapping_element: self.mapping_handler.mapping().begin(property),
            gradients: SubElementCache::default(),
        }
    }

    /// Requests physical values (and gradients if [`BasisFlags::GRADIENT`] is set), physical
    /// points and weighted measures.
    pub fn reset(&mut self, flags: BasisFlags, k: usize, quadrature: &TensorProductQuadrature<T>) {
        let mut mapping_flags = MappingFlags::POINT | MappingFlags::W_MEASURE;
        if flags.contains(BasisFlags::GRADIENT) {
            mapping_flags |= MappingFlags::INVERSE_JACOBIAN_TRANSPOSE;
        }
        self.mapping_handler
            .reset_with_basis(mapping_flags, flags | BasisFlags::VALUE, k, quadrature);
        self.flags[k] = flags;
    }

    pub fn reset_element(&mut self, flags: BasisFlags, quadrature: &TensorProductQuadrature<T>) {
        self.reset(flags, D, quadrature)
    }

    pub fn init_cache(&self, element: &mut PhysicalSpaceElement<'m, T, D, S>, k: usize) {
        self.mapping_handler
            .init_cache(&mut element.mapping_element, k);
        let space = self.mapping_handler.mapping().space();
        let num_functions = if self.flags[k].contains(BasisFlags::GRADIENT) {
            space.num_basis_per_element()
        } else {
            0
        };
        let num_points = self.mapping_handler.space_handler.quadrature(k).num_points();
        for j in 0..space.grid().unit_element().num_sub_elements(k) {
            element
                .gradients
                .allocate(k, j)
                .resize(num_functions, num_points, SVector::zeros());
        }
    }

    pub fn fill_cache(&self, element: &mut PhysicalSpaceElement<'m, T, D, S>, k: usize, j: usize) -> Result<()> {
        let PhysicalSpaceElement {
            mapping_element,
            gradients,
        } = element;
        self.mapping_handler.fill_cache(mapping_element, k, j)?;
        let physical = gradients.begin_fill(k, j, mapping_element.flat_index());
        if self.flags[k].contains(BasisFlags::GRADIENT) {
            let reference = mapping_element.space_element().gradients(k, j);
            let inverse_transpose = &mapping_element.values(k, j).inverse_jacobians_transpose;
            for i in 0..reference.num_functions() {
                for (q, g) in inverse_transpose.iter().enumerate() {
                    *physical.get_mut(i, q) = g * reference.get(i, q);
                }
            }
        }
        Ok(())
    }

    pub fn init_element_cache(&self, element: &mut PhysicalSpaceElement<'m, T, D, S>) {
        self.init_cache(element, D)
    }

    pub fn fill_element_cache(&self, element: &mut PhysicalSpaceElement<'m, T, D, S>) -> Result<()> {
        self.fill_cache(element, D, 0)
    }
}

/// Control points given as a function of the tensor index of each basis function.
pub fn control_points_from_fn<T: Real, const D: usize, const S: usize>(
    space: &ReferenceSpace<T, D>,
    f: impl FnMut([usize; D]) -> SVector<T, S>,
) -> Vec<SVector<T, S>> {
    space.num_basis_per_direction().indices().map(f).collect()
}
