use crate::basis::{BSplineSpace, ElementBasisValues, NurbsSpace, SpaceElement};
use crate::flags::BasisFlags;
use crate::grid::{Grid, GridRefinement, ACTIVE};
use crate::tensor_index::{TensorIndex, TensorSize};
use crate::{Error, Real, Result};
use itertools::Itertools;
use log::debug;
use nalgebra::Point;
use std::array;

/// Basis values of one element at the points of a batch that lie in that element.
#[derive(Debug, Clone)]
pub struct ElementPointValues<T: Real, const D: usize> {
    pub element: TensorIndex<D>,
    /// Positions of the points in the batch.
    pub point_indices: Vec<usize>,
    pub values: ElementBasisValues<T, D>,
}

/// A spline space on the parametric domain: either polynomial or rational.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceSpace<T: Real, const D: usize> {
    BSpline(BSplineSpace<T, D>),
    Nurbs(NurbsSpace<T, D>),
}

impl<T: Real, const D: usize> From<BSplineSpace<T, D>> for ReferenceSpace<T, D> {
    fn from(space: BSplineSpace<T, D>) -> Self {
        Self::BSpline(space)
    }
}

impl<T: Real, const D: usize> From<NurbsSpace<T, D>> for ReferenceSpace<T, D> {
    fn from(space: NurbsSpace<T, D>) -> Self {
        Self::Nurbs(space)
    }
}

impl<T: Real, const D: usize> ReferenceSpace<T, D> {
    /// Whether the functions are rational.
    pub fn has_weights(&self) -> bool {
        matches!(self, Self::Nurbs(_))
    }

    /// The polynomial space; for NURBS the space of the numerators.
    pub fn bspline(&self) -> &BSplineSpace<T, D> {
        match self {
            Self::BSpline(space) => space,
            Self::Nurbs(space) => space.bspline(),
        }
    }

    pub fn weights(&self) -> Option<&[T]> {
        match self {
            Self::BSpline(_) => None,
            Self::Nurbs(space) => Some(space.weights()),
        }
    }

    pub fn grid(&self) -> &Grid<T, D> {
        self.bspline().grid()
    }

    pub fn num_basis(&self) -> usize {
        self.bspline().num_basis()
    }

    pub fn num_basis_per_direction(&self) -> TensorSize<D> {
        self.bspline().num_basis_per_direction()
    }

    pub fn num_basis_per_element(&self) -> usize {
        self.bspline().num_basis_per_element()
    }

    /// Flat grid index of the `index`-th active element.
    pub fn active_element(&self, index: usize) -> usize {
        self.grid().elements_with_property(ACTIVE)[index]
    }

    pub fn num_active_elements(&self) -> usize {
        self.grid().elements_with_property(ACTIVE).len()
    }

    pub fn element_dofs(&self, element: &TensorIndex<D>) -> Vec<usize> {
        self.bspline().element_dofs(element)
    }

    pub fn boundary_dofs(&self) -> Vec<usize> {
        self.bspline().boundary_dofs()
    }

    pub fn face_dofs(&self, face: usize) -> Vec<usize> {
        self.bspline().face_dofs(face)
    }

    pub fn evaluate_at_unit_points(
        &self,
        element: &TensorIndex<D>,
        unit_points: &[Point<T, D>],
        flags: BasisFlags,
        output: &mut ElementBasisValues<T, D>,
    ) {
        match self {
            Self::BSpline(space) => space.evaluate_at_unit_points(element, unit_points, flags, output),
            Self::Nurbs(space) => space.evaluate_at_unit_points(element, unit_points, flags, output),
        }
    }

    /// Trace space on a sub-element. Only available for B-spline spaces.
    pub fn sub_space<const K: usize>(&self, id: usize) -> Result<(ReferenceSpace<T, K>, Vec<usize>)> {
        match self {
            Self::BSpline(space) => {
                let (sub, dofs) = space.sub_space::<K>(id)?;
                Ok((ReferenceSpace::BSpline(sub), dofs))
            }
            Self::Nurbs(_) => Err(Error::NotImplemented("sub-spaces of NURBS spaces")),
        }
    }

    pub fn refine_h(&mut self, refinement: &GridRefinement<T, D>) -> Result<()> {
        match self {
            Self::BSpline(space) => space.refine_h(refinement),
            Self::Nurbs(space) => space.refine_h(refinement),
        }
    }

    /// Evaluates the basis at arbitrary parametric points.
    ///
    /// Points are located in the grid and grouped by element, so each element is evaluated
    /// once. `flags` selects the tables as in
    /// [`evaluate_at_unit_points`](Self::evaluate_at_unit_points). Fails with
    /// [`Error::PointOutsideDomain`] if a point lies outside the domain.
    pub fn evaluate_at_points(
        &self,
        points: &[Point<T, D>],
        flags: BasisFlags,
    ) -> Result<Vec<ElementPointValues<T, D>>> {
        let grid = self.grid();
        let elements = points
            .iter()
            .map(|x| grid.locate_element(&array::from_fn(|d| x[d])))
            .collect::<Result<Vec<_>>>()?;

        let groups: Vec<ElementPointValues<T, D>> = (0..points.len())
            .sorted_by_key(|&i| elements[i])
            .group_by(|&i| elements[i])
            .into_iter()
            .map(|(flat, group)| {
                let element = grid.element_tensor_index(flat);
                let point_indices: Vec<usize> = group.collect();
                let unit_points: Vec<Point<T, D>> = point_indices
                    .iter()
                    .map(|&i| {
                        Point::from(array::from_fn(|d| {
                            let breaks = grid.knot_coordinates(d);
                            let (a, b) = (breaks[element[d]], breaks[element[d] + 1]);
                            (points[i][d] - a) / (b - a)
                        }))
                    })
                    .collect();
                let mut values = ElementBasisValues::default();
                self.evaluate_at_unit_points(&element, &unit_points, flags, &mut values);
                ElementPointValues {
                    element,
                    point_indices,
                    values,
                }
            })
            .collect();
        debug!("Evaluated basis at {} points on {} elements", points.len(), groups.len());
        Ok(groups)
    }

    /// Accessor to the first element with the given property.
    pub fn begin(&self, property: &str) -> SpaceElement<'_, T, D> {
        SpaceElement::new(self, self.grid().begin(property))
    }
}
