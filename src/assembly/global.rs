use crate::assembly::local::{
    ElementConnectivityAssembler, ElementMatrixAssembler, ElementScalarAssembler, ElementVectorAssembler,
};
use crate::{Error, Real, Result};
use eyre::eyre;
use log::debug;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut, Scalar};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use std::cell::RefCell;

/// An assembler for CSR matrices.
#[derive(Debug, Clone)]
pub struct CsrAssembler<T: Scalar> {
    // Buffers reused when assembling several matrices with the same assembler
    workspace: RefCell<CsrAssemblerWorkspace<T>>,
}

impl<T: Scalar> Default for CsrAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new(CsrAssemblerWorkspace::default()),
        }
    }
}

#[derive(Debug, Clone)]
struct CsrAssemblerWorkspace<T: Scalar> {
    element_dofs: Vec<usize>,
    element_matrix: DMatrix<T>,
}

impl<T: Scalar> Default for CsrAssemblerWorkspace<T> {
    fn default() -> Self {
        Self {
            element_dofs: Vec::new(),
            element_matrix: DMatrix::from_row_slice(0, 0, &[]),
        }
    }
}

impl<T: Scalar> CsrAssembler<T> {
    /// The pattern coupling every pair of dofs that share an element.
    pub fn assemble_pattern(&self, element_assembler: &(impl ElementConnectivityAssembler + ?Sized)) -> SparsityPattern {
        let num_dofs = element_assembler.num_dofs();
        let mut rows = vec![Vec::new(); num_dofs];
        let mut element_dofs = Vec::new();
        for e in 0..element_assembler.num_elements() {
            element_dofs.resize(element_assembler.element_dof_count(e), 0);
            element_assembler.populate_element_dofs(&mut element_dofs, e);
            for &i in &element_dofs {
                rows[i].extend_from_slice(&element_dofs);
            }
        }

        let mut offsets = Vec::with_capacity(num_dofs + 1);
        let mut columns = Vec::new();
        offsets.push(0);
        for mut row in rows {
            row.sort_unstable();
            row.dedup();
            columns.append(&mut row);
            offsets.push(columns.len());
        }
        SparsityPattern::try_from_offsets_and_indices(num_dofs, num_dofs, offsets, columns)
            .expect("rows are sorted and deduplicated")
    }
}

impl<T: Real> CsrAssembler<T> {
    pub fn assemble(&self, element_assembler: &dyn ElementMatrixAssembler<T>) -> eyre::Result<CsrMatrix<T>> {
        let pattern = self.assemble_pattern(element_assembler);
        let initial_matrix_values = vec![T::zero(); pattern.nnz()];
        let mut matrix = CsrMatrix::try_from_pattern_and_values(pattern, initial_matrix_values)
            .map_err(|err| eyre!("failed to create CSR matrix: {err}"))?;
        self.assemble_into_csr(&mut matrix, element_assembler)?;
        debug!(
            "Assembled {}x{} CSR matrix with {} non-zeros from {} elements",
            matrix.nrows(),
            matrix.ncols(),
            matrix.nnz(),
            element_assembler.num_elements()
        );
        Ok(matrix)
    }

    /// Adds the element contributions into an existing matrix.
    ///
    /// Fails if the pattern of `csr` misses an entry coupling two dofs of an element.
    pub fn assemble_into_csr(
        &self,
        csr: &mut CsrMatrix<T>,
        element_assembler: &dyn ElementMatrixAssembler<T>,
    ) -> eyre::Result<()> {
        let ws = &mut *self.workspace.borrow_mut();
        let element_dofs = &mut ws.element_dofs;
        let element_matrix = &mut ws.element_matrix;

        for e in 0..element_assembler.num_elements() {
            let n = element_assembler.element_dof_count(e);
            element_dofs.resize(n, 0);
            element_matrix.resize_mut(n, n, T::zero());
            element_matrix.fill(T::zero());

            element_assembler.assemble_element_matrix_into(e, DMatrixViewMut::from(&mut *element_matrix))?;
            element_assembler.populate_element_dofs(element_dofs, e);

            for (a, &i) in element_dofs.iter().enumerate() {
                let mut row = csr.row_mut(i);
                let (columns, values) = row.cols_and_values_mut();
                for (b, &j) in element_dofs.iter().enumerate() {
                    let position = columns
                        .binary_search(&j)
                        .map_err(|_| eyre!("entry ({i}, {j}) of element {e} is missing from the sparsity pattern"))?;
                    values[position] += element_matrix[(a, b)];
                }
            }
        }
        Ok(())
    }
}

/// An assembler for dense global vectors.
#[derive(Debug, Clone)]
pub struct VectorAssembler<T: Scalar> {
    workspace: RefCell<VectorAssemblerWorkspace<T>>,
}

impl<T: Scalar> Default for VectorAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new(VectorAssemblerWorkspace::default()),
        }
    }
}

#[derive(Debug, Clone)]
struct VectorAssemblerWorkspace<T: Scalar> {
    element_dofs: Vec<usize>,
    element_vector: DVector<T>,
}

impl<T: Scalar> Default for VectorAssemblerWorkspace<T> {
    fn default() -> Self {
        Self {
            element_dofs: Vec::new(),
            element_vector: DVector::from_column_slice(&[]),
        }
    }
}

impl<T: Real> VectorAssembler<T> {
    pub fn assemble_vector(&self, element_assembler: &dyn ElementVectorAssembler<T>) -> eyre::Result<DVector<T>> {
        let mut output = DVector::zeros(element_assembler.num_dofs());
        self.assemble_vector_into(&mut output, element_assembler)?;
        Ok(output)
    }

    /// Adds the element contributions into `output`.
    pub fn assemble_vector_into<'a>(
        &self,
        output: impl Into<DVectorViewMut<'a, T>>,
        element_assembler: &dyn ElementVectorAssembler<T>,
    ) -> eyre::Result<()> {
        let mut output = output.into();
        assert_eq!(
            output.len(),
            element_assembler.num_dofs(),
            "output vector needs one entry per dof"
        );

        let ws = &mut *self.workspace.borrow_mut();
        let element_dofs = &mut ws.element_dofs;
        let element_vector = &mut ws.element_vector;

        for e in 0..element_assembler.num_elements() {
            let n = element_assembler.element_dof_count(e);
            element_dofs.resize(n, 0);
            element_vector.resize_vertically_mut(n, T::zero());
            element_vector.fill(T::zero());

            element_assembler.assemble_element_vector_into(e, DVectorViewMut::from(&mut *element_vector))?;
            element_assembler.populate_element_dofs(element_dofs, e);

            for (&i, &value) in element_dofs.iter().zip(element_vector.iter()) {
                output[i] += value;
            }
        }
        Ok(())
    }
}

/// Sums the element scalars of all elements.
pub fn assemble_scalar<T: Real>(element_assembler: &dyn ElementScalarAssembler<T>) -> eyre::Result<T> {
    (0..element_assembler.num_elements()).try_fold(T::zero(), |acc, i| {
        Ok(acc + element_assembler.assemble_element_scalar(i)?)
    })
}

/// The magnitude of the first non-zero diagonal entry, or one.
fn diagonal_scale<T: Real>(matrix: &CsrMatrix<T>) -> T {
    (0..matrix.nrows())
        .filter_map(|i| matrix.get_entry(i, i).map(|entry| entry.into_value()))
        .find(|&x| x != T::zero())
        .map(|x| x.abs())
        .unwrap_or(T::one())
}

/// Imposes the values `u[dofs[i]] = values[i]` on the system `A u = b`.
///
/// The known values are moved to the right-hand side of the free rows, and the rows and
/// columns of the prescribed dofs are cleared. Their diagonal entries get the scale of the
/// matrix instead of one, which keeps the system symmetric and its conditioning unchanged.
///
/// Every prescribed dof needs a diagonal entry in the pattern.
///
/// # Panics
///
/// Panics if `dofs` and `values` differ in length or `rhs` does not match the matrix.
pub fn apply_dirichlet_values<T: Real>(matrix: &mut CsrMatrix<T>, rhs: &mut DVector<T>, dofs: &[usize], values: &[T]) {
    assert_eq!(dofs.len(), values.len(), "one value per Dirichlet dof required");
    assert_eq!(rhs.len(), matrix.nrows(), "right-hand side does not match the matrix");
    let scale = diagonal_scale(matrix);
    let mut prescribed = vec![None; matrix.nrows()];
    for (&dof, &value) in dofs.iter().zip(values) {
        prescribed[dof] = Some(value);
    }

    for (r, mut row) in matrix.row_iter_mut().enumerate() {
        let (columns, entries) = row.cols_and_values_mut();
        match prescribed[r] {
            Some(value) => {
                for (&c, entry) in columns.iter().zip(entries) {
                    *entry = if c == r { scale } else { T::zero() };
                }
                rhs[r] = scale * value;
            }
            None => {
                for (&c, entry) in columns.iter().zip(entries) {
                    if let Some(value) = prescribed[c] {
                        rhs[r] -= *entry * value;
                        *entry = T::zero();
                    }
                }
            }
        }
    }
    debug!("Imposed {} Dirichlet values", dofs.len());
}

/// [`apply_dirichlet_values`] with all values zero.
pub fn apply_homogeneous_dirichlet<T: Real>(matrix: &mut CsrMatrix<T>, rhs: &mut DVector<T>, dofs: &[usize]) {
    apply_dirichlet_values(matrix, rhs, dofs, &vec![T::zero(); dofs.len()])
}

/// A linear relation `c_1 u_{i_1} + ... + c_n u_{i_n} = f` between dofs.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint<T> {
    terms: Vec<(usize, T)>,
    rhs: T,
}

impl<T: Real> LinearConstraint<T> {
    /// Fails if the lengths differ, a dof appears twice, or all coefficients are zero.
    pub fn new(dofs: &[usize], coefficients: &[T], rhs: T) -> Result<Self> {
        if dofs.len() != coefficients.len() {
            return Err(Error::DimensionMismatch {
                what: "constraint coefficients",
                expected: dofs.len(),
                actual: coefficients.len(),
            });
        }
        let mut sorted = dofs.to_vec();
        sorted.sort_unstable();
        if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(Error::InvalidConstraint("a dof appears more than once"));
        }
        if coefficients.iter().all(|&c| c == T::zero()) {
            return Err(Error::InvalidConstraint("all coefficients are zero"));
        }
        Ok(Self {
            terms: dofs.iter().copied().zip(coefficients.iter().copied()).collect(),
            rhs,
        })
    }

    pub fn rhs(&self) -> T {
        self.rhs
    }

    pub fn set_rhs(&mut self, rhs: T) {
        self.rhs = rhs;
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn dof(&self, i: usize) -> usize {
        self.terms[i].0
    }

    pub fn coefficient(&self, i: usize) -> T {
        self.terms[i].1
    }

    pub fn terms(&self) -> &[(usize, T)] {
        &self.terms
    }

    /// `sum_i c_i u_{dof_i} - f`.
    pub fn residual(&self, u: &[T]) -> T {
        self.terms
            .iter()
            .fold(-self.rhs, |acc, &(dof, c)| acc + c * u[dof])
    }

    /// The term with the coefficient of largest magnitude; its dof is the one eliminated.
    fn pivot(&self) -> (usize, T) {
        self.terms
            .iter()
            .copied()
            .fold(self.terms[0], |best, term| if term.1.abs() > best.1.abs() { term } else { best })
    }
}

/// A linear system `A u = b` reduced by eliminating one dof per [`LinearConstraint`].
///
/// Writing `u = C v + g`, where `v` holds the remaining free dofs, the reduced system is
/// `C^T A C v = C^T (b - A g)`. It stays symmetric, and positive definite whenever `A` is
/// positive definite on the constrained dofs.
#[derive(Debug, Clone)]
pub struct ConstrainedSystem<T: Scalar> {
    matrix: CsrMatrix<T>,
    rhs: DVector<T>,
    transform: CsrMatrix<T>,
    offset: DVector<T>,
}

impl<T: Real> ConstrainedSystem<T> {
    /// Fails with [`Error::InvalidConstraint`] if the dof eliminated by one constraint also
    /// appears in another constraint.
    pub fn new(matrix: &CsrMatrix<T>, rhs: &DVector<T>, constraints: &[LinearConstraint<T>]) -> Result<Self> {
        let n = matrix.nrows();
        if rhs.len() != n {
            return Err(Error::DimensionMismatch {
                what: "right-hand side",
                expected: n,
                actual: rhs.len(),
            });
        }
        if let Some(&(dof, _)) = constraints
            .iter()
            .flat_map(|constraint| constraint.terms())
            .find(|(dof, _)| *dof >= n)
        {
            return Err(Error::DimensionMismatch {
                what: "constrained dof",
                expected: n,
                actual: dof,
            });
        }

        let pivots: Vec<(usize, T)> = constraints.iter().map(LinearConstraint::pivot).collect();
        let mut eliminated_by = vec![None; n];
        for (c, &(dof, _)) in pivots.iter().enumerate() {
            eliminated_by[dof] = Some(c);
        }
        for (c, constraint) in constraints.iter().enumerate() {
            if constraint
                .terms()
                .iter()
                .any(|&(dof, _)| eliminated_by[dof].is_some_and(|other| other != c))
            {
                return Err(Error::InvalidConstraint("eliminated dofs must appear in a single constraint"));
            }
        }

        let mut reduced_index = vec![usize::MAX; n];
        let mut num_free = 0;
        for (dof, index) in reduced_index.iter_mut().enumerate() {
            if eliminated_by[dof].is_none() {
                *index = num_free;
                num_free += 1;
            }
        }

        let mut transform = CooMatrix::new(n, num_free);
        let mut offset = DVector::zeros(n);
        for dof in (0..n).filter(|&dof| eliminated_by[dof].is_none()) {
            transform.push(dof, reduced_index[dof], T::one());
        }
        for (constraint, &(pivot_dof, pivot_coefficient)) in constraints.iter().zip(&pivots) {
            offset[pivot_dof] = constraint.rhs() / pivot_coefficient;
            for &(dof, c) in constraint.terms() {
                if dof != pivot_dof {
                    transform.push(pivot_dof, reduced_index[dof], -c / pivot_coefficient);
                }
            }
        }
        let transform = CsrMatrix::from(&transform);
        let transform_t = transform.transpose();
        let reduced_matrix = &transform_t * &(matrix * &transform);
        let reduced_rhs = &transform_t * &(rhs - matrix * &offset);
        debug!(
            "Condensed {} constraints: {} of {} dofs remain free",
            constraints.len(),
            num_free,
            n
        );
        Ok(Self {
            matrix: reduced_matrix,
            rhs: reduced_rhs,
            transform,
            offset,
        })
    }

    pub fn matrix(&self) -> &CsrMatrix<T> {
        &self.matrix
    }

    pub fn rhs(&self) -> &DVector<T> {
        &self.rhs
    }

    pub fn num_free_dofs(&self) -> usize {
        self.matrix.nrows()
    }

    /// All dofs `C v + g` from the free dofs `v`.
    pub fn expand(&self, reduced: &DVector<T>) -> DVector<T> {
        &self.transform * reduced + &self.offset
    }

    /// Solves the reduced system and expands the solution to all dofs.
    pub fn solve(&self, solver: &impl LinearSolver<T>) -> eyre::Result<DVector<T>> {
        let reduced = solver.solve(&self.matrix, &self.rhs)?;
        Ok(self.expand(&reduced))
    }
}

/// Solver for the assembled linear systems.
pub trait LinearSolver<T: Scalar> {
    fn solve(&self, matrix: &CsrMatrix<T>, rhs: &DVector<T>) -> eyre::Result<DVector<T>>;
}

/// Direct solver for symmetric positive definite systems.
#[derive(Debug, Copy, Clone, Default)]
pub struct CholeskySolver;

impl<T: Real> LinearSolver<T> for CholeskySolver {
    fn solve(&self, matrix: &CsrMatrix<T>, rhs: &DVector<T>) -> eyre::Result<DVector<T>> {
        let csc = CscMatrix::from(matrix);
        let cholesky =
            CscCholesky::factor(&csc).map_err(|err| eyre!("Failed to solve linear system. Error: {}", err))?;
        let solution = cholesky.solve(rhs);
        Ok(solution.column(0).into_owned())
    }
}
