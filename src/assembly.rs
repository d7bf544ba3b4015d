//! Assembly of element matrices and vectors into global sparse systems.
//!
//! Element-level assemblers in [`local`] describe, for every active element of a patch, which
//! global degrees of freedom the element touches and how to compute its local contribution.
//! [`global`] turns those contributions into CSR matrices and dense vectors, applies
//! homogeneous Dirichlet conditions and solves the resulting systems.
pub mod global;
pub mod local;
