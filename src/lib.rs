//! Counterexample caching for a symbolic-execution constraint solver.
//!
//! Real workloads produce millions of validity queries whose constraint
//! sets overlap in structured ways (supersets, subsets, independent
//! conjuncts), so this crate answers as many as possible from previously
//! computed satisfying assignments before touching the underlying decision
//! procedure. The cache itself never reasons about satisfiability: every
//! shortcut is derived from cached evidence, by structural subsumption or
//! by direct evaluation of a candidate assignment.
//!
//! The pieces, bottom up: a hash-consed expression model ([`expr`]), a
//! constraint store with a range-narrowing simplifier
//! ([`solver::constraints`]), an independence analyzer that partitions
//! constraints by shared array footprint ([`solver::independence`]), and
//! the three-tier cache plus solver facade ([`solver::cex_cache`]).

pub mod error;
pub mod expr;
pub mod solver;

pub use error::{Result, SolverError};
pub use expr::{ArrayRef, Builder, ExprRef};
pub use solver::{
    Assignment, CexCacheConfig, CexCachingSolver, Query, SolverBackend, SolverRunStatus, Validity,
};
pub use solver::constraints::ConstraintSet;
