//! Constraint solving with counterexample caching.
//!
//! The entry point is [`cex_cache::CexCachingSolver`], which answers
//! validity/truth/value queries over a [`constraints::ConstraintSet`] by
//! reusing previously computed assignments wherever subsumption allows, and
//! falls back to a [`SolverBackend`] only on a genuine miss.

pub mod assignment;
pub mod cex_cache;
pub mod config;
pub mod constraints;
pub mod independence;
pub mod index_set;
pub mod map_of_sets;
pub mod stats;

use crate::error::Result;
use crate::expr::{ArrayRef, Builder, ExprRef};
use constraints::ConstraintSet;

pub use assignment::Assignment;
pub use cex_cache::{CacheValue, CexCachingSolver};
pub use config::CexCacheConfig;
pub use stats::CexCacheStatsSnapshot;

/// A validity question over a path condition: is `(AND constraints) ⇒ expr`
/// valid? A counterexample is an assignment satisfying the constraints
/// while falsifying `expr`.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    pub constraints: &'a ConstraintSet,
    pub expr: ExprRef,
}

impl<'a> Query<'a> {
    pub fn new(constraints: &'a ConstraintSet, expr: ExprRef) -> Self {
        Query { constraints, expr }
    }

    /// The same constraints asking about `false`; its counterexamples are
    /// exactly the assignments satisfying the path condition.
    pub fn with_false(&self) -> Query<'a> {
        Query {
            constraints: self.constraints,
            expr: Builder::false_expr(),
        }
    }

    pub fn negate_expr(&self) -> Query<'a> {
        Query {
            constraints: self.constraints,
            expr: Builder::is_zero(&self.expr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverRunStatus {
    Success,
    Failure,
    Timeout,
}

/// The underlying decision procedure. The cache performs no SMT reasoning
/// of its own; everything it cannot derive from cached evidence lands here.
pub trait SolverBackend {
    /// Search for concrete contents of `objects` satisfying
    /// `(AND constraints) ∧ ¬expr`. `Ok(None)` means unsatisfiable; `Err`
    /// means failure or timeout and must leave no trace in any cache.
    fn compute_initial_values(
        &mut self,
        query: &Query<'_>,
        objects: &[ArrayRef],
    ) -> Result<Option<Vec<Vec<u8>>>>;

    fn set_timeout(&mut self, _seconds: f64) {}

    fn status(&self) -> SolverRunStatus {
        SolverRunStatus::Success
    }
}
