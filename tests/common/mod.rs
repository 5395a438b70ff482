//! Shared helpers for the cache integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cex_solver::{ArrayRef, Assignment, Builder, ExprRef, Query, Result, SolverBackend, SolverError};

/// Byte values are searched in `0..VALUE_LIMIT`; tests must keep their
/// constants below it so unsatisfiability is never an artifact of the
/// truncated domain.
pub const VALUE_LIMIT: u8 = 32;

/// Reference decision procedure: enumerate the contents of every referenced
/// array and hand back the first model of `(AND constraints) ∧ ¬expr`.
/// Instrumented so tests can assert exactly when the cache fell through.
pub struct BruteForceBackend {
    calls: Arc<AtomicUsize>,
    constraint_counts: Arc<Mutex<Vec<usize>>>,
}

impl BruteForceBackend {
    pub fn new() -> Self {
        BruteForceBackend {
            calls: Arc::new(AtomicUsize::new(0)),
            constraint_counts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared call counter, usable after the backend moves into a solver.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Constraint count of every query that reached the backend, in order.
    pub fn constraint_log(&self) -> Arc<Mutex<Vec<usize>>> {
        Arc::clone(&self.constraint_counts)
    }
}

impl SolverBackend for BruteForceBackend {
    fn compute_initial_values(
        &mut self,
        query: &Query<'_>,
        objects: &[ArrayRef],
    ) -> Result<Option<Vec<Vec<u8>>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.constraint_counts
            .lock()
            .expect("constraint log poisoned")
            .push(query.constraints.len());

        let mut exprs: Vec<ExprRef> = query.constraints.iter().cloned().collect();
        exprs.push(Builder::is_zero(&query.expr));
        Ok(search_model(&exprs, objects))
    }
}

/// First model of the conjunction over the given objects, if any.
pub fn search_model(exprs: &[ExprRef], objects: &[ArrayRef]) -> Option<Vec<Vec<u8>>> {
    let sizes: Vec<usize> = objects.iter().map(|o| o.size() as usize).collect();
    let total: usize = sizes.iter().sum();
    assert!(total <= 3, "brute-force search space too large for a test");

    let mut positions = Vec::with_capacity(total);
    for (ai, &size) in sizes.iter().enumerate() {
        for bi in 0..size {
            positions.push((ai, bi));
        }
    }
    let mut contents: Vec<Vec<u8>> = sizes.iter().map(|&s| vec![0u8; s]).collect();
    if fill(0, &positions, &mut contents, objects, exprs) {
        Some(contents)
    } else {
        None
    }
}

fn fill(
    pos: usize,
    positions: &[(usize, usize)],
    contents: &mut Vec<Vec<u8>>,
    objects: &[ArrayRef],
    exprs: &[ExprRef],
) -> bool {
    if pos == positions.len() {
        let assignment = Assignment::new(objects, contents.clone());
        return exprs.iter().all(|e| assignment.evaluate(e).is_true());
    }
    let (ai, bi) = positions[pos];
    for v in 0..VALUE_LIMIT {
        contents[ai][bi] = v;
        if fill(pos + 1, positions, contents, objects, exprs) {
            return true;
        }
    }
    contents[ai][bi] = 0;
    false
}

/// Fails its first `failures` calls, then behaves like the brute-force
/// backend. For exercising the no-poisoning rule.
pub struct FlakyBackend {
    failures: usize,
    inner: BruteForceBackend,
}

impl FlakyBackend {
    pub fn new(failures: usize) -> Self {
        FlakyBackend {
            failures,
            inner: BruteForceBackend::new(),
        }
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.inner.call_counter()
    }
}

impl SolverBackend for FlakyBackend {
    fn compute_initial_values(
        &mut self,
        query: &Query<'_>,
        objects: &[ArrayRef],
    ) -> Result<Option<Vec<Vec<u8>>>> {
        if self.failures > 0 {
            self.failures -= 1;
            self.inner.calls.fetch_add(1, Ordering::SeqCst);
            return Err(SolverError::Timeout { seconds: 0.0 });
        }
        self.inner.compute_initial_values(query, objects)
    }
}

pub fn byte(array: &ArrayRef, index: u32) -> ExprRef {
    Builder::read_at(array, index)
}

pub fn c8(value: u64) -> ExprRef {
    Builder::constant(value, 8)
}
