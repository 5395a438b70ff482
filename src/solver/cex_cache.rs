//! The counterexample cache.
//!
//! Three lookup tiers, probed in order and stopping at the first answer:
//!
//! 1. QuickCache: exact key match in a hash table.
//! 2. PrevSolution: if the query extends a previously answered key by one
//!    conjunct, re-validate the previous assignment (and propagate UNSAT,
//!    since a superset of an unsatisfiable set is unsatisfiable).
//! 3. Upper-bound search: an exact probe of the subsumption trie, then a
//!    superset probe (a witness for more constraints also witnesses fewer),
//!    then a subset probe (an unsatisfiable subset dooms the whole key; a
//!    satisfiable one is cheaply re-validated).
//!
//! Every decision made here is a sound shortcut derived from cached
//! evidence; nothing is answered that is not either an interned SMT witness
//! or proved by structural subsumption or by direct evaluation.

use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{Result, SolverError};
use crate::expr::util::find_symbolic_objects;
use crate::expr::{ArrayRef, Builder, ExprRef};
use crate::solver::assignment::Assignment;
use crate::solver::config::CexCacheConfig;
use crate::solver::constraints::ConstraintSet;
use crate::solver::independence::{
    get_independent_constraints, get_independent_constraints_unsafe,
};
use crate::solver::map_of_sets::MapOfSets;
use crate::solver::stats::{CexCacheStats, CexCacheStatsSnapshot, TimerGuard};
use crate::solver::{Query, SolverBackend, SolverRunStatus, Validity};

/// A satisfying assignment, or `None` for an unsatisfiable key.
pub type CacheValue = Option<Arc<Assignment>>;

/// The set of path constraints plus the negated query expression.
/// Membership is structural expression identity; the set has no ordering
/// significance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey(BTreeSet<ExprRef>);

impl CacheKey {
    fn from_constraints(constraints: &ConstraintSet) -> Self {
        CacheKey(constraints.iter().cloned().collect())
    }

    fn insert(&mut self, e: ExprRef) {
        self.0.insert(e);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExprRef> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn sorted(&self) -> Vec<ExprRef> {
        self.0.iter().cloned().collect()
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Order-independent combination of the members' content hashes.
        let mut combo: u64 = 0;
        for e in &self.0 {
            combo = combo.wrapping_add(e.hash_value());
        }
        state.write_u64(combo);
    }
}

enum PrevOutcome {
    /// The previous answer carries over as-is.
    Hit(CacheValue),
    /// A previous assignment exists but does not satisfy the new conjunct.
    Parent(Arc<Assignment>),
    Miss,
}

/// A query narrowed to the constraints that share a read footprint with its
/// expression. Owns the narrowed store so the borrowed [`Query`] shape is
/// preserved.
struct ReducedQuery {
    constraints: ConstraintSet,
    expr: ExprRef,
}

impl ReducedQuery {
    fn of(query: &Query<'_>) -> Self {
        let (_, required) = get_independent_constraints(query);
        ReducedQuery {
            constraints: ConstraintSet::from_simplified(required),
            expr: query.expr.clone(),
        }
    }

    fn query(&self) -> Query<'_> {
        Query::new(&self.constraints, self.expr.clone())
    }
}

pub struct CexCachingSolver {
    config: CexCacheConfig,
    stats: CexCacheStats,
    quick_cache: HashMap<CacheKey, CacheValue>,
    cache: MapOfSets<ExprRef, CacheValue>,
    backend: Box<dyn SolverBackend>,
    // Declared last: the cache tables above drop first, then the backend,
    // then the interned assignments they referenced.
    assignments: BTreeSet<Arc<Assignment>>,
}

impl CexCachingSolver {
    pub fn new(backend: Box<dyn SolverBackend>) -> Self {
        Self::with_config(backend, CexCacheConfig::default())
    }

    pub fn with_config(backend: Box<dyn SolverBackend>, config: CexCacheConfig) -> Self {
        CexCachingSolver {
            config,
            stats: CexCacheStats::default(),
            quick_cache: HashMap::new(),
            cache: MapOfSets::new(),
            backend,
            assignments: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &CexCacheConfig {
        &self.config
    }

    pub fn stats(&self) -> CexCacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of distinct assignments interned; equal assignments share one
    /// entry.
    pub fn interned_assignment_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn set_core_solver_timeout(&mut self, seconds: f64) {
        self.backend.set_timeout(seconds);
    }

    pub fn operation_status_code(&self) -> SolverRunStatus {
        self.backend.status()
    }

    /// Is `(AND constraints) ⇒ expr` valid?
    pub fn compute_truth(&mut self, query: &Query<'_>) -> Result<bool> {
        let reduced = ReducedQuery::of(query);
        let query = reduced.query();

        if self.config.experimental {
            // If the negated query is already known unsatisfiable the
            // constraints force the expression false; report it the way the
            // callers of this speculative probe expect, as a failure.
            let negated = query.negate_expr();
            let (_, found) = self.lookup_assignment(&negated)?;
            if let Some(None) = found {
                return Err(SolverError::Aborted(
                    "negated query cached unsatisfiable".into(),
                ));
            }
        }

        let assignment = self.get_assignment(&query)?;
        Ok(assignment.is_none())
    }

    pub fn compute_validity(&mut self, query: &Query<'_>) -> Result<Validity> {
        let reduced = ReducedQuery::of(query);
        let query = reduced.query();

        let assignment = self
            .get_assignment(&query.with_false())?
            .expect("computeValidity requires a satisfying assignment for the path constraints");
        let value = assignment.evaluate(&query.expr);
        assert!(
            value.is_constant(),
            "assignment evaluation did not result in constant"
        );
        if value.is_true() {
            let a = self.get_assignment(&query)?;
            Ok(if a.is_none() { Validity::True } else { Validity::Unknown })
        } else {
            let a = self.get_assignment(&query.negate_expr())?;
            Ok(if a.is_none() { Validity::False } else { Validity::Unknown })
        }
    }

    /// Concrete value of `query.expr` under some assignment satisfying the
    /// constraints.
    pub fn compute_value(&mut self, query: &Query<'_>) -> Result<ExprRef> {
        let reduced = ReducedQuery::of(query);
        let query = reduced.query();

        let assignment = self
            .get_assignment(&query.with_false())?
            .expect("computeValue requires a satisfying assignment for the path constraints");
        let value = assignment.evaluate(&query.expr);
        assert!(
            value.is_constant(),
            "assignment evaluation did not result in constant"
        );
        Ok(value)
    }

    /// Byte contents for each requested array under a counterexample of the
    /// query, or `None` when the query is valid. Unbound arrays yield zero
    /// vectors of their declared size. The query is deliberately not
    /// narrowed here: the witness must bind every requested object.
    pub fn compute_initial_values(
        &mut self,
        query: &Query<'_>,
        objects: &[ArrayRef],
    ) -> Result<Option<Vec<Vec<u8>>>> {
        let Some(assignment) = self.get_assignment(query)? else {
            return Ok(None);
        };
        let values = objects
            .iter()
            .map(|os| {
                assignment
                    .bindings()
                    .get(os)
                    .cloned()
                    .unwrap_or_else(|| vec![0u8; os.size() as usize])
            })
            .collect();
        Ok(Some(values))
    }

    fn intern(&mut self, assignment: Assignment) -> Arc<Assignment> {
        if let Some(existing) = self.assignments.get(&assignment) {
            return existing.clone();
        }
        let arc = Arc::new(assignment);
        self.assignments.insert(arc.clone());
        arc
    }

    fn get_from_quick_cache(&self, key: &CacheKey) -> Option<CacheValue> {
        self.quick_cache.get(key).cloned()
    }

    fn insert_in_quick_cache(&mut self, key: &CacheKey, binding: CacheValue) {
        self.quick_cache.insert(key.clone(), binding);
    }

    fn insert_in_caches(&mut self, key: &CacheKey, binding: CacheValue) {
        self.insert_in_quick_cache(key, binding.clone());
        self.cache.insert(&key.sorted(), binding);
    }

    /// Tier 2: reuse the previous query's answer when the current key
    /// extends it by exactly one conjunct.
    fn check_previous_solution(&self, query: &Query<'_>) -> PrevOutcome {
        if query.constraints.is_empty() {
            return PrevOutcome::Miss;
        }
        let n = query.constraints.len();
        let (parent_key, query_expr) = if let Some(c) = query.expr.as_constant() {
            assert_eq!(c, 0, "a constant query expression must be false");
            // The newest conjunct is the last constraint.
            let parent = CacheKey(query.constraints.iter().take(n - 1).cloned().collect());
            let newest = query
                .constraints
                .get(n - 1)
                .cloned()
                .expect("constraint store is non-empty here");
            (parent, Builder::is_zero(&newest))
        } else {
            (
                CacheKey::from_constraints(query.constraints),
                query.expr.clone(),
            )
        };

        let Some(value) = self.quick_cache.get(&parent_key) else {
            return PrevOutcome::Miss;
        };
        match value {
            // The parent key was UNSAT, so any superset of it is too.
            None => PrevOutcome::Hit(None),
            Some(parent) => {
                let neg = Builder::is_zero(&query_expr);
                let verdict = parent.evaluate(&neg);
                assert!(
                    verdict.is_constant(),
                    "assignment evaluation did not result in constant"
                );
                if verdict.is_true() {
                    PrevOutcome::Hit(Some(parent.clone()))
                } else {
                    PrevOutcome::Parent(parent.clone())
                }
            }
        }
    }

    /// Tier 3: exact, superset, then subset probes of the subsumption trie.
    fn search_for_assignment(&self, key: &CacheKey) -> Option<CacheValue> {
        let _t = TimerGuard::new(&self.stats.lookup_time_us);
        let sorted = key.sorted();

        if let Some(v) = self.cache.lookup(&sorted) {
            CexCacheStats::bump(&self.stats.ub_exact_hits);
            return Some(v.clone());
        }

        if self.config.try_all {
            let mut found = self.cache.find_superset(&sorted, |v| v.is_some());
            if found.is_none() {
                found = self.cache.find_subset(&sorted, |v| v.is_none());
            }
            if let Some(v) = found {
                CexCacheStats::bump(&self.stats.try_all_hits);
                return Some(v.clone());
            }
            // Last resort: maybe some interned assignment happens to
            // satisfy the key.
            for a in &self.assignments {
                if a.satisfies(key.iter()) {
                    CexCacheStats::bump(&self.stats.try_all_hits);
                    return Some(Some(a.clone()));
                }
            }
            return None;
        }

        let mut found: Option<&CacheValue> = None;
        if !self.config.disable_super_set {
            // An assignment satisfying a superset trivially satisfies the
            // key.
            found = self.cache.find_superset(&sorted, |v| v.is_some());
            if found.is_some() {
                CexCacheStats::bump(&self.stats.ub_superset_hits);
            }
        }
        if found.is_none() {
            // An unsatisfiable subset dooms the key; a satisfiable subset's
            // witness is worth a cheap re-validation.
            found = self.cache.find_subset(&sorted, |v| match v {
                None => true,
                Some(a) => a.satisfies(key.iter()),
            });
            if found.is_some() {
                CexCacheStats::bump(&self.stats.ub_subset_hits);
            }
        }
        found.cloned()
    }

    /// Optimistic split-and-graft. The unsafe footprint isolates the
    /// constraints sharing concrete indices with the query expression; a
    /// solution for just that factor is grafted onto the parent solution
    /// and kept only if the grafted whole verifies against the full query.
    fn guess_independent(
        &mut self,
        query: &Query<'_>,
        parent: &Arc<Assignment>,
    ) -> Result<Option<CacheValue>> {
        let (ies, unsafe_factor) = get_independent_constraints_unsafe(query);
        if unsafe_factor.len() == query.constraints.len() || ies.elements.is_empty() {
            return Ok(None);
        }
        tracing::debug!(
            factor = unsafe_factor.len(),
            total = query.constraints.len(),
            "guess-split attempting narrow sub-query"
        );

        // The factor constraints came out of an already-simplified store;
        // they are adopted as-is.
        let sub_constraints = ConstraintSet::from_simplified(unsafe_factor);
        let sub_query = Query::new(&sub_constraints, query.expr.clone());
        let Some(newest) = self.get_assignment(&sub_query)? else {
            // The narrow factor alone is unsatisfiable, so the whole key
            // is.
            return Ok(Some(None));
        };

        let Some(grafted) = Assignment::grafted(parent, &newest, &ies) else {
            return Ok(None);
        };
        let verdict = grafted.evaluate(&Builder::is_zero(&query.expr));
        assert!(
            verdict.is_constant(),
            "assignment evaluation did not result in constant"
        );
        if verdict.is_true() && grafted.satisfies(query.constraints.iter()) {
            Ok(Some(Some(self.intern(grafted))))
        } else {
            Ok(None)
        }
    }

    /// Probe every cache tier for `query`. Returns the key constructed for
    /// it and, on a hit, the cached value.
    fn lookup_assignment(&mut self, query: &Query<'_>) -> Result<(CacheKey, Option<CacheValue>)> {
        CexCacheStats::bump(&self.stats.queries);
        let mut key = CacheKey::from_constraints(query.constraints);
        // Canonicalize the query expression against the store so that
        // range-narrowed queries collapse before any table is touched.
        let expr = query.constraints.simplify(&query.expr);
        let neg = Builder::is_zero(&expr);
        if let Some(c) = neg.as_constant() {
            if c == 0 {
                // ¬expr simplified to false: the key cannot be satisfied
                // and the query is trivially valid.
                CexCacheStats::bump(&self.stats.hits);
                return Ok((key, Some(None)));
            }
            // ¬expr is constant true (expr is false): the key is just the
            // constraint set.
        } else {
            key.insert(neg);
        }

        let mut found: Option<CacheValue> = None;
        if self.config.quick_cache {
            if let Some(v) = self.get_from_quick_cache(&key) {
                CexCacheStats::bump(&self.stats.quick_hits);
                tracing::debug!(key_len = key.len(), "quick cache hit");
                found = Some(v);
            }
        }
        if found.is_none() && self.config.prev_solution {
            match self.check_previous_solution(query) {
                PrevOutcome::Hit(v) => {
                    CexCacheStats::bump(&self.stats.prev_hits);
                    tracing::debug!(key_len = key.len(), "previous solution reused");
                    self.insert_in_quick_cache(&key, v.clone());
                    found = Some(v);
                }
                PrevOutcome::Parent(parent) if self.config.guess_split => {
                    if let Some(v) = self.guess_independent(query, &parent)? {
                        CexCacheStats::bump(&self.stats.guess_hits);
                        tracing::debug!(key_len = key.len(), "guess-split graft verified");
                        self.insert_in_quick_cache(&key, v.clone());
                        found = Some(v);
                    }
                }
                _ => {}
            }
        }
        if found.is_none() {
            if let Some(v) = self.search_for_assignment(&key) {
                self.insert_in_quick_cache(&key, v.clone());
                found = Some(v);
            }
        }

        if found.is_some() {
            CexCacheStats::bump(&self.stats.hits);
        } else {
            CexCacheStats::bump(&self.stats.misses);
        }
        Ok((key, found))
    }

    /// Cached assignment for `query`, or the backend's answer on a miss.
    fn get_assignment(&mut self, query: &Query<'_>) -> Result<CacheValue> {
        let (key, found) = self.lookup_assignment(query)?;
        if let Some(v) = found {
            return Ok(v);
        }

        let objects = find_symbolic_objects(key.iter());
        CexCacheStats::bump(&self.stats.backend_queries);
        let values = {
            let _t = TimerGuard::new(&self.stats.backend_time_us);
            self.backend.compute_initial_values(query, &objects)
        };
        let values = match values {
            Ok(v) => v,
            Err(err) => {
                // Failures must not poison the cache.
                tracing::warn!(error = %err, "core solver failed; no cache entry installed");
                return Err(err);
            }
        };

        let binding: CacheValue = match values {
            Some(values) => {
                let arc = self.intern(Assignment::new(&objects, values));
                if self.config.debug_check_binding {
                    assert!(
                        arc.satisfies(key.iter()),
                        "fresh binding does not satisfy its key"
                    );
                }
                Some(arc)
            }
            None => None,
        };
        self.insert_in_caches(&key, binding.clone());
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ArrayRef;

    /// Backend that must never be reached.
    struct PanicBackend;

    impl SolverBackend for PanicBackend {
        fn compute_initial_values(
            &mut self,
            _query: &Query<'_>,
            _objects: &[ArrayRef],
        ) -> Result<Option<Vec<Vec<u8>>>> {
            panic!("backend must not be consulted");
        }
    }

    #[test]
    fn cache_key_hash_is_order_independent() {
        let a = ArrayRef::symbolic("a", 4);
        let e1 = Builder::ult(&Builder::read_at(&a, 0), &Builder::constant(5, 8));
        let e2 = Builder::ult(&Builder::read_at(&a, 1), &Builder::constant(7, 8));
        let k1 = CacheKey([e1.clone(), e2.clone()].into_iter().collect());
        let k2 = CacheKey([e2, e1].into_iter().collect());
        assert_eq!(k1, k2);
        let hash = |k: &CacheKey| {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            k.hash(&mut h);
            std::hash::Hasher::finish(&h)
        };
        assert_eq!(hash(&k1), hash(&k2));
    }

    #[test]
    fn trivially_valid_query_short_circuits() {
        let cs = ConstraintSet::new();
        let mut solver = CexCachingSolver::new(Box::new(PanicBackend));
        let query = Query::new(&cs, Builder::true_expr());
        assert!(solver.compute_truth(&query).unwrap());
        let snap = solver.stats();
        assert_eq!(snap.backend_queries, 0);
        assert_eq!(snap.hits, 1);
    }
}
