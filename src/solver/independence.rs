//! Read-footprint analysis and constraint independence.
//!
//! An [`IndependentElementSet`] records which arrays, and which concrete
//! indices of them, a set of expressions touches. An array read at a
//! symbolic index is "collapsed": the whole object counts as touched and the
//! array never returns to per-index tracking.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::expr::util::find_reads;
use crate::expr::{ArrayRef, Builder, ExprKind, ExprRef};
use crate::solver::index_set::IndexSet;
use crate::solver::Query;

#[derive(Debug, Clone, Default)]
pub struct IndependentElementSet {
    /// Per-array concrete indices touched.
    pub elements: BTreeMap<ArrayRef, IndexSet>,
    /// Arrays read at a symbolic index.
    pub whole_objects: BTreeSet<ArrayRef>,
    /// The expressions that contributed to this footprint.
    pub exprs: Vec<ExprRef>,
}

impl IndependentElementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_expr(e: &ExprRef) -> Self {
        let mut ies = IndependentElementSet {
            exprs: vec![e.clone()],
            ..Default::default()
        };
        for read in find_reads(e, true) {
            let ExprKind::Read { updates, index } = read.kind() else {
                continue;
            };
            let root = &updates.root;
            // Reads of an unwritten constant array cannot alias anything.
            if root.is_constant_array() && updates.writes.is_empty() {
                continue;
            }
            if ies.whole_objects.contains(root) {
                continue;
            }
            if let Some(c) = index.as_constant() {
                ies.elements.entry(root.clone()).or_default().add(c as u32);
            } else {
                ies.elements.remove(root);
                ies.whole_objects.insert(root.clone());
            }
        }
        ies.check_disjoint();
        ies
    }

    fn check_disjoint(&self) {
        debug_assert!(
            self.elements.keys().all(|a| !self.whole_objects.contains(a)),
            "array tracked both per-index and as a whole object"
        );
    }

    /// Sound intersection test; more efficient when self is the smaller set.
    pub fn intersects(&self, b: &IndependentElementSet) -> bool {
        for array in &self.whole_objects {
            if b.whole_objects.contains(array) || b.elements.contains_key(array) {
                return true;
            }
        }
        for (array, indices) in &self.elements {
            if b.whole_objects.contains(array) {
                return true;
            }
            if let Some(other) = b.elements.get(array) {
                if indices.intersects(other) {
                    return true;
                }
            }
        }
        false
    }

    /// Intersection through concrete indices only; whole objects are
    /// ignored. Not a sound independence test on its own; callers must verify any
    /// result built on it against the full evaluator.
    pub fn intersects_unsafe(&self, b: &IndependentElementSet) -> bool {
        for (array, indices) in &self.elements {
            if let Some(other) = b.elements.get(array) {
                if indices.intersects(other) {
                    return true;
                }
            }
        }
        false
    }

    /// Merge `b` into self; true iff the footprint changed. Expressions are
    /// always appended.
    pub fn add(&mut self, b: &IndependentElementSet) -> bool {
        self.exprs.extend(b.exprs.iter().cloned());

        let mut modified = false;
        for array in &b.whole_objects {
            if self.elements.remove(array).is_some() {
                modified = true;
                self.whole_objects.insert(array.clone());
            } else if self.whole_objects.insert(array.clone()) {
                modified = true;
            }
        }
        for (array, indices) in &b.elements {
            if self.whole_objects.contains(array) {
                continue;
            }
            match self.elements.get_mut(array) {
                Some(mine) => {
                    if mine.add_set(indices) {
                        modified = true;
                    }
                }
                None => {
                    self.elements.insert(array.clone(), indices.clone());
                    modified = true;
                }
            }
        }
        self.check_disjoint();
        modified
    }

    /// Every array touched, whether per-index or as a whole object.
    pub fn array_references(&self) -> Vec<ArrayRef> {
        let mut seen: BTreeSet<ArrayRef> = self.elements.keys().cloned().collect();
        seen.extend(self.whole_objects.iter().cloned());
        seen.into_iter().collect()
    }
}

impl fmt::Display for IndependentElementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for array in &self.whole_objects {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "MO{}", array.name())?;
        }
        for (array, indices) in &self.elements {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "MO{} : {}", array.name(), indices)?;
        }
        write!(f, "}}")
    }
}

/// Compute the closure of constraints relevant to `query.expr`. Returns the
/// closure footprint and, in input order, the constraints absorbed into it;
/// the remaining constraints are provably independent of the query.
pub fn get_independent_constraints(query: &Query<'_>) -> (IndependentElementSet, Vec<ExprRef>) {
    worklist_closure(query, IndependentElementSet::intersects)
}

/// Heuristic variant of [`get_independent_constraints`] built on
/// [`IndependentElementSet::intersects_unsafe`]. Only suitable for
/// optimizations that re-verify their result.
pub fn get_independent_constraints_unsafe(
    query: &Query<'_>,
) -> (IndependentElementSet, Vec<ExprRef>) {
    worklist_closure(query, IndependentElementSet::intersects_unsafe)
}

fn worklist_closure(
    query: &Query<'_>,
    intersects: fn(&IndependentElementSet, &IndependentElementSet) -> bool,
) -> (IndependentElementSet, Vec<ExprRef>) {
    let mut closure = IndependentElementSet::from_expr(&query.expr);
    let mut worklist: Vec<(ExprRef, IndependentElementSet)> = query
        .constraints
        .iter()
        .map(|c| (c.clone(), IndependentElementSet::from_expr(c)))
        .collect();
    let mut required = Vec::new();

    let mut done = false;
    while !done {
        done = true;
        let mut next = Vec::with_capacity(worklist.len());
        for (constraint, ies) in worklist {
            if intersects(&ies, &closure) {
                if closure.add(&ies) {
                    done = false;
                }
                required.push(constraint);
            } else {
                next.push((constraint, ies));
            }
        }
        worklist = next;
    }

    tracing::debug!(
        closure = %closure,
        required = required.len(),
        dropped = query.constraints.len() - required.len(),
        "independence closure"
    );
    (closure, required)
}

/// Partition the query into its independent factors: maximal groups of
/// constraints connected under [`IndependentElementSet::intersects`]. A
/// non-constant query expression seeds a factor through its negation; a
/// constant expression must be false and contributes nothing.
pub fn get_all_factors(query: &Query<'_>) -> Vec<IndependentElementSet> {
    let mut work: VecDeque<IndependentElementSet> = VecDeque::new();
    if let Some(c) = query.expr.as_constant() {
        assert_eq!(c, 0, "a constant query expression must be false");
    } else {
        work.push_back(IndependentElementSet::from_expr(&Builder::is_zero(&query.expr)));
    }
    for constraint in query.constraints.iter() {
        work.push_back(IndependentElementSet::from_expr(constraint));
    }

    // Fuse until a full pass changes no footprint. Queue order keeps the
    // result deterministic for a given input sequence.
    loop {
        let mut done = true;
        let mut finished: Vec<IndependentElementSet> = Vec::new();
        while let Some(mut current) = work.pop_front() {
            let mut keep = VecDeque::new();
            while let Some(compare) = work.pop_front() {
                if current.intersects(&compare) {
                    if current.add(&compare) {
                        done = false;
                    }
                } else {
                    keep.push_back(compare);
                }
            }
            finished.push(current);
            work = keep;
        }
        if done {
            return finished;
        }
        work = finished.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::constraints::ConstraintSet;

    fn lt(l: &ExprRef, r: &ExprRef) -> ExprRef {
        Builder::ult(l, r)
    }

    #[test]
    fn symbolic_index_promotes_to_whole_object() {
        let a = ArrayRef::symbolic("a", 4);
        let b = ArrayRef::symbolic("b", 4);
        let sym_idx = Builder::zext(&Builder::read_at(&b, 0), 32);
        let read = Builder::read(&crate::expr::UpdateList::new(a.clone()), &sym_idx);
        let e = lt(&read, &Builder::constant(9, 8));
        let ies = IndependentElementSet::from_expr(&e);
        assert!(ies.whole_objects.contains(&a));
        assert!(!ies.elements.contains_key(&a));
        assert!(ies.elements.contains_key(&b));
    }

    #[test]
    fn whole_object_never_returns_to_elements() {
        let a = ArrayRef::symbolic("a", 4);
        let b = ArrayRef::symbolic("b", 4);
        let sym_idx = Builder::zext(&Builder::read_at(&b, 0), 32);
        let sym_read = Builder::read(&crate::expr::UpdateList::new(a.clone()), &sym_idx);
        let mut ies = IndependentElementSet::from_expr(&lt(&sym_read, &Builder::constant(9, 8)));
        let concrete = IndependentElementSet::from_expr(&lt(
            &Builder::read_at(&a, 1),
            &Builder::constant(3, 8),
        ));
        ies.add(&concrete);
        assert!(ies.whole_objects.contains(&a));
        assert!(!ies.elements.contains_key(&a));
    }

    #[test]
    fn unsafe_intersection_ignores_whole_objects() {
        let a = ArrayRef::symbolic("a", 4);
        let b = ArrayRef::symbolic("b", 4);
        let sym_idx = Builder::zext(&Builder::read_at(&b, 0), 32);
        let whole = IndependentElementSet::from_expr(&lt(
            &Builder::read(&crate::expr::UpdateList::new(a.clone()), &sym_idx),
            &Builder::constant(9, 8),
        ));
        let concrete = IndependentElementSet::from_expr(&lt(
            &Builder::read_at(&a, 1),
            &Builder::constant(3, 8),
        ));
        assert!(whole.intersects(&concrete));
        assert!(!whole.intersects_unsafe(&concrete));
        // Shared concrete indices do intersect either way.
        let concrete2 = IndependentElementSet::from_expr(&lt(
            &Builder::constant(0, 8),
            &Builder::read_at(&a, 1),
        ));
        assert!(concrete.intersects_unsafe(&concrete2));
    }

    #[test]
    fn independent_constraints_drop_unrelated_arrays() {
        let a = ArrayRef::symbolic("a", 4);
        let b = ArrayRef::symbolic("b", 4);
        let mut cs = ConstraintSet::new();
        let a_lt = lt(&Builder::read_at(&a, 0), &Builder::constant(5, 8));
        let b_gt = lt(&Builder::constant(1, 8), &Builder::read_at(&b, 0));
        cs.add(a_lt.clone());
        cs.add(b_gt.clone());
        let expr = Builder::eq(&Builder::read_at(&a, 0), &Builder::constant(3, 8));
        let query = Query::new(&cs, expr);
        let (closure, required) = get_independent_constraints(&query);
        assert_eq!(required, vec![a_lt]);
        assert_eq!(closure.array_references(), vec![a]);
    }

    #[test]
    fn factors_partition_constraints() {
        let a = ArrayRef::symbolic("a", 4);
        let b = ArrayRef::symbolic("b", 4);
        let mut cs = ConstraintSet::new();
        let c1 = lt(&Builder::read_at(&a, 0), &Builder::constant(5, 8));
        let c2 = lt(&Builder::read_at(&a, 0), &Builder::constant(7, 8));
        let c3 = lt(&Builder::constant(1, 8), &Builder::read_at(&b, 2));
        cs.add(c1.clone());
        cs.add(c2.clone());
        cs.add(c3.clone());
        let query = Query::new(&cs, Builder::false_expr());
        let factors = get_all_factors(&query);
        assert_eq!(factors.len(), 2);
        let total: usize = factors.iter().map(|f| f.exprs.len()).sum();
        assert_eq!(total, 3);
        for (i, f) in factors.iter().enumerate() {
            for g in factors.iter().skip(i + 1) {
                assert!(!f.intersects(g), "factors must be independent");
            }
        }
    }

    #[test]
    fn transitive_chains_fuse_into_one_factor() {
        // a[0]=b[0] and b[0]=c[0] must land in the same factor even though
        // a and c never appear together.
        let a = ArrayRef::symbolic("a", 2);
        let b = ArrayRef::symbolic("b", 2);
        let c = ArrayRef::symbolic("c", 2);
        let mut cs = ConstraintSet::new();
        let ab = Builder::eq(&Builder::read_at(&a, 0), &Builder::read_at(&b, 0));
        let bc = Builder::eq(&Builder::read_at(&b, 0), &Builder::read_at(&c, 0));
        cs.add(ab);
        cs.add(bc);
        let query = Query::new(&cs, Builder::false_expr());
        let factors = get_all_factors(&query);
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[0].array_references().len(), 3);
    }
}
