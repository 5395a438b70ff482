//! Concrete array assignments and evaluation under them.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::expr::visitor::{rewrite, Action, ExprRewriter};
use crate::expr::{ArrayRef, Builder, ExprKind, ExprRef};
use crate::solver::independence::IndependentElementSet;

/// A mapping from arrays to concrete byte contents. Immutable once
/// published; the cache interns these so pointer equality is value
/// equality.
#[derive(Debug, Clone)]
pub struct Assignment {
    allow_free: bool,
    bindings: BTreeMap<ArrayRef, Vec<u8>>,
}

impl Assignment {
    pub fn empty(allow_free: bool) -> Self {
        Assignment {
            allow_free,
            bindings: BTreeMap::new(),
        }
    }

    pub fn new(objects: &[ArrayRef], values: Vec<Vec<u8>>) -> Self {
        debug_assert_eq!(objects.len(), values.len());
        let bindings = objects.iter().cloned().zip(values).collect();
        Assignment {
            allow_free: false,
            bindings,
        }
    }

    pub fn bindings(&self) -> &BTreeMap<ArrayRef, Vec<u8>> {
        &self.bindings
    }

    /// Overwrite selected parts of `existing` with `overwriting`, at
    /// exactly the concrete indices the footprint names. Returns `None`
    /// when `overwriting` lacks a binding the footprint requires, which
    /// means the sub-solution was not a full answer.
    pub fn grafted(
        existing: &Assignment,
        overwriting: &Assignment,
        ies: &IndependentElementSet,
    ) -> Option<Assignment> {
        let mut bindings = existing.bindings.clone();
        for (array, indices) in &ies.elements {
            let Some(new_bytes) = overwriting.bindings.get(array) else {
                debug_assert!(false, "sub-solution did not bind array {}", array.name());
                return None;
            };
            match bindings.get_mut(array) {
                Some(old_bytes) => {
                    for i in indices.iter() {
                        let i = i as usize;
                        if i < old_bytes.len() && i < new_bytes.len() {
                            old_bytes[i] = new_bytes[i];
                        }
                    }
                }
                None => {
                    bindings.insert(array.clone(), new_bytes.clone());
                }
            }
        }
        Some(Assignment {
            allow_free: false,
            bindings,
        })
    }

    /// Value of `array[index]`: the bound byte if present and in range,
    /// otherwise a free symbolic read when allowed, otherwise zero.
    pub fn evaluate_index(&self, array: &ArrayRef, index: u32) -> ExprRef {
        if let Some(bytes) = self.bindings.get(array) {
            if let Some(&b) = bytes.get(index as usize) {
                return Builder::constant(b as u64, array.range_width());
            }
        }
        if self.allow_free {
            Builder::read_at(array, index)
        } else {
            Builder::constant(0, array.range_width())
        }
    }

    /// Substitute bound reads and constant-fold.
    pub fn evaluate(&self, e: &ExprRef) -> ExprRef {
        rewrite(&mut AssignmentEvaluator { assignment: self }, e, true)
    }

    /// True iff every expression evaluates to constant true.
    pub fn satisfies<'a>(&self, exprs: impl IntoIterator<Item = &'a ExprRef>) -> bool {
        exprs.into_iter().all(|e| self.evaluate(e).is_true())
    }
}

impl PartialEq for Assignment {
    fn eq(&self, other: &Self) -> bool {
        self.bindings == other.bindings
    }
}

impl Eq for Assignment {}

impl PartialOrd for Assignment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Assignment {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lexicographic over bindings; the interning table's order.
        self.bindings.cmp(&other.bindings)
    }
}

struct AssignmentEvaluator<'a> {
    assignment: &'a Assignment,
}

impl ExprRewriter for AssignmentEvaluator<'_> {
    fn visit_expr_post(&mut self, e: &ExprRef) -> Action {
        // Children are already rebuilt, so any resolvable update list has
        // collapsed; what is left is a direct read of the root array.
        if let ExprKind::Read { updates, index } = e.kind() {
            if updates.writes.is_empty() {
                if let Some(idx) = index.as_constant() {
                    return Action::ChangeTo(
                        self.assignment.evaluate_index(&updates.root, idx as u32),
                    );
                }
            }
        }
        Action::DoChildren
    }
}
