//! Ordered path-condition store with expression simplification.
//!
//! The store keeps every constraint in insertion order (modulo rewrites) and
//! mines the accumulated equalities and inequalities to rewrite incoming
//! expressions. Range narrowing turns a pair like `5 < x, x < 7` into the
//! equality `x = 6`, which then concretizes any expression mentioning `x`.

use std::collections::HashMap;

use crate::expr::visitor::{rewrite, Action, ExprRewriter};
use crate::expr::{Builder, ExprKind, ExprRef};

/// Whole-expression replacement of `src` by `dst`, applied before and after
/// children are rebuilt.
struct ReplaceVisitor {
    src: ExprRef,
    dst: ExprRef,
}

impl ExprRewriter for ReplaceVisitor {
    fn visit_expr(&mut self, e: &ExprRef) -> Action {
        if *e == self.src {
            Action::ChangeTo(self.dst.clone())
        } else {
            Action::DoChildren
        }
    }

    fn visit_expr_post(&mut self, e: &ExprRef) -> Action {
        if *e == self.src {
            Action::ChangeTo(self.dst.clone())
        } else {
            Action::DoChildren
        }
    }
}

/// Post-order substitution from a replacement map; safe to memoize.
struct ReplaceMapVisitor<'a> {
    replacements: &'a HashMap<ExprRef, ExprRef>,
}

impl ExprRewriter for ReplaceMapVisitor<'_> {
    fn visit_expr_post(&mut self, e: &ExprRef) -> Action {
        match self.replacements.get(e) {
            Some(dst) => Action::ChangeTo(dst.clone()),
            None => Action::DoChildren,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpKind {
    Ult,
    Ule,
    Slt,
    Sle,
}

impl CmpKind {
    /// Strictness flip used when a comparison sits under a top-level
    /// negation: `¬(a < b)` is `b ≤ a`.
    fn flipped(self) -> Self {
        match self {
            CmpKind::Ult => CmpKind::Ule,
            CmpKind::Ule => CmpKind::Ult,
            CmpKind::Slt => CmpKind::Sle,
            CmpKind::Sle => CmpKind::Slt,
        }
    }

    fn is_signed(self) -> bool {
        matches!(self, CmpKind::Slt | CmpKind::Sle)
    }

    fn is_strict(self) -> bool {
        matches!(self, CmpKind::Ult | CmpKind::Slt)
    }
}

fn to_signed(value: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Keep the larger (tighter) lower bound.
fn insert_left_bound(map: &mut HashMap<ExprRef, u64>, key: &ExprRef, value: u64) {
    let slot = map.entry(key.clone()).or_insert(value);
    if *slot < value {
        *slot = value;
    }
}

/// Keep the smaller (tighter) upper bound.
fn insert_right_bound(map: &mut HashMap<ExprRef, u64>, key: &ExprRef, value: u64) {
    let slot = map.entry(key.clone()).or_insert(value);
    if *slot > value {
        *slot = value;
    }
}

#[derive(Debug, Clone)]
pub struct ConstraintSet {
    constraints: Vec<ExprRef>,
    simplify_inequalities: bool,
}

impl Default for ConstraintSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintSet {
    pub fn new() -> Self {
        ConstraintSet {
            constraints: Vec::new(),
            simplify_inequalities: crate::solver::config::simplify_inequalities_default(),
        }
    }

    pub fn with_simplify_inequalities(simplify_inequalities: bool) -> Self {
        ConstraintSet {
            constraints: Vec::new(),
            simplify_inequalities,
        }
    }

    /// Adopt constraints that are already in simplified form, without
    /// running them through the rewriting pipeline again.
    pub fn from_simplified(constraints: Vec<ExprRef>) -> Self {
        ConstraintSet {
            constraints,
            simplify_inequalities: crate::solver::config::simplify_inequalities_default(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExprRef> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&ExprRef> {
        self.constraints.get(i)
    }

    /// Add a constraint, simplifying it against the store first. Asserting a
    /// constant-false constraint is a precondition violation and panics.
    pub fn add(&mut self, e: ExprRef) {
        let e = self.simplify(&e);
        self.add_internal(e);
    }

    fn add_internal(&mut self, e: ExprRef) {
        match e.kind() {
            ExprKind::Constant(_) => {
                assert!(e.is_true(), "attempt to add invalid (false) constraint");
            }
            // Split conjunctions to enable finer-grained independence.
            ExprKind::And(l, r) => {
                let (l, r) = (l.clone(), r.clone());
                self.add_internal(l);
                self.add_internal(r);
            }
            ExprKind::Eq(l, r) if l.is_constant() => {
                // A concretization: substitute it through everything we
                // already hold, re-adding whatever changed.
                let mut visitor = ReplaceVisitor {
                    src: r.clone(),
                    dst: l.clone(),
                };
                self.rewrite_constraints(&mut visitor);
                self.constraints.push(e);
            }
            _ => self.constraints.push(e),
        }
    }

    fn rewrite_constraints(&mut self, visitor: &mut dyn ExprRewriter) -> bool {
        let old = std::mem::take(&mut self.constraints);
        let mut changed = false;
        for ce in old {
            let e = rewrite(visitor, &ce, false);
            if e != ce {
                // Feed it back through insertion to enable further
                // reductions.
                changed = true;
                self.add_internal(e);
            } else {
                self.constraints.push(ce);
            }
        }
        changed
    }

    /// Rewrite `e` using information already implied by the store: known
    /// equalities, constraints that must hold (map to true), and variable
    /// ranges that inequalities pin to a single value.
    pub fn simplify(&self, e: &ExprRef) -> ExprRef {
        if e.is_constant() {
            return e.clone();
        }

        let mut equalities: HashMap<ExprRef, ExprRef> = HashMap::new();
        // Unsigned-space bounds a variable is known to satisfy. If the two
        // ever meet, the variable is concrete.
        let mut left_bounded: HashMap<ExprRef, u64> = HashMap::new();
        let mut right_bounded: HashMap<ExprRef, u64> = HashMap::new();

        for constraint in &self.constraints {
            let mut top_false = false;
            let mut expr = constraint.clone();
            if let ExprKind::Eq(l, r) = constraint.kind() {
                if l.is_constant() {
                    equalities.insert(r.clone(), l.clone());
                } else {
                    // Equality between two complex operations: only useful
                    // on a complete match.
                    equalities.insert(constraint.clone(), Builder::true_expr());
                }
                if l.is_false() && !matches!(r.kind(), ExprKind::Eq(..)) {
                    // (= false (op ...)): the negated operation may still
                    // carry range information.
                    expr = r.clone();
                    top_false = true;
                } else {
                    continue;
                }
            } else {
                equalities.insert(constraint.clone(), Builder::true_expr());
            }

            if !self.simplify_inequalities {
                continue;
            }
            let (kind, raw_left, raw_right) = match expr.kind() {
                ExprKind::Ult(l, r) => (CmpKind::Ult, l.clone(), r.clone()),
                ExprKind::Ule(l, r) => (CmpKind::Ule, l.clone(), r.clone()),
                ExprKind::Slt(l, r) => (CmpKind::Slt, l.clone(), r.clone()),
                ExprKind::Sle(l, r) => (CmpKind::Sle, l.clone(), r.clone()),
                _ => continue,
            };
            // Under a top-level negation, drop the negation by flipping the
            // strictness and swapping the operands.
            let (kind, left, right) = if top_false {
                (kind.flipped(), raw_right, raw_left)
            } else {
                (kind, raw_left, raw_right)
            };
            let width = left.width();

            if kind.is_strict() {
                if let Some(rv) = right.as_constant() {
                    // x < c, recorded as x <= c-1.
                    let bound = rv.wrapping_sub(1) & width_mask(width);
                    if kind.is_signed() {
                        if to_signed(rv, width) < to_signed(bound, width) {
                            panic!("strict signed bound adjustment overflowed");
                        }
                        if to_signed(bound, width) >= 0 {
                            // The range straddles the signed-zero boundary;
                            // representing it needs a disjunction.
                            continue;
                        }
                    } else if rv < bound {
                        panic!("strict unsigned bound adjustment overflowed");
                    }
                    insert_right_bound(&mut right_bounded, &left, bound);
                    insert_left_bound(&mut left_bounded, &left, 0);
                } else if let Some(lv) = left.as_constant() {
                    // c < x, recorded as c+1 <= x.
                    let bound = lv.wrapping_add(1) & width_mask(width);
                    if kind.is_signed() {
                        if to_signed(bound, width) < to_signed(lv, width) {
                            panic!("strict signed bound adjustment overflowed");
                        }
                        if to_signed(bound, width) < 0 {
                            continue;
                        }
                    } else if bound < lv {
                        panic!("strict unsigned bound adjustment overflowed");
                    }
                    insert_left_bound(&mut left_bounded, &right, bound);
                }
            } else {
                if let Some(rv) = right.as_constant() {
                    // x <= c.
                    if kind.is_signed() && to_signed(rv, width) >= 0 {
                        continue;
                    }
                    insert_right_bound(&mut right_bounded, &left, rv);
                    insert_left_bound(&mut left_bounded, &left, 0);
                } else if let Some(lv) = left.as_constant() {
                    // c <= x.
                    if to_signed(lv, width) < 0 {
                        continue;
                    }
                    insert_left_bound(&mut left_bounded, &right, lv);
                }
            }
        }

        // A variable whose lower and upper bounds meet is a single value;
        // promote it to an equality so `e` can concretize.
        for (key, lv) in &left_bounded {
            if right_bounded.get(key) == Some(lv) {
                equalities.insert(key.clone(), Builder::constant(*lv, key.width()));
            }
        }

        rewrite(&mut ReplaceMapVisitor { replacements: &equalities }, e, true)
    }
}

impl PartialEq for ConstraintSet {
    fn eq(&self, other: &Self) -> bool {
        self.constraints == other.constraints
    }
}

impl Eq for ConstraintSet {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ArrayRef;

    fn byte(array: &ArrayRef, i: u32) -> ExprRef {
        Builder::read_at(array, i)
    }

    #[test]
    fn range_pair_concretizes_variable() {
        let a = ArrayRef::symbolic("a", 4);
        let x = byte(&a, 0);
        let mut cs = ConstraintSet::new();
        cs.add(Builder::ult(&Builder::constant(5, 8), &x));
        cs.add(Builder::ult(&x, &Builder::constant(7, 8)));
        assert_eq!(cs.simplify(&x).as_constant(), Some(6));
    }

    #[test]
    fn negated_inequality_flips_strictness() {
        let a = ArrayRef::symbolic("a", 4);
        let x = byte(&a, 0);
        let mut cs = ConstraintSet::new();
        // ¬(x < 6) == 6 <= x, and x <= 6 pins x to 6.
        cs.add(Builder::is_zero(&Builder::ult(&x, &Builder::constant(6, 8))));
        cs.add(Builder::ule(&x, &Builder::constant(6, 8)));
        assert_eq!(cs.simplify(&x).as_constant(), Some(6));
    }

    #[test]
    fn simplify_leaves_constants_alone() {
        let mut cs = ConstraintSet::new();
        let a = ArrayRef::symbolic("a", 4);
        cs.add(Builder::ult(&byte(&a, 0), &Builder::constant(9, 8)));
        let c = Builder::constant(42, 8);
        assert_eq!(cs.simplify(&c), c);
        let t = Builder::true_expr();
        assert_eq!(cs.simplify(&t), t);
    }

    #[test]
    fn add_is_idempotent_on_the_simplified_fixpoint() {
        let a = ArrayRef::symbolic("a", 4);
        let x = byte(&a, 0);
        let mut cs = ConstraintSet::new();
        let c = Builder::ult(&x, &Builder::constant(9, 8));
        cs.add(c.clone());
        let snapshot = cs.clone();
        cs.add(c);
        assert_eq!(cs, snapshot);

        let eq = Builder::eq(&Builder::constant(3, 8), &x);
        cs.add(eq.clone());
        let snapshot = cs.clone();
        cs.add(eq);
        assert_eq!(cs, snapshot);
    }

    #[test]
    fn equality_rewrites_existing_constraints() {
        let a = ArrayRef::symbolic("a", 4);
        let x = byte(&a, 0);
        let y = byte(&a, 1);
        let mut cs = ConstraintSet::new();
        cs.add(Builder::eq(&x, &y));
        // Concretizing x must concretize the earlier x=y into y=5.
        cs.add(Builder::eq(&Builder::constant(5, 8), &x));
        let simplified = cs.simplify(&y);
        assert_eq!(simplified.as_constant(), Some(5));
    }

    #[test]
    fn conjunctions_split_on_insert() {
        let a = ArrayRef::symbolic("a", 4);
        let l = Builder::ult(&byte(&a, 0), &Builder::constant(9, 8));
        let r = Builder::ult(&byte(&a, 1), &Builder::constant(7, 8));
        let mut cs = ConstraintSet::new();
        cs.add(Builder::and(&l, &r));
        assert_eq!(cs.len(), 2);
    }

    #[test]
    #[should_panic(expected = "attempt to add invalid (false) constraint")]
    fn contradictory_equalities_are_fatal() {
        let a = ArrayRef::symbolic("a", 4);
        let x = byte(&a, 0);
        let mut cs = ConstraintSet::new();
        cs.add(Builder::eq(&Builder::constant(1, 8), &x));
        cs.add(Builder::eq(&Builder::constant(2, 8), &x));
    }

    #[test]
    fn signed_range_straddling_zero_is_skipped() {
        let a = ArrayRef::symbolic("a", 4);
        let x = byte(&a, 0);
        let mut cs = ConstraintSet::new();
        // x <=s 3 crosses the signed-zero boundary: no bound is mined, so a
        // matching lower bound must not concretize x.
        cs.add(Builder::sle(&x, &Builder::constant(3, 8)));
        cs.add(Builder::ule(&Builder::constant(3, 8), &x));
        cs.add(Builder::ule(&x, &Builder::constant(3, 8)));
        assert_eq!(cs.simplify(&x).as_constant(), Some(3));
        // Purely signed pair around zero stays symbolic.
        let y = byte(&a, 1);
        let mut cs2 = ConstraintSet::new();
        cs2.add(Builder::sle(&y, &Builder::constant(2, 8)));
        cs2.add(Builder::slt(&Builder::constant(1, 8), &y));
        assert!(cs2.simplify(&y).as_constant().is_none());
    }
}
