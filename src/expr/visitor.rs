//! Post-order expression rewriting.
//!
//! A rewriter inspects each node before and after its children are rebuilt
//! and can replace it wholesale. Rebuilding goes through the folding
//! constructors, so replacements trigger further simplification for free.

use std::collections::HashMap;

use super::{Builder, ExprKind, ExprRef, Update, UpdateList};

pub enum Action {
    ChangeTo(ExprRef),
    DoChildren,
    SkipChildren,
}

pub trait ExprRewriter {
    /// Called before descending into children.
    fn visit_expr(&mut self, _e: &ExprRef) -> Action {
        Action::DoChildren
    }

    /// Called after children have been rebuilt. `DoChildren` keeps the
    /// rebuilt node.
    fn visit_expr_post(&mut self, _e: &ExprRef) -> Action {
        Action::DoChildren
    }
}

/// Rewrite `e` bottom-up. With `use_cache` set, shared subtrees are visited
/// once; rewriters whose answers depend on context must leave it off.
pub fn rewrite(rewriter: &mut dyn ExprRewriter, e: &ExprRef, use_cache: bool) -> ExprRef {
    let mut memo: Option<HashMap<ExprRef, ExprRef>> = use_cache.then(HashMap::new);
    rewrite_inner(rewriter, e, &mut memo)
}

fn rewrite_inner(
    rewriter: &mut dyn ExprRewriter,
    e: &ExprRef,
    memo: &mut Option<HashMap<ExprRef, ExprRef>>,
) -> ExprRef {
    if let Some(cached) = memo.as_ref().and_then(|m| m.get(e)) {
        return cached.clone();
    }
    let result = match rewriter.visit_expr(e) {
        Action::ChangeTo(r) => r,
        Action::SkipChildren => e.clone(),
        Action::DoChildren => {
            let rebuilt = rebuild(rewriter, e, memo);
            match rewriter.visit_expr_post(&rebuilt) {
                Action::ChangeTo(r) => r,
                _ => rebuilt,
            }
        }
    };
    if let Some(m) = memo.as_mut() {
        m.insert(e.clone(), result.clone());
    }
    result
}

fn rebuild(
    rewriter: &mut dyn ExprRewriter,
    e: &ExprRef,
    memo: &mut Option<HashMap<ExprRef, ExprRef>>,
) -> ExprRef {
    match e.kind() {
        ExprKind::Constant(_) => e.clone(),
        ExprKind::Read { updates, index } => {
            let index = rewrite_inner(rewriter, index, memo);
            let writes: Vec<Update> = updates
                .writes
                .iter()
                .map(|w| Update {
                    index: rewrite_inner(rewriter, &w.index, memo),
                    value: rewrite_inner(rewriter, &w.value, memo),
                })
                .collect();
            let ul = UpdateList::with_writes(updates.root.clone(), writes);
            Builder::read(&ul, &index)
        }
        ExprKind::Select { cond, then, otherwise } => {
            let cond = rewrite_inner(rewriter, cond, memo);
            let then = rewrite_inner(rewriter, then, memo);
            let otherwise = rewrite_inner(rewriter, otherwise, memo);
            Builder::select(&cond, &then, &otherwise)
        }
        ExprKind::Concat { left, right } => {
            let left = rewrite_inner(rewriter, left, memo);
            let right = rewrite_inner(rewriter, right, memo);
            Builder::concat(&left, &right)
        }
        ExprKind::Extract { expr, offset } => {
            let width = e.width();
            let inner = rewrite_inner(rewriter, expr, memo);
            Builder::extract(&inner, *offset, width)
        }
        ExprKind::Not(inner) => Builder::not(&rewrite_inner(rewriter, inner, memo)),
        ExprKind::ZExt(inner) => {
            let width = e.width();
            Builder::zext(&rewrite_inner(rewriter, inner, memo), width)
        }
        ExprKind::SExt(inner) => {
            let width = e.width();
            Builder::sext(&rewrite_inner(rewriter, inner, memo), width)
        }
        ExprKind::And(l, r) => {
            let l = rewrite_inner(rewriter, l, memo);
            let r = rewrite_inner(rewriter, r, memo);
            Builder::and(&l, &r)
        }
        ExprKind::Or(l, r) => {
            let l = rewrite_inner(rewriter, l, memo);
            let r = rewrite_inner(rewriter, r, memo);
            Builder::or(&l, &r)
        }
        ExprKind::Xor(l, r) => {
            let l = rewrite_inner(rewriter, l, memo);
            let r = rewrite_inner(rewriter, r, memo);
            Builder::xor(&l, &r)
        }
        ExprKind::Add(l, r) => {
            let l = rewrite_inner(rewriter, l, memo);
            let r = rewrite_inner(rewriter, r, memo);
            Builder::add(&l, &r)
        }
        ExprKind::Sub(l, r) => {
            let l = rewrite_inner(rewriter, l, memo);
            let r = rewrite_inner(rewriter, r, memo);
            Builder::sub(&l, &r)
        }
        ExprKind::Mul(l, r) => {
            let l = rewrite_inner(rewriter, l, memo);
            let r = rewrite_inner(rewriter, r, memo);
            Builder::mul(&l, &r)
        }
        ExprKind::Eq(l, r) => {
            let l = rewrite_inner(rewriter, l, memo);
            let r = rewrite_inner(rewriter, r, memo);
            Builder::eq(&l, &r)
        }
        ExprKind::Ult(l, r) => {
            let l = rewrite_inner(rewriter, l, memo);
            let r = rewrite_inner(rewriter, r, memo);
            Builder::ult(&l, &r)
        }
        ExprKind::Ule(l, r) => {
            let l = rewrite_inner(rewriter, l, memo);
            let r = rewrite_inner(rewriter, r, memo);
            Builder::ule(&l, &r)
        }
        ExprKind::Slt(l, r) => {
            let l = rewrite_inner(rewriter, l, memo);
            let r = rewrite_inner(rewriter, r, memo);
            Builder::slt(&l, &r)
        }
        ExprKind::Sle(l, r) => {
            let l = rewrite_inner(rewriter, l, memo);
            let r = rewrite_inner(rewriter, r, memo);
            Builder::sle(&l, &r)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ArrayRef;

    struct Replace {
        src: ExprRef,
        dst: ExprRef,
    }

    impl ExprRewriter for Replace {
        fn visit_expr_post(&mut self, e: &ExprRef) -> Action {
            if *e == self.src {
                Action::ChangeTo(self.dst.clone())
            } else {
                Action::DoChildren
            }
        }
    }

    #[test]
    fn post_order_replacement_folds_parents() {
        let a = ArrayRef::symbolic("a", 4);
        let x = Builder::read_at(&a, 0);
        let lt = Builder::ult(&x, &Builder::constant(10, 8));
        let mut r = Replace {
            src: x.clone(),
            dst: Builder::constant(3, 8),
        };
        let rewritten = rewrite(&mut r, &lt, true);
        assert!(rewritten.is_true());
    }

    #[test]
    fn skip_children_leaves_subtree_untouched() {
        struct SkipAll;
        impl ExprRewriter for SkipAll {
            fn visit_expr(&mut self, _e: &ExprRef) -> Action {
                Action::SkipChildren
            }
        }
        let a = ArrayRef::symbolic("a", 4);
        let e = Builder::ult(&Builder::read_at(&a, 0), &Builder::constant(10, 8));
        assert_eq!(rewrite(&mut SkipAll, &e, true), e);
    }
}
