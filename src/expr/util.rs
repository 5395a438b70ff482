//! Traversal helpers over expression DAGs.

use std::collections::HashSet;

use super::{ArrayRef, ExprKind, ExprRef};

/// Collect every `Read` in `e`, in first-visit order. With `visit_updates`
/// set, index and value expressions inside update lists are traversed too.
pub fn find_reads(e: &ExprRef, visit_updates: bool) -> Vec<ExprRef> {
    let mut reads = Vec::new();
    let mut visited = HashSet::new();
    walk(e, visit_updates, &mut visited, &mut reads);
    reads
}

fn walk(e: &ExprRef, visit_updates: bool, visited: &mut HashSet<ExprRef>, reads: &mut Vec<ExprRef>) {
    if !visited.insert(e.clone()) {
        return;
    }
    match e.kind() {
        ExprKind::Constant(_) => {}
        ExprKind::Read { updates, index } => {
            reads.push(e.clone());
            walk(index, visit_updates, visited, reads);
            if visit_updates {
                for w in updates.writes.iter() {
                    walk(&w.index, visit_updates, visited, reads);
                    walk(&w.value, visit_updates, visited, reads);
                }
            }
        }
        ExprKind::Select { cond, then, otherwise } => {
            walk(cond, visit_updates, visited, reads);
            walk(then, visit_updates, visited, reads);
            walk(otherwise, visit_updates, visited, reads);
        }
        ExprKind::Concat { left, right } => {
            walk(left, visit_updates, visited, reads);
            walk(right, visit_updates, visited, reads);
        }
        ExprKind::Extract { expr, .. } => walk(expr, visit_updates, visited, reads),
        ExprKind::Not(inner) | ExprKind::ZExt(inner) | ExprKind::SExt(inner) => {
            walk(inner, visit_updates, visited, reads)
        }
        ExprKind::And(l, r)
        | ExprKind::Or(l, r)
        | ExprKind::Xor(l, r)
        | ExprKind::Add(l, r)
        | ExprKind::Sub(l, r)
        | ExprKind::Mul(l, r)
        | ExprKind::Eq(l, r)
        | ExprKind::Ult(l, r)
        | ExprKind::Ule(l, r)
        | ExprKind::Slt(l, r)
        | ExprKind::Sle(l, r) => {
            walk(l, visit_updates, visited, reads);
            walk(r, visit_updates, visited, reads);
        }
    }
}

/// Distinct symbolic root arrays referenced by the expressions, in
/// first-encounter order. Constant arrays are never symbolic objects.
pub fn find_symbolic_objects<'a>(exprs: impl IntoIterator<Item = &'a ExprRef>) -> Vec<ArrayRef> {
    let mut seen = HashSet::new();
    let mut objects = Vec::new();
    for e in exprs {
        for read in find_reads(e, true) {
            if let ExprKind::Read { updates, .. } = read.kind() {
                let root = &updates.root;
                if !root.is_constant_array() && seen.insert(root.id()) {
                    objects.push(root.clone());
                }
            }
        }
    }
    objects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Builder, Update, UpdateList};

    #[test]
    fn finds_reads_inside_update_lists() {
        let a = ArrayRef::symbolic("a", 4);
        let b = ArrayRef::symbolic("b", 4);
        let write_idx = Builder::zext(&Builder::read_at(&b, 0), 32);
        let ul = UpdateList::with_writes(
            a.clone(),
            vec![Update { index: write_idx, value: Builder::constant(1, 8) }],
        );
        let read = Builder::read(&ul, &Builder::constant(2, 32));
        let reads = find_reads(&read, true);
        assert_eq!(reads.len(), 2);
        let shallow = find_reads(&read, false);
        assert_eq!(shallow.len(), 1);
    }

    #[test]
    fn symbolic_objects_skip_constant_arrays() {
        let a = ArrayRef::symbolic("a", 4);
        let k = ArrayRef::constant("k", vec![0, 1]);
        // Reading k at a symbolic index keeps the read alive.
        let idx = Builder::zext(&Builder::read_at(&a, 0), 32);
        let read_k = Builder::read(&UpdateList::new(k.clone()), &idx);
        let e = Builder::eq(&read_k, &Builder::constant(1, 8));
        let objects = find_symbolic_objects([&e]);
        assert_eq!(objects, vec![a]);
    }
}
