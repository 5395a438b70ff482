//! Hash-consed symbolic expression model.
//!
//! Expressions are immutable DAG nodes interned in a process-wide table, so
//! structural equality is pointer equality and every node carries a
//! precomputed 64-bit content hash. Constructors constant-fold aggressively;
//! the cache layers rely on that folding to detect trivially-valid queries
//! and to evaluate expressions under concrete assignments.
//!
//! Canonical form: boolean negation is `Eq(false, e)` (there is no boolean
//! `Not` at the top level), `Eq` keeps a constant operand on the left, and
//! the only comparisons are `Ult`/`Ule`/`Slt`/`Sle`.

pub mod util;
pub mod visitor;

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

/// Bit width of an expression. Supported range is 1..=64.
pub type Width = u32;

pub const BOOL_WIDTH: Width = 1;

fn width_mask(width: Width) -> u64 {
    debug_assert!((1..=64).contains(&width), "unsupported width {width}");
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn to_signed(value: u64, width: Width) -> i64 {
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

static NEXT_ARRAY_ID: AtomicU64 = AtomicU64::new(1);

/// A symbolic byte array. Identity is the stable interning id; arrays are
/// never mutated after creation.
#[derive(Debug)]
pub struct Array {
    id: u64,
    name: String,
    size: u32,
    domain_width: Width,
    range_width: Width,
    constant_values: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct ArrayRef(Arc<Array>);

impl ArrayRef {
    /// A fresh symbolic array of `size` bytes (32-bit index domain, 8-bit
    /// byte range).
    pub fn symbolic(name: impl Into<String>, size: u32) -> Self {
        ArrayRef(Arc::new(Array {
            id: NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            size,
            domain_width: 32,
            range_width: 8,
            constant_values: None,
        }))
    }

    /// An array with fixed concrete contents.
    pub fn constant(name: impl Into<String>, values: Vec<u8>) -> Self {
        ArrayRef(Arc::new(Array {
            id: NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            size: values.len() as u32,
            domain_width: 32,
            range_width: 8,
            constant_values: Some(values),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn size(&self) -> u32 {
        self.0.size
    }

    pub fn domain_width(&self) -> Width {
        self.0.domain_width
    }

    pub fn range_width(&self) -> Width {
        self.0.range_width
    }

    pub fn is_constant_array(&self) -> bool {
        self.0.constant_values.is_some()
    }

    pub fn constant_values(&self) -> Option<&[u8]> {
        self.0.constant_values.as_deref()
    }
}

impl PartialEq for ArrayRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ArrayRef {}

impl PartialOrd for ArrayRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArrayRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl Hash for ArrayRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.id);
    }
}

/// A single symbolic write over an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Update {
    pub index: ExprRef,
    pub value: ExprRef,
}

/// An array plus its pending symbolic writes, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateList {
    pub root: ArrayRef,
    pub writes: Arc<Vec<Update>>,
}

impl UpdateList {
    pub fn new(root: ArrayRef) -> Self {
        UpdateList {
            root,
            writes: Arc::new(Vec::new()),
        }
    }

    pub fn with_writes(root: ArrayRef, writes: Vec<Update>) -> Self {
        UpdateList {
            root,
            writes: Arc::new(writes),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Constant(u64),
    Read { updates: UpdateList, index: ExprRef },
    Select { cond: ExprRef, then: ExprRef, otherwise: ExprRef },
    Concat { left: ExprRef, right: ExprRef },
    Extract { expr: ExprRef, offset: Width },
    Not(ExprRef),
    And(ExprRef, ExprRef),
    Or(ExprRef, ExprRef),
    Xor(ExprRef, ExprRef),
    Add(ExprRef, ExprRef),
    Sub(ExprRef, ExprRef),
    Mul(ExprRef, ExprRef),
    Eq(ExprRef, ExprRef),
    Ult(ExprRef, ExprRef),
    Ule(ExprRef, ExprRef),
    Slt(ExprRef, ExprRef),
    Sle(ExprRef, ExprRef),
    ZExt(ExprRef),
    SExt(ExprRef),
}

impl ExprKind {
    fn discriminant(&self) -> u8 {
        match self {
            ExprKind::Constant(_) => 0,
            ExprKind::Read { .. } => 1,
            ExprKind::Select { .. } => 2,
            ExprKind::Concat { .. } => 3,
            ExprKind::Extract { .. } => 4,
            ExprKind::Not(_) => 5,
            ExprKind::And(..) => 6,
            ExprKind::Or(..) => 7,
            ExprKind::Xor(..) => 8,
            ExprKind::Add(..) => 9,
            ExprKind::Sub(..) => 10,
            ExprKind::Mul(..) => 11,
            ExprKind::Eq(..) => 12,
            ExprKind::Ult(..) => 13,
            ExprKind::Ule(..) => 14,
            ExprKind::Slt(..) => 15,
            ExprKind::Sle(..) => 16,
            ExprKind::ZExt(_) => 17,
            ExprKind::SExt(_) => 18,
        }
    }
}

#[derive(Debug)]
pub struct Expr {
    id: u64,
    hash: u64,
    width: Width,
    kind: ExprKind,
}

/// Shared handle to an interned expression node.
#[derive(Debug, Clone)]
pub struct ExprRef(Arc<Expr>);

impl ExprRef {
    /// Stable interning id; also the total order used for key sets.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Precomputed 64-bit content hash.
    pub fn hash_value(&self) -> u64 {
        self.0.hash
    }

    pub fn width(&self) -> Width {
        self.0.width
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn as_constant(&self) -> Option<u64> {
        match self.0.kind {
            ExprKind::Constant(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.0.kind, ExprKind::Constant(_))
    }

    /// True iff this is the boolean constant 1.
    pub fn is_true(&self) -> bool {
        self.0.width == BOOL_WIDTH && self.as_constant() == Some(1)
    }

    /// True iff this is the boolean constant 0.
    pub fn is_false(&self) -> bool {
        self.0.width == BOOL_WIDTH && self.as_constant() == Some(0)
    }
}

impl PartialEq for ExprRef {
    fn eq(&self, other: &Self) -> bool {
        // Interned: pointer identity is structural identity.
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ExprRef {}

impl PartialOrd for ExprRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExprRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl Hash for ExprRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

/// Structural key for the interner: width + shallow kind. Children are
/// already interned, so comparing them by pointer is full structural
/// equality.
#[derive(Clone, PartialEq, Eq, Hash)]
struct InternKey(Width, ExprKind);

struct Interner {
    table: HashMap<InternKey, ExprRef>,
    next_id: u64,
}

static INTERNER: LazyLock<Mutex<Interner>> = LazyLock::new(|| {
    Mutex::new(Interner {
        table: HashMap::with_capacity(4096),
        next_id: 1,
    })
});

fn content_hash(width: Width, kind: &ExprKind) -> u64 {
    let mut h = DefaultHasher::new();
    h.write_u8(kind.discriminant());
    h.write_u32(width);
    match kind {
        ExprKind::Constant(v) => h.write_u64(*v),
        ExprKind::Read { updates, index } => {
            h.write_u64(updates.root.id());
            for w in updates.writes.iter() {
                h.write_u64(w.index.hash_value());
                h.write_u64(w.value.hash_value());
            }
            h.write_u64(index.hash_value());
        }
        ExprKind::Select { cond, then, otherwise } => {
            h.write_u64(cond.hash_value());
            h.write_u64(then.hash_value());
            h.write_u64(otherwise.hash_value());
        }
        ExprKind::Concat { left, right } => {
            h.write_u64(left.hash_value());
            h.write_u64(right.hash_value());
        }
        ExprKind::Extract { expr, offset } => {
            h.write_u64(expr.hash_value());
            h.write_u32(*offset);
        }
        ExprKind::Not(e) | ExprKind::ZExt(e) | ExprKind::SExt(e) => {
            h.write_u64(e.hash_value());
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
            h.write_u64(l.hash_value());
            h.write_u64(r.hash_value());
        }
    }
    h.finish()
}

fn intern(width: Width, kind: ExprKind) -> ExprRef {
    let mut interner = INTERNER.lock().expect("expression interner poisoned");
    let key = InternKey(width, kind);
    if let Some(existing) = interner.table.get(&key) {
        return existing.clone();
    }
    let hash = content_hash(width, &key.1);
    let id = interner.next_id;
    interner.next_id += 1;
    let expr = ExprRef(Arc::new(Expr {
        id,
        hash,
        width,
        kind: key.1.clone(),
    }));
    interner.table.insert(key, expr.clone());
    expr
}

/// Folding constructors. All expression creation goes through these.
pub struct Builder;

impl Builder {
    pub fn constant(value: u64, width: Width) -> ExprRef {
        intern(width, ExprKind::Constant(value & width_mask(width)))
    }

    pub fn bool_const(value: bool) -> ExprRef {
        Self::constant(value as u64, BOOL_WIDTH)
    }

    pub fn true_expr() -> ExprRef {
        Self::bool_const(true)
    }

    pub fn false_expr() -> ExprRef {
        Self::bool_const(false)
    }

    /// `Eq(0_w, e)`, the canonical boolean negation / zero test.
    pub fn is_zero(e: &ExprRef) -> ExprRef {
        Self::eq(&Self::constant(0, e.width()), e)
    }

    pub fn eq(l: &ExprRef, r: &ExprRef) -> ExprRef {
        assert_eq!(l.width(), r.width(), "eq operand width mismatch");
        if l == r {
            return Self::true_expr();
        }
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::bool_const(lv == rv);
        }
        // Keep the constant on the left.
        let (l, r) = if r.is_constant() && !l.is_constant() {
            (r, l)
        } else {
            (l, r)
        };
        if l.width() == BOOL_WIDTH {
            if l.is_true() {
                return r.clone();
            }
            if l.is_false() {
                // (false = (false = x)) collapses to x.
                if let ExprKind::Eq(il, ir) = r.kind() {
                    if il.is_false() {
                        return ir.clone();
                    }
                }
            }
        }
        intern(BOOL_WIDTH, ExprKind::Eq(l.clone(), r.clone()))
    }

    pub fn not(e: &ExprRef) -> ExprRef {
        if let Some(v) = e.as_constant() {
            return Self::constant(!v, e.width());
        }
        if let ExprKind::Not(inner) = e.kind() {
            return inner.clone();
        }
        intern(e.width(), ExprKind::Not(e.clone()))
    }

    pub fn and(l: &ExprRef, r: &ExprRef) -> ExprRef {
        assert_eq!(l.width(), r.width(), "and operand width mismatch");
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::constant(lv & rv, l.width());
        }
        if l.width() == BOOL_WIDTH {
            if let Some(lv) = l.as_constant() {
                return if lv == 1 { r.clone() } else { Self::false_expr() };
            }
            if let Some(rv) = r.as_constant() {
                return if rv == 1 { l.clone() } else { Self::false_expr() };
            }
        }
        if l == r {
            return l.clone();
        }
        intern(l.width(), ExprKind::And(l.clone(), r.clone()))
    }

    pub fn or(l: &ExprRef, r: &ExprRef) -> ExprRef {
        assert_eq!(l.width(), r.width(), "or operand width mismatch");
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::constant(lv | rv, l.width());
        }
        if l.width() == BOOL_WIDTH {
            if let Some(lv) = l.as_constant() {
                return if lv == 1 { Self::true_expr() } else { r.clone() };
            }
            if let Some(rv) = r.as_constant() {
                return if rv == 1 { Self::true_expr() } else { l.clone() };
            }
        }
        if l == r {
            return l.clone();
        }
        intern(l.width(), ExprKind::Or(l.clone(), r.clone()))
    }

    pub fn xor(l: &ExprRef, r: &ExprRef) -> ExprRef {
        assert_eq!(l.width(), r.width(), "xor operand width mismatch");
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::constant(lv ^ rv, l.width());
        }
        if let Some(0) = l.as_constant() {
            return r.clone();
        }
        if let Some(0) = r.as_constant() {
            return l.clone();
        }
        intern(l.width(), ExprKind::Xor(l.clone(), r.clone()))
    }

    pub fn add(l: &ExprRef, r: &ExprRef) -> ExprRef {
        assert_eq!(l.width(), r.width(), "add operand width mismatch");
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::constant(lv.wrapping_add(rv), l.width());
        }
        if let Some(0) = l.as_constant() {
            return r.clone();
        }
        if let Some(0) = r.as_constant() {
            return l.clone();
        }
        intern(l.width(), ExprKind::Add(l.clone(), r.clone()))
    }

    pub fn sub(l: &ExprRef, r: &ExprRef) -> ExprRef {
        assert_eq!(l.width(), r.width(), "sub operand width mismatch");
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::constant(lv.wrapping_sub(rv), l.width());
        }
        if let Some(0) = r.as_constant() {
            return l.clone();
        }
        intern(l.width(), ExprKind::Sub(l.clone(), r.clone()))
    }

    pub fn mul(l: &ExprRef, r: &ExprRef) -> ExprRef {
        assert_eq!(l.width(), r.width(), "mul operand width mismatch");
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::constant(lv.wrapping_mul(rv), l.width());
        }
        if let Some(1) = l.as_constant() {
            return r.clone();
        }
        if let Some(1) = r.as_constant() {
            return l.clone();
        }
        if l.as_constant() == Some(0) || r.as_constant() == Some(0) {
            return Self::constant(0, l.width());
        }
        intern(l.width(), ExprKind::Mul(l.clone(), r.clone()))
    }

    pub fn ult(l: &ExprRef, r: &ExprRef) -> ExprRef {
        assert_eq!(l.width(), r.width(), "ult operand width mismatch");
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::bool_const(lv < rv);
        }
        intern(BOOL_WIDTH, ExprKind::Ult(l.clone(), r.clone()))
    }

    pub fn ule(l: &ExprRef, r: &ExprRef) -> ExprRef {
        assert_eq!(l.width(), r.width(), "ule operand width mismatch");
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::bool_const(lv <= rv);
        }
        intern(BOOL_WIDTH, ExprKind::Ule(l.clone(), r.clone()))
    }

    pub fn slt(l: &ExprRef, r: &ExprRef) -> ExprRef {
        assert_eq!(l.width(), r.width(), "slt operand width mismatch");
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::bool_const(to_signed(lv, l.width()) < to_signed(rv, r.width()));
        }
        intern(BOOL_WIDTH, ExprKind::Slt(l.clone(), r.clone()))
    }

    pub fn sle(l: &ExprRef, r: &ExprRef) -> ExprRef {
        assert_eq!(l.width(), r.width(), "sle operand width mismatch");
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::bool_const(to_signed(lv, l.width()) <= to_signed(rv, r.width()));
        }
        intern(BOOL_WIDTH, ExprKind::Sle(l.clone(), r.clone()))
    }

    pub fn zext(e: &ExprRef, width: Width) -> ExprRef {
        assert!(width >= e.width(), "zext must not narrow");
        if width == e.width() {
            return e.clone();
        }
        if let Some(v) = e.as_constant() {
            return Self::constant(v, width);
        }
        intern(width, ExprKind::ZExt(e.clone()))
    }

    pub fn sext(e: &ExprRef, width: Width) -> ExprRef {
        assert!(width >= e.width(), "sext must not narrow");
        if width == e.width() {
            return e.clone();
        }
        if let Some(v) = e.as_constant() {
            return Self::constant(to_signed(v, e.width()) as u64, width);
        }
        intern(width, ExprKind::SExt(e.clone()))
    }

    pub fn concat(l: &ExprRef, r: &ExprRef) -> ExprRef {
        let width = l.width() + r.width();
        assert!(width <= 64, "concat width {width} exceeds 64 bits");
        if let (Some(lv), Some(rv)) = (l.as_constant(), r.as_constant()) {
            return Self::constant((lv << r.width()) | rv, width);
        }
        intern(width, ExprKind::Concat { left: l.clone(), right: r.clone() })
    }

    pub fn extract(e: &ExprRef, offset: Width, width: Width) -> ExprRef {
        assert!(offset + width <= e.width(), "extract out of range");
        if offset == 0 && width == e.width() {
            return e.clone();
        }
        if let Some(v) = e.as_constant() {
            return Self::constant(v >> offset, width);
        }
        intern(width, ExprKind::Extract { expr: e.clone(), offset })
    }

    pub fn select(cond: &ExprRef, then: &ExprRef, otherwise: &ExprRef) -> ExprRef {
        assert_eq!(cond.width(), BOOL_WIDTH, "select condition must be boolean");
        assert_eq!(then.width(), otherwise.width(), "select arm width mismatch");
        if let Some(v) = cond.as_constant() {
            return if v == 1 { then.clone() } else { otherwise.clone() };
        }
        if then == otherwise {
            return then.clone();
        }
        intern(
            then.width(),
            ExprKind::Select {
                cond: cond.clone(),
                then: then.clone(),
                otherwise: otherwise.clone(),
            },
        )
    }

    /// Read through the update list. Writes at non-matching concrete indices
    /// are discarded; a symbolic write index blocks further resolution.
    pub fn read(updates: &UpdateList, index: &ExprRef) -> ExprRef {
        assert_eq!(
            index.width(),
            updates.root.domain_width(),
            "read index width must match the array domain"
        );
        let range = updates.root.range_width();
        if let Some(idx) = index.as_constant() {
            for (pos, write) in updates.writes.iter().enumerate() {
                match write.index.as_constant() {
                    Some(wv) if wv == idx => return write.value.clone(),
                    Some(_) => continue,
                    None => {
                        // Blocked: keep this write and everything older.
                        let remaining = updates.writes[pos..].to_vec();
                        let ul = UpdateList::with_writes(updates.root.clone(), remaining);
                        return intern(range, ExprKind::Read { updates: ul, index: index.clone() });
                    }
                }
            }
            if let Some(values) = updates.root.constant_values() {
                let byte = values.get(idx as usize).copied().unwrap_or(0);
                return Self::constant(byte as u64, range);
            }
            let ul = UpdateList::new(updates.root.clone());
            return intern(range, ExprKind::Read { updates: ul, index: index.clone() });
        }
        intern(
            range,
            ExprKind::Read {
                updates: updates.clone(),
                index: index.clone(),
            },
        )
    }

    /// Convenience: read `array[index]` with no pending writes.
    pub fn read_at(array: &ArrayRef, index: u32) -> ExprRef {
        let idx = Self::constant(index as u64, array.domain_width());
        Self::read(&UpdateList::new(array.clone()), &idx)
    }
}

impl fmt::Display for ExprRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Constant(v) => write!(f, "{}:w{}", v, self.width()),
            ExprKind::Read { updates, index } => {
                if updates.is_empty() {
                    write!(f, "{}[{}]", updates.root.name(), index)
                } else {
                    write!(f, "{}+{}w[{}]", updates.root.name(), updates.writes.len(), index)
                }
            }
            ExprKind::Select { cond, then, otherwise } => {
                write!(f, "(ite {cond} {then} {otherwise})")
            }
            ExprKind::Concat { left, right } => write!(f, "(concat {left} {right})"),
            ExprKind::Extract { expr, offset } => {
                write!(f, "(extract {} {} {})", expr, offset, self.width())
            }
            ExprKind::Not(e) => write!(f, "(not {e})"),
            ExprKind::And(l, r) => write!(f, "(and {l} {r})"),
            ExprKind::Or(l, r) => write!(f, "(or {l} {r})"),
            ExprKind::Xor(l, r) => write!(f, "(xor {l} {r})"),
            ExprKind::Add(l, r) => write!(f, "(add {l} {r})"),
            ExprKind::Sub(l, r) => write!(f, "(sub {l} {r})"),
            ExprKind::Mul(l, r) => write!(f, "(mul {l} {r})"),
            ExprKind::Eq(l, r) => write!(f, "(= {l} {r})"),
            ExprKind::Ult(l, r) => write!(f, "(< {l} {r})"),
            ExprKind::Ule(l, r) => write!(f, "(<= {l} {r})"),
            ExprKind::Slt(l, r) => write!(f, "(s< {l} {r})"),
            ExprKind::Sle(l, r) => write!(f, "(s<= {l} {r})"),
            ExprKind::ZExt(e) => write!(f, "(zext {} {})", e, self.width()),
            ExprKind::SExt(e) => write!(f, "(sext {} {})", e, self.width()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedups_structurally_equal_nodes() {
        let a = ArrayRef::symbolic("a", 4);
        let e1 = Builder::ult(&Builder::read_at(&a, 0), &Builder::constant(10, 8));
        let e2 = Builder::ult(&Builder::read_at(&a, 0), &Builder::constant(10, 8));
        assert_eq!(e1, e2);
        assert_eq!(e1.id(), e2.id());
    }

    #[test]
    fn constant_comparisons_fold() {
        let five = Builder::constant(5, 8);
        let seven = Builder::constant(7, 8);
        assert!(Builder::ult(&five, &seven).is_true());
        assert!(Builder::ule(&seven, &five).is_false());
        // 0xff is -1 signed at width 8.
        let minus_one = Builder::constant(0xff, 8);
        assert!(Builder::slt(&minus_one, &five).is_true());
    }

    #[test]
    fn eq_normalizes_constant_to_left() {
        let a = ArrayRef::symbolic("a", 4);
        let x = Builder::read_at(&a, 0);
        let c = Builder::constant(3, 8);
        let e = Builder::eq(&x, &c);
        match e.kind() {
            ExprKind::Eq(l, r) => {
                assert!(l.is_constant());
                assert_eq!(r, &x);
            }
            other => panic!("expected Eq, got {other:?}"),
        }
    }

    #[test]
    fn double_negation_collapses() {
        let a = ArrayRef::symbolic("a", 4);
        let cond = Builder::ult(&Builder::read_at(&a, 0), &Builder::constant(10, 8));
        let neg = Builder::is_zero(&cond);
        let double = Builder::is_zero(&neg);
        assert_eq!(double, cond);
    }

    #[test]
    fn read_resolves_through_concrete_writes() {
        let a = ArrayRef::symbolic("a", 4);
        let idx0 = Builder::constant(0, 32);
        let idx1 = Builder::constant(1, 32);
        let ul = UpdateList::with_writes(
            a.clone(),
            vec![Update { index: idx1.clone(), value: Builder::constant(9, 8) }],
        );
        // Write at 1 does not shadow a read at 0.
        let r0 = Builder::read(&ul, &idx0);
        assert!(matches!(r0.kind(), ExprKind::Read { updates, .. } if updates.is_empty()));
        // Read at 1 sees the write.
        let r1 = Builder::read(&ul, &idx1);
        assert_eq!(r1.as_constant(), Some(9));
    }

    #[test]
    fn read_of_constant_array_folds() {
        let a = ArrayRef::constant("k", vec![1, 2, 3]);
        assert_eq!(Builder::read_at(&a, 2).as_constant(), Some(3));
    }

    #[test]
    fn symbolic_write_blocks_resolution() {
        let a = ArrayRef::symbolic("a", 4);
        let b = ArrayRef::symbolic("b", 4);
        let sym_idx = Builder::zext(&Builder::read_at(&b, 0), 32);
        let ul = UpdateList::with_writes(
            a.clone(),
            vec![Update { index: sym_idx, value: Builder::constant(7, 8) }],
        );
        let r = Builder::read(&ul, &Builder::constant(0, 32));
        assert!(matches!(r.kind(), ExprKind::Read { updates, .. } if updates.writes.len() == 1));
    }

    #[test]
    fn concat_and_extract_fold() {
        let hi = Builder::constant(0xab, 8);
        let lo = Builder::constant(0xcd, 8);
        let both = Builder::concat(&hi, &lo);
        assert_eq!(both.as_constant(), Some(0xabcd));
        assert_eq!(both.width(), 16);
        assert_eq!(Builder::extract(&both, 8, 8).as_constant(), Some(0xab));
    }
}
