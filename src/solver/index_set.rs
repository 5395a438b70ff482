//! Sets of concrete array indices.

use std::collections::BTreeSet;
use std::fmt;

/// A finite set of concrete array indices, iterated in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    indices: BTreeSet<u32>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, index: u32) {
        self.indices.insert(index);
    }

    /// Add the half-open range `[start, end)`.
    pub fn add_range(&mut self, start: u32, end: u32) {
        for i in start..end {
            self.indices.insert(i);
        }
    }

    /// Merge `other` into self; true iff self changed.
    pub fn add_set(&mut self, other: &IndexSet) -> bool {
        let mut modified = false;
        for &i in &other.indices {
            if self.indices.insert(i) {
                modified = true;
            }
        }
        modified
    }

    pub fn contains(&self, index: u32) -> bool {
        self.indices.contains(&index)
    }

    /// More efficient when self is the smaller set.
    pub fn intersects(&self, other: &IndexSet) -> bool {
        self.indices.iter().any(|i| other.indices.contains(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.indices.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl fmt::Display for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (n, i) in self.indices.iter().enumerate() {
            if n > 0 {
                write!(f, ",")?;
            }
            write!(f, "{i}")?;
        }
        write!(f, "}}")
    }
}
