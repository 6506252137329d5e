//! Single-record vs. sequence normalization
//!
//! Several VCD endpoints encode a one-element collection as a bare record
//! instead of a sequence. Every consumer normalizes through [`OneOrMany`]
//! before counting, filtering or iterating.

use serde::{Deserialize, Serialize};

/// A remote collection that may arrive as a bare record or a sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single record standing in for a one-element collection
    One(T),
    /// A proper sequence of records
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Normalize to a sequence; a bare record becomes a one-element vector
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }

    /// Number of records after normalization
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the records without consuming
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
            OneOrMany::Many(items) => items.iter(),
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        value.into_vec()
    }
}
