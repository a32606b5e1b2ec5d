//! Entry interning cache
//!
//! Many sources list the same domains and addresses, and the same source
//! names and categories show up in every pair record. The cache owns one
//! canonical `Arc<str>` per distinct value so consumers share a single
//! allocation. Values shorter than `min_len` or longer than `max_len` are
//! handed back uncached; they are either cheap to copy or too rare to be
//! worth the write lock.
//!
//! The cache is scoped to one processing round and cleared (or dropped) at
//! the round boundary to bound peak memory.

use ahash::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

pub const DEFAULT_MIN_LEN: usize = 4;
pub const DEFAULT_MAX_LEN: usize = 253;

/// Deduplicating string store shared across worker tasks
#[derive(Debug)]
pub struct InternCache {
    entries: RwLock<HashSet<Arc<str>>>,
    min_len: usize,
    max_len: usize,
}

impl Default for InternCache {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LEN, DEFAULT_MAX_LEN)
    }
}

impl InternCache {
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self {
            entries: RwLock::new(HashSet::default()),
            min_len,
            max_len,
        }
    }

    /// Return the shared copy of `s`, caching it on first sight
    pub fn intern(&self, s: &str) -> Arc<str> {
        if s.len() < self.min_len || s.len() > self.max_len {
            return Arc::from(s);
        }

        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = entries.get(s) {
                return Arc::clone(existing);
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another task may have inserted it between the two locks
        if let Some(existing) = entries.get(s) {
            return Arc::clone(existing);
        }
        let value: Arc<str> = Arc::from(s);
        entries.insert(Arc::clone(&value));
        value
    }

    /// Intern every value, preserving order
    pub fn intern_many<I, S>(&self, values: I) -> Vec<Arc<str>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .map(|value| self.intern(value.as_ref()))
            .collect()
    }

    /// Number of cached values
    pub fn size(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop every cached value and release the table's memory
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        *entries = HashSet::default();
    }
}
