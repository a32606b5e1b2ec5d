// Bounded top-N selection over the entry -> sources index
use ahash::HashMap;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::model::EntryCountPair;

/// Distinct source IDs that list one entry
///
/// Sources per category number in the dozens, so a small vector with a
/// linear membership check is denser than a hash set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet(Vec<u32>);

impl SourceSet {
    /// Add `id`, returning false if it was already present
    pub fn insert(&mut self, id: u32) -> bool {
        if self.0.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<u32> for SourceSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = SourceSet::default();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Entry -> contributing sources for one (category, list type)
pub type EntryIndex = HashMap<Arc<str>, SourceSet>;

/// Heap item ordered by count, ties broken so that later entries are evicted first
#[derive(Debug, PartialEq, Eq)]
struct Ranked(EntryCountPair);

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .count
            .cmp(&other.0.count)
            .then_with(|| other.0.entry.cmp(&self.0.entry))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap holding at most `capacity` of the highest-count entries
#[derive(Debug)]
pub struct EntryHeap {
    heap: BinaryHeap<Reverse<Ranked>>,
    capacity: usize,
}

impl EntryHeap {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    /// Push `pair`, evicting the lowest-ranked item once over capacity
    pub fn push(&mut self, pair: EntryCountPair) {
        self.heap.push(Reverse(Ranked(pair)));
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    /// Lowest-ranked retained item
    pub fn peek(&self) -> Option<&EntryCountPair> {
        self.heap.peek().map(|Reverse(Ranked(pair))| pair)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a vector ordered by count descending
    pub fn into_sorted_desc(mut self) -> Vec<EntryCountPair> {
        let mut slots: Vec<Option<EntryCountPair>> = Vec::new();
        slots.resize_with(self.heap.len(), || None);
        // Pops come out ascending, so fill from the back
        let mut i = slots.len();
        while let Some(Reverse(Ranked(pair))) = self.heap.pop() {
            i -= 1;
            slots[i] = Some(pair);
        }
        slots.into_iter().flatten().collect()
    }
}

/// Entries listed by at least `min_sources` sources, at most `max_entries`
/// of them, highest count first
///
/// Consumes the index so its memory is released while scanning.
pub fn select_top(index: EntryIndex, min_sources: usize, max_entries: usize) -> Vec<EntryCountPair> {
    if max_entries == 0 {
        return Vec::new();
    }

    let mut heap = EntryHeap::with_capacity(max_entries);
    for (entry, sources) in index {
        let count = sources.len();
        if count >= min_sources {
            heap.push(EntryCountPair { entry, count });
        }
    }
    heap.into_sorted_desc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(entries: &[(&str, u32)]) -> EntryIndex {
        entries
            .iter()
            .map(|(entry, sources)| (Arc::from(*entry), (0..*sources).collect()))
            .collect()
    }

    fn sample() -> EntryIndex {
        index(&[("e1", 3), ("e2", 4), ("e3", 2), ("e4", 5), ("e5", 6)])
    }

    fn summarize(pairs: &[EntryCountPair]) -> Vec<(String, usize)> {
        pairs.iter().map(|p| (p.entry.to_string(), p.count)).collect()
    }

    #[test]
    fn test_bounded_selection() {
        let top = select_top(sample(), 3, 2);
        assert_eq!(summarize(&top), vec![("e5".into(), 6), ("e4".into(), 5)]);
    }

    #[test]
    fn test_all_qualifying_when_capacity_large() {
        let top = select_top(sample(), 3, 10);
        assert_eq!(
            summarize(&top),
            vec![
                ("e5".into(), 6),
                ("e4".into(), 5),
                ("e2".into(), 4),
                ("e1".into(), 3)
            ]
        );
    }

    #[test]
    fn test_threshold_above_everything() {
        assert!(select_top(sample(), 10, 5).is_empty());
    }

    #[test]
    fn test_zero_max_entries() {
        assert!(select_top(sample(), 1, 0).is_empty());
    }

    #[test]
    fn test_ties_prefer_earlier_entries() {
        let idx = index(&[("d.com", 2), ("b.com", 2), ("a.com", 2), ("c.com", 2)]);
        let top = select_top(idx, 2, 2);
        assert_eq!(summarize(&top), vec![("a.com".into(), 2), ("b.com".into(), 2)]);
    }

    #[test]
    fn test_heap_peek_is_minimum() {
        let mut heap = EntryHeap::with_capacity(2);
        heap.push(EntryCountPair { entry: Arc::from("x"), count: 7 });
        heap.push(EntryCountPair { entry: Arc::from("y"), count: 2 });
        heap.push(EntryCountPair { entry: Arc::from("z"), count: 5 });

        assert_eq!(heap.len(), 2);
        assert_eq!(heap.peek().unwrap().count, 5);
    }

    #[test]
    fn test_source_set_dedups() {
        let mut set = SourceSet::default();
        assert!(set.insert(1));
        assert!(set.insert(2));
        assert!(!set.insert(1));
        assert_eq!(set.len(), 2);
    }
}
