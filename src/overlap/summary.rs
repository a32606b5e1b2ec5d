// Compact overlap summary reduction
// Folds every directed pair of a source into one record with deduplicated targets
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::{ListType, OverlapPair, OverlapSourceType, OverlapSummary, OverlapTargetFileInfo};

/// Identity of a target inside one source's summary
///
/// The list type and category are part of the key so that a same-named
/// target published as both a blocklist and an allowlist stays as two
/// records, each visible as a conflict.
type TargetKey = (Arc<str>, ListType, Arc<str>);

/// Identity of a summarized source
type SourceKey = (Arc<str>, ListType);

/// Reduce the pairs of one source into its compact summary
///
/// Each target's `percent` is the overlap as a share of the target's own
/// entry count, not the source's, and targets are ordered by it descending.
/// Returns `None` for an empty slice.
pub fn reduce_source(pairs: &[&OverlapPair]) -> Option<OverlapSummary> {
    let first = pairs.first()?;
    let source = &first.source;

    let mut best: BTreeMap<TargetKey, OverlapTargetFileInfo> = BTreeMap::new();
    for pair in pairs.iter().filter(|p| p.overlap > 0) {
        let target = &pair.target;
        let key = (
            Arc::clone(&target.name),
            target.list_type,
            Arc::clone(&target.category),
        );
        let candidate = OverlapTargetFileInfo {
            name: target.name.to_string(),
            list_type: target.list_type,
            category: target.category.to_string(),
            count: target.count,
            percent: target.percent,
            overlap: pair.overlap,
        };

        let higher = best
            .get(&key)
            .map_or(true, |kept| candidate.overlap > kept.overlap);
        if higher {
            best.insert(key, candidate);
        }
    }

    let mut targets: Vec<OverlapTargetFileInfo> = best.into_values().collect();
    targets.sort_by(|a, b| {
        b.percent
            .partial_cmp(&a.percent)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.list_type.cmp(&b.list_type))
    });

    let overlap_total: usize = targets.iter().map(|t| t.overlap).sum();
    let conflicts = targets
        .iter()
        .filter(|t| t.list_type != source.list_type || *t.category != *source.category)
        .count();

    Some(OverlapSummary {
        name: source.name.to_string(),
        category: source.category.to_string(),
        list_type: source.list_type,
        count: source.count,
        unique: source.count.saturating_sub(overlap_total),
        conflicts,
        targets_count: targets.len(),
        targets,
    })
}

/// Reduce every category's pairs into per-source compact summaries
///
/// Output order is (category, name, list type), independent of the order in
/// which worker tasks recorded their pairs.
pub fn compact_summaries(source_types: &[OverlapSourceType]) -> Vec<OverlapSummary> {
    let mut summaries = Vec::new();

    for source_type in source_types {
        let mut by_source: BTreeMap<SourceKey, Vec<&OverlapPair>> = BTreeMap::new();
        for pair in &source_type.pairs {
            by_source
                .entry((Arc::clone(&pair.source.name), pair.source.list_type))
                .or_default()
                .push(pair);
        }

        summaries.extend(by_source.values().filter_map(|pairs| reduce_source(pairs)));
    }

    summaries.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.list_type.cmp(&b.list_type))
    });
    summaries
}
