//! Overlap detection engine
//!
//! Compares every unordered pair of valid files inside a category, records
//! both directions of each non-empty overlap, and reduces the result into
//! compact per-source summaries.
//!
//! Categories are the memory boundary: each `find_overlap` call owns its own
//! interning cache and pair accumulator, and both are released before the
//! call returns so nothing from one category survives into the next.

mod compare;
mod summary;

pub use compare::{compare_files, is_ignorable, OverlapResult, COMMENT_PREFIXES};
pub use summary::{compact_summaries, reduce_source};

use crate::error::Result;
use crate::intern::{InternCache, DEFAULT_MAX_LEN, DEFAULT_MIN_LEN};
use crate::model::{
    overlap_percent, ListType, OverlapFileInfo, OverlapPair, OverlapSourceType, OverlapSummary,
    ProcessedFile,
};
use crate::output::{sanitize_component, write_json, write_lines};
use crate::pool::WorkerPool;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Where and how the overlap engine works
#[derive(Debug, Clone)]
pub struct OverlapOptions {
    /// Directory receiving per-pair overlap entry files
    pub overlap_dir: PathBuf,
    /// Compact summary JSON file
    pub summary_path: PathBuf,
    /// Comparison workers per category; zero means host parallelism
    pub pair_workers: usize,
    pub intern_min_len: usize,
    pub intern_max_len: usize,
}

impl OverlapOptions {
    pub fn new(overlap_dir: impl Into<PathBuf>, summary_path: impl Into<PathBuf>) -> Self {
        Self {
            overlap_dir: overlap_dir.into(),
            summary_path: summary_path.into(),
            pair_workers: 0,
            intern_min_len: DEFAULT_MIN_LEN,
            intern_max_len: DEFAULT_MAX_LEN,
        }
    }
}

/// One file prepared for comparison, with its strings interned once
#[derive(Debug, Clone)]
struct Side {
    path: PathBuf,
    name: Arc<str>,
    category: Arc<str>,
    list_type: ListType,
    expected_entries: usize,
}

impl Side {
    fn info(&self, count: usize, overlap: usize) -> OverlapFileInfo {
        OverlapFileInfo {
            filename: self.path.clone(),
            name: Arc::clone(&self.name),
            category: Arc::clone(&self.category),
            list_type: self.list_type,
            count,
            percent: overlap_percent(overlap, count),
        }
    }

    fn check_count(&self, actual: usize) {
        if self.expected_entries > 0 && actual != self.expected_entries {
            warn!(
                "Entry count mismatch for {} ({}): expected {}, read {}",
                self.name,
                self.path.display(),
                self.expected_entries,
                actual
            );
        }
    }
}

/// Pairwise overlap engine
#[derive(Debug, Clone)]
pub struct OverlapEngine {
    options: OverlapOptions,
}

impl OverlapEngine {
    pub fn new(options: OverlapOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &OverlapOptions {
        &self.options
    }

    /// File name for the overlap between two sides
    ///
    /// The list type code is `mixed` when the sides differ.
    pub fn overlap_file_name(
        name_a: &str,
        name_b: &str,
        category: &str,
        list_a: ListType,
        list_b: ListType,
    ) -> String {
        pair_file_name(name_a, name_b, category, list_code(list_a, list_b))
    }

    /// Compare every unordered pair of valid files in `files`
    ///
    /// Pairs are generated in file-path order so the result set is the same
    /// on every run, although tasks finish in arbitrary order. Empty overlaps
    /// are not reported.
    pub fn find_overlap(&self, category: &str, files: &[ProcessedFile]) -> OverlapSourceType {
        let start = Instant::now();
        let cache = InternCache::new(self.options.intern_min_len, self.options.intern_max_len);

        let mut valid: Vec<&ProcessedFile> = files.iter().filter(|f| f.valid).collect();
        valid.sort_by(|a, b| a.filepath.cmp(&b.filepath));

        let sides: Vec<Side> = valid
            .iter()
            .map(|f| Side {
                path: f.filepath.clone(),
                name: cache.intern(&f.name),
                category: cache.intern(&f.generic_source_type),
                list_type: f.list_type,
                expected_entries: f.number_of_entries,
            })
            .collect();

        if sides.len() < 2 {
            debug!(
                "Category {}: {} valid file(s), nothing to compare",
                category,
                sides.len()
            );
            return OverlapSourceType::new(category);
        }

        if let Err(e) = std::fs::create_dir_all(&self.options.overlap_dir) {
            error!(
                "Failed to create overlap directory {}: {}",
                self.options.overlap_dir.display(),
                e
            );
        }

        let accumulator = Arc::new(Mutex::new(OverlapSourceType::new(category)));
        let category: Arc<str> = cache.intern(category);
        let pool = WorkerPool::new(self.options.pair_workers);
        let total_pairs = sides.len() * (sides.len() - 1) / 2;

        info!(
            "Category {}: comparing {} files ({} pairs) with {} workers",
            category,
            sides.len(),
            total_pairs,
            pool.max_workers()
        );

        for (i, j, file_name) in plan_pairs(&sides, &category) {
            let a = sides[i].clone();
            let b = sides[j].clone();
            let overlap_file = self.options.overlap_dir.join(file_name);
            let accumulator = Arc::clone(&accumulator);

            pool.submit(move || {
                compare_pair(&a, &b, overlap_file, &accumulator);
            });
        }
        pool.wait();

        let result = std::mem::take(
            &mut *accumulator.lock().unwrap_or_else(PoisonError::into_inner),
        );
        drop(accumulator);

        info!(
            "Category {}: {} directed pairs from {} comparisons in {}ms, releasing {} interned strings",
            category,
            result.pairs_count,
            total_pairs,
            start.elapsed().as_millis(),
            cache.size()
        );
        cache.clear();
        drop(cache);

        result
    }

    /// Run `find_overlap` for each category concurrently, reduce, and persist
    ///
    /// Returns the number of summaries written. Only a failure to write the
    /// summary file is an error; unreadable inputs just shrink the result.
    pub fn write_compact_overlap_summaries(
        &self,
        all_files: &[ProcessedFile],
        categories: &[String],
        max_workers: usize,
    ) -> Result<usize> {
        let start = Instant::now();

        let mut by_category: BTreeMap<&str, Vec<ProcessedFile>> = BTreeMap::new();
        for file in all_files {
            if categories.iter().any(|c| *c == file.generic_source_type) {
                by_category
                    .entry(file.generic_source_type.as_str())
                    .or_default()
                    .push(file.clone());
            }
        }

        let collected: Arc<Mutex<Vec<OverlapSourceType>>> = Arc::new(Mutex::new(Vec::new()));
        let pool = WorkerPool::new(max_workers);

        for (category, files) in by_category {
            let engine = self.clone();
            let category = category.to_string();
            let collected = Arc::clone(&collected);

            pool.submit(move || {
                let source_type = engine.find_overlap(&category, &files);
                if source_type.is_empty() {
                    debug!("Category {}: no overlaps recorded", category);
                    return;
                }
                collected
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(source_type);
            });
        }
        pool.wait();

        let source_types =
            std::mem::take(&mut *collected.lock().unwrap_or_else(PoisonError::into_inner));
        drop(collected);

        let summaries = compact_summaries(&source_types);
        info!(
            "Reduced {} categories into {} compact summaries, releasing pair lists",
            source_types.len(),
            summaries.len()
        );
        drop(source_types);

        write_overlap_summaries(&self.options.summary_path, &summaries)?;

        info!(
            "Wrote {} overlap summaries to {} in {}ms",
            summaries.len(),
            self.options.summary_path.display(),
            start.elapsed().as_millis()
        );
        Ok(summaries.len())
    }
}

/// Persist compact summaries as one JSON array
pub fn write_overlap_summaries(path: &Path, summaries: &[OverlapSummary]) -> Result<()> {
    write_json(path, summaries)
}

fn list_code(list_a: ListType, list_b: ListType) -> &'static str {
    if list_a == list_b {
        list_a.code()
    } else {
        "mixed"
    }
}

fn pair_file_name(name_a: &str, name_b: &str, category: &str, code: &str) -> String {
    format!(
        "{}_{}_{}_{}_overlap.txt",
        sanitize_component(name_a),
        sanitize_component(name_b),
        sanitize_component(category),
        code
    )
}

/// Every unordered pair of `sides` with an overlap file name unique inside the category
///
/// Two sources that each publish both list types produce two `mixed` pairs
/// under the same names. A name already taken gets `-2`, `-3`, ... appended
/// to its list code, assigned in pair order, so the mapping is the same on
/// every run over the same files.
fn plan_pairs(sides: &[Side], category: &str) -> Vec<(usize, usize, String)> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut plan = Vec::with_capacity(sides.len() * sides.len().saturating_sub(1) / 2);

    for (i, a) in sides.iter().enumerate() {
        for (j, b) in sides.iter().enumerate().skip(i + 1) {
            let code = list_code(a.list_type, b.list_type);
            let mut file_name = pair_file_name(&a.name, &b.name, category, code);
            let mut suffix = 2;
            while taken.contains(&file_name) {
                file_name = pair_file_name(
                    &a.name,
                    &b.name,
                    category,
                    &format!("{}-{}", code, suffix),
                );
                suffix += 1;
            }
            taken.insert(file_name.clone());
            plan.push((i, j, file_name));
        }
    }
    plan
}

/// Comparison task body for one unordered pair
fn compare_pair(
    a: &Side,
    b: &Side,
    overlap_file: PathBuf,
    accumulator: &Mutex<OverlapSourceType>,
) {
    let result = compare_files(&a.path, &b.path);
    a.check_count(result.count_a);
    b.check_count(result.count_b);

    if result.is_empty() {
        debug!("No overlap between {} and {}", a.name, b.name);
        return;
    }

    if let Err(e) = write_lines(&overlap_file, &result.overlap) {
        error!(
            "Skipping pair {} / {}: failed to write overlap file: {}",
            a.name, b.name, e
        );
        return;
    }

    let overlap = result.overlap.len();
    let info_a = a.info(result.count_a, overlap);
    let info_b = b.info(result.count_b, overlap);

    let forward = OverlapPair {
        source: info_a.clone(),
        target: info_b.clone(),
        overlap,
        overlap_file: overlap_file.clone(),
    };
    let backward = OverlapPair {
        source: info_b,
        target: info_a,
        overlap,
        overlap_file,
    };

    debug!(
        "Overlap {} <-> {}: {} entries ({:.1}% / {:.1}%)",
        a.name, b.name, overlap, forward.source.percent, backward.source.percent
    );

    accumulator
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push_both(forward, backward);
}
