//! Top-K source-agreement aggregator
//!
//! For one (category, list type) the aggregator indexes every entry against
//! the set of sources that list it, then keeps the entries corroborated by
//! at least `min_sources` sources, bounded to the `max_entries` best.

mod heap;

pub use heap::{select_top, EntryHeap, EntryIndex, SourceSet};

use crate::error::Result;
use crate::intern::{InternCache, DEFAULT_MAX_LEN, DEFAULT_MIN_LEN};
use crate::model::{EntryCountPair, ListType, ProcessedFile, TopSummary};
use crate::output::{sanitize_component, write_json, write_lines};
use crate::pool::WorkerPool;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Where and how the aggregator works
#[derive(Debug, Clone)]
pub struct TopOptions {
    /// Directory receiving `top_*.txt` entry files
    pub top_dir: PathBuf,
    /// Grouped summary JSON file
    pub summary_path: PathBuf,
    /// File count at which files are indexed in parallel
    pub parallel_file_threshold: usize,
    /// Workers used for parallel file indexing; zero means host parallelism
    pub file_workers: usize,
    pub intern_min_len: usize,
    pub intern_max_len: usize,
}

impl TopOptions {
    pub fn new(top_dir: impl Into<PathBuf>, summary_path: impl Into<PathBuf>) -> Self {
        Self {
            top_dir: top_dir.into(),
            summary_path: summary_path.into(),
            parallel_file_threshold: 4,
            file_workers: 0,
            intern_min_len: DEFAULT_MIN_LEN,
            intern_max_len: DEFAULT_MAX_LEN,
        }
    }
}

/// Job for indexing one file
#[derive(Debug, Clone)]
struct FileJob {
    path: PathBuf,
    source: String,
    expected_entries: usize,
}

/// Top-K aggregator
#[derive(Debug, Clone)]
pub struct TopAggregator {
    options: TopOptions,
}

impl TopAggregator {
    pub fn new(options: TopOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TopOptions {
        &self.options
    }

    /// Path of the entry file for one combination
    pub fn top_file_path(&self, category: &str, list_type: ListType, min_sources: usize) -> PathBuf {
        self.options.top_dir.join(format!(
            "top_{}_{}_min{}.txt",
            sanitize_component(category),
            list_type,
            min_sources
        ))
    }

    /// Find and persist the most corroborated entries for one combination
    ///
    /// No qualifying entry is a valid outcome: a zero-count summary is
    /// returned and no file is written. Only a failed write is an error.
    pub fn find_top_entries(
        &self,
        category: &str,
        list_type: ListType,
        all_files: &[ProcessedFile],
        min_sources: usize,
        max_entries: usize,
        cache: &Arc<InternCache>,
    ) -> Result<TopSummary> {
        let start = Instant::now();

        let files: Vec<&ProcessedFile> = all_files
            .iter()
            .filter(|f| f.valid && f.generic_source_type == category && f.list_type == list_type)
            .collect();
        if files.is_empty() {
            debug!("No valid {} {} files", category, list_type);
            return Ok(TopSummary::empty(category, list_type, min_sources));
        }

        let names: BTreeSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
        let source_ids: Arc<HashMap<String, u32>> = Arc::new(
            names
                .into_iter()
                .zip(0u32..)
                .map(|(name, id)| (name.to_string(), id))
                .collect(),
        );

        let index: Arc<Mutex<EntryIndex>> = Arc::new(Mutex::new(EntryIndex::default()));
        let jobs: Vec<FileJob> = files
            .iter()
            .map(|f| FileJob {
                path: f.filepath.clone(),
                source: f.name.clone(),
                expected_entries: f.number_of_entries,
            })
            .collect();

        if jobs.len() >= self.options.parallel_file_threshold {
            let pool = WorkerPool::new(self.options.file_workers);
            debug!(
                "Indexing {} {} {} files in parallel ({} workers)",
                jobs.len(),
                category,
                list_type,
                pool.max_workers()
            );
            for job in jobs {
                let cache = Arc::clone(cache);
                let source_ids = Arc::clone(&source_ids);
                let index = Arc::clone(&index);
                pool.submit(move || index_file(&job, &cache, &source_ids, &index));
            }
            pool.wait();
        } else {
            for job in &jobs {
                index_file(job, cache, &source_ids, &index);
            }
        }

        let index = std::mem::take(&mut *index.lock().unwrap_or_else(PoisonError::into_inner));
        info!(
            "Indexed {} distinct {} {} entries from {} sources, releasing index",
            index.len(),
            category,
            list_type,
            source_ids.len()
        );
        let top = select_top(index, min_sources, max_entries);

        if top.is_empty() {
            debug!(
                "No {} {} entries listed by at least {} sources",
                category, list_type, min_sources
            );
            return Ok(TopSummary::empty(category, list_type, min_sources));
        }

        let path = self.top_file_path(category, list_type, min_sources);
        let count = save_top_entries(&path, &top)?;

        info!(
            "Wrote {} top {} {} entries (min {} sources) to {} in {}ms",
            count,
            category,
            list_type,
            min_sources,
            path.display(),
            start.elapsed().as_millis()
        );

        Ok(TopSummary {
            category: category.to_string(),
            list_type,
            min_sources,
            count,
            filepath: Some(path),
            top_entries: top,
        })
    }

    /// Run every (category, list type, threshold) combination and persist the summaries
    ///
    /// One interning cache is shared by the whole run and released at the
    /// end. Repeated thresholds run once. Combinations that fail or select
    /// nothing are left out.
    pub fn process_top_entries(
        &self,
        categories: &[String],
        all_files: &[ProcessedFile],
        min_sources_values: &[usize],
        max_entries: usize,
        max_workers: usize,
    ) -> Result<Vec<TopSummary>> {
        let start = Instant::now();
        let cache = Arc::new(InternCache::new(
            self.options.intern_min_len,
            self.options.intern_max_len,
        ));
        let files: Arc<Vec<ProcessedFile>> = Arc::new(all_files.to_vec());
        let collected: Arc<Mutex<Vec<TopSummary>>> = Arc::new(Mutex::new(Vec::new()));
        let pool = WorkerPool::new(max_workers);

        let mut thresholds = min_sources_values.to_vec();
        thresholds.sort_unstable();
        thresholds.dedup();

        for category in categories {
            for list_type in ListType::ALL {
                for &min_sources in &thresholds {
                    let aggregator = self.clone();
                    let category = category.clone();
                    let files = Arc::clone(&files);
                    let cache = Arc::clone(&cache);
                    let collected = Arc::clone(&collected);

                    pool.submit(move || {
                        match aggregator.find_top_entries(
                            &category,
                            list_type,
                            &files,
                            min_sources,
                            max_entries,
                            &cache,
                        ) {
                            Ok(summary) if !summary.is_empty() => collected
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push(summary),
                            Ok(_) => {}
                            Err(e) => error!(
                                "Top entries for {} {} min {} failed: {}",
                                category, list_type, min_sources, e
                            ),
                        }
                    });
                }
            }
        }
        pool.wait();

        info!(
            "Top-K run done, releasing {} interned entries",
            cache.size()
        );
        cache.clear();
        drop(cache);

        let mut summaries: Vec<TopSummary> =
            std::mem::take(&mut *collected.lock().unwrap_or_else(PoisonError::into_inner))
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect();
        sort_summaries(&mut summaries);

        save_top_summaries(&self.options.summary_path, &summaries)?;
        info!(
            "Wrote {} top summaries to {} in {}ms",
            summaries.len(),
            self.options.summary_path.display(),
            start.elapsed().as_millis()
        );
        Ok(summaries)
    }
}

/// Read one file into the shared index
///
/// The file is read and interned without holding the index lock; the lock
/// is taken once to merge the whole batch.
fn index_file(
    job: &FileJob,
    cache: &InternCache,
    source_ids: &HashMap<String, u32>,
    index: &Mutex<EntryIndex>,
) {
    let Some(&source_id) = source_ids.get(&job.source) else {
        error!(
            "Source {} missing from the source ID map, skipping {}",
            job.source,
            job.path.display()
        );
        return;
    };

    let Some(entries) = read_entries(&job.path, cache) else {
        return;
    };

    if job.expected_entries > 0 && entries.len() != job.expected_entries {
        warn!(
            "Skipping {} ({}): expected {} entries, read {}",
            job.source,
            job.path.display(),
            job.expected_entries,
            entries.len()
        );
        return;
    }

    let read = entries.len();
    let mut index = index.lock().unwrap_or_else(PoisonError::into_inner);
    for entry in entries {
        index.entry(entry).or_default().insert(source_id);
    }
    drop(index);

    debug!("Indexed {} entries from {}", read, job.source);
}

/// Trimmed, non-blank lines of `path`, interned
fn read_entries(path: &Path, cache: &InternCache) -> Option<Vec<Arc<str>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Skipping unreadable file {}: {}", path.display(), e);
            return None;
        }
    };

    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Skipping {}: read failed: {}", path.display(), e);
                return None;
            }
        };
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            entries.push(cache.intern(trimmed));
        }
    }

    if entries.is_empty() {
        debug!("Skipping empty file {}", path.display());
        return None;
    }
    Some(entries)
}

/// Write the selected entries, one per line, returning how many were written
pub fn save_top_entries(path: &Path, entries: &[EntryCountPair]) -> Result<usize> {
    write_lines(path, entries.iter().map(|e| &*e.entry))
}

fn sort_summaries(summaries: &mut [TopSummary]) {
    summaries.sort_by(|a, b| {
        a.list_type
            .cmp(&b.list_type)
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.min_sources.cmp(&b.min_sources))
    });
}

/// Persist summaries grouped by list type
///
/// Both list types are always present in the output, empty when nothing
/// qualified, and each group is ordered by (category, min sources).
pub fn save_top_summaries(path: &Path, summaries: &[TopSummary]) -> Result<()> {
    let mut grouped: BTreeMap<ListType, Vec<&TopSummary>> =
        ListType::ALL.iter().map(|&lt| (lt, Vec::new())).collect();

    for summary in summaries.iter().filter(|s| !s.is_empty()) {
        grouped.entry(summary.list_type).or_default().push(summary);
    }
    for group in grouped.values_mut() {
        group.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.min_sources.cmp(&b.min_sources))
        });
    }

    write_json(path, &grouped)
}
