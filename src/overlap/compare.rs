// Pairwise overlap comparator
// Line-exact set intersection between two normalized entry files
use ahash::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Prefixes that mark a line as a comment in entry files
pub const COMMENT_PREFIXES: [&str; 4] = ["#", "!", "//", ";"];

/// Outcome of comparing two files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapResult {
    /// Entries present in both files, sorted ascending
    pub overlap: Vec<String>,
    /// Valid lines in the first file
    pub count_a: usize,
    /// Valid lines in the second file
    pub count_b: usize,
}

impl OverlapResult {
    pub fn is_empty(&self) -> bool {
        self.overlap.is_empty()
    }
}

/// True for lines that carry no entry
pub fn is_ignorable(line: &str) -> bool {
    line.is_empty() || COMMENT_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Open `path` for line reading, or `None` when it is missing or empty
fn open_lines(path: &Path) -> Option<impl Iterator<Item = String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Skipping unreadable file {}: {}", path.display(), e);
            return None;
        }
    };

    match file.metadata() {
        Ok(meta) if meta.len() == 0 => {
            debug!("Skipping empty file {}", path.display());
            return None;
        }
        Ok(_) => {}
        Err(e) => {
            warn!("Skipping file with unreadable metadata {}: {}", path.display(), e);
            return None;
        }
    }

    let shown = path.display().to_string();
    let lines = BufReader::new(file)
        .lines()
        .map_while(move |line| match line {
            Ok(line) => Some(line),
            Err(e) => {
                warn!("Stopped reading {} early: {}", shown, e);
                None
            }
        })
        .filter_map(|line| {
            let trimmed = line.trim();
            if is_ignorable(trimmed) {
                None
            } else if trimmed.len() == line.len() {
                Some(line)
            } else {
                Some(trimmed.to_string())
            }
        });

    Some(lines)
}

/// Compare two entry files line by line
///
/// Only the first file is held in memory; the second is streamed against it.
/// A missing, unreadable or empty file yields an empty result with zero
/// counts for that side instead of an error.
pub fn compare_files(path_a: &Path, path_b: &Path) -> OverlapResult {
    let mut result = OverlapResult::default();

    let entries_a: HashSet<String> = match open_lines(path_a) {
        Some(lines) => lines
            .inspect(|_| result.count_a += 1)
            .collect(),
        None => return result,
    };

    let mut common: HashSet<String> = HashSet::default();
    match open_lines(path_b) {
        Some(lines) => {
            for line in lines {
                result.count_b += 1;
                if entries_a.contains(&line) {
                    common.insert(line);
                }
            }
        }
        None => {
            result.count_a = 0;
            return result;
        }
    }
    drop(entries_a);

    let mut overlap: Vec<String> = common.into_iter().collect();
    overlap.sort_unstable();
    result.overlap = overlap;
    result
}
