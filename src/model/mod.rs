//! Shared records for the analysis stage
//!
//! `ProcessedFile` is the input boundary with the upstream validation stage.
//! Everything else is produced by the overlap engine or the top-K aggregator.

use crate::error::{AnalyzerError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Whether a source blocks or allows its entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Allowlist,
    Blocklist,
}

impl ListType {
    /// Every list type, in summary output order
    pub const ALL: [ListType; 2] = [ListType::Blocklist, ListType::Allowlist];

    /// Short code used in generated file names
    pub fn code(self) -> &'static str {
        match self {
            ListType::Blocklist => "bl",
            ListType::Allowlist => "al",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ListType::Blocklist => "blocklist",
            ListType::Allowlist => "allowlist",
        }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated source file handed over by the consolidation stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedFile {
    /// Logical source identifier
    pub name: String,
    /// Coarse category: domain, ipv4, ipv6, cidr_ipv4, ...
    pub generic_source_type: String,
    /// Finer-grained origin tag (hostsfile, adguard, ...)
    #[serde(default)]
    pub actual_source_type: String,
    pub list_type: ListType,
    pub filepath: PathBuf,
    #[serde(default)]
    pub number_of_entries: usize,
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub must_consider: bool,
}

impl ProcessedFile {
    /// Load the manifest of processed files written by the upstream stage
    pub fn load_manifest(path: &Path) -> Result<Vec<ProcessedFile>> {
        if !path.exists() {
            return Err(AnalyzerError::Manifest {
                path: path.to_path_buf(),
                message: "file does not exist".to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalyzerError::io(e, format!("Failed to read manifest: {}", path.display()))
        })?;

        let files: Vec<ProcessedFile> = serde_json::from_str(&content).map_err(|e| {
            AnalyzerError::json(e, format!("Failed to parse manifest: {}", path.display()))
        })?;

        tracing::debug!(
            "Loaded {} processed files ({} valid) from {}",
            files.len(),
            files.iter().filter(|f| f.valid).count(),
            path.display()
        );

        Ok(files)
    }
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `overlap / count * 100`, rounded to one decimal; zero when `count` is zero
pub fn overlap_percent(overlap: usize, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round1(overlap as f64 / count as f64 * 100.0)
}

fn serialize_percent<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.1}", value))
}

/// One side of a pairwise comparison
#[derive(Debug, Clone)]
pub struct OverlapFileInfo {
    pub filename: PathBuf,
    pub name: Arc<str>,
    pub category: Arc<str>,
    pub list_type: ListType,
    /// Valid (non-blank, non-comment) lines in the file
    pub count: usize,
    /// Share of this file covered by the overlap
    pub percent: f64,
}

/// Directed comparison result; every unordered pair yields two of these
#[derive(Debug, Clone)]
pub struct OverlapPair {
    pub source: OverlapFileInfo,
    pub target: OverlapFileInfo,
    pub overlap: usize,
    pub overlap_file: PathBuf,
}

/// All overlap pairs recorded for one category
#[derive(Debug, Clone, Default)]
pub struct OverlapSourceType {
    pub category: String,
    pub pairs: Vec<OverlapPair>,
    pub pairs_count: usize,
}

impl OverlapSourceType {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            pairs: Vec::new(),
            pairs_count: 0,
        }
    }

    /// Record both directions of one comparison
    pub fn push_both(&mut self, forward: OverlapPair, backward: OverlapPair) {
        self.pairs.push(forward);
        self.pairs.push(backward);
        self.pairs_count += 2;
    }

    pub fn is_empty(&self) -> bool {
        self.pairs_count == 0
    }
}

/// Deduplicated overlap target inside a compact summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapTargetFileInfo {
    pub name: String,
    pub list_type: ListType,
    pub category: String,
    pub count: usize,
    #[serde(serialize_with = "serialize_percent")]
    pub percent: f64,
    pub overlap: usize,
}

/// Per (category, source) roll-up of every overlap the source takes part in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapSummary {
    pub name: String,
    pub category: String,
    pub list_type: ListType,
    pub count: usize,
    pub unique: usize,
    pub conflicts: usize,
    pub targets_count: usize,
    pub targets: Vec<OverlapTargetFileInfo>,
}

/// An entry and the number of distinct sources that list it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryCountPair {
    pub entry: Arc<str>,
    pub count: usize,
}

/// Result of one top-K selection
#[derive(Debug, Clone, Serialize)]
pub struct TopSummary {
    pub category: String,
    pub list_type: ListType,
    pub min_sources: usize,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,
    pub top_entries: Vec<EntryCountPair>,
}

impl TopSummary {
    /// Summary for a combination where no entry met the threshold
    pub fn empty(category: &str, list_type: ListType, min_sources: usize) -> Self {
        Self {
            category: category.to_string(),
            list_type,
            min_sources,
            count: 0,
            filepath: None,
            top_entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0 || self.top_entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_overlap_percent() {
        assert_eq!(overlap_percent(2, 4), 50.0);
        assert_eq!(overlap_percent(1, 3), 33.3);
        assert_eq!(overlap_percent(2, 3), 66.7);
        assert_eq!(overlap_percent(5, 0), 0.0);
    }

    #[test]
    fn test_percent_serializes_with_one_decimal() {
        let target = OverlapTargetFileInfo {
            name: "feed".to_string(),
            list_type: ListType::Blocklist,
            category: "domain".to_string(),
            count: 4,
            percent: overlap_percent(2, 4),
            overlap: 2,
        };

        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["percent"], "50.0");
        assert_eq!(json["list_type"], "blocklist");
    }

    #[test]
    fn test_list_type_codes() {
        assert_eq!(ListType::Blocklist.code(), "bl");
        assert_eq!(ListType::Allowlist.code(), "al");
        assert_eq!(ListType::Allowlist.to_string(), "allowlist");
    }

    #[test]
    fn test_push_both_counts_directed_pairs() {
        let info = OverlapFileInfo {
            filename: PathBuf::from("a.txt"),
            name: Arc::from("a"),
            category: Arc::from("domain"),
            list_type: ListType::Blocklist,
            count: 1,
            percent: 100.0,
        };
        let pair = OverlapPair {
            source: info.clone(),
            target: info,
            overlap: 1,
            overlap_file: PathBuf::from("a_a_domain_bl_overlap.txt"),
        };

        let mut source_type = OverlapSourceType::new("domain");
        assert!(source_type.is_empty());
        source_type.push_both(pair.clone(), pair);
        assert_eq!(source_type.pairs_count, 2);
        assert_eq!(source_type.pairs.len(), 2);
    }

    #[test]
    fn test_load_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "alpha", "generic_source_type": "domain", "list_type": "blocklist",
                 "filepath": "/data/alpha.txt", "number_of_entries": 10, "valid": true},
                {"name": "beta", "generic_source_type": "ipv4", "actual_source_type": "cidr",
                 "list_type": "allowlist", "filepath": "/data/beta.txt", "valid": false,
                 "must_consider": true}
            ]"#,
        )
        .unwrap();

        let files = ProcessedFile::load_manifest(&path).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].list_type, ListType::Blocklist);
        assert_eq!(files[0].number_of_entries, 10);
        assert!(files[1].must_consider);
        assert!(!files[1].valid);
    }

    #[test]
    fn test_load_manifest_missing() {
        let dir = TempDir::new().unwrap();
        let result = ProcessedFile::load_manifest(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(AnalyzerError::Manifest { .. })));
    }

    #[test]
    fn test_load_manifest_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = ProcessedFile::load_manifest(&path);
        assert!(matches!(result, Err(AnalyzerError::Json { .. })));
    }
}
