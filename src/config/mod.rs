//! Configuration management for listinsight
//!
//! Loading, environment overrides, and validation. The engines never read
//! `Config` directly; `overlap_options` and `top_options` turn it into the
//! plain parameters they take.

use crate::error::{AnalyzerError, Result};
use crate::intern::{DEFAULT_MAX_LEN, DEFAULT_MIN_LEN};
use crate::overlap::OverlapOptions;
use crate::top::TopOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub intern: InternConfig,
    pub output: OutputConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Categories (generic source types) to analyze
    pub categories: Vec<String>,
    /// Top-level worker budget; 0 means host available parallelism
    #[serde(default)]
    pub max_workers: usize,
    /// Thresholds for the top-K aggregator
    pub min_sources: Vec<usize>,
    pub max_entries: usize,
    /// File count at which the top-K aggregator reads files in parallel
    #[serde(default = "default_parallel_file_threshold")]
    pub parallel_file_threshold: usize,
}

fn default_parallel_file_threshold() -> usize {
    4
}

/// Interning cache bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternConfig {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for InternConfig {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_LEN,
            max_len: DEFAULT_MAX_LEN,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub overlap_dir: PathBuf,
    pub top_dir: PathBuf,
    pub overlap_summary: PathBuf,
    pub top_summary: PathBuf,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AnalyzerError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| AnalyzerError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AnalyzerError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        std::fs::write(path, content).map_err(|e| AnalyzerError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: LISTINSIGHT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply overrides from `(key, value)` pairs in the environment format
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("LISTINSIGHT_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "ANALYSIS__MAX_WORKERS" => {
                self.analysis.max_workers = parse_usize(path, value)?;
            }
            "ANALYSIS__MAX_ENTRIES" => {
                self.analysis.max_entries = parse_usize(path, value)?;
            }
            "ANALYSIS__MIN_SOURCES" => {
                self.analysis.min_sources = value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| parse_usize(path, v))
                    .collect::<Result<Vec<_>>>()?;
            }
            "ANALYSIS__CATEGORIES" => {
                self.analysis.categories = value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "OUTPUT__OVERLAP_DIR" => {
                self.output.overlap_dir = PathBuf::from(value);
            }
            "OUTPUT__TOP_DIR" => {
                self.output.top_dir = PathBuf::from(value);
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Overlap engine parameters with `~` expanded
    pub fn overlap_options(&self) -> Result<OverlapOptions> {
        let mut options = OverlapOptions::new(
            expand_path(&self.output.overlap_dir)?,
            expand_path(&self.output.overlap_summary)?,
        );
        options.intern_min_len = self.intern.min_len;
        options.intern_max_len = self.intern.max_len;
        Ok(options)
    }

    /// Top-K aggregator parameters with `~` expanded
    pub fn top_options(&self) -> Result<TopOptions> {
        let mut options = TopOptions::new(
            expand_path(&self.output.top_dir)?,
            expand_path(&self.output.top_summary)?,
        );
        options.parallel_file_threshold = self.analysis.parallel_file_threshold;
        options.intern_min_len = self.intern.min_len;
        options.intern_max_len = self.intern.max_len;
        Ok(options)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            AnalyzerError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("listinsight").join("config.toml"))
    }
}

fn parse_usize(path: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| AnalyzerError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}' as a non-negative integer", value),
        })
}

/// Expand a leading `~` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = dirs::home_dir()
        .ok_or_else(|| AnalyzerError::Config("Cannot determine home directory".to_string()))?;
    Ok(home.join(rest))
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.listinsight");

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            analysis: AnalysisConfig {
                categories: ["domain", "ipv4", "ipv6", "cidr_ipv4"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                max_workers: 0,
                min_sources: vec![2, 3, 5],
                max_entries: 500,
                parallel_file_threshold: default_parallel_file_threshold(),
            },
            intern: InternConfig::default(),
            output: OutputConfig {
                overlap_dir: data_dir.join("overlap"),
                top_dir: data_dir.join("top"),
                overlap_summary: data_dir.join("summaries").join("overlap_summary.json"),
                top_summary: data_dir.join("summaries").join("top_summary.json"),
            },
        }
    }
}
