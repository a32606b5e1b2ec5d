use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{AnalyzerError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_analysis(config, &mut errors);
        Self::validate_intern(config, &mut errors);
        Self::validate_output(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AnalyzerError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_analysis(config: &Config, errors: &mut Vec<ValidationError>) {
        let analysis = &config.analysis;

        if analysis.categories.is_empty() {
            errors.push(ValidationError::new(
                "analysis.categories",
                "At least one category is required",
            ));
        }
        if analysis.categories.iter().any(|c| c.trim().is_empty()) {
            errors.push(ValidationError::new(
                "analysis.categories",
                "Category names cannot be blank",
            ));
        }

        if analysis.min_sources.is_empty() {
            errors.push(ValidationError::new(
                "analysis.min_sources",
                "At least one threshold is required",
            ));
        }
        if analysis.min_sources.contains(&0) {
            errors.push(ValidationError::new(
                "analysis.min_sources",
                "Thresholds must be at least 1",
            ));
        }

        if analysis.max_entries == 0 {
            errors.push(ValidationError::new(
                "analysis.max_entries",
                "Max entries must be greater than 0",
            ));
        }

        if analysis.parallel_file_threshold == 0 {
            errors.push(ValidationError::new(
                "analysis.parallel_file_threshold",
                "Parallel file threshold must be greater than 0",
            ));
        }
    }

    fn validate_intern(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.intern.min_len > config.intern.max_len {
            errors.push(ValidationError::new(
                "intern.min_len",
                format!(
                    "min_len ({}) cannot exceed max_len ({})",
                    config.intern.min_len, config.intern.max_len
                ),
            ));
        }
    }

    fn validate_output(config: &Config, errors: &mut Vec<ValidationError>) {
        let output = &config.output;
        let paths = [
            ("output.overlap_dir", &output.overlap_dir),
            ("output.top_dir", &output.top_dir),
            ("output.overlap_summary", &output.overlap_summary),
            ("output.top_summary", &output.top_summary),
        ];

        for (key, path) in paths {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::new(key, "Path cannot be empty"));
            }
        }
    }
}
