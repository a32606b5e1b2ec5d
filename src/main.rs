use anyhow::Context;
use listinsight::cli::{Cli, Commands, ConfigAction};
use listinsight::config::{Config, ConfigValidator};
use listinsight::error::Result;
use listinsight::model::ProcessedFile;
use listinsight::overlap::OverlapEngine;
use listinsight::top::TopAggregator;
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            manifest,
            skip_overlap,
            skip_top,
        } => {
            let config = load_config(cli.config, cli.max_workers)
                .context("Failed to load configuration")?;
            let files = read_manifest(&manifest)?;
            if !skip_overlap {
                cmd_overlap(&config, &files).context("Overlap analysis failed")?;
            }
            if !skip_top {
                cmd_top(&config, &files).context("Top-K aggregation failed")?;
            }
        }
        Commands::Overlap { manifest } => {
            let config = load_config(cli.config, cli.max_workers)
                .context("Failed to load configuration")?;
            let files = read_manifest(&manifest)?;
            cmd_overlap(&config, &files).context("Overlap analysis failed")?;
        }
        Commands::Top {
            manifest,
            min_sources,
            max_entries,
        } => {
            let mut config = load_config(cli.config, cli.max_workers)
                .context("Failed to load configuration")?;
            if !min_sources.is_empty() {
                config.analysis.min_sources = min_sources;
            }
            if let Some(max_entries) = max_entries {
                config.analysis.max_entries = max_entries;
            }
            ConfigValidator::validate(&config)
                .context("Invalid --min-sources or --max-entries")?;

            let files = read_manifest(&manifest)?;
            cmd_top(&config, &files).context("Top-K aggregation failed")?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn read_manifest(path: &Path) -> anyhow::Result<Vec<ProcessedFile>> {
    ProcessedFile::load_manifest(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "listinsight=debug"
    } else {
        "listinsight=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn cmd_overlap(config: &Config, files: &[ProcessedFile]) -> Result<()> {
    let engine = OverlapEngine::new(config.overlap_options()?);
    let written = engine.write_compact_overlap_summaries(
        files,
        &config.analysis.categories,
        config.analysis.max_workers,
    )?;

    println!("✓ Overlap analysis complete");
    println!("  Summaries: {}", written);
    println!("  Summary file: {}", engine.options().summary_path.display());
    println!("  Overlap files: {}", engine.options().overlap_dir.display());
    Ok(())
}

fn cmd_top(config: &Config, files: &[ProcessedFile]) -> Result<()> {
    let aggregator = TopAggregator::new(config.top_options()?);
    let summaries = aggregator.process_top_entries(
        &config.analysis.categories,
        files,
        &config.analysis.min_sources,
        config.analysis.max_entries,
        config.analysis.max_workers,
    )?;

    println!("✓ Top-K aggregation complete");
    println!("  Top sets: {}", summaries.len());
    for summary in &summaries {
        println!(
            "  - {} {} min {}: {} entries",
            summary.category, summary.list_type, summary.min_sources, summary.count
        );
    }
    println!(
        "  Summary file: {}",
        aggregator.options().summary_path.display()
    );
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            let rendered = toml::to_string_pretty(&config)?;
            println!("{}", rendered);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Categories: {}", config.analysis.categories.join(", "));
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, max_workers: Option<usize>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    let mut config = if path.exists() {
        Config::load(&path)?
    } else {
        tracing::warn!(
            "Config file not found, using defaults. Run 'listinsight config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        config
    };

    if let Some(max_workers) = max_workers {
        config.analysis.max_workers = max_workers;
    }

    Ok(config)
}
