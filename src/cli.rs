//! Command-line interface components.

use crate::config::{CompressionAlgorithm, ConverterConfig, TabularFormat};
use crate::constants::{
    DEFAULT_INSTANCE_PATTERN, DEFAULT_OUTPUT_DIR, DEFAULT_WRITE_RETRIES, EXIT_CANCELLED,
};
use crate::models::BatchSummary;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "homberger_processor")]
#[command(about = "Convert Gehring & Homberger VRPTW instances to canonical Parquet datasets")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Zip archives, directories or instance files to convert
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory receiving the artifact pairs
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Replace existing artifact pairs
    #[arg(long)]
    pub overwrite: bool,

    /// Number of concurrent conversions (0 = number of CPU cores)
    #[arg(short = 'j', long, default_value_t = 0)]
    pub concurrency: usize,

    /// Regex matched case-insensitively against instance file names
    #[arg(short, long, default_value = DEFAULT_INSTANCE_PATTERN)]
    pub pattern: String,

    /// Customer table format (parquet, csv)
    #[arg(long, default_value = "parquet")]
    pub format: TabularFormat,

    /// Parquet compression algorithm (snappy, zstd, lz4, none)
    #[arg(long, default_value = "snappy")]
    pub compression: CompressionAlgorithm,

    /// Extra attempts for a failed artifact write
    #[arg(long, default_value_t = DEFAULT_WRITE_RETRIES)]
    pub write_retries: usize,

    /// Succeed when at least one instance converted
    #[arg(long)]
    pub allow_partial: bool,

    /// Convert only the first matching instance of the first input
    #[arg(long)]
    pub single: bool,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors, and hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Translate arguments into a validated converter configuration
    pub fn to_config(&self) -> Result<ConverterConfig> {
        let mut config = ConverterConfig::default()
            .with_output_dir(self.output_dir.clone())
            .with_overwrite(self.overwrite)
            .with_concurrency(self.concurrency)
            .with_instance_pattern(self.pattern.clone())
            .with_tabular_format(self.format)
            .with_compression(self.compression)
            .with_write_retries(self.write_retries)
            .with_allow_partial(self.allow_partial);

        if self.quiet {
            config = config.without_progress();
        }

        config
            .validate()
            .context("Invalid command-line configuration")?;
        Ok(config)
    }

    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

/// Set up structured logging on stderr
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("homberger_processor={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Process exit code for a finished batch
pub fn exit_code(summary: &BatchSummary, accepted: bool) -> i32 {
    if summary.was_cancelled() {
        EXIT_CANCELLED
    } else if accepted {
        0
    } else {
        1
    }
}
