//! Configuration management and validation.
//!
//! Provides the read-only configuration shared by every conversion in a
//! batch: output location, overwrite policy, worker limit, the instance
//! file pattern, and the tabular output format.

use crate::constants::{
    DEFAULT_INSTANCE_PATTERN, DEFAULT_MAX_ENTRY_BYTES, DEFAULT_OUTPUT_DIR,
    DEFAULT_RETRY_BACKOFF_MS, DEFAULT_WRITE_RETRIES,
};
use crate::error::{ConvertError, Result};
use polars::prelude::ParquetCompression;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

/// Supported compression algorithms for parquet files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "snappy" => Ok(CompressionAlgorithm::Snappy),
            "zstd" => Ok(CompressionAlgorithm::Zstd),
            "lz4" => Ok(CompressionAlgorithm::Lz4),
            "none" | "uncompressed" => Ok(CompressionAlgorithm::Uncompressed),
            other => Err(ConvertError::configuration(format!(
                "unknown compression '{}' (expected snappy, zstd, lz4 or none)",
                other
            ))),
        }
    }
}

/// Format of the customer table artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabularFormat {
    Parquet,
    Csv,
}

impl TabularFormat {
    /// File extension used in `<name>.customers.<ext>`
    pub fn extension(&self) -> &'static str {
        match self {
            TabularFormat::Parquet => "parquet",
            TabularFormat::Csv => "csv",
        }
    }
}

impl FromStr for TabularFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "parquet" => Ok(TabularFormat::Parquet),
            "csv" => Ok(TabularFormat::Csv),
            other => Err(ConvertError::configuration(format!(
                "unknown tabular format '{}' (expected parquet or csv)",
                other
            ))),
        }
    }
}

/// Configuration for a conversion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Directory receiving the artifact pairs
    pub output_dir: PathBuf,

    /// Replace existing artifact pairs instead of refusing
    pub overwrite: bool,

    /// Maximum concurrent conversions (0 = number of CPU cores)
    pub concurrency: usize,

    /// Regex matched case-insensitively against whole entry basenames
    pub instance_pattern: String,

    /// Customer table format
    pub tabular_format: TabularFormat,

    /// Parquet compression algorithm
    pub compression: CompressionAlgorithm,

    /// Write column statistics into parquet output
    pub enable_statistics: bool,

    /// Extra attempts for a failed artifact write
    pub write_retries: usize,

    /// Base delay between write attempts, grows linearly
    pub retry_backoff_ms: u64,

    /// Largest instance entry or file read into memory
    pub max_entry_bytes: u64,

    /// Partial-accept mode: a run with at least one success counts as success
    pub allow_partial: bool,

    /// Draw a progress bar while converting
    pub show_progress: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            overwrite: false,
            concurrency: 0,
            instance_pattern: DEFAULT_INSTANCE_PATTERN.to_string(),
            tabular_format: TabularFormat::Parquet,
            compression: CompressionAlgorithm::Snappy,
            enable_statistics: true,
            write_retries: DEFAULT_WRITE_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            allow_partial: false,
            show_progress: true,
        }
    }
}

impl ConverterConfig {
    /// Set the output directory
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Enable or disable overwriting existing outputs
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the instance file pattern
    pub fn with_instance_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.instance_pattern = pattern.into();
        self
    }

    /// Set the customer table format
    pub fn with_tabular_format(mut self, format: TabularFormat) -> Self {
        self.tabular_format = format;
        self
    }

    /// Set the parquet compression algorithm
    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.compression = compression;
        self
    }

    /// Set the number of extra write attempts
    pub fn with_write_retries(mut self, retries: usize) -> Self {
        self.write_retries = retries;
        self
    }

    /// Set the maximum entry size read into memory
    pub fn with_max_entry_bytes(mut self, max_entry_bytes: u64) -> Self {
        self.max_entry_bytes = max_entry_bytes;
        self
    }

    /// Enable partial-accept mode
    pub fn with_allow_partial(mut self, allow_partial: bool) -> Self {
        self.allow_partial = allow_partial;
        self
    }

    /// Disable the progress bar (tests, quiet mode)
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Worker limit with the CPU-core default applied
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency == 0 {
            num_cpus::get().max(1)
        } else {
            self.concurrency
        }
    }

    /// Compile the instance pattern, anchored and case-insensitive
    pub fn compile_pattern(&self) -> Result<Regex> {
        RegexBuilder::new(&format!("^(?:{})$", self.instance_pattern))
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                ConvertError::configuration(format!(
                    "invalid instance pattern '{}': {}",
                    self.instance_pattern, e
                ))
            })
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> Result<()> {
        self.compile_pattern()?;

        if self.max_entry_bytes == 0 {
            return Err(ConvertError::configuration(
                "max_entry_bytes must be greater than zero",
            ));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(ConvertError::configuration("output directory is empty"));
        }

        debug!(
            "Configuration valid: output={}, overwrite={}, workers={}, format={:?}",
            self.output_dir.display(),
            self.overwrite,
            self.effective_concurrency(),
            self.tabular_format
        );

        Ok(())
    }
}
