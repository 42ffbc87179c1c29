//! Batch conversion of benchmark instances.
//!
//! Resolves every input path into instance entries, then drives the
//! read, parse, validate and write pipeline over them with the streaming
//! processor. Per-item failures are collected into the run summary and never
//! abort the batch.

pub mod discovery;
pub mod streaming;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::discovery::{EntryRef, InstanceSource, resolve_first};
use self::streaming::{StreamingProcessor, WorkItem};

use crate::config::ConverterConfig;
use crate::error::{ConvertError, Result};
use crate::models::{BatchSummary, ConversionReport, ItemStatus};

use colored::*;
use regex::Regex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Batch coordinator for instance conversion
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    config: ConverterConfig,
    pattern: Regex,
    streaming_processor: StreamingProcessor,
}

impl BatchProcessor {
    /// Create a new batch processor, rejecting an invalid configuration
    pub fn new(config: ConverterConfig) -> Result<Self> {
        config.validate()?;
        let pattern = config.compile_pattern()?;
        let streaming_processor = StreamingProcessor::new(&config);

        Ok(Self {
            config,
            pattern,
            streaming_processor,
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert every matching instance under `inputs`.
    ///
    /// Outcomes in the summary follow input order, then entry order within
    /// each input. An input that cannot be resolved becomes one failed item
    /// named after the input path, and an entry whose instance name was
    /// already claimed by an earlier entry fails with `DuplicateInstance`.
    pub async fn process(
        &self,
        inputs: &[PathBuf],
        cancel: CancellationToken,
    ) -> Result<BatchSummary> {
        let start_time = Instant::now();
        let mut items = Vec::new();
        let mut claimed: HashMap<String, String> = HashMap::new();

        for input in inputs {
            let source = input.display().to_string();
            if cancel.is_cancelled() {
                items.push(WorkItem::Skipped { source });
                continue;
            }

            match self.resolve(input).await {
                Ok(entries) => {
                    debug!("Resolved {} instance(s) from {}", entries.len(), source);
                    items.extend(
                        entries
                            .into_iter()
                            .map(|entry| claim_instance_name(&mut claimed, entry)),
                    );
                }
                Err(error) => {
                    warn!("Cannot resolve {}: {}", source, error);
                    items.push(WorkItem::Rejected { source, error });
                }
            }
        }

        info!(
            "Converting {} item(s) with up to {} worker(s)",
            items.len(),
            self.streaming_processor.concurrency()
        );

        let outcomes = self.streaming_processor.process_items(items, &cancel).await;
        let summary = BatchSummary::from_outcomes(outcomes, start_time.elapsed().as_millis());

        info!(
            "Batch finished: {} converted, {} failed, {} cancelled",
            summary.succeeded, summary.failed, summary.cancelled
        );
        Ok(summary)
    }

    /// Convert the first matching instance under `path`, surfacing any
    /// error directly instead of collecting it.
    pub async fn convert_instance(&self, path: &Path) -> Result<ConversionReport> {
        let path = path.to_path_buf();
        let pattern = self.pattern.clone();
        let max_bytes = self.config.max_entry_bytes;

        let blob = task::spawn_blocking(move || resolve_first(&path, &pattern, max_bytes))
            .await
            .map_err(|e| ConvertError::Interrupted {
                reason: format!("resolver task failed: {}", e),
            })??;

        debug!("Converting single instance {}", blob.source_name);
        self.streaming_processor.convert_blob(blob).await
    }

    /// Whether a finished batch counts as a successful run
    pub fn accepts(&self, summary: &BatchSummary) -> bool {
        if summary.is_success() {
            return true;
        }
        self.config.allow_partial && !summary.was_cancelled() && summary.succeeded > 0
    }

    async fn resolve(&self, input: &Path) -> Result<Vec<EntryRef>> {
        let input = input.to_path_buf();
        let pattern = self.pattern.clone();
        let max_bytes = self.config.max_entry_bytes;

        task::spawn_blocking(move || {
            InstanceSource::open(&input, &pattern, max_bytes).map(InstanceSource::into_entries)
        })
        .await
        .map_err(|e| ConvertError::Interrupted {
            reason: format!("resolver task failed: {}", e),
        })?
    }
}

/// Reject an entry whose artifacts would land on those of an earlier entry.
///
/// Names are compared case-insensitively, since case-insensitive filesystems
/// map `C2_2_1` and `c2_2_1` to the same files.
fn claim_instance_name(claimed: &mut HashMap<String, String>, entry: EntryRef) -> WorkItem {
    let name = entry.instance_name();
    let source = entry.to_string();

    match claimed.entry(name.to_ascii_lowercase()) {
        Entry::Vacant(slot) => {
            slot.insert(source);
            WorkItem::Entry(entry)
        }
        Entry::Occupied(slot) => {
            warn!("{} shares instance name {} with {}", source, name, slot.get());
            WorkItem::Rejected {
                error: ConvertError::DuplicateInstance {
                    name,
                    first: slot.get().clone(),
                    duplicate: source.clone(),
                },
                source,
            }
        }
    }
}

/// Print the run summary, listing every failed item in input order
pub fn print_summary(summary: &BatchSummary, output_dir: &Path) {
    println!("\n{}", "Processing Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        summary.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Output:".bright_cyan(),
        output_dir.display()
    );
    println!(
        "  {} {}",
        "Instances converted:".bright_cyan(),
        summary.succeeded.to_string().bright_white().bold()
    );
    if summary.failed > 0 {
        println!(
            "  {} {}",
            "Instances failed:".bright_red(),
            summary.failed.to_string().bright_red().bold()
        );
    }
    if summary.cancelled > 0 {
        println!(
            "  {} {}",
            "Instances cancelled:".bright_yellow(),
            summary.cancelled.to_string().bright_yellow().bold()
        );
    }

    for outcome in &summary.outcomes {
        match &outcome.status {
            ItemStatus::Converted(report) => println!(
                "  {} {} ({} customers, {} vehicles x {})",
                "ok".bright_green(),
                report.instance_name,
                report.customer_count,
                report.vehicle_count,
                report.vehicle_capacity
            ),
            ItemStatus::Failed(error) => println!(
                "  {} {} [{}] {}",
                "failed".bright_red().bold(),
                outcome.source,
                error.kind(),
                error
            ),
            ItemStatus::Cancelled => {
                println!("  {} {}", "cancelled".bright_yellow(), outcome.source)
            }
        }
    }
}
