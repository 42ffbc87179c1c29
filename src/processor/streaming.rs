//! Concurrent conversion of resolved instance entries.
//!
//! Runs read, parse, validate and write for each entry on the blocking
//! pool, bounded by the configured worker limit. Results come back in input
//! order, a failed item never stops the others, and cancellation is checked
//! before each item starts. An item that has begun writing is never
//! abandoned.

use super::discovery::EntryRef;
use super::writer::InstanceWriter;
use crate::config::ConverterConfig;
use crate::error::{ConvertError, Result};
use crate::models::{ConversionReport, ItemOutcome, ItemStatus, RawBlob, ValidInstance};
use crate::parser::parse_instance;
use crate::validator::validate_instance;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One unit of batch work, in input order
#[derive(Debug)]
pub enum WorkItem {
    /// A matching instance entry to convert
    Entry(EntryRef),
    /// An item rejected before conversion; reported as-is
    Rejected { source: String, error: ConvertError },
    /// An input skipped because the run was cancelled before it was resolved
    Skipped { source: String },
}

/// Converts instances on a bounded worker pool
#[derive(Debug, Clone)]
pub struct StreamingProcessor {
    writer: Arc<InstanceWriter>,
    concurrency: usize,
    max_entry_bytes: u64,
    write_retries: usize,
    retry_backoff: Duration,
    show_progress: bool,
}

impl StreamingProcessor {
    /// Create a new streaming processor
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            writer: Arc::new(InstanceWriter::new(config)),
            concurrency: config.effective_concurrency(),
            max_entry_bytes: config.max_entry_bytes,
            write_retries: config.write_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            show_progress: config.show_progress,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process work items, returning one outcome per item in input order
    pub async fn process_items(
        &self,
        items: Vec<WorkItem>,
        cancel: &CancellationToken,
    ) -> Vec<ItemOutcome> {
        let pb = self.create_progress_bar(items.len() as u64);
        let concurrent_limit = self.concurrency.min(items.len()).max(1);
        debug!(
            "Converting {} item(s) with {} worker(s)",
            items.len(),
            concurrent_limit
        );

        let outcomes = stream::iter(items)
            .map(|item| {
                let pb = pb.clone();
                async move {
                    let outcome = self.process_item(item, cancel).await;
                    pb.inc(1);
                    outcome
                }
            })
            .buffered(concurrent_limit)
            .collect::<Vec<_>>()
            .await;

        pb.finish_with_message("Conversion finished");
        outcomes
    }

    async fn process_item(&self, item: WorkItem, cancel: &CancellationToken) -> ItemOutcome {
        let entry = match item {
            WorkItem::Entry(entry) => entry,
            WorkItem::Rejected { source, error } => {
                error!("Rejected {}: {}", source, error);
                return ItemOutcome {
                    source,
                    status: ItemStatus::Failed(error),
                };
            }
            WorkItem::Skipped { source } => {
                return ItemOutcome {
                    source,
                    status: ItemStatus::Cancelled,
                };
            }
        };

        let source = entry.to_string();
        if cancel.is_cancelled() {
            debug!("Skipping {} after cancellation", source);
            return ItemOutcome {
                source,
                status: ItemStatus::Cancelled,
            };
        }

        // Only the read, parse and validate stage is abandoned on cancellation.
        // Once writing starts the item runs to completion and reports what
        // actually reached the disk.
        let prepared = tokio::select! {
            result = self.prepare_entry(entry) => result,
            _ = cancel.cancelled() => {
                warn!("Abandoned {} after cancellation", source);
                return ItemOutcome {
                    source,
                    status: ItemStatus::Cancelled,
                };
            }
        };

        let status = self.finish_item(&source, prepared).await;
        ItemOutcome { source, status }
    }

    /// Write a prepared instance and turn the result into an item status
    async fn finish_item(
        &self,
        source: &str,
        prepared: Result<(String, ValidInstance)>,
    ) -> ItemStatus {
        let result = match prepared {
            Ok((source_name, instance)) => {
                self.write_with_retries(source_name, Arc::new(instance))
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                info!(
                    "Converted {} ({} customers, capacity {}, ~{} vehicles needed)",
                    report.instance_name,
                    report.customer_count,
                    report.vehicle_capacity,
                    report.estimated_vehicles
                );
                ItemStatus::Converted(report)
            }
            Err(e) => {
                error!("Failed to convert {}: {}", source, e);
                ItemStatus::Failed(e)
            }
        }
    }

    /// Read, parse, validate and write one entry
    pub async fn convert_entry(&self, entry: EntryRef) -> Result<ConversionReport> {
        let (source_name, instance) = self.prepare_entry(entry).await?;
        self.write_with_retries(source_name, Arc::new(instance))
            .await
    }

    /// Read, parse and validate one entry without writing anything
    async fn prepare_entry(&self, entry: EntryRef) -> Result<(String, ValidInstance)> {
        let max_bytes = self.max_entry_bytes;
        run_blocking(move || {
            let blob = entry.load(max_bytes)?;
            let instance = parse_and_validate(&blob)?;
            Ok((blob.source_name, instance))
        })
        .await
    }

    /// Convert an already loaded blob
    pub async fn convert_blob(&self, blob: RawBlob) -> Result<ConversionReport> {
        let (source_name, instance) = run_blocking(move || {
            let instance = parse_and_validate(&blob)?;
            Ok((blob.source_name, instance))
        })
        .await?;

        self.write_with_retries(source_name, Arc::new(instance))
            .await
    }

    /// Write the artifact pair, re-attempting only `Write` failures
    async fn write_with_retries(
        &self,
        source_name: String,
        instance: Arc<ValidInstance>,
    ) -> Result<ConversionReport> {
        let mut attempt = 1;
        loop {
            let writer = self.writer.clone();
            let target = instance.clone();
            match run_blocking(move || writer.write(&target)).await {
                Ok(artifacts) => {
                    return Ok(ConversionReport {
                        instance_name: instance.name.clone(),
                        source_name,
                        customer_count: instance.customers.len(),
                        vehicle_count: instance.vehicle_count,
                        vehicle_capacity: instance.vehicle_capacity,
                        estimated_vehicles: instance.estimated_vehicles(),
                        artifacts,
                        write_attempts: attempt,
                    });
                }
                Err(e) if e.is_retryable() && attempt <= self.write_retries => {
                    warn!(
                        "Write attempt {} for {} failed, retrying: {}",
                        attempt, instance.name, e
                    );
                    tokio::time::sleep(self.retry_backoff * attempt as u32).await;
                    attempt += 1;
                }
                Err(ConvertError::Write { path, reason }) if attempt > 1 => {
                    return Err(ConvertError::Write {
                        path,
                        reason: format!("{} (after {} attempts)", reason, attempt),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn create_progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message("Converting instances");
        pb
    }
}

/// Syntax pass, then the exhaustive semantic pass
pub fn parse_and_validate(blob: &RawBlob) -> Result<ValidInstance> {
    let instance = parse_instance(blob).map_err(|source| ConvertError::Parse {
        file: blob.source_name.clone(),
        source,
    })?;
    validate_instance(instance)
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| ConvertError::Interrupted {
            reason: format!("conversion task failed: {}", e),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const VALID: &str = "RC2_2_1\n25 200\n0 40 50 0 0 1236 0\n1 45 68 10 912 967 90\n2 45 70 30 825 870 90\n";

    fn create_test_processor(temp_dir: &TempDir) -> StreamingProcessor {
        let config = ConverterConfig::default()
            .with_output_dir(temp_dir.path().join("out"))
            .with_concurrency(2)
            .without_progress();
        StreamingProcessor::new(&config)
    }

    fn write_instance(temp_dir: &TempDir, name: &str, text: &str) -> EntryRef {
        let path = temp_dir.path().join(name);
        fs::write(&path, text).unwrap();
        EntryRef::File(path)
    }

    #[tokio::test]
    async fn test_convert_entry() {
        let temp_dir = TempDir::new().unwrap();
        let processor = create_test_processor(&temp_dir);
        let entry = write_instance(&temp_dir, "RC2_2_1.TXT", VALID);

        let report = processor.convert_entry(entry).await.unwrap();
        assert_eq!(report.instance_name, "RC2_2_1");
        assert_eq!(report.customer_count, 2);
        assert_eq!(report.write_attempts, 1);
        assert!(report.artifacts.customers.exists());
        assert!(report.artifacts.params.exists());
    }

    #[tokio::test]
    async fn test_parse_error_carries_source_name() {
        let temp_dir = TempDir::new().unwrap();
        let processor = create_test_processor(&temp_dir);
        let blob = RawBlob::new("c2/C2_2_9.TXT", "C2\n25 200\n0 40 50 0 0 1236\n");

        match processor.convert_blob(blob).await {
            Err(ConvertError::Parse { file, source }) => {
                assert_eq!(file, "c2/C2_2_9.TXT");
                assert_eq!(source.line(), 3);
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_instance_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let processor = create_test_processor(&temp_dir);
        let blob = RawBlob::new(
            "C2_2_1.TXT",
            "C2\n25 200\n0 40 50 0 0 1236 0\n1 45 68 500 912 967 90\n",
        );

        let err = processor.convert_blob(blob).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(!temp_dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_outcomes_keep_input_order() {
        let temp_dir = TempDir::new().unwrap();
        let processor = create_test_processor(&temp_dir);

        let items = vec![
            WorkItem::Entry(write_instance(&temp_dir, "C2_2_1.TXT", VALID)),
            WorkItem::Entry(write_instance(&temp_dir, "C2_2_2.TXT", "broken\n")),
            WorkItem::Rejected {
                source: "missing.zip".to_string(),
                error: ConvertError::InputNotFound {
                    path: PathBuf::from("missing.zip"),
                },
            },
            WorkItem::Entry(write_instance(&temp_dir, "C2_2_3.TXT", VALID)),
        ];

        let outcomes = processor
            .process_items(items, &CancellationToken::new())
            .await;

        assert_eq!(outcomes.len(), 4);
        assert!(matches!(outcomes[0].status, ItemStatus::Converted(_)));
        assert_eq!(outcomes[1].error().map(|e| e.kind()), Some("parse"));
        assert_eq!(outcomes[2].source, "missing.zip");
        assert_eq!(outcomes[2].error().map(|e| e.kind()), Some("input-not-found"));
        assert!(matches!(outcomes[3].status, ItemStatus::Converted(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let temp_dir = TempDir::new().unwrap();
        let processor = create_test_processor(&temp_dir);
        let token = CancellationToken::new();
        token.cancel();

        let items = vec![
            WorkItem::Entry(write_instance(&temp_dir, "C2_2_1.TXT", VALID)),
            WorkItem::Skipped {
                source: "later.zip".to_string(),
            },
        ];
        let outcomes = processor.process_items(items, &token).await;

        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o.status, ItemStatus::Cancelled))
        );
        assert!(!temp_dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_output_exists_is_not_retried() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConverterConfig::default()
            .with_output_dir(temp_dir.path().join("out"))
            .with_write_retries(3)
            .without_progress();
        let processor = StreamingProcessor::new(&config);

        let blob = RawBlob::new("C2_2_1.TXT", VALID);
        processor.convert_blob(blob.clone()).await.unwrap();

        match processor.convert_blob(blob).await {
            Err(ConvertError::OutputExists { path }) => {
                assert!(path.ends_with("C2_2_1.customers.parquet"));
            }
            other => panic!("Expected OutputExists error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_failure_retried_then_reported() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");
        // A regular file where the output directory should be
        fs::write(&out, "not a directory").unwrap();

        let config = ConverterConfig::default()
            .with_output_dir(&out)
            .with_write_retries(2)
            .without_progress();
        let processor = StreamingProcessor::new(&config);

        let err = processor
            .convert_blob(RawBlob::new("C2_2_1.TXT", VALID))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "write");
        assert!(err.to_string().ends_with("(after 3 attempts)"));
    }

    #[tokio::test]
    async fn test_write_retry_recovers_from_transient_failure() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");
        fs::write(&out, "not a directory yet").unwrap();

        let mut config = ConverterConfig::default()
            .with_output_dir(&out)
            .with_write_retries(2)
            .without_progress();
        config.retry_backoff_ms = 500;
        let processor = StreamingProcessor::new(&config);

        // Clear the blocker while the first retry is backing off
        let blocker = out.clone();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            fs::remove_file(blocker).unwrap();
        });

        let report = processor
            .convert_blob(RawBlob::new("C2_2_1.TXT", VALID))
            .await
            .unwrap();
        release.await.unwrap();

        assert_eq!(report.write_attempts, 2);
        assert!(report.artifacts.customers.exists());
        assert!(report.artifacts.params.exists());
    }

    #[tokio::test]
    async fn test_cancellation_mid_batch_leaves_whole_pairs() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");
        let processor = create_test_processor(&temp_dir);

        let items: Vec<WorkItem> = (1..=20)
            .map(|i| WorkItem::Entry(write_instance(&temp_dir, &format!("C2_2_{}.TXT", i), VALID)))
            .collect();

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            canceller.cancel();
        });

        let outcomes = processor.process_items(items, &token).await;
        assert_eq!(outcomes.len(), 20);

        let mut converted = 0;
        for (i, outcome) in outcomes.iter().enumerate() {
            let customers = out.join(format!("C2_2_{}.customers.parquet", i + 1));
            let params = out.join(format!("C2_2_{}.params.json", i + 1));
            match &outcome.status {
                ItemStatus::Converted(_) => {
                    converted += 1;
                    assert!(customers.exists() && params.exists());
                }
                ItemStatus::Cancelled => assert!(!customers.exists() && !params.exists()),
                ItemStatus::Failed(e) => panic!("Unexpected failure: {}", e),
            }
        }

        let on_disk = if out.exists() {
            fs::read_dir(&out).unwrap().count()
        } else {
            0
        };
        assert_eq!(on_disk, converted * 2);
    }
}
