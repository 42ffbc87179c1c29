//! Basic processing integration tests

use super::{LABELLED, SCENARIO, output_files, test_config, write_file};
use crate::config::TabularFormat;
use crate::models::{InstanceParams, ItemStatus};
use crate::processor::BatchProcessor;
use polars::prelude::*;
use std::fs::{self, File};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_scenario_instance_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_file(&temp_dir.path().join("input"), "rc2_scenario.txt", SCENARIO);

    let processor = BatchProcessor::new(test_config(&temp_dir)).unwrap();
    let summary = processor
        .process(&[input], CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert!(summary.is_success());

    let report = summary.reports().next().unwrap();
    assert_eq!(report.instance_name, "rc2_scenario");
    assert_eq!(report.customer_count, 3);

    let frame = ParquetReader::new(File::open(&report.artifacts.customers).unwrap())
        .finish()
        .unwrap();
    assert_eq!(frame.height(), 4);

    let ids = frame.column("id").unwrap().as_materialized_series().i64().unwrap();
    let demand = frame
        .column("demand")
        .unwrap()
        .as_materialized_series()
        .i64()
        .unwrap();
    assert_eq!(ids.get(0), Some(0));
    assert_eq!(demand.get(0), Some(0));

    let params: InstanceParams =
        serde_json::from_str(&fs::read_to_string(&report.artifacts.params).unwrap()).unwrap();
    assert_eq!(params.instance_name, "rc2_scenario");
    assert_eq!(params.vehicle_count, 25);
    assert_eq!(params.vehicle_capacity, 200);
    assert_eq!(params.customer_count, 3);
    assert_eq!(params.depot_id, 0);
}

#[tokio::test]
async fn test_labelled_file_from_directory() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("homberger_200");
    write_file(&input_dir.join("c2"), "C2_2_1.TXT", LABELLED);
    write_file(&input_dir, "README.txt", "not an instance");

    let processor = BatchProcessor::new(test_config(&temp_dir)).unwrap();
    let summary = processor
        .process(&[input_dir], CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.outcomes.len(), 1);
    assert!(summary.is_success());
    assert_eq!(
        output_files(&temp_dir.path().join("output")),
        vec!["C2_2_1.customers.parquet", "C2_2_1.params.json"]
    );
}

#[tokio::test]
async fn test_single_instance_conversion() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_file(&temp_dir.path().join("input"), "c1_2_1.txt", LABELLED);

    let processor = BatchProcessor::new(test_config(&temp_dir)).unwrap();
    let report = processor.convert_instance(&input).await.unwrap();

    assert_eq!(report.instance_name, "c1_2_1");
    assert_eq!(report.vehicle_count, 50);
    assert_eq!(report.vehicle_capacity, 700);
    assert_eq!(report.customer_count, 2);
    assert_eq!(report.estimated_vehicles, 1);
    assert!(report.artifacts.customers.exists());
}

#[tokio::test]
async fn test_csv_output_format() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_file(&temp_dir.path().join("input"), "r2_csv.txt", SCENARIO);

    let config = test_config(&temp_dir).with_tabular_format(TabularFormat::Csv);
    let processor = BatchProcessor::new(config).unwrap();
    let summary = processor
        .process(&[input], CancellationToken::new())
        .await
        .unwrap();

    let report = summary.reports().next().unwrap();
    assert!(report.artifacts.customers.ends_with("r2_csv.customers.csv"));

    let text = fs::read_to_string(&report.artifacts.customers).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("id,x,y,demand,ready_time,due_time,service_time")
    );
    assert_eq!(text.lines().count(), 5);
}

#[tokio::test]
async fn test_overwrite_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_file(&temp_dir.path().join("input"), "rc2_scenario.txt", SCENARIO);
    let config = test_config(&temp_dir).with_overwrite(true);
    let processor = BatchProcessor::new(config).unwrap();

    let first = processor.convert_instance(&input).await.unwrap();
    let first_params = fs::read(&first.artifacts.params).unwrap();
    let first_frame = ParquetReader::new(File::open(&first.artifacts.customers).unwrap())
        .finish()
        .unwrap();

    let second = processor.convert_instance(&input).await.unwrap();
    let second_frame = ParquetReader::new(File::open(&second.artifacts.customers).unwrap())
        .finish()
        .unwrap();

    assert_eq!(first.artifacts, second.artifacts);
    assert_eq!(first_params, fs::read(&second.artifacts.params).unwrap());
    assert!(first_frame.equals(&second_frame));
}

#[tokio::test]
async fn test_cancelled_before_run_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let first = write_file(&input_dir, "c2_2_1.txt", SCENARIO);
    let second = write_file(&input_dir, "c2_2_2.txt", SCENARIO);

    let token = CancellationToken::new();
    token.cancel();

    let processor = BatchProcessor::new(test_config(&temp_dir)).unwrap();
    let summary = processor.process(&[first, second], token).await.unwrap();

    assert_eq!(summary.cancelled, 2);
    assert!(summary.was_cancelled());
    assert!(!summary.is_success());
    assert!(
        summary
            .outcomes
            .iter()
            .all(|o| matches!(o.status, ItemStatus::Cancelled))
    );
    assert!(output_files(&temp_dir.path().join("output")).is_empty());
}
