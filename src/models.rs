//! Core data structures for Homberger instance conversion.
//!
//! Defines the raw text blobs produced by discovery, the canonical
//! `Instance` form, the parameters record, and the per-item and per-run
//! results reported by the batch processor.

use crate::constants::FLEET_ESTIMATE_FACTOR;
use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Raw text of one instance file, as read from an archive entry or a loose file
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlob {
    /// Archive entry name or file path the text came from
    pub source_name: String,
    pub lines: Vec<String>,
}

impl RawBlob {
    pub fn new(source_name: impl Into<String>, text: &str) -> Self {
        Self {
            source_name: source_name.into(),
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Output identifier derived from the source file name
    pub fn instance_name(&self) -> String {
        instance_name_for(&self.source_name)
    }
}

/// Output identifier for a source name.
///
/// Uses the basename without its extension; characters other than ASCII
/// alphanumerics, `_` and `-` become `_` so the name is safe in paths.
pub fn instance_name_for(source_name: &str) -> String {
    let base = source_name.rsplit(['/', '\\']).next().unwrap_or(source_name);
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(base);

    let name: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() {
        "instance".to_string()
    } else {
        name
    }
}

/// One customer record; the depot is the customer with id 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub demand: i64,
    pub ready_time: i64,
    pub due_time: i64,
    pub service_time: i64,
}

/// A parsed routing instance. Not checked until it passes the validator.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Output identifier derived from the source file name
    pub name: String,
    /// Informational title from the header section
    pub title: Option<String>,
    /// Customer count declared in the header, depot excluded
    pub declared_customers: Option<usize>,
    pub vehicle_count: i64,
    pub vehicle_capacity: i64,
    pub depot: Customer,
    /// Customers in file order, depot excluded
    pub customers: Vec<Customer>,
}

impl Instance {
    /// Depot followed by the customers, in file order
    pub fn all_customers(&self) -> impl Iterator<Item = &Customer> {
        std::iter::once(&self.depot).chain(self.customers.iter())
    }

    /// Summed as `i128`; validated demands are at most `i64::MAX` each
    pub fn total_demand(&self) -> i128 {
        self.customers.iter().map(|c| i128::from(c.demand)).sum()
    }

    /// Demand-based fleet size: `max(1, floor(total_demand / capacity * 1.2))`
    pub fn estimated_vehicles(&self) -> i64 {
        if self.vehicle_capacity <= 0 {
            return 1;
        }
        let ratio = self.total_demand() as f64 / self.vehicle_capacity as f64;
        // Float-to-int casts saturate at i64::MAX
        ((ratio * FLEET_ESTIMATE_FACTOR).floor() as i64).max(1)
    }
}

/// An instance that passed semantic validation.
///
/// Only the validator constructs this, so the writer can never receive an
/// instance carrying defects.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidInstance(Instance);

impl ValidInstance {
    pub(crate) fn new_unchecked(instance: Instance) -> Self {
        Self(instance)
    }

    pub fn into_inner(self) -> Instance {
        self.0
    }
}

impl Deref for ValidInstance {
    type Target = Instance;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Flat parameters record written next to the customer table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceParams {
    pub instance_name: String,
    pub vehicle_count: i64,
    pub vehicle_capacity: i64,
    pub customer_count: usize,
    pub depot_id: i64,
}

impl InstanceParams {
    pub fn from_instance(instance: &ValidInstance) -> Self {
        Self {
            instance_name: instance.name.clone(),
            vehicle_count: instance.vehicle_count,
            vehicle_capacity: instance.vehicle_capacity,
            customer_count: instance.customers.len(),
            depot_id: instance.depot.id,
        }
    }
}

/// Paths of the two artifacts written for one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub customers: PathBuf,
    pub params: PathBuf,
}

/// Result of converting one instance
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub instance_name: String,
    pub source_name: String,
    pub customer_count: usize,
    pub vehicle_count: i64,
    pub vehicle_capacity: i64,
    /// Demand-based fleet estimate; informational only
    pub estimated_vehicles: i64,
    pub artifacts: ArtifactPaths,
    /// Number of write attempts it took, 1 when the first succeeded
    pub write_attempts: usize,
}

/// Final state of one batch item
#[derive(Debug)]
pub enum ItemStatus {
    Converted(ConversionReport),
    Failed(ConvertError),
    Cancelled,
}

/// One batch item: an instance file, or an input that could not be resolved
#[derive(Debug)]
pub struct ItemOutcome {
    /// Input path or `archive!entry` reference
    pub source: String,
    pub status: ItemStatus,
}

impl ItemOutcome {
    pub fn error(&self) -> Option<&ConvertError> {
        match &self.status {
            ItemStatus::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Processing statistics for a batch run
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Every item in input order
    pub outcomes: Vec<ItemOutcome>,
    pub processing_time_ms: u128,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: Vec<ItemOutcome>, processing_time_ms: u128) -> Self {
        let mut summary = Self {
            processing_time_ms,
            ..Default::default()
        };
        for outcome in &outcomes {
            match outcome.status {
                ItemStatus::Converted(_) => summary.succeeded += 1,
                ItemStatus::Failed(_) => summary.failed += 1,
                ItemStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary.outcomes = outcomes;
        summary
    }

    /// Failed items with their errors, in input order
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ConvertError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error().map(|e| (o.source.as_str(), e)))
    }

    pub fn reports(&self) -> impl Iterator<Item = &ConversionReport> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            ItemStatus::Converted(report) => Some(report),
            _ => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0 && self.succeeded > 0
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled > 0
    }
}
