//! Homberger Processor Library
//!
//! A Rust library for converting Gehring & Homberger vehicle-routing
//! benchmark instances (VRPTW text files) into a validated, canonical form:
//! one tabular customer dataset and one parameters record per instance.
//!
//! This library provides tools for:
//! - Resolving instance files from zip archives, directories or loose files
//! - Parsing the positional instance grammar with line-accurate errors
//! - Validating cross-field invariants, reporting every defect at once
//! - Writing Parquet (or CSV) customer tables and JSON parameter records
//!   as an all-or-nothing pair
//! - Converting whole batches concurrently with per-item results

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod parser;
pub mod processor;
pub mod validator;

// Re-export commonly used types
pub use config::{CompressionAlgorithm, ConverterConfig, TabularFormat};
pub use error::{ConvertError, Result};
pub use models::{
    BatchSummary, ConversionReport, Customer, Instance, InstanceParams, ItemOutcome, ItemStatus,
    RawBlob, ValidInstance,
};
pub use parser::{ParseError, parse_instance};
pub use processor::BatchProcessor;
pub use validator::{ValidationDefect, validate_instance};
