//! Error handling for Homberger instance conversion.
//!
//! Provides error types with context for archive resolution, grammar
//! parsing, semantic validation, and artifact writing failures.

use crate::parser::ParseError;
use crate::validator::ValidationDefect;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Input not found at path: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Archive error in {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("No instance files matching '{pattern}' found in {path}")]
    EmptyInput { path: PathBuf, pattern: String },

    #[error("Parse error in {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: ParseError,
    },

    #[error("Validation failed for instance {name}: {}", describe_defects(.defects))]
    Validation {
        name: String,
        defects: Vec<ValidationDefect>,
    },

    #[error("Instance {name} from {duplicate} would overwrite the artifacts of {first}")]
    DuplicateInstance {
        name: String,
        first: String,
        duplicate: String,
    },

    #[error("Output already exists: {path} (pass --overwrite to replace it)")]
    OutputExists { path: PathBuf },

    #[error("Write failed for {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

impl ConvertError {
    /// Short, stable name of the error kind used in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::Io(_) => "io",
            ConvertError::Polars(_) => "polars",
            ConvertError::InputNotFound { .. } => "input-not-found",
            ConvertError::Archive { .. } => "archive",
            ConvertError::EmptyInput { .. } => "empty-input",
            ConvertError::Parse { .. } => "parse",
            ConvertError::Validation { .. } => "validation",
            ConvertError::DuplicateInstance { .. } => "duplicate-instance",
            ConvertError::OutputExists { .. } => "output-exists",
            ConvertError::Write { .. } => "write",
            ConvertError::Configuration { .. } => "configuration",
            ConvertError::Interrupted { .. } => "interrupted",
        }
    }

    /// Only artifact writes may be re-attempted; everything else is a
    /// deterministic content or format error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConvertError::Write { .. })
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ConvertError::Configuration {
            message: message.into(),
        }
    }

    pub fn archive(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ConvertError::Archive {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        ConvertError::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

fn describe_defects(defects: &[ValidationDefect]) -> String {
    let listed = defects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} defect(s): {}", defects.len(), listed)
}

pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_defect() {
        let error = ConvertError::Validation {
            name: "C2_2_1".to_string(),
            defects: vec![
                ValidationDefect::DuplicateId { id: 4 },
                ValidationDefect::InvalidTimeWindow {
                    id: 7,
                    ready_time: 90,
                    due_time: 10,
                },
            ],
        };

        let message = error.to_string();
        assert!(message.starts_with("Validation failed for instance C2_2_1: 2 defect(s)"));
        assert!(message.contains("id 4"));
        assert!(message.contains("id 7"));
        assert_eq!(error.kind(), "validation");
    }

    #[test]
    fn test_only_write_errors_are_retryable() {
        assert!(ConvertError::write("out/a.params.json", "disk full").is_retryable());
        assert!(
            !ConvertError::OutputExists {
                path: PathBuf::from("out/a.params.json")
            }
            .is_retryable()
        );
        assert!(!ConvertError::archive("a.zip", "corrupt").is_retryable());
    }
}
