//! Error types for the RIF pipeline

use crate::file_type::RifFileType;
use crate::record::RecordAction;
use std::fmt;
use thiserror::Error;

/// Result type alias for RIF pipeline operations
pub type Result<T> = std::result::Result<T, RifError>;

/// Main error type for the RIF pipeline
#[derive(Error, Debug)]
pub enum RifError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] ccw_common::CcwError),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Invalid files event: {0}")]
    InvalidFilesEvent(String),

    #[error("Unknown RIF file type: '{0}'")]
    UnknownFileType(String),

    #[error("Unknown record action: '{0}'")]
    UnknownRecordAction(String),

    #[error("Row {row_number} is not valid {encoding} text in column {column}")]
    Encoding {
        row_number: u64,
        column: usize,
        encoding: &'static str,
    },

    #[error("Missing header row in {0}")]
    MissingHeader(String),

    #[error("Row {row_number} has no value for grouping column {column}")]
    MissingGroupingKey { column: &'static str, row_number: u64 },

    #[error("Rows for key '{key}' are not contiguous (seen again at row {row_number})")]
    GroupingOrderViolation { key: String, row_number: u64 },

    #[error("{0}")]
    Parse(#[from] RecordParseError),

    #[error("Invalid record event: {0}")]
    InvalidRecordEvent(String),

    #[error("Invalid loaded batch: {0}")]
    InvalidBatch(String),

    #[error("Unsupported record action {action} in {file_type} file")]
    UnsupportedRecordAction {
        action: RecordAction,
        file_type: RifFileType,
    },

    #[error("Record rejected by load filter: {0}")]
    Rejected(String),

    #[error("Invalid job status transition: {0}")]
    InvalidStatus(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task error: {0}")]
    Task(String),
}

impl RifError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest(message.into())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for RifError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::migrate::MigrateError> for RifError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(err.to_string())
    }
}

/// A single field that could not be mapped onto its typed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub column: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.column, self.message)
    }
}

/// Failure to transform the rows of one logical record
///
/// Carries the row number of the first raw row plus every field-level problem
/// found while building the record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parse error: lineNumber: {row_number} message: {message} errors: [{}]", join_errors(.errors))]
pub struct RecordParseError {
    pub row_number: u64,
    pub message: String,
    pub errors: Vec<FieldError>,
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
