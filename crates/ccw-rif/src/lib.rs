//! CCW RIF data-set ingestion
//!
//! Discovers manifest-described data sets in object storage, parses their
//! beneficiary and claim files into typed record events and loads them with
//! per-file bookkeeping of the beneficiaries each load touched.
//!
//! # Modules
//!
//! - [`manifest`]: manifest documents and bucket key conventions
//! - [`file`]: RIF files and the ordered data-set event
//! - [`source`]: row access over delimited text and Parquet
//! - [`parser`] / [`processor`]: rows to [`record::RecordEvent`]s
//! - [`load`]: loader, sinks and load bookkeeping
//! - [`status`]: job status state machine and reporter
//! - [`monitor`] / [`s3`]: bucket polling

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod file;
pub mod file_type;
pub mod load;
pub mod manifest;
pub mod monitor;
pub mod parser;
pub mod processor;
pub mod record;
pub mod s3;
pub mod source;
pub mod status;

pub use config::{ExtractionOptions, LoadOptions};
pub use error::{FieldError, RecordParseError, Result, RifError};
pub use file::{Charset, DataSetInfo, RifFile, RifFileEvent, RifFileFormat, RifFilesEvent};
pub use file_type::{ClaimLayout, RifFileType};
pub use manifest::{DataSetLocation, DataSetManifest, DataSetManifestEntry, DataSetManifestId};
pub use monitor::{DataSetMonitor, DataSetMonitorListener, MonitorOutcome};
pub use parser::{RifFileParser, RifRecordEvent};
pub use processor::{FileRecords, RifFilesProcessor};
pub use record::{RecordAction, RecordEvent, RifRecord};
pub use status::{JobStage, JobStatusEvent, JobStatusListener, JobStatusReporter};
