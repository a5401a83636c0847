//! Tuning for data-set extraction and loading
//!
//! Both option sets read `CCW_RIF_*` environment variables; unset variables
//! take the `DEFAULT_*` values below.

use crate::error::{Result, RifError};
use crate::file_type::RifFileType;
use ccw_common::env;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_DATA_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_MANIFEST_AGE_DAYS: i64 = 60;
pub const DEFAULT_RECORD_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_CONCURRENT_FILES: usize = 4;

/// How manifests are discovered and their data files gathered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOptions {
    /// Page size for bucket listings
    pub s3_list_max_keys: Option<i32>,
    /// Only process entries of this type
    pub allowed_file_type: Option<RifFileType>,
    pub data_poll_interval: Duration,
    /// Give up waiting for data files after this long
    pub data_max_wait: Option<Duration>,
    pub max_manifest_age_days: i64,
    pub strict_grouping: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            s3_list_max_keys: None,
            allowed_file_type: None,
            data_poll_interval: Duration::from_millis(DEFAULT_DATA_POLL_INTERVAL_MS),
            data_max_wait: None,
            max_manifest_age_days: DEFAULT_MAX_MANIFEST_AGE_DAYS,
            strict_grouping: false,
        }
    }
}

impl ExtractionOptions {
    pub fn from_env() -> Result<Self> {
        let options = Self {
            s3_list_max_keys: env::parse("CCW_RIF_S3_LIST_MAX_KEYS")?,
            allowed_file_type: env::var("CCW_RIF_ALLOWED_FILE_TYPE")
                .map(|v| v.parse::<RifFileType>())
                .transpose()?,
            data_poll_interval: Duration::from_millis(env::parse_or(
                "CCW_RIF_DATA_POLL_INTERVAL_MS",
                DEFAULT_DATA_POLL_INTERVAL_MS,
            )?),
            data_max_wait: env::parse::<u64>("CCW_RIF_DATA_MAX_WAIT_SECS")?.map(Duration::from_secs),
            max_manifest_age_days: env::parse_or(
                "CCW_RIF_MAX_MANIFEST_AGE_DAYS",
                DEFAULT_MAX_MANIFEST_AGE_DAYS,
            )?,
            strict_grouping: env::flag_or("CCW_RIF_STRICT_GROUPING", false)?,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(max) = self.s3_list_max_keys {
            if max <= 0 {
                return Err(RifError::Config(format!(
                    "S3 list page size must be positive, got {}",
                    max
                )));
            }
        }
        if self.data_poll_interval.is_zero() {
            return Err(RifError::Config("data poll interval must not be zero".to_string()));
        }
        if self.max_manifest_age_days <= 0 {
            return Err(RifError::Config(format!(
                "max manifest age must be positive, got {} days",
                self.max_manifest_age_days
            )));
        }
        Ok(())
    }

    pub fn max_manifest_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.max_manifest_age_days)
    }
}

/// How parsed records are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Insert only records that are not there yet
    pub idempotent: bool,
    pub record_batch_size: usize,
    pub max_concurrent_files: usize,
    /// Skip or refuse beneficiary rows for other enrollment years
    pub filter_enrollment_year: Option<i32>,
    /// Merge a file's batches into one once it is loaded
    pub compact_batches: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            idempotent: true,
            record_batch_size: DEFAULT_RECORD_BATCH_SIZE,
            max_concurrent_files: DEFAULT_MAX_CONCURRENT_FILES,
            filter_enrollment_year: None,
            compact_batches: false,
        }
    }
}

impl LoadOptions {
    pub fn from_env() -> Result<Self> {
        let options = Self {
            idempotent: env::flag_or("CCW_RIF_IDEMPOTENT", true)?,
            record_batch_size: env::parse_or("CCW_RIF_RECORD_BATCH_SIZE", DEFAULT_RECORD_BATCH_SIZE)?,
            max_concurrent_files: env::parse_or(
                "CCW_RIF_MAX_CONCURRENT_FILES",
                DEFAULT_MAX_CONCURRENT_FILES,
            )?,
            filter_enrollment_year: env::parse("CCW_RIF_FILTER_ENROLLMENT_YEAR")?,
            compact_batches: env::flag_or("CCW_RIF_COMPACT_BATCHES", false)?,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.record_batch_size == 0 {
            return Err(RifError::Config("record batch size must be at least 1".to_string()));
        }
        if self.max_concurrent_files == 0 {
            return Err(RifError::Config(
                "max concurrent files must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
