//! Pipeline configuration
//!
//! Everything is read from the environment (after `.env` is loaded by the
//! binary); unset values take the `DEFAULT_*` constants.

use ccw_common::env;
use ccw_rif::s3::S3Config;
use ccw_rif::{ExtractionOptions, LoadOptions, Result, RifError};
use std::time::Duration;

pub const DEFAULT_RUN_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub s3: S3Config,
    pub extraction: ExtractionOptions,
    pub load: LoadOptions,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Pause between poll cycles of `run`
    pub run_interval: Duration,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            s3: S3Config::from_env()?,
            extraction: ExtractionOptions::from_env()?,
            load: LoadOptions::from_env()?,
            database_url: env::var("DATABASE_URL"),
            database_max_connections: env::parse_or(
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
            run_interval: Duration::from_secs(env::parse_or(
                "CCW_RIF_RUN_INTERVAL_SECS",
                DEFAULT_RUN_INTERVAL_SECS,
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.s3.validate()?;
        self.extraction.validate()?;
        self.load.validate()?;
        if self.run_interval.is_zero() {
            return Err(RifError::Config("run interval must not be zero".to_string()));
        }
        if self.database_max_connections == 0 {
            return Err(RifError::Config(
                "database max connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_run_interval(mut self, interval: Duration) -> Self {
        self.run_interval = interval;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            s3: S3Config::default(),
            extraction: ExtractionOptions::default(),
            load: LoadOptions::default(),
            database_url: None,
            database_max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            run_interval: Duration::from_secs(DEFAULT_RUN_INTERVAL_SECS),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.database_url.is_none());
        assert_eq!(config.run_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config = PipelineConfig::default().with_run_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(RifError::Config(_))));
    }

    #[test]
    fn test_nested_options_are_validated() {
        let mut config = PipelineConfig::default();
        config.load.record_batch_size = 0;
        assert!(config.validate().is_err());
    }
}
