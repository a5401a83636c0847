use crate::error::{Result, RifError};
use ccw_common::env;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BUCKET: &str = "ccw-rif";

/// Connection settings for the bucket holding incoming data sets
#[derive(Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// When both keys are absent the default AWS credential chain is used
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}

impl S3Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            endpoint: env::var("S3_ENDPOINT"),
            region: env::var("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket: env::var("S3_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            access_key: env::var_any(&["S3_ACCESS_KEY", "AWS_ACCESS_KEY_ID"]),
            secret_key: env::var_any(&["S3_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"]),
            path_style: env::flag_or("S3_PATH_STYLE", false)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: DEFAULT_REGION.to_string(),
            bucket: bucket.into(),
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(RifError::Config("S3 bucket must not be empty".to_string()));
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(RifError::Config(
                "S3 access key and secret key must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_for_minio() {
        let config = S3Config::for_minio("http://localhost:9000", "test-bucket");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.bucket, "test-bucket");
        assert!(config.path_style);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_key_pair() {
        let mut config = S3Config::for_minio("http://localhost:9000", "test-bucket");
        config.secret_key = None;
        assert!(config.validate().is_err());

        config.access_key = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = S3Config::for_minio("http://localhost:9000", "test-bucket");
        let debug = format!("{:?}", config);
        assert!(debug.contains("***"));
        assert!(!debug.contains("secret_key: Some(\"minioadmin\")"));
    }
}
