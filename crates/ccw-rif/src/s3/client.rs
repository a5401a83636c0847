use super::config::S3Config;
use super::{ListPage, ObjectStore};
use crate::error::{Result, RifError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use bytes::Bytes;
use std::path::Path;
use tracing::{debug, info, instrument};

/// [`ObjectStore`] over S3 or an S3-compatible service
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(config: S3Config) -> Result<Self> {
        config.validate()?;
        debug!(?config, "Initializing S3 object store");

        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = Credentials::new(access_key, secret_key, None, None, "ccw-rif");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(credentials)
                    .region(Region::new(config.region.clone()))
            },
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };
        builder = builder.force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        info!(bucket = %config.bucket, "S3 object store initialized");

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: Option<i32>,
    ) -> Result<ListPage> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix);
        if let Some(token) = continuation {
            request = request.continuation_token(token);
        }
        if let Some(max) = max_keys {
            request = request.max_keys(max);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RifError::storage(format!("Failed to list {}: {}", self.location(prefix), e)))?;

        let keys = response
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();
        let next_continuation = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            keys,
            next_continuation,
        })
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(err) if err.is_no_such_key() => RifError::ObjectNotFound(self.location(key)),
                _ => RifError::storage(format!("Failed to download {}: {}", self.location(key), e)),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| RifError::storage(format!("Failed to read {}: {}", self.location(key), e)))?
            .into_bytes();
        debug!(bytes = data.len(), "Downloaded {}", self.location(key));
        Ok(data)
    }

    #[instrument(skip(self, data))]
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| RifError::storage(format!("Failed to upload {}: {}", self.location(key), e)))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match e.as_service_error() {
                Some(err) if err.is_not_found() => Ok(false),
                _ => Err(RifError::storage(format!(
                    "Failed to check {}: {}",
                    self.location(key),
                    e
                ))),
            },
        }
    }

    #[instrument(skip(self))]
    async fn copy(&self, source_key: &str, dest_key: &str) -> Result<()> {
        let copy_source = format!("{}/{}", self.bucket, source_key);
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(&copy_source)
            .key(dest_key)
            .send()
            .await
            .map_err(|e| {
                RifError::storage(format!(
                    "Failed to copy {} to {}: {}",
                    self.location(source_key),
                    self.location(dest_key),
                    e
                ))
            })?;
        debug!("Copied {} to {}", self.location(source_key), self.location(dest_key));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| RifError::storage(format!("Failed to delete {}: {}", self.location(key), e)))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download_to(&self, key: &str, path: &Path) -> Result<()> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(err) if err.is_no_such_key() => RifError::ObjectNotFound(self.location(key)),
                _ => RifError::storage(format!("Failed to download {}: {}", self.location(key), e)),
            })?;

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(path).await?;
        let bytes = tokio::io::copy(&mut reader, &mut file).await?;
        debug!(bytes, path = %path.display(), "Downloaded {}", self.location(key));
        Ok(())
    }
}
