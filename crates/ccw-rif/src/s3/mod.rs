//! Object-store collaborator
//!
//! The pipeline needs only a narrow set of operations on the bucket, captured
//! by [`ObjectStore`]. [`S3ObjectStore`] talks to S3 or any compatible
//! service; [`InMemoryObjectStore`] backs tests and local runs.

mod client;
pub mod config;
mod memory;

pub use client::S3ObjectStore;
pub use config::S3Config;
pub use memory::InMemoryObjectStore;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use tracing::debug;

/// One page of a key listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Pass back to fetch the following page; `None` on the last page
    pub next_continuation: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: Option<i32>,
    ) -> Result<ListPage>;

    /// Every key under `prefix`, fetching pages of `max_keys` until exhausted
    async fn list_keys(&self, prefix: &str, max_keys: Option<i32>) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation = None;
        loop {
            let page = self.list_page(prefix, continuation, max_keys).await?;
            keys.extend(page.keys);
            match page.next_continuation {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }
        debug!(prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Bytes>;

    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn copy(&self, source_key: &str, dest_key: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Copy then delete; stores have no atomic rename
    async fn move_object(&self, source_key: &str, dest_key: &str) -> Result<()> {
        self.copy(source_key, dest_key).await?;
        self.delete(source_key).await
    }

    async fn download_to(&self, key: &str, path: &Path) -> Result<()> {
        let data = self.get(key).await?;
        tokio::fs::write(path, &data).await?;
        Ok(())
    }
}
