use super::{ListPage, ObjectStore};
use crate::error::{Result, RifError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

/// Page size used when the caller does not ask for one
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// Bucket held in a sorted map; listings are in key order like S3's
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every file under `root`, keyed by its `/` separated relative path
    pub async fn load_dir(&self, root: &Path) -> Result<usize> {
        let mut pending = vec![root.to_path_buf()];
        let mut loaded = 0;
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let relative = path
                    .strip_prefix(root)
                    .map_err(|e| RifError::storage(e.to_string()))?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let data = tokio::fs::read(&path).await?;
                self.put(&key, Bytes::from(data)).await?;
                loaded += 1;
            }
        }
        debug!(root = %root.display(), loaded, "Loaded directory into object store");
        Ok(loaded)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: Option<i32>,
    ) -> Result<ListPage> {
        let page_size = match max_keys {
            Some(max) if max > 0 => max as usize,
            Some(max) => return Err(RifError::storage(format!("invalid page size {}", max))),
            None => DEFAULT_MAX_KEYS,
        };
        let start = match continuation {
            Some(after) => Bound::Excluded(after),
            None => Bound::Included(prefix.to_string()),
        };

        let objects = self.objects.read().await;
        let mut matching = objects
            .range((start, Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix));
        let keys: Vec<String> = matching.by_ref().take(page_size).cloned().collect();
        let next_continuation = match matching.next() {
            Some(_) => keys.last().cloned(),
            None => None,
        };

        Ok(ListPage {
            keys,
            next_continuation,
        })
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| RifError::ObjectNotFound(key.to_string()))
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.objects.write().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn copy(&self, source_key: &str, dest_key: &str) -> Result<()> {
        let mut objects = self.objects.write().await;
        let data = objects
            .get(source_key)
            .cloned()
            .ok_or_else(|| RifError::ObjectNotFound(source_key.to_string()))?;
        objects.insert(dest_key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}
