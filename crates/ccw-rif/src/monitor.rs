//! Discovery of data sets in the bucket
//!
//! One [`DataSetMonitor::run_once`] call is one poll cycle: find the oldest
//! eligible manifest, wait for its data files, hand them to the listener and
//! move everything to the done prefix.

use crate::config::ExtractionOptions;
use crate::error::{Result, RifError};
use crate::file::{RifFile, RifFilesEvent};
use crate::manifest::{DataSetLocation, DataSetManifest, DataSetManifestEntry, DataSetManifestId};
use crate::s3::ObjectStore;
use crate::status::{JobStage, JobStatusReporter};
use async_trait::async_trait;
use chrono::Utc;
use std::borrow::Borrow;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Manifests remembered as already handled
pub const RECENTLY_PROCESSED_CAPACITY: usize = 10_000;

/// Manifests remembered as failed or unparseable; the oldest are forgotten first
pub const SKIPPED_MANIFEST_CAPACITY: usize = 1_000;

/// Receives each data set once all its files are present locally
#[async_trait]
pub trait DataSetMonitorListener: Send + Sync {
    /// Process a data set; files are only valid until this returns
    async fn data_available(&self, event: &RifFilesEvent) -> Result<()>;

    async fn no_data_available(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    NothingToDo,
    /// Gave up waiting for the data files of this manifest for now
    AwaitingData { manifest_key: String },
    Processed { manifest_key: String, files: usize },
}

/// Insertion-ordered set that evicts its oldest member past `capacity`
#[derive(Debug)]
struct BoundedSet<T> {
    order: VecDeque<T>,
    index: HashSet<T>,
    capacity: usize,
}

impl<T: Eq + Hash + Clone> BoundedSet<T> {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            index: HashSet::new(),
            capacity,
        }
    }

    fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains(value)
    }

    fn insert(&mut self, value: T) {
        if !self.index.insert(value.clone()) {
            return;
        }
        self.order.push_back(value);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.index.remove(&oldest);
            }
        }
    }
}

#[derive(Debug)]
struct MonitorState {
    invalid_keys: BoundedSet<String>,
    failed: BoundedSet<DataSetManifestId>,
    recent: BoundedSet<DataSetManifestId>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            invalid_keys: BoundedSet::new(SKIPPED_MANIFEST_CAPACITY),
            failed: BoundedSet::new(SKIPPED_MANIFEST_CAPACITY),
            recent: BoundedSet::new(RECENTLY_PROCESSED_CAPACITY),
        }
    }
}

impl MonitorState {
    fn is_known(&self, key: &str, id: &DataSetManifestId) -> bool {
        self.invalid_keys.contains(key) || self.failed.contains(id) || self.recent.contains(id)
    }
}

pub struct DataSetMonitor {
    store: Arc<dyn ObjectStore>,
    options: ExtractionOptions,
    status: Arc<JobStatusReporter>,
    state: Mutex<MonitorState>,
}

impl DataSetMonitor {
    pub fn new(store: Arc<dyn ObjectStore>, options: ExtractionOptions, status: Arc<JobStatusReporter>) -> Self {
        Self {
            store,
            options,
            status,
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn status(&self) -> &Arc<JobStatusReporter> {
        &self.status
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    #[instrument(skip_all)]
    pub async fn run_once(&self, listener: &dyn DataSetMonitorListener) -> Result<MonitorOutcome> {
        self.status.report(JobStage::CheckingBucketForManifest, None)?;

        let Some(manifest) = self.find_next_manifest().await? else {
            self.status.report(JobStage::NothingToDo, None)?;
            listener.no_data_available().await;
            return Ok(MonitorOutcome::NothingToDo);
        };
        let manifest_key = manifest.incoming_key();
        info!(manifest = %manifest_key, entries = manifest.entries().len(), "Found data set manifest");

        let entries: Vec<_> = manifest
            .entries()
            .iter()
            .filter(|e| self.options.allowed_file_type.is_none_or(|t| t == e.file_type))
            .cloned()
            .collect();

        if !self.wait_for_entries(&manifest, &manifest_key, &entries).await? {
            return Ok(MonitorOutcome::AwaitingData { manifest_key });
        }
        self.status.report(JobStage::ProcessingManifestDataFiles, Some(&manifest_key))?;

        if entries.is_empty() {
            info!(manifest = %manifest_key, "No entries of the allowed file type");
        } else {
            let staging = tempfile::tempdir()?;
            let mut files = Vec::with_capacity(entries.len());
            for (position, entry) in entries.iter().enumerate() {
                let local = staging
                    .path()
                    .join(format!("{}-{}", position, entry.name.replace('/', "_")));
                self.store
                    .download_to(&manifest.entry_incoming_key(entry), &local)
                    .await?;
                files.push(RifFile::local(local, entry.file_type));
            }
            let event = RifFilesEvent::new(manifest.timestamp(), manifest.is_synthetic_data(), files)?;

            if let Err(err) = listener.data_available(&event).await {
                error!(manifest = %manifest_key, error = %err, "Data set processing failed");
                self.state.lock().await.failed.insert(manifest.id().clone());
                return Err(err);
            }
        }

        if let Err(err) = self.move_to_done(&manifest, &entries).await {
            error!(manifest = %manifest_key, error = %err, "Could not move data set to done");
            self.state.lock().await.failed.insert(manifest.id().clone());
            return Err(err);
        }

        self.state.lock().await.recent.insert(manifest.id().clone());
        self.status.report(JobStage::CompletedManifest, Some(&manifest_key))?;
        info!(manifest = %manifest_key, files = entries.len(), "Completed data set");

        Ok(MonitorOutcome::Processed {
            manifest_key,
            files: entries.len(),
        })
    }

    /// Data files first, then the manifest that announces them
    async fn move_to_done(&self, manifest: &DataSetManifest, entries: &[DataSetManifestEntry]) -> Result<()> {
        for entry in entries {
            self.store
                .move_object(&manifest.entry_incoming_key(entry), &manifest.entry_done_key(entry))
                .await?;
        }
        self.store
            .move_object(&manifest.incoming_key(), &manifest.done_key())
            .await
    }

    /// Oldest eligible manifest that parses
    async fn find_next_manifest(&self) -> Result<Option<DataSetManifest>> {
        let now = Utc::now();
        let max_age = self.options.max_manifest_age();

        let mut candidates: Vec<(DataSetManifestId, DataSetLocation, String)> = Vec::new();
        {
            let state = self.state.lock().await;
            for location in DataSetLocation::ALL {
                let prefix = format!("{}/", location.incoming_prefix());
                for key in self.store.list_keys(&prefix, self.options.s3_list_max_keys).await? {
                    let Some((key_location, id)) = DataSetManifestId::parse_from_key(&key) else {
                        continue;
                    };
                    if key_location != location || state.is_known(&key, &id) {
                        continue;
                    }
                    if id.is_future(now) {
                        debug!(key = %key, "Skipping manifest from the future");
                        continue;
                    }
                    if id.is_older_than(now, max_age) {
                        debug!(key = %key, "Skipping manifest older than the max age");
                        continue;
                    }
                    candidates.push((id, location, key));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)));

        for (_, location, key) in candidates {
            match self.read_manifest(&key, location).await {
                Ok(manifest) => return Ok(Some(manifest)),
                Err(RifError::ObjectNotFound(_)) => continue,
                Err(err @ (RifError::Manifest(_) | RifError::UnknownFileType(_))) => {
                    warn!(key = %key, error = %err, "Ignoring invalid manifest");
                    self.state.lock().await.invalid_keys.insert(key);
                },
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    async fn read_manifest(&self, key: &str, location: DataSetLocation) -> Result<DataSetManifest> {
        let data = self.store.get(key).await?;
        let xml = std::str::from_utf8(&data)
            .map_err(|e| RifError::manifest(format!("manifest is not UTF-8: {}", e)))?;
        DataSetManifest::from_xml(xml, location)
    }

    /// Poll until every entry exists; `false` when the max wait ran out
    async fn wait_for_entries(
        &self,
        manifest: &DataSetManifest,
        manifest_key: &str,
        entries: &[DataSetManifestEntry],
    ) -> Result<bool> {
        let started = Instant::now();
        loop {
            let mut missing = Vec::new();
            for entry in entries {
                if !self.store.exists(&manifest.entry_incoming_key(entry)).await? {
                    missing.push(entry.name.as_str());
                }
            }
            if missing.is_empty() {
                return Ok(true);
            }

            self.status
                .report(JobStage::AwaitingManifestDataFiles, Some(manifest_key))?;
            debug!(manifest = %manifest_key, ?missing, "Waiting for data files");

            if let Some(max_wait) = self.options.data_max_wait {
                if started.elapsed() >= max_wait {
                    info!(manifest = %manifest_key, ?missing, "Data files still missing, will check again later");
                    return Ok(false);
                }
            }
            tokio::time::sleep(self.options.data_poll_interval).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_set_evicts_oldest() {
        let mut set = BoundedSet::new(2);
        set.insert("a".to_string());
        set.insert("b".to_string());
        set.insert("a".to_string());
        assert!(set.contains("a"));

        set.insert("c".to_string());
        assert_eq!(set.order.len(), 2);
        assert!(!set.contains("a"));
        assert!(set.contains("b"));
        assert!(set.contains("c"));
    }
}
