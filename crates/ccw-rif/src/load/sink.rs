//! Persistence collaborator for loaded records and their bookkeeping

use super::batch::{LoadedBatch, LoadedFile};
use super::skip::SkippedRifRecord;
use crate::error::{Result, RifError};
use crate::file_type::RifFileType;
use crate::parser::RifRecordEvent;
use crate::record::{RecordAction, RifRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// How records are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStrategy {
    /// Insert only when the record is absent, so reruns change nothing
    InsertIdempotent,
    /// Insert `INSERT` rows and upsert `UPDATE` rows
    InsertUpdateNonIdempotent,
}

/// Outcome for a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadAction {
    Inserted,
    Updated,
    DidNothing,
    Skipped,
}

/// One unit of work for a sink, written atomically
#[derive(Debug)]
pub struct PendingBatch {
    pub strategy: LoadStrategy,
    pub records: Vec<RifRecordEvent>,
    pub loaded_batch: LoadedBatch,
    pub skipped: Vec<SkippedRifRecord>,
}

#[async_trait]
pub trait RifLoadSink: Send + Sync {
    async fn record_loaded_file(&self, file: &LoadedFile) -> Result<()>;

    /// Write every record, the batch and the skipped rows together
    ///
    /// Returns one action per entry of `batch.records`, in order.
    async fn write_batch(&self, batch: &PendingBatch) -> Result<Vec<LoadAction>>;

    /// Fold every batch of a loaded file into one; `None` if it has none
    async fn compact_batches(&self, loaded_file_id: Uuid) -> Result<Option<LoadedBatch>>;
}

/// A record as last written
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub beneficiary_id: String,
    pub last_action: RecordAction,
    pub record: RifRecord,
    pub loaded_batch_id: Uuid,
}

#[derive(Debug, Default)]
struct MemoryState {
    loaded_files: Vec<LoadedFile>,
    batches: Vec<LoadedBatch>,
    records: BTreeMap<(RifFileType, String), StoredRecord>,
    skipped: Vec<SkippedRifRecord>,
}

/// Sink that keeps everything in process memory
#[derive(Debug, Default)]
pub struct InMemoryLoadSink {
    state: RwLock<MemoryState>,
}

impl InMemoryLoadSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn loaded_files(&self) -> Vec<LoadedFile> {
        self.state.read().await.loaded_files.clone()
    }

    pub async fn loaded_batches(&self) -> Vec<LoadedBatch> {
        self.state.read().await.batches.clone()
    }

    pub async fn skipped(&self) -> Vec<SkippedRifRecord> {
        self.state.read().await.skipped.clone()
    }

    pub async fn record(&self, file_type: RifFileType, record_key: &str) -> Option<StoredRecord> {
        self.state
            .read()
            .await
            .records
            .get(&(file_type, record_key.to_string()))
            .cloned()
    }

    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }
}

#[async_trait]
impl RifLoadSink for InMemoryLoadSink {
    async fn record_loaded_file(&self, file: &LoadedFile) -> Result<()> {
        self.state.write().await.loaded_files.push(file.clone());
        Ok(())
    }

    async fn write_batch(&self, batch: &PendingBatch) -> Result<Vec<LoadAction>> {
        let mut state = self.state.write().await;
        if !state
            .loaded_files
            .iter()
            .any(|f| f.id == batch.loaded_batch.loaded_file_id())
        {
            return Err(RifError::InvalidBatch(format!(
                "unknown loaded file {}",
                batch.loaded_batch.loaded_file_id()
            )));
        }

        // Stage changes so a failure leaves the state untouched
        let mut staged: BTreeMap<(RifFileType, String), StoredRecord> = BTreeMap::new();
        let mut actions = Vec::with_capacity(batch.records.len());
        for event in &batch.records {
            let key = (event.record().file_type(), event.record().record_key());
            let exists = staged.contains_key(&key) || state.records.contains_key(&key);
            let action = match (batch.strategy, event.action(), exists) {
                (LoadStrategy::InsertIdempotent, _, true) => LoadAction::DidNothing,
                (_, _, false) => LoadAction::Inserted,
                (LoadStrategy::InsertUpdateNonIdempotent, RecordAction::Update, true) => LoadAction::Updated,
                (LoadStrategy::InsertUpdateNonIdempotent, action, true) => {
                    return Err(RifError::Database(format!(
                        "{} of existing {} record {}",
                        action, key.0, key.1
                    )));
                },
            };
            if action != LoadAction::DidNothing {
                staged.insert(
                    key,
                    StoredRecord {
                        beneficiary_id: event.beneficiary_id().to_string(),
                        last_action: event.action(),
                        record: event.record().clone(),
                        loaded_batch_id: batch.loaded_batch.id(),
                    },
                );
            }
            actions.push(action);
        }

        state.records.extend(staged);
        state.batches.push(batch.loaded_batch.clone());
        state.skipped.extend(batch.skipped.iter().cloned());
        Ok(actions)
    }

    async fn compact_batches(&self, loaded_file_id: Uuid) -> Result<Option<LoadedBatch>> {
        let mut state = self.state.write().await;
        let mine: Vec<LoadedBatch> = state
            .batches
            .iter()
            .filter(|b| b.loaded_file_id() == loaded_file_id)
            .cloned()
            .collect();

        let combined = combine_all(&mine)?;
        if let Some(batch) = &combined {
            state.batches.retain(|b| b.loaded_file_id() != loaded_file_id);
            state.batches.push(batch.clone());
        }
        Ok(combined)
    }
}

/// Fold batches in order with [`LoadedBatch::combine`]
pub fn combine_all(batches: &[LoadedBatch]) -> Result<Option<LoadedBatch>> {
    let Some((first, rest)) = batches.split_first() else {
        return Ok(None);
    };
    rest.iter()
        .try_fold(first.clone(), |acc, next| acc.combine(Some(next)))
        .map(Some)
}
