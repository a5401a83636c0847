//! Drives record streams from a data set into a sink

use super::batch::{LoadedBatchBuilder, LoadedFile};
use super::sink::{LoadAction, LoadStrategy, PendingBatch, RifLoadSink};
use super::skip::{EnrollmentYearFilter, NoSkip, SkipDecision, SkipPolicy, SkippedRifRecord};
use crate::config::LoadOptions;
use crate::error::{Result, RifError};
use crate::file::{RifFileEvent, RifFilesEvent};
use crate::file_type::RifFileType;
use crate::parser::RifRecordEvent;
use crate::processor::RifFilesProcessor;
use crate::record::RecordAction;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::mem;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// What happened to the records of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub file_type: RifFileType,
    pub file_name: String,
    pub loaded_file_id: Uuid,
    pub records: u64,
    pub inserted: u64,
    pub updated: u64,
    pub did_nothing: u64,
    pub skipped: u64,
    pub batches: u64,
}

impl LoadStats {
    fn new(file_event: &RifFileEvent, loaded_file_id: Uuid) -> Self {
        Self {
            file_type: file_event.file_type(),
            file_name: file_event.file().display_name().to_string(),
            loaded_file_id,
            records: 0,
            inserted: 0,
            updated: 0,
            did_nothing: 0,
            skipped: 0,
            batches: 0,
        }
    }

    fn count(&mut self, action: LoadAction) {
        self.records += 1;
        match action {
            LoadAction::Inserted => self.inserted += 1,
            LoadAction::Updated => self.updated += 1,
            LoadAction::DidNothing => self.did_nothing += 1,
            LoadAction::Skipped => self.skipped += 1,
        }
    }
}

pub struct RifLoader {
    options: LoadOptions,
    processor: RifFilesProcessor,
    sink: Arc<dyn RifLoadSink>,
    skip_policy: Arc<dyn SkipPolicy>,
}

impl RifLoader {
    pub fn new(options: LoadOptions, processor: RifFilesProcessor, sink: Arc<dyn RifLoadSink>) -> Self {
        let skip_policy: Arc<dyn SkipPolicy> = match options.filter_enrollment_year {
            Some(year) => Arc::new(EnrollmentYearFilter::new(year)),
            None => Arc::new(NoSkip),
        };
        Self {
            options,
            processor,
            sink,
            skip_policy,
        }
    }

    pub fn with_skip_policy(mut self, skip_policy: Arc<dyn SkipPolicy>) -> Self {
        self.skip_policy = skip_policy;
        self
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    fn strategy(&self) -> LoadStrategy {
        if self.options.idempotent {
            LoadStrategy::InsertIdempotent
        } else {
            LoadStrategy::InsertUpdateNonIdempotent
        }
    }

    /// Load a whole data set
    ///
    /// Beneficiary files are loaded one after another before any other file
    /// starts. The remaining files then load concurrently. A failed file does
    /// not stop its siblings; the first failure is returned once they finish.
    #[instrument(skip_all, fields(timestamp = %event.timestamp(), files = event.file_events().len()))]
    pub async fn process(&self, event: &RifFilesEvent) -> Result<Vec<LoadStats>> {
        let (beneficiary_files, other_files) = event.split_beneficiary_files();
        let mut results = Vec::with_capacity(event.file_events().len());

        for file_event in beneficiary_files {
            results.push(self.load_file(file_event.clone()).await?);
        }

        let outcomes: Vec<Result<LoadStats>> = stream::iter(other_files.iter().cloned())
            .map(|file_event| self.load_file(file_event))
            .buffered(self.options.max_concurrent_files)
            .collect()
            .await;

        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(stats) => results.push(stats),
                Err(err) => {
                    error!(error = %err, "RIF file failed to load");
                    first_error.get_or_insert(err);
                },
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }

    /// Load one file; records are parsed on a blocking thread and handed over
    /// through a bounded channel
    #[instrument(skip_all, fields(file = %file_event.file()))]
    pub async fn load_file(&self, file_event: Arc<RifFileEvent>) -> Result<LoadStats> {
        let loaded_file = LoadedFile::new(file_event.file_type());
        self.sink.record_loaded_file(&loaded_file).await?;
        let mut stats = LoadStats::new(&file_event, loaded_file.id);

        let batch_size = self.options.record_batch_size;
        let (tx, mut rx) = mpsc::channel::<Result<RifRecordEvent>>(batch_size);
        let processor = self.processor;
        let producer_event = file_event.clone();
        let producer = tokio::task::spawn_blocking(move || {
            let records = match processor.produce_records(producer_event) {
                Ok(records) => records,
                Err(err) => {
                    let _ = tx.blocking_send(Err(err));
                    return;
                },
            };
            for record in records {
                if tx.blocking_send(record).is_err() {
                    break;
                }
            }
        });

        let mut pending = Vec::with_capacity(batch_size);
        while let Some(record) = rx.recv().await {
            pending.push(record?);
            if pending.len() >= batch_size {
                self.write_batch(&loaded_file, mem::take(&mut pending), &mut stats).await?;
            }
        }
        if !pending.is_empty() {
            self.write_batch(&loaded_file, pending, &mut stats).await?;
        }
        producer.await.map_err(|e| RifError::Task(e.to_string()))?;

        if self.options.compact_batches && stats.batches > 1 {
            self.sink.compact_batches(loaded_file.id).await?;
        }

        info!(
            records = stats.records,
            inserted = stats.inserted,
            updated = stats.updated,
            did_nothing = stats.did_nothing,
            skipped = stats.skipped,
            batches = stats.batches,
            "Loaded RIF file"
        );
        Ok(stats)
    }

    async fn write_batch(
        &self,
        loaded_file: &LoadedFile,
        records: Vec<RifRecordEvent>,
        stats: &mut LoadStats,
    ) -> Result<()> {
        let builder = LoadedBatchBuilder::new(loaded_file.id, records.len());
        let mut to_load = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();

        for record in records {
            if record.action() == RecordAction::Delete {
                return Err(RifError::UnsupportedRecordAction {
                    action: record.action(),
                    file_type: loaded_file.file_type,
                });
            }
            match self.skip_policy.decide(&record)? {
                SkipDecision::Load => {
                    builder.associate_beneficiary(record.beneficiary_id())?;
                    to_load.push(record);
                },
                SkipDecision::Skip(reason) => {
                    warn!(
                        row = record.row_number(),
                        beneficiary_id = record.beneficiary_id(),
                        %reason,
                        "Skipping record"
                    );
                    skipped.push(SkippedRifRecord::from_event(&record, reason));
                },
            }
        }

        let batch = PendingBatch {
            strategy: self.strategy(),
            records: to_load,
            loaded_batch: builder.build(),
            skipped,
        };
        let actions = self.sink.write_batch(&batch).await?;
        if actions.len() != batch.records.len() {
            return Err(RifError::Database(format!(
                "sink reported {} outcomes for {} records",
                actions.len(),
                batch.records.len()
            )));
        }

        for action in actions {
            stats.count(action);
        }
        for _ in &batch.skipped {
            stats.count(LoadAction::Skipped);
        }
        stats.batches += 1;
        Ok(())
    }
}
