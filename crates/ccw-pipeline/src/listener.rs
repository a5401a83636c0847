//! Hands data sets found by the monitor to the loader

use async_trait::async_trait;
use ccw_rif::load::{LoadStats, RifLoader};
use ccw_rif::{DataSetMonitorListener, Result, RifFilesEvent};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Running totals over every file loaded by one listener
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadTotals {
    pub files: u64,
    pub records: u64,
    pub inserted: u64,
    pub updated: u64,
    pub did_nothing: u64,
    pub skipped: u64,
}

impl LoadTotals {
    fn add(&mut self, stats: &LoadStats) {
        self.files += 1;
        self.records += stats.records;
        self.inserted += stats.inserted;
        self.updated += stats.updated;
        self.did_nothing += stats.did_nothing;
        self.skipped += stats.skipped;
    }
}

pub struct LoaderListener {
    loader: RifLoader,
    totals: Mutex<LoadTotals>,
}

impl LoaderListener {
    pub fn new(loader: RifLoader) -> Self {
        Self {
            loader,
            totals: Mutex::new(LoadTotals::default()),
        }
    }

    pub fn totals(&self) -> LoadTotals {
        *self.totals.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DataSetMonitorListener for LoaderListener {
    async fn data_available(&self, event: &RifFilesEvent) -> Result<()> {
        let stats = self.loader.process(event).await?;
        for file in &stats {
            info!(
                file = %file.file_name,
                file_type = %file.file_type,
                records = file.records,
                inserted = file.inserted,
                updated = file.updated,
                did_nothing = file.did_nothing,
                skipped = file.skipped,
                "Loaded RIF file"
            );
        }
        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        for file in &stats {
            totals.add(file);
        }
        Ok(())
    }

    async fn no_data_available(&self) {
        debug!("No data set ready to load");
    }
}
