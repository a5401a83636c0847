//! Job status reporting
//!
//! Every stage change of the extraction job produces one [`JobStatusEvent`].
//! Events are derived purely from the previous event, the new stage and the
//! manifest being worked on; [`JobStatusReporter`] is the single writer that
//! publishes them to any number of observers.

use crate::error::{Result, RifError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStage {
    CheckingBucketForManifest,
    AwaitingManifestDataFiles,
    ProcessingManifestDataFiles,
    CompletedManifest,
    NothingToDo,
}

impl JobStage {
    /// Stages that are always about one specific manifest
    pub fn has_manifest(self) -> bool {
        matches!(
            self,
            JobStage::AwaitingManifestDataFiles
                | JobStage::ProcessingManifestDataFiles
                | JobStage::CompletedManifest
        )
    }

    /// Whether this stage may directly follow `previous` (`None` at start-up)
    ///
    /// A new poll cycle may start from anywhere, which is how a failed
    /// manifest hands control back to the next cycle.
    pub fn can_follow(self, previous: Option<JobStage>) -> bool {
        use JobStage::*;
        match (previous, self) {
            (_, CheckingBucketForManifest) => true,
            (None, NothingToDo) => true,
            (None, _) => false,
            (Some(CheckingBucketForManifest), NothingToDo)
            | (Some(CheckingBucketForManifest), AwaitingManifestDataFiles)
            | (Some(CheckingBucketForManifest), ProcessingManifestDataFiles) => true,
            (Some(AwaitingManifestDataFiles), AwaitingManifestDataFiles)
            | (Some(AwaitingManifestDataFiles), ProcessingManifestDataFiles) => true,
            (Some(ProcessingManifestDataFiles), CompletedManifest) => true,
            (Some(NothingToDo), NothingToDo) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Snapshot of the job after one stage change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusEvent {
    pub job_stage: JobStage,
    pub current_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_manifest_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed_manifest_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed_timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "nothingToDoSinceTimestamp", skip_serializing_if = "Option::is_none")]
    pub nothing_to_do_since: Option<DateTime<Utc>>,
}

impl JobStatusEvent {
    /// The event that follows `previous` when the job enters `stage`
    pub fn next(
        previous: Option<&JobStatusEvent>,
        stage: JobStage,
        manifest_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let previous_stage = previous.map(|p| p.job_stage);
        if !stage.can_follow(previous_stage) {
            return Err(RifError::InvalidStatus(format!(
                "{} cannot follow {}",
                stage,
                previous_stage.map_or_else(|| "start-up".to_string(), |s| s.to_string())
            )));
        }
        if stage.has_manifest() != manifest_key.is_some() {
            return Err(RifError::InvalidStatus(format!(
                "{} {} a manifest key",
                stage,
                if stage.has_manifest() { "requires" } else { "must not carry" }
            )));
        }

        let (last_completed_manifest_key, last_completed_timestamp) = match stage {
            JobStage::CompletedManifest => (manifest_key.map(str::to_string), Some(now)),
            _ => previous
                .map(|p| (p.last_completed_manifest_key.clone(), p.last_completed_timestamp))
                .unwrap_or((None, None)),
        };

        let nothing_to_do_since = match (stage, previous) {
            (JobStage::NothingToDo, Some(p)) if p.job_stage == JobStage::NothingToDo => {
                p.nothing_to_do_since.or(Some(now))
            },
            (JobStage::NothingToDo, _) => Some(now),
            _ => None,
        };

        let event = Self {
            job_stage: stage,
            current_timestamp: now,
            current_manifest_key: manifest_key.map(str::to_string),
            last_completed_manifest_key,
            last_completed_timestamp,
            nothing_to_do_since,
        };
        event.validate()?;
        Ok(event)
    }

    /// Check the invariants every event must satisfy on its own
    pub fn validate(&self) -> Result<()> {
        if self.job_stage.has_manifest() != self.current_manifest_key.is_some() {
            return Err(RifError::InvalidStatus(format!(
                "current manifest key presence does not match stage {}",
                self.job_stage
            )));
        }
        if (self.job_stage == JobStage::NothingToDo) != self.nothing_to_do_since.is_some() {
            return Err(RifError::InvalidStatus(format!(
                "nothing-to-do timestamp presence does not match stage {}",
                self.job_stage
            )));
        }
        if self.last_completed_manifest_key.is_some() != self.last_completed_timestamp.is_some() {
            return Err(RifError::InvalidStatus(
                "last completed manifest key and timestamp must be set together".to_string(),
            ));
        }
        if self.job_stage == JobStage::CompletedManifest
            && (self.last_completed_manifest_key != self.current_manifest_key
                || self.last_completed_timestamp != Some(self.current_timestamp))
        {
            return Err(RifError::InvalidStatus(
                "a completed manifest must be recorded as the last completed one".to_string(),
            ));
        }
        Ok(())
    }
}

/// Observer of job status changes
pub trait JobStatusListener: Send + Sync {
    fn job_status_changed(&self, event: &JobStatusEvent);
}

/// Logs every event as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingStatusListener;

impl JobStatusListener for LoggingStatusListener {
    fn job_status_changed(&self, event: &JobStatusEvent) {
        match serde_json::to_string(event) {
            Ok(json) => info!(stage = %event.job_stage, job_status = %json, "Job status changed"),
            Err(err) => warn!(stage = %event.job_stage, error = %err, "Could not serialize job status"),
        }
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Single writer of job status events
///
/// The latest event is published on a watch channel; [`subscribe`] hands out
/// receivers. Registered listeners are called after each change.
///
/// [`subscribe`]: JobStatusReporter::subscribe
pub struct JobStatusReporter {
    sender: watch::Sender<Option<JobStatusEvent>>,
    listeners: Vec<Arc<dyn JobStatusListener>>,
    clock: Clock,
}

impl Default for JobStatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStatusReporter {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender,
            listeners: Vec::new(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn JobStatusListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<JobStatusEvent>> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> Option<JobStatusEvent> {
        self.sender.borrow().clone()
    }

    /// Move the job to `stage` and publish the resulting event
    pub fn report(&self, stage: JobStage, manifest_key: Option<&str>) -> Result<JobStatusEvent> {
        let now = (self.clock)();
        let mut outcome = Err(RifError::InvalidStatus("status was not updated".to_string()));
        self.sender.send_if_modified(|current| {
            match JobStatusEvent::next(current.as_ref(), stage, manifest_key, now) {
                Ok(event) => {
                    *current = Some(event.clone());
                    outcome = Ok(event);
                    true
                },
                Err(err) => {
                    outcome = Err(err);
                    false
                },
            }
        });

        let event = outcome?;
        for listener in &self.listeners {
            listener.job_status_changed(&event);
        }
        Ok(event)
    }
}
