//! Policy-driven exclusion of records from a load

use crate::error::{Result, RifError};
use crate::file_type::RifFileType;
use crate::parser::RifRecordEvent;
use crate::record::{RecordAction, RifRecord};
use crate::source::SourceRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReasonCode {
    /// Beneficiary update for an enrollment year other than the one being loaded
    DelayedBackdatedEnrollment,
}

impl SkipReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReasonCode::DelayedBackdatedEnrollment => "DELAYED_BACKDATED_ENROLLMENT",
        }
    }
}

impl fmt::Display for SkipReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record deliberately left out of a load, kept for later replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRifRecord {
    pub rif_file_timestamp: DateTime<Utc>,
    pub skip_reason: SkipReasonCode,
    pub rif_file_type: RifFileType,
    pub dml_ind: RecordAction,
    pub beneficiary_id: String,
    /// Raw rows re-serialized as `|` delimited lines
    pub rif_data: String,
}

impl SkippedRifRecord {
    pub fn from_event(event: &RifRecordEvent, skip_reason: SkipReasonCode) -> Self {
        Self {
            rif_file_timestamp: event.file_event().parent().timestamp,
            skip_reason,
            rif_file_type: event.file_event().file_type(),
            dml_ind: event.action(),
            beneficiary_id: event.beneficiary_id().to_string(),
            rif_data: event
                .raw_rows()
                .iter()
                .map(SourceRow::to_delimited)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDecision {
    Load,
    Skip(SkipReasonCode),
}

/// Decides per record whether it is loaded or set aside
pub trait SkipPolicy: Send + Sync + fmt::Debug {
    /// An `Err` fails the whole file
    fn decide(&self, event: &RifRecordEvent) -> Result<SkipDecision>;
}

/// Loads everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSkip;

impl SkipPolicy for NoSkip {
    fn decide(&self, _event: &RifRecordEvent) -> Result<SkipDecision> {
        Ok(SkipDecision::Load)
    }
}

/// Restricts beneficiary changes to one enrollment reference year
///
/// Updates for another year are skipped. Inserts for another year are
/// refused outright since there is no earlier state to keep.
#[derive(Debug, Clone, Copy)]
pub struct EnrollmentYearFilter {
    year: i32,
}

impl EnrollmentYearFilter {
    pub fn new(year: i32) -> Self {
        Self { year }
    }

    pub fn year(&self) -> i32 {
        self.year
    }
}

impl SkipPolicy for EnrollmentYearFilter {
    fn decide(&self, event: &RifRecordEvent) -> Result<SkipDecision> {
        let RifRecord::Beneficiary(beneficiary) = event.record() else {
            return Ok(SkipDecision::Load);
        };
        match beneficiary.enrollment_reference_year {
            Some(year) if year != self.year => match event.action() {
                RecordAction::Update => Ok(SkipDecision::Skip(SkipReasonCode::DelayedBackdatedEnrollment)),
                action => Err(RifError::Rejected(format!(
                    "{} of beneficiary {} for enrollment year {} (loading {})",
                    action, beneficiary.beneficiary_id, year, self.year
                ))),
            },
            _ => Ok(SkipDecision::Load),
        }
    }
}
