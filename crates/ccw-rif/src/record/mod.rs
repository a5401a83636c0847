//! Record events: the unit handed from parsing to persistence

mod model;
mod transform;

pub use model::{
    Beneficiary, BeneficiaryHistory, Claim, ClaimLine, PartDEvent, RifRecord,
};
pub use transform::{parse_date, parse_decimal, FieldReader};

use crate::error::{Result, RifError};
use crate::file::RifFileEvent;
use crate::file_type::RECORD_ACTION_COLUMN;
use crate::source::SourceRow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Insert/update/delete intent carried by every row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordAction {
    Insert,
    Update,
    /// Reserved; production data sets are not expected to carry it
    Delete,
}

impl RecordAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordAction::Insert => "INSERT",
            RecordAction::Update => "UPDATE",
            RecordAction::Delete => "DELETE",
        }
    }

    /// Action of the logical record built from `rows`, taken from its first row
    pub fn from_rows(rows: &[SourceRow]) -> Result<Self> {
        let first = rows
            .first()
            .ok_or_else(|| RifError::InvalidRecordEvent("no rows".to_string()))?;
        first.get(RECORD_ACTION_COLUMN).unwrap_or("").parse()
    }
}

impl FromStr for RecordAction {
    type Err = RifError;

    /// Exact match only; anything else is an error rather than a default
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "INSERT" => Ok(RecordAction::Insert),
            "UPDATE" => Ok(RecordAction::Update),
            "DELETE" => Ok(RecordAction::Delete),
            other => Err(RifError::UnknownRecordAction(other.to_string())),
        }
    }
}

impl fmt::Display for RecordAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed business record together with its provenance
#[derive(Debug, Clone)]
pub struct RecordEvent<R> {
    file_event: Arc<RifFileEvent>,
    raw_rows: Vec<SourceRow>,
    action: RecordAction,
    beneficiary_id: String,
    record: R,
}

impl<R> RecordEvent<R> {
    /// Every part is required: no rows or a blank beneficiary id is rejected
    pub fn new(
        file_event: Arc<RifFileEvent>,
        raw_rows: Vec<SourceRow>,
        action: RecordAction,
        beneficiary_id: impl Into<String>,
        record: R,
    ) -> Result<Self> {
        let beneficiary_id = beneficiary_id.into();
        if raw_rows.is_empty() {
            return Err(RifError::InvalidRecordEvent(
                "a record event needs at least one raw row".to_string(),
            ));
        }
        if beneficiary_id.trim().is_empty() {
            return Err(RifError::InvalidRecordEvent(format!(
                "row {} has no beneficiary id",
                raw_rows[0].row_number()
            )));
        }

        Ok(Self {
            file_event,
            raw_rows,
            action,
            beneficiary_id,
            record,
        })
    }

    pub fn file_event(&self) -> &Arc<RifFileEvent> {
        &self.file_event
    }

    pub fn raw_rows(&self) -> &[SourceRow] {
        &self.raw_rows
    }

    pub fn action(&self) -> RecordAction {
        self.action
    }

    pub fn beneficiary_id(&self) -> &str {
        &self.beneficiary_id
    }

    pub fn record(&self) -> &R {
        &self.record
    }

    pub fn into_record(self) -> R {
        self.record
    }

    /// Row number of the first raw row
    pub fn row_number(&self) -> u64 {
        self.raw_rows.first().map(SourceRow::row_number).unwrap_or(0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_action_exact_match() {
        assert_eq!("INSERT".parse::<RecordAction>().unwrap(), RecordAction::Insert);
        assert_eq!("UPDATE".parse::<RecordAction>().unwrap(), RecordAction::Update);
        assert_eq!("DELETE".parse::<RecordAction>().unwrap(), RecordAction::Delete);

        for bad in ["XYZ", "insert", " INSERT", ""] {
            assert!(matches!(
                bad.parse::<RecordAction>(),
                Err(RifError::UnknownRecordAction(ref v)) if v == bad
            ));
        }
    }
}
