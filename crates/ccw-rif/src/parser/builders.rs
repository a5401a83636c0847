//! Per-file-type record builders

use super::RifRecordEvent;
use crate::error::{Result, RifError};
use crate::file::RifFileEvent;
use crate::record::{
    Beneficiary, BeneficiaryHistory, Claim, PartDEvent, RecordAction, RecordEvent, RifRecord,
};
use crate::source::SourceRow;
use std::sync::Arc;

fn single_row(rows: &[SourceRow]) -> Result<&SourceRow> {
    rows.first()
        .ok_or_else(|| RifError::InvalidRecordEvent("no rows to parse".to_string()))
}

pub(super) fn beneficiary(event: &Arc<RifFileEvent>, rows: Vec<SourceRow>) -> Result<RifRecordEvent> {
    let action = RecordAction::from_rows(&rows)?;
    let mut record = Beneficiary::from_row(single_row(&rows)?)?;
    record.relocate_unhashed_hicn();
    let beneficiary_id = record.beneficiary_id.clone();
    RecordEvent::new(event.clone(), rows, action, beneficiary_id, RifRecord::Beneficiary(record))
}

pub(super) fn beneficiary_history(
    event: &Arc<RifFileEvent>,
    rows: Vec<SourceRow>,
) -> Result<RifRecordEvent> {
    let action = RecordAction::from_rows(&rows)?;
    let record = BeneficiaryHistory::from_row(single_row(&rows)?)?;
    let beneficiary_id = record.beneficiary_id.clone();
    RecordEvent::new(
        event.clone(),
        rows,
        action,
        beneficiary_id,
        RifRecord::BeneficiaryHistory(record),
    )
}

pub(super) fn part_d_event(event: &Arc<RifFileEvent>, rows: Vec<SourceRow>) -> Result<RifRecordEvent> {
    let action = RecordAction::from_rows(&rows)?;
    let record = PartDEvent::from_row(single_row(&rows)?)?;
    let beneficiary_id = record.beneficiary_id.clone();
    RecordEvent::new(event.clone(), rows, action, beneficiary_id, RifRecord::PartDEvent(record))
}

pub(super) fn claim(event: &Arc<RifFileEvent>, rows: Vec<SourceRow>) -> Result<RifRecordEvent> {
    let file_type = event.file_type();
    let layout = file_type
        .claim_layout()
        .ok_or_else(|| RifError::InvalidRecordEvent(format!("{} is not a claim file", file_type)))?;
    let action = RecordAction::from_rows(&rows)?;
    let record = Claim::from_rows(file_type, layout, &rows)?;
    let beneficiary_id = record.beneficiary_id.clone();
    RecordEvent::new(event.clone(), rows, action, beneficiary_id, RifRecord::Claim(record))
}
