//! Row-to-record parsing strategies
//!
//! A parser is fed the rows of one file in order and emits a
//! [`RecordEvent`] whenever a logical record is complete. [`SimpleParser`]
//! emits one record per row. [`GroupingParser`] buffers consecutive rows that
//! share a grouping column value and emits them as one record when the value
//! changes or the input ends.
//!
//! Parsers hold per-file state and are driven by a single consumer; use one
//! instance per file.

mod builders;
mod grouping;
mod simple;

pub use grouping::GroupingParser;
pub use simple::SimpleParser;

use crate::error::Result;
use crate::file::RifFileEvent;
use crate::file_type::{RifFileType, CLAIM_ID_COLUMN};
use crate::record::{RecordEvent, RifRecord};
use crate::source::SourceRow;
use std::sync::Arc;

pub type RifRecordEvent = RecordEvent<RifRecord>;

/// Turns the rows of one logical record into its event
pub type RecordBuilder = fn(&Arc<RifFileEvent>, Vec<SourceRow>) -> Result<RifRecordEvent>;

pub trait RifFileParser: Send {
    /// Feed the next row; returns the record this row completed, if any
    fn next(&mut self, row: SourceRow) -> Result<Option<RifRecordEvent>>;

    /// Flush whatever is still buffered; call once after the last row
    fn finish(&mut self) -> Result<Option<RifRecordEvent>>;
}

/// Pick the parsing strategy and record mapping for a file
pub fn parser_for_file(file_event: Arc<RifFileEvent>, strict_grouping: bool) -> Box<dyn RifFileParser> {
    match file_event.file_type() {
        RifFileType::Beneficiary => Box::new(SimpleParser::new(file_event, builders::beneficiary)),
        RifFileType::BeneficiaryHistory => {
            Box::new(SimpleParser::new(file_event, builders::beneficiary_history))
        },
        RifFileType::Pde => Box::new(SimpleParser::new(file_event, builders::part_d_event)),
        RifFileType::Carrier
        | RifFileType::Inpatient
        | RifFileType::Outpatient
        | RifFileType::Snf
        | RifFileType::Hospice
        | RifFileType::Hha
        | RifFileType::Dme => Box::new(
            GroupingParser::new(file_event, CLAIM_ID_COLUMN, builders::claim).strict(strict_grouping),
        ),
    }
}
