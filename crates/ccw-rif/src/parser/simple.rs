use super::{RecordBuilder, RifFileParser, RifRecordEvent};
use crate::error::Result;
use crate::file::RifFileEvent;
use crate::source::SourceRow;
use std::sync::Arc;

/// One row, one record
pub struct SimpleParser {
    file_event: Arc<RifFileEvent>,
    build: RecordBuilder,
}

impl SimpleParser {
    pub fn new(file_event: Arc<RifFileEvent>, build: RecordBuilder) -> Self {
        Self { file_event, build }
    }
}

impl RifFileParser for SimpleParser {
    fn next(&mut self, row: SourceRow) -> Result<Option<RifRecordEvent>> {
        (self.build)(&self.file_event, vec![row]).map(Some)
    }

    fn finish(&mut self) -> Result<Option<RifRecordEvent>> {
        Ok(None)
    }
}
