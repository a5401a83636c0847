use super::{RecordBuilder, RifFileParser, RifRecordEvent};
use crate::error::{Result, RifError};
use crate::file::RifFileEvent;
use crate::source::SourceRow;
use std::collections::HashSet;
use std::mem;
use std::sync::Arc;
use tracing::trace;

/// Run-length grouping of adjacent rows with equal key values
///
/// Input must already be clustered by key; the parser never sorts. By default
/// a key that reappears after its run ended simply starts a new record. In
/// strict mode every closed key is remembered and a reappearance fails with
/// [`RifError::GroupingOrderViolation`].
pub struct GroupingParser {
    file_event: Arc<RifFileEvent>,
    key_column: &'static str,
    build: RecordBuilder,
    open_key: Option<String>,
    buffer: Vec<SourceRow>,
    closed_keys: Option<HashSet<String>>,
}

impl GroupingParser {
    pub fn new(file_event: Arc<RifFileEvent>, key_column: &'static str, build: RecordBuilder) -> Self {
        Self {
            file_event,
            key_column,
            build,
            open_key: None,
            buffer: Vec::new(),
            closed_keys: None,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.closed_keys = strict.then(HashSet::new);
        self
    }

    /// Rows waiting for their group to close
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn close_group(&mut self) -> Result<Option<RifRecordEvent>> {
        let Some(key) = self.open_key.take() else {
            return Ok(None);
        };
        let rows = mem::take(&mut self.buffer);
        trace!(key = %key, rows = rows.len(), "closing group");
        if let Some(closed) = self.closed_keys.as_mut() {
            closed.insert(key);
        }
        (self.build)(&self.file_event, rows).map(Some)
    }
}

impl RifFileParser for GroupingParser {
    fn next(&mut self, row: SourceRow) -> Result<Option<RifRecordEvent>> {
        let key = row
            .get(self.key_column)
            .ok_or(RifError::MissingGroupingKey {
                column: self.key_column,
                row_number: row.row_number(),
            })?
            .to_string();

        if self.open_key.as_deref() == Some(key.as_str()) {
            self.buffer.push(row);
            return Ok(None);
        }

        if let Some(closed) = &self.closed_keys {
            if closed.contains(&key) {
                return Err(RifError::GroupingOrderViolation {
                    key,
                    row_number: row.row_number(),
                });
            }
        }

        let completed = self.close_group()?;
        self.open_key = Some(key);
        self.buffer.push(row);
        Ok(completed)
    }

    fn finish(&mut self) -> Result<Option<RifRecordEvent>> {
        self.close_group()
    }
}
