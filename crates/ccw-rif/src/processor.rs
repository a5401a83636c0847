//! Lazily turns a file event into its stream of record events

use crate::error::{Result, RifError};
use crate::file::RifFileEvent;
use crate::parser::{parser_for_file, RifFileParser, RifRecordEvent};
use crate::source::{open_row_source, RowSource};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point for parsing the files of a data set
#[derive(Debug, Clone, Copy, Default)]
pub struct RifFilesProcessor {
    strict_grouping: bool,
}

impl RifFilesProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on non-contiguous grouping keys instead of trusting the input order
    pub fn with_strict_grouping(mut self, strict: bool) -> Self {
        self.strict_grouping = strict;
        self
    }

    /// Open the file and prepare its record stream
    ///
    /// Nothing beyond the header is read until the returned [`FileRecords`]
    /// is iterated.
    pub fn produce_records(&self, file_event: Arc<RifFileEvent>) -> Result<FileRecords> {
        let source = open_row_source(file_event.file())?;
        let parser = parser_for_file(file_event.clone(), self.strict_grouping);
        debug!(
            file = %file_event.file(),
            columns = source.header().len(),
            strict_grouping = self.strict_grouping,
            "opened RIF file"
        );
        Ok(FileRecords {
            source_event: file_event,
            source,
            parser,
            state: State::Reading,
            emitted: 0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Reading,
    Done,
}

/// Single-pass record stream of one file
///
/// Pulling a record reads only as many rows as that record needs. The row
/// source is closed as soon as the stream ends or fails. Dropping the stream
/// early closes the source and discards any partly grouped record.
pub struct FileRecords {
    source_event: Arc<RifFileEvent>,
    source: Box<dyn RowSource>,
    parser: Box<dyn RifFileParser>,
    state: State,
    emitted: u64,
}

impl FileRecords {
    pub fn source_event(&self) -> &Arc<RifFileEvent> {
        &self.source_event
    }

    /// Records handed out so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Stop early; later calls to `next` return `None`
    pub fn close(&mut self) {
        if self.state != State::Done {
            debug!(file = %self.source_event.file(), emitted = self.emitted, "record stream closed early");
        }
        self.end();
    }

    fn end(&mut self) {
        self.state = State::Done;
        self.source.close();
    }

    fn emit(&mut self, event: RifRecordEvent) -> Option<Result<RifRecordEvent>> {
        self.emitted += 1;
        Some(Ok(event))
    }

    fn fail(&mut self, err: RifError) -> Option<Result<RifRecordEvent>> {
        warn!(file = %self.source_event.file(), emitted = self.emitted, error = %err, "record stream failed");
        self.end();
        Some(Err(err))
    }
}

impl Iterator for FileRecords {
    type Item = Result<RifRecordEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.state == State::Reading {
            match self.source.next() {
                Some(Ok(row)) => match self.parser.next(row) {
                    Ok(Some(event)) => return self.emit(event),
                    Ok(None) => continue,
                    Err(err) => return self.fail(err),
                },
                Some(Err(err)) => return self.fail(err),
                None => {
                    self.end();
                    let flushed = match self.parser.finish() {
                        Ok(Some(event)) => self.emit(event),
                        Ok(None) => None,
                        Err(err) => return self.fail(err),
                    };
                    info!(file = %self.source_event.file(), records = self.emitted, "finished RIF file");
                    return flushed;
                },
            }
        }
        None
    }
}

impl std::iter::FusedIterator for FileRecords {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::file::{DataSetInfo, RifFile};
    use crate::file_type::RifFileType;
    use chrono::Utc;

    const CARRIER: &str = "\
DML_IND|BENE_ID|CLM_ID|CLM_GRP_ID|NCH_CLM_TYPE_CD|CLM_FROM_DT|CLM_THRU_DT|CLM_PMT_AMT|PRNCPAL_DGNS_CD|LINE_NUM|HCPCS_CD|LINE_NCH_PMT_AMT|LINE_1ST_EXPNS_DT
INSERT|567834|C1|900|71|19990127|19990127|199.99|A02|1|92999|99.99|19990127
INSERT|567834|C1|900|71|19990127|19990127|199.99|A02|2|92999|100.00|19990127
INSERT|567834|C2|901|71|19990201|19990201|20.00||1||20.00|
";

    fn event(name: &str, file_type: RifFileType, data: &'static str) -> Arc<RifFileEvent> {
        let info = DataSetInfo {
            timestamp: Utc::now(),
            synthetic_data: false,
        };
        Arc::new(RifFileEvent::new(info, RifFile::in_memory(name, file_type, data.as_bytes())))
    }

    #[test]
    fn test_groups_claim_lines() {
        let records = RifFilesProcessor::new()
            .produce_records(event("carrier.txt", RifFileType::Carrier, CARRIER))
            .unwrap();
        let events: Vec<_> = records.collect::<Result<_>>().unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].raw_rows().len(), 2);
        assert_eq!(events[0].row_number(), 1);
        assert_eq!(events[1].row_number(), 3);
        assert_eq!(events[1].beneficiary_id(), "567834");
    }

    #[test]
    fn test_failure_ends_stream() {
        let data = "DML_IND|BENE_ID|CLM_ID\nINSERT|1|\n";
        let mut records = RifFilesProcessor::new()
            .produce_records(event("carrier.txt", RifFileType::Carrier, data))
            .unwrap();

        assert!(matches!(
            records.next(),
            Some(Err(RifError::MissingGroupingKey { row_number: 1, .. }))
        ));
        assert!(records.next().is_none());
    }

    #[test]
    fn test_close_discards_open_group() {
        let mut records = RifFilesProcessor::new()
            .produce_records(event("carrier.txt", RifFileType::Carrier, CARRIER))
            .unwrap();

        assert!(records.next().unwrap().is_ok());
        records.close();
        assert!(records.next().is_none());
        assert_eq!(records.emitted(), 1);
    }
}
