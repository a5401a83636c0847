use super::{Header, RowSource, SourceRow};
use crate::error::{Result, RifError};
use crate::file::{Charset, RifFile};
use csv::{ByteRecord, Reader, ReaderBuilder};
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

const UTF8_BOM: char = '\u{feff}';

/// `|` delimited text with a header row; quotes inside quoted fields escape as `\"` or `""`
pub struct DelimitedRowSource {
    name: String,
    reader: Option<Reader<Box<dyn Read + Send>>>,
    header: Arc<Header>,
    charset: Charset,
    record: ByteRecord,
    rows_read: u64,
}

impl DelimitedRowSource {
    pub fn open(file: &RifFile) -> Result<Self> {
        Self::from_reader(file.display_name(), file.open()?, file.charset())
    }

    pub fn from_reader(
        name: impl Into<String>,
        stream: Box<dyn Read + Send>,
        charset: Charset,
    ) -> Result<Self> {
        let name = name.into();
        let mut reader = ReaderBuilder::new()
            .delimiter(b'|')
            .escape(Some(b'\\'))
            .has_headers(true)
            .flexible(true)
            .from_reader(stream);

        let raw_header = reader.byte_headers()?.clone();
        if raw_header.is_empty() || (raw_header.len() == 1 && raw_header[0].is_empty()) {
            return Err(RifError::MissingHeader(name));
        }

        let mut names = Vec::with_capacity(raw_header.len());
        for (column, field) in raw_header.iter().enumerate() {
            let text = decode(field, charset, 0, column)?;
            let text = if column == 0 {
                text.trim_start_matches(UTF8_BOM).to_string()
            } else {
                text
            };
            names.push(text.trim().to_string());
        }
        debug!(file = %name, columns = names.len(), "Opened delimited RIF file");

        Ok(Self {
            name,
            reader: Some(reader),
            header: Arc::new(Header::new(names)),
            charset,
            record: ByteRecord::new(),
            rows_read: 0,
        })
    }

    fn decode_row(&self, row_number: u64) -> Result<SourceRow> {
        let mut values = Vec::with_capacity(self.header.len());
        for (column, field) in self.record.iter().enumerate().take(self.header.len()) {
            let text = decode(field, self.charset, row_number, column)?;
            values.push(if text.is_empty() { None } else { Some(text) });
        }
        Ok(SourceRow::new(row_number, Arc::clone(&self.header), values))
    }
}

fn decode(field: &[u8], charset: Charset, row_number: u64, column: usize) -> Result<String> {
    match charset {
        Charset::Utf8 => std::str::from_utf8(field)
            .map(str::to_string)
            .map_err(|_| RifError::Encoding {
                row_number,
                column,
                encoding: charset.name(),
            }),
        Charset::Latin1 => Ok(field.iter().map(|&b| char::from(b)).collect()),
    }
}

impl Iterator for DelimitedRowSource {
    type Item = Result<SourceRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        match reader.read_byte_record(&mut self.record) {
            Ok(true) => {
                self.rows_read += 1;
                let row = self.decode_row(self.rows_read);
                if row.is_err() {
                    self.close();
                }
                Some(row)
            },
            Ok(false) => {
                self.close();
                None
            },
            Err(e) => {
                self.close();
                Some(Err(e.into()))
            },
        }
    }
}

impl RowSource for DelimitedRowSource {
    fn header(&self) -> &Arc<Header> {
        &self.header
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!(file = %self.name, rows = self.rows_read, "Closed delimited RIF file");
        }
    }

    fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(bytes: &'static [u8], charset: Charset) -> Result<DelimitedRowSource> {
        DelimitedRowSource::from_reader("test.txt", Box::new(Cursor::new(bytes)), charset)
    }

    #[test]
    fn test_reads_rows_with_numbers() {
        let mut rows = source(b"\xEF\xBB\xBFDML_IND|BENE_ID|NOTE\nINSERT|1|\nUPDATE|2|\"a|b \\\"q\\\"\"\n", Charset::Utf8)
            .unwrap();

        assert_eq!(rows.header().names(), &["DML_IND", "BENE_ID", "NOTE"]);

        let first = rows.next().unwrap().unwrap();
        assert_eq!(first.row_number(), 1);
        assert_eq!(first.get("DML_IND"), Some("INSERT"));
        assert_eq!(first.get("NOTE"), None);

        let second = rows.next().unwrap().unwrap();
        assert_eq!(second.row_number(), 2);
        assert_eq!(second.get("NOTE"), Some("a|b \"q\""));

        assert!(rows.next().is_none());
        assert!(rows.is_closed());
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_doubled_quotes_inside_quoted_field() {
        let mut rows = source(b"BENE_ID|NOTE\n1|\"say \"\"hi\"\" \\\"twice\\\"\"\n", Charset::Utf8).unwrap();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get("NOTE"), Some("say \"hi\" \"twice\""));
    }

    #[test]
    fn test_latin1_decoding() {
        let mut rows = source(b"BENE_ID|BENE_SRNM_NAME\n1|Mu\xF1oz\n", Charset::Latin1).unwrap();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get("BENE_SRNM_NAME"), Some("Muñoz"));
    }

    #[test]
    fn test_invalid_utf8_is_error_and_closes() {
        let mut rows = source(b"BENE_ID|BENE_SRNM_NAME\n1|Mu\xF1oz\n", Charset::Utf8).unwrap();
        let err = rows.next().unwrap().unwrap_err();
        assert!(matches!(err, RifError::Encoding { row_number: 1, column: 1, .. }));
        assert!(rows.is_closed());
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(source(b"", Charset::Utf8), Err(RifError::MissingHeader(_))));
    }

    #[test]
    fn test_short_rows_read_as_absent() {
        let mut rows = source(b"A|B|C\n1|2\n", Charset::Utf8).unwrap();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get("B"), Some("2"));
        assert_eq!(row.get("C"), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut rows = source(b"A\n1\n", Charset::Utf8).unwrap();
        rows.close();
        rows.close();
        assert!(rows.next().is_none());
    }
}
