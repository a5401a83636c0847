//! Uniform row access over delimited-text and columnar RIF files
//!
//! Parsers only ever see [`SourceRow`]s; whether a row came from a `|`
//! delimited text file or from a Parquet file is invisible to them. Empty text
//! and nulls both read as absent.

mod columnar;
mod delimited;

pub use columnar::ColumnarRowSource;
pub use delimited::DelimitedRowSource;

use crate::error::Result;
use crate::file::{RifFile, RifFileFormat};
use std::collections::HashMap;
use std::sync::Arc;

/// Column names of a source, with lookup by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Header {
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(position);
        }
        Self { names, index }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One row of named string fields
#[derive(Debug, Clone)]
pub struct SourceRow {
    row_number: u64,
    header: Arc<Header>,
    values: Vec<Option<String>>,
}

impl SourceRow {
    pub fn new(row_number: u64, header: Arc<Header>, values: Vec<Option<String>>) -> Self {
        Self {
            row_number,
            header,
            values,
        }
    }

    /// Value of `field`, or `None` when the column is missing or empty
    pub fn get(&self, field: &str) -> Option<&str> {
        let position = self.header.position(field)?;
        self.values.get(position)?.as_deref()
    }

    /// 1-based position of this row among the data rows of its file
    pub fn row_number(&self) -> u64 {
        self.row_number
    }

    /// Every value in column order, absent values as empty text
    pub fn all_values(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.header.len()).map(|i| self.values.get(i).and_then(|v| v.as_deref()).unwrap_or(""))
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Re-serialize as a `|` delimited line readable by [`DelimitedRowSource`]
    pub fn to_delimited(&self) -> String {
        self.all_values()
            .map(quote_if_needed)
            .collect::<Vec<_>>()
            .join("|")
    }
}

fn quote_if_needed(value: &str) -> String {
    if value.contains(['|', '"', '\\', '\n', '\r']) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Ordered rows of one physical file
///
/// A source owns its file handle. It is released when the rows run out, when
/// reading fails, on [`RowSource::close`], or when the source is dropped,
/// whichever comes first. `close` may be called any number of times.
pub trait RowSource: Iterator<Item = Result<SourceRow>> + Send {
    fn header(&self) -> &Arc<Header>;

    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Open the backend matching the file's physical format
pub fn open_row_source(file: &RifFile) -> Result<Box<dyn RowSource>> {
    match file.format() {
        RifFileFormat::Delimited => Ok(Box::new(DelimitedRowSource::open(file)?)),
        RifFileFormat::Columnar => Ok(Box::new(ColumnarRowSource::open(file)?)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn row(values: &[Option<&str>]) -> SourceRow {
        let header = Arc::new(Header::new(vec![
            "BENE_ID".to_string(),
            "NOTE".to_string(),
            "BENE_ID".to_string(),
        ]));
        SourceRow::new(4, header, values.iter().map(|v| v.map(str::to_string)).collect())
    }

    #[test]
    fn test_get_by_name() {
        let row = row(&[Some("567834"), None, Some("ignored")]);
        assert_eq!(row.get("BENE_ID"), Some("567834"));
        assert_eq!(row.get("NOTE"), None);
        assert_eq!(row.get("MISSING"), None);
        assert_eq!(row.row_number(), 4);
    }

    #[test]
    fn test_all_values_and_delimited_text() {
        let row = row(&[Some("1"), Some("a|b\\c"), None]);
        assert_eq!(row.all_values().collect::<Vec<_>>(), vec!["1", "a|b\\c", ""]);
        assert_eq!(row.to_delimited(), "1|\"a|b\\\\c\"|");
    }
}
