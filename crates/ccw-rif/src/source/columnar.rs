use super::{Header, RowSource, SourceRow};
use crate::error::{Result, RifError};
use crate::file::{RifFile, RifFileSource};
use arrow::array::{Array, AsArray, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::file::reader::ChunkReader;
use std::fs::File;
use std::sync::Arc;
use tracing::debug;

/// Rows materialized per record batch
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Parquet file read one record batch at a time
///
/// Only the current batch is held in memory; it is dropped as soon as its last
/// row has been handed out. Every column is cast to text so fields read the
/// same as their delimited counterparts.
pub struct ColumnarRowSource {
    name: String,
    reader: Option<ParquetRecordBatchReader>,
    header: Arc<Header>,
    batch: Vec<StringArray>,
    batch_len: usize,
    position: usize,
    rows_read: u64,
}

impl ColumnarRowSource {
    pub fn open(file: &RifFile) -> Result<Self> {
        Self::open_with_batch_size(file, DEFAULT_BATCH_SIZE)
    }

    pub fn open_with_batch_size(file: &RifFile, batch_size: usize) -> Result<Self> {
        match file.source() {
            RifFileSource::Local(path) => {
                Self::from_chunks(file.display_name(), File::open(path)?, batch_size)
            },
            RifFileSource::InMemory(data) => {
                Self::from_chunks(file.display_name(), data.clone(), batch_size)
            },
        }
    }

    fn from_chunks<T: ChunkReader + 'static>(name: &str, chunks: T, batch_size: usize) -> Result<Self> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(chunks)?;
        let names: Vec<String> = builder
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect();
        let reader = builder.with_batch_size(batch_size.max(1)).build()?;
        debug!(file = %name, columns = names.len(), "Opened columnar RIF file");

        Ok(Self {
            name: name.to_string(),
            reader: Some(reader),
            header: Arc::new(Header::new(names)),
            batch: Vec::new(),
            batch_len: 0,
            position: 0,
            rows_read: 0,
        })
    }

    fn take_row(&mut self) -> SourceRow {
        let position = self.position;
        let values = self
            .batch
            .iter()
            .map(|column| {
                if column.is_null(position) {
                    return None;
                }
                let value = column.value(position);
                (!value.is_empty()).then(|| value.to_string())
            })
            .collect();

        self.position += 1;
        self.rows_read += 1;
        SourceRow::new(self.rows_read, Arc::clone(&self.header), values)
    }

    fn load_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let mut columns = Vec::with_capacity(batch.num_columns());
        for (index, column) in batch.columns().iter().enumerate() {
            let text = cast(column, &DataType::Utf8)?;
            let strings = text.as_string_opt::<i32>().ok_or_else(|| {
                RifError::Arrow(arrow::error::ArrowError::CastError(format!(
                    "column {} of {} could not be read as text",
                    index, self.name
                )))
            })?;
            columns.push(strings.clone());
        }
        self.batch = columns;
        self.batch_len = batch.num_rows();
        self.position = 0;
        Ok(())
    }
}

impl Iterator for ColumnarRowSource {
    type Item = Result<SourceRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.position < self.batch_len {
                return Some(Ok(self.take_row()));
            }

            self.batch.clear();
            self.batch_len = 0;
            self.position = 0;

            let next_batch = self.reader.as_mut()?.next();
            match next_batch {
                None => {
                    self.close();
                    return None;
                },
                Some(Err(e)) => {
                    self.close();
                    return Some(Err(e.into()));
                },
                Some(Ok(batch)) => {
                    if let Err(e) = self.load_batch(&batch) {
                        self.close();
                        return Some(Err(e));
                    }
                },
            }
        }
    }
}

impl RowSource for ColumnarRowSource {
    fn header(&self) -> &Arc<Header> {
        &self.header
    }

    fn close(&mut self) {
        self.batch.clear();
        self.batch_len = 0;
        self.position = 0;
        if self.reader.take().is_some() {
            debug!(file = %self.name, rows = self.rows_read, "Closed columnar RIF file");
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
    use crate::file_type::RifFileType;
    use arrow::array::{ArrayRef, Int64Array};
    use arrow::datatypes::{Field, Schema};
    use bytes::Bytes;
    use parquet::arrow::ArrowWriter;

    fn parquet_bytes() -> Bytes {
        let schema = Arc::new(Schema::new(vec![
            Field::new("BENE_ID", DataType::Utf8, false),
            Field::new("DAYS_SUPLY_NUM", DataType::Int64, true),
            Field::new("NOTE", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(StringArray::from(vec!["1", "2", "3"])) as ArrayRef,
                Arc::new(Int64Array::from(vec![Some(30), None, Some(90)])) as ArrayRef,
                Arc::new(StringArray::from(vec![Some(""), Some("x"), None])) as ArrayRef,
            ],
        )
        .unwrap();

        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        Bytes::from(buffer)
    }

    #[test]
    fn test_reads_rows_across_batches() {
        let file = RifFile::in_memory("pde.parquet", RifFileType::Pde, parquet_bytes());
        let mut rows = ColumnarRowSource::open_with_batch_size(&file, 2).unwrap();
        assert_eq!(rows.header().names(), &["BENE_ID", "DAYS_SUPLY_NUM", "NOTE"]);

        let all: Vec<SourceRow> = rows.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].row_number(), 1);
        assert_eq!(all[0].get("DAYS_SUPLY_NUM"), Some("30"));
        assert_eq!(all[0].get("NOTE"), None);
        assert_eq!(all[1].get("DAYS_SUPLY_NUM"), None);
        assert_eq!(all[1].get("NOTE"), Some("x"));
        assert_eq!(all[2].row_number(), 3);
        assert_eq!(all[2].get("BENE_ID"), Some("3"));
        assert!(rows.is_closed());
    }

    #[test]
    fn test_garbage_is_error() {
        let file = RifFile::in_memory("bad.parquet", RifFileType::Pde, Bytes::from_static(b"nope"));
        assert!(matches!(ColumnarRowSource::open(&file), Err(RifError::Parquet(_))));
    }
}
