//! Delimited and Parquet encodings of the same data must parse identically

mod common;

use arrow::array::{ArrayRef, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ccw_rif::{RifFile, RifFileEvent, RifFileType, RifFilesProcessor, RifRecord};
use common::*;
use parquet::arrow::ArrowWriter;
use std::sync::Arc;

const LINE_NUMBER_COLUMN: &str = "LINE_NUM";

fn carrier_lines() -> Vec<String> {
    vec![
        carrier_line("INSERT", "1", "C1", 1),
        carrier_line("INSERT", "1", "C1", 2),
        carrier_line("UPDATE", "2", "C2", 1).replace("|A02|", "||"),
        carrier_line("INSERT", "3", "C3", 1),
    ]
}

/// Same rows as a Parquet file; the line number column is stored as an integer
fn write_parquet(path: &std::path::Path, lines: &[String]) {
    let names: Vec<&str> = CARRIER_HEADER.split('|').collect();
    let rows: Vec<Vec<&str>> = lines.iter().map(|l| l.split('|').collect()).collect();

    let mut fields = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();
    for (index, name) in names.iter().enumerate() {
        let values = rows.iter().map(|r| Some(r[index]).filter(|v| !v.is_empty()));
        if *name == LINE_NUMBER_COLUMN {
            fields.push(Field::new(*name, DataType::Int32, true));
            let numbers: Vec<Option<i32>> = values.map(|v| v.map(|n| n.parse().unwrap())).collect();
            columns.push(Arc::new(Int32Array::from(numbers)));
        } else {
            fields.push(Field::new(*name, DataType::Utf8, true));
            columns.push(Arc::new(StringArray::from(values.collect::<Vec<_>>())));
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

fn parse(file: RifFile) -> Vec<(u64, RifRecord)> {
    let event = Arc::new(RifFileEvent::new(data_set_info(), file));
    RifFilesProcessor::new()
        .produce_records(event)
        .unwrap()
        .map(|r| {
            let r = r.unwrap();
            (r.row_number(), r.into_record())
        })
        .collect()
}

#[test]
fn test_parquet_matches_delimited() {
    let dir = tempfile::tempdir().unwrap();
    let lines = carrier_lines();

    let text_path = dir.path().join("carrier.txt");
    std::fs::write(&text_path, delimited(CARRIER_HEADER, &lines)).unwrap();
    let parquet_path = dir.path().join("carrier.parquet");
    write_parquet(&parquet_path, &lines);

    let from_text = parse(RifFile::local(&text_path, RifFileType::Carrier));
    let from_parquet = parse(RifFile::local(&parquet_path, RifFileType::Carrier));

    assert_eq!(from_text.len(), 3);
    assert_eq!(from_text, from_parquet);

    let RifRecord::Claim(c2) = &from_text[1].1 else {
        panic!("expected a claim");
    };
    assert_eq!(c2.principal_diagnosis_code, None);
}
