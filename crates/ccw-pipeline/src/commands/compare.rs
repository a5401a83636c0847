//! `ccw-pipeline compare` command implementation
//!
//! Walks the records of a delimited file and a Parquet file side by side and
//! stops at the first pair that differs.

use super::parse::local_file_event;
use anyhow::{bail, Context, Result};
use ccw_rif::{RifFile, RifFileFormat, RifFileType, RifFilesProcessor, RifRecord};
use colored::Colorize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Identical { records: usize },
    /// Records at `index` differ; `None` means that side ran out first
    Mismatch {
        index: usize,
        delimited: Option<Box<RifRecord>>,
        parquet: Option<Box<RifRecord>>,
    },
}

pub fn compare_files(
    file_type: RifFileType,
    delimited: &Path,
    parquet: &Path,
    strict_grouping: bool,
) -> ccw_rif::Result<Comparison> {
    let processor = RifFilesProcessor::new().with_strict_grouping(strict_grouping);
    let left_file = RifFile::local(delimited, file_type).with_format(RifFileFormat::Delimited);
    let right_file = RifFile::local(parquet, file_type).with_format(RifFileFormat::Columnar);
    let mut left = processor.produce_records(local_file_event(left_file))?;
    let mut right = processor.produce_records(local_file_event(right_file))?;

    let mut index = 0;
    loop {
        let l = left.next().transpose()?.map(|e| e.into_record());
        let r = right.next().transpose()?.map(|e| e.into_record());
        match (l, r) {
            (None, None) => return Ok(Comparison::Identical { records: index }),
            (Some(l), Some(r)) if l == r => index += 1,
            (l, r) => {
                left.close();
                right.close();
                return Ok(Comparison::Mismatch {
                    index,
                    delimited: l.map(Box::new),
                    parquet: r.map(Box::new),
                });
            },
        }
    }
}

fn describe(record: Option<&RifRecord>) -> Result<String> {
    match record {
        Some(record) => Ok(serde_json::to_string_pretty(record)?),
        None => Ok("<no more records>".to_string()),
    }
}

/// Compare two encodings; a mismatch is reported and returned as an error
pub fn run(file_type: RifFileType, delimited: &Path, parquet: &Path, strict_grouping: bool) -> Result<()> {
    let comparison = compare_files(file_type, delimited, parquet, strict_grouping).with_context(|| {
        format!(
            "Failed to compare {} with {}",
            delimited.display(),
            parquet.display()
        )
    })?;

    match comparison {
        Comparison::Identical { records } => {
            println!("{} {} records match", "OK".green().bold(), records);
            Ok(())
        },
        Comparison::Mismatch {
            index,
            delimited: left,
            parquet: right,
        } => {
            println!("{} records differ at index {}", "MISMATCH".red().bold(), index);
            println!("{}", "Delimited:".cyan());
            println!("{}", describe(left.as_deref())?);
            println!("{}", "Parquet:".cyan());
            println!("{}", describe(right.as_deref())?);
            bail!("{} and {} hold different records", delimited.display(), parquet.display())
        },
    }
}
