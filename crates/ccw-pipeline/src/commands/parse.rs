//! `ccw-pipeline parse` command implementation
//!
//! Parses one local file the same way the loader would and counts records.

use anyhow::{Context, Result};
use ccw_rif::{DataSetInfo, RifFile, RifFileEvent, RifFileType, RifFilesProcessor};
use chrono::Utc;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseSummary {
    pub records: u64,
    /// Keyed by `DML_IND` text
    pub by_action: BTreeMap<&'static str, u64>,
    /// Source rows consumed, including every line of multi-line claims
    pub rows: u64,
}

/// Wrap a single local file in its own file event
pub(crate) fn local_file_event(file: RifFile) -> Arc<RifFileEvent> {
    let info = DataSetInfo {
        timestamp: Utc::now(),
        synthetic_data: false,
    };
    Arc::new(RifFileEvent::new(info, file))
}

pub fn summarize(path: &Path, file_type: RifFileType, strict_grouping: bool) -> ccw_rif::Result<ParseSummary> {
    let event = local_file_event(RifFile::local(path, file_type));
    let processor = RifFilesProcessor::new().with_strict_grouping(strict_grouping);

    let mut summary = ParseSummary::default();
    for record in processor.produce_records(event)? {
        let record = record?;
        summary.records += 1;
        summary.rows += record.raw_rows().len() as u64;
        *summary.by_action.entry(record.action().as_str()).or_default() += 1;
    }
    Ok(summary)
}

/// Parse a file and print its record counts
pub fn run(path: &Path, file_type: RifFileType, strict_grouping: bool) -> Result<()> {
    let summary = summarize(path, file_type, strict_grouping)
        .with_context(|| format!("Failed to parse {} file {}", file_type, path.display()))?;

    println!("{} {}", file_type.to_string().cyan().bold(), path.display());
    println!("  Rows:    {}", summary.rows);
    println!("  Records: {}", summary.records);
    for (action, count) in &summary.by_action {
        println!("  {:<8} {}", format!("{}:", action), count);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const PDE_FILE: &str = "DML_IND|PDE_ID|BENE_ID|SRVC_DT|PD_DT|SRVC_PRVDR_ID|PRSCRBR_ID|PROD_SRVC_ID|QTY_DSPNSD_NUM|DAYS_SUPLY_NUM|FILL_NUM|TOT_RX_CST_AMT\n\
INSERT|89|567834|20150501|20150512|1023011079|1750384806|000000000|60|30|3|36.00\n\
UPDATE|90|567834|20150601|20150612|1023011079|1750384806|000000000|60|30|4|36.00\n";

    #[test]
    fn test_summarize_counts_actions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pde.txt");
        std::fs::write(&path, PDE_FILE).unwrap();

        let summary = summarize(&path, RifFileType::Pde, false).unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.by_action.get("INSERT"), Some(&1));
        assert_eq!(summary.by_action.get("UPDATE"), Some(&1));
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(summarize(&dir.path().join("absent.txt"), RifFileType::Pde, false).is_err());
    }
}
