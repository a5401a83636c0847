//! Shared fixtures for ccw-rif integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use ccw_rif::file::{DataSetInfo, RifFile, RifFileEvent};
use ccw_rif::manifest::{DataSetLocation, DataSetManifest, DataSetManifestEntry};
use ccw_rif::s3::{InMemoryObjectStore, ObjectStore};
use ccw_rif::source::{Header, SourceRow};
use ccw_rif::RifFileType;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::sync::Arc;

pub const BENEFICIARY_HEADER: &str = "DML_IND|BENE_ID|STATE_CODE|BENE_COUNTY_CD|BENE_ZIP_CD|BENE_BIRTH_DT|\
BENE_SEX_IDENT_CD|BENE_RACE_CD|BENE_ENTLMT_RSN_ORIG|BENE_CRNT_HIC_NUM|MBI_NUM|BENE_SRNM_NAME|\
BENE_GVN_NAME|BENE_MDL_NAME|BENE_DEATH_DT|RFRNC_YR";

pub const CARRIER_HEADER: &str = "DML_IND|BENE_ID|CLM_ID|CLM_GRP_ID|NCH_CLM_TYPE_CD|CLM_FROM_DT|\
CLM_THRU_DT|CLM_PMT_AMT|PRNCPAL_DGNS_CD|LINE_NUM|HCPCS_CD|LINE_NCH_PMT_AMT|LINE_1ST_EXPNS_DT";

pub fn beneficiary_line(action: &str, bene_id: &str, year: &str) -> String {
    format!(
        "{}|{}|MO|123|12345|19810317|1|1||543217066U|3456789|Doe|John|A||{}",
        action, bene_id, year
    )
}

pub fn carrier_line(action: &str, bene_id: &str, claim_id: &str, line: u32) -> String {
    format!(
        "{}|{}|{}|900|71|19990127|19990127|199.99|A02|{}|92999|99.99|19990127",
        action, bene_id, claim_id, line
    )
}

/// A `|` delimited file body with a trailing newline
pub fn delimited(header: &str, lines: &[String]) -> String {
    let mut body = String::from(header);
    for line in lines {
        body.push('\n');
        body.push_str(line);
    }
    body.push('\n');
    body
}

pub fn data_set_info() -> DataSetInfo {
    DataSetInfo {
        timestamp: Utc::now(),
        synthetic_data: false,
    }
}

pub fn file_event(name: &str, file_type: RifFileType, body: impl Into<Bytes>) -> Arc<RifFileEvent> {
    Arc::new(RifFileEvent::new(
        data_set_info(),
        RifFile::in_memory(name, file_type, body),
    ))
}

/// Rows parsed out of a delimited header and lines, numbered from 1
pub fn source_rows(header: &str, lines: &[String]) -> Vec<SourceRow> {
    let header = Arc::new(Header::new(header.split('|').map(str::to_string).collect()));
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let values = line
                .split('|')
                .map(|v| (!v.is_empty()).then(|| v.to_string()))
                .collect();
            SourceRow::new(i as u64 + 1, header.clone(), values)
        })
        .collect()
}

/// Manifest timestamp text `age` in the past, second precision
pub fn timestamp_text(age: Duration) -> String {
    (Utc::now() - age).to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
}

/// Upload a manifest and, optionally, its data files into the store
pub async fn stage_data_set(
    store: &InMemoryObjectStore,
    location: DataSetLocation,
    timestamp_text: &str,
    sequence_id: u32,
    files: &[(&str, RifFileType, String)],
    upload_files: bool,
) -> DataSetManifest {
    let entries = files
        .iter()
        .map(|(name, file_type, _)| DataSetManifestEntry::new(*name, *file_type))
        .collect();
    let manifest = DataSetManifest::new(
        timestamp_text,
        sequence_id,
        location == DataSetLocation::Synthetic,
        location,
        entries,
    )
    .unwrap();

    store
        .put(&manifest.incoming_key(), Bytes::from(manifest.to_xml().unwrap()))
        .await
        .unwrap();
    if upload_files {
        for (entry, (_, _, body)) in manifest.entries().iter().zip(files) {
            store
                .put(&manifest.entry_incoming_key(entry), Bytes::from(body.clone()))
                .await
                .unwrap();
        }
    }
    manifest
}
