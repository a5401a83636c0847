//! Data-set manifests and their object-store key conventions
//!
//! Every data set is announced by a small XML document:
//!
//! ```xml
//! <dataSetManifest timestamp="2024-01-15T06:00:00Z" sequenceId="0" syntheticData="false">
//!   <entry name="beneficiaries.txt" type="BENEFICIARY"/>
//!   <entry name="carrier.txt" type="CARRIER"/>
//! </dataSetManifest>
//! ```
//!
//! stored at `{prefix}/{timestamp}/{sequenceId}_manifest.xml`, next to the data
//! files it lists. Processed data sets are moved from the incoming prefix to the
//! matching done prefix.

use crate::error::{Result, RifError};
use crate::file_type::RifFileType;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

pub const S3_PREFIX_PENDING_DATA_SETS: &str = "Incoming";
pub const S3_PREFIX_COMPLETED_DATA_SETS: &str = "Done";
pub const S3_PREFIX_PENDING_SYNTHETIC_DATA_SETS: &str = "Synthetic/Incoming";
pub const S3_PREFIX_COMPLETED_SYNTHETIC_DATA_SETS: &str = "Synthetic/Done";

static PENDING_MANIFEST_KEY: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^(Incoming|Synthetic/Incoming)/(.*)/([0-9]+)_manifest\.xml$")
});

/// Which pair of prefixes a data set lives under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSetLocation {
    Production,
    Synthetic,
}

impl DataSetLocation {
    pub const ALL: [DataSetLocation; 2] = [DataSetLocation::Production, DataSetLocation::Synthetic];

    pub fn incoming_prefix(self) -> &'static str {
        match self {
            DataSetLocation::Production => S3_PREFIX_PENDING_DATA_SETS,
            DataSetLocation::Synthetic => S3_PREFIX_PENDING_SYNTHETIC_DATA_SETS,
        }
    }

    pub fn done_prefix(self) -> &'static str {
        match self {
            DataSetLocation::Production => S3_PREFIX_COMPLETED_DATA_SETS,
            DataSetLocation::Synthetic => S3_PREFIX_COMPLETED_SYNTHETIC_DATA_SETS,
        }
    }

    fn from_incoming_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.incoming_prefix() == prefix)
    }
}

// ============================================================================
// Manifest identity
// ============================================================================

/// Identity and ordering key of a manifest: `(timestamp, sequenceId)`
#[derive(Debug, Clone)]
pub struct DataSetManifestId {
    timestamp_text: String,
    timestamp: DateTime<Utc>,
    sequence_id: u32,
}

impl DataSetManifestId {
    pub fn new(timestamp_text: impl Into<String>, sequence_id: u32) -> Result<Self> {
        let timestamp_text = timestamp_text.into();
        let timestamp = parse_timestamp(&timestamp_text)?;
        Ok(Self {
            timestamp_text,
            timestamp,
            sequence_id,
        })
    }

    /// Recognize an incoming manifest key
    ///
    /// Returns `None` for keys that are not manifests, or whose timestamp
    /// directory is not a valid instant.
    pub fn parse_from_key(key: &str) -> Option<(DataSetLocation, DataSetManifestId)> {
        let regex = PENDING_MANIFEST_KEY.as_ref().ok()?;
        let captures = regex.captures(key)?;
        let location = DataSetLocation::from_incoming_prefix(captures.get(1)?.as_str())?;
        let sequence_id = captures.get(3)?.as_str().parse().ok()?;
        let id = DataSetManifestId::new(captures.get(2)?.as_str(), sequence_id).ok()?;
        Some((location, id))
    }

    pub fn compute_key(&self, prefix: &str) -> String {
        format!("{}/{}/{}_manifest.xml", prefix, self.timestamp_text, self.sequence_id)
    }

    pub fn timestamp_text(&self) -> &str {
        &self.timestamp_text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn sequence_id(&self) -> u32 {
        self.sequence_id
    }

    /// Manifests stamped at or after `now` are not processed yet
    pub fn is_future(&self, now: DateTime<Utc>) -> bool {
        self.timestamp >= now
    }

    pub fn is_older_than(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.timestamp < now - max_age
    }
}

impl PartialEq for DataSetManifestId {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.sequence_id == other.sequence_id
    }
}

impl Eq for DataSetManifestId {}

impl std::hash::Hash for DataSetManifestId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.timestamp.hash(state);
        self.sequence_id.hash(state);
    }
}

impl PartialOrd for DataSetManifestId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DataSetManifestId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.sequence_id.cmp(&other.sequence_id))
    }
}

impl fmt::Display for DataSetManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.timestamp_text, self.sequence_id)
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// One `(file name, file type)` line of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSetManifestEntry {
    pub name: String,
    pub file_type: RifFileType,
}

impl DataSetManifestEntry {
    pub fn new(name: impl Into<String>, file_type: RifFileType) -> Self {
        Self {
            name: name.into(),
            file_type,
        }
    }
}

/// Parsed description of one data-set upload; never mutated after construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSetManifest {
    id: DataSetManifestId,
    synthetic_data: bool,
    location: DataSetLocation,
    entries: Vec<DataSetManifestEntry>,
}

impl DataSetManifest {
    pub fn new(
        timestamp_text: impl Into<String>,
        sequence_id: u32,
        synthetic_data: bool,
        location: DataSetLocation,
        entries: Vec<DataSetManifestEntry>,
    ) -> Result<Self> {
        if entries.is_empty() {
            return Err(RifError::manifest("manifest lists no entries"));
        }
        if let Some(blank) = entries.iter().find(|e| e.name.trim().is_empty()) {
            return Err(RifError::manifest(format!(
                "manifest entry of type {} has a blank name",
                blank.file_type
            )));
        }
        let mut names = HashSet::with_capacity(entries.len());
        if let Some(duplicate) = entries.iter().find(|e| !names.insert(e.name.as_str())) {
            return Err(RifError::manifest(format!(
                "manifest lists entry '{}' more than once",
                duplicate.name
            )));
        }

        Ok(Self {
            id: DataSetManifestId::new(timestamp_text, sequence_id)?,
            synthetic_data,
            location,
            entries,
        })
    }

    /// Parse a manifest document found under `location`
    pub fn from_xml(xml: &str, location: DataSetLocation) -> Result<Self> {
        let raw: ManifestXml = quick_xml::de::from_str(xml)
            .map_err(|e| RifError::manifest(format!("Failed to parse manifest XML: {}", e)))?;

        let entries = raw
            .entries
            .into_iter()
            .map(|e| Ok(DataSetManifestEntry::new(e.name, e.file_type.parse()?)))
            .collect::<Result<Vec<_>>>()?;

        Self::new(
            raw.timestamp.trim(),
            raw.sequence_id,
            raw.synthetic_data,
            location,
            entries,
        )
    }

    pub fn to_xml(&self) -> Result<String> {
        let raw = ManifestXml {
            timestamp: self.id.timestamp_text.clone(),
            sequence_id: self.id.sequence_id,
            synthetic_data: self.synthetic_data,
            entries: self
                .entries
                .iter()
                .map(|e| EntryXml {
                    name: e.name.clone(),
                    file_type: e.file_type.as_str().to_string(),
                })
                .collect(),
        };
        quick_xml::se::to_string_with_root("dataSetManifest", &raw)
            .map_err(|e| RifError::manifest(format!("Failed to write manifest XML: {}", e)))
    }

    pub fn id(&self) -> &DataSetManifestId {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.id.timestamp
    }

    pub fn timestamp_text(&self) -> &str {
        &self.id.timestamp_text
    }

    pub fn sequence_id(&self) -> u32 {
        self.id.sequence_id
    }

    pub fn is_synthetic_data(&self) -> bool {
        self.synthetic_data
    }

    pub fn location(&self) -> DataSetLocation {
        self.location
    }

    /// Entries in declaration order
    pub fn entries(&self) -> &[DataSetManifestEntry] {
        &self.entries
    }

    /// Directory holding this data set before processing
    pub fn incoming_location(&self) -> String {
        format!("{}/{}", self.location.incoming_prefix(), self.id.timestamp_text)
    }

    /// Directory this data set is moved to once processed
    pub fn done_location(&self) -> String {
        format!("{}/{}", self.location.done_prefix(), self.id.timestamp_text)
    }

    pub fn incoming_key(&self) -> String {
        self.id.compute_key(self.location.incoming_prefix())
    }

    pub fn done_key(&self) -> String {
        self.id.compute_key(self.location.done_prefix())
    }

    pub fn entry_incoming_key(&self, entry: &DataSetManifestEntry) -> String {
        format!("{}/{}", self.incoming_location(), entry.name)
    }

    pub fn entry_done_key(&self, entry: &DataSetManifestEntry) -> String {
        format!("{}/{}", self.done_location(), entry.name)
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RifError::manifest(format!("invalid manifest timestamp '{}': {}", text, e)))
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestXml {
    #[serde(rename = "@timestamp")]
    timestamp: String,
    #[serde(rename = "@sequenceId")]
    sequence_id: u32,
    #[serde(rename = "@syntheticData", default)]
    synthetic_data: bool,
    #[serde(rename = "entry", default)]
    entries: Vec<EntryXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@type")]
    file_type: String,
}
