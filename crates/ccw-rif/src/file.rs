//! Physical RIF files and the events announcing them
//!
//! A [`RifFilesEvent`] is the "data set arrived" notification: one
//! [`RifFileEvent`] per file, already sorted into a safe processing order.

use crate::error::{Result, RifError};
use crate::file_type::RifFileType;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Physical encoding of a RIF file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RifFileFormat {
    /// `|` separated text with a header row
    Delimited,
    /// Parquet
    Columnar,
}

impl RifFileFormat {
    /// Infer the encoding from a file name; anything not `.parquet` is delimited text
    pub fn from_name(name: &str) -> Self {
        let is_parquet = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
        if is_parquet {
            RifFileFormat::Columnar
        } else {
            RifFileFormat::Delimited
        }
    }
}

/// Character set of delimited files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    /// ISO-8859-1, one byte per character
    Latin1,
}

impl Charset {
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
        }
    }
}

#[derive(Clone)]
pub enum RifFileSource {
    Local(PathBuf),
    InMemory(Bytes),
}

impl fmt::Debug for RifFileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RifFileSource::Local(path) => f.debug_tuple("Local").field(path).finish(),
            RifFileSource::InMemory(data) => write!(f, "InMemory({} bytes)", data.len()),
        }
    }
}

/// A RIF file of a known type that can be opened for reading
#[derive(Debug, Clone)]
pub struct RifFile {
    display_name: String,
    file_type: RifFileType,
    format: RifFileFormat,
    charset: Charset,
    source: RifFileSource,
}

impl RifFile {
    pub fn local(path: impl Into<PathBuf>, file_type: RifFileType) -> Self {
        let path = path.into();
        let display_name = path.display().to_string();
        Self {
            format: RifFileFormat::from_name(&display_name),
            display_name,
            file_type,
            charset: Charset::default(),
            source: RifFileSource::Local(path),
        }
    }

    pub fn in_memory(
        display_name: impl Into<String>,
        file_type: RifFileType,
        data: impl Into<Bytes>,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            format: RifFileFormat::from_name(&display_name),
            display_name,
            file_type,
            charset: Charset::default(),
            source: RifFileSource::InMemory(data.into()),
        }
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_format(mut self, format: RifFileFormat) -> Self {
        self.format = format;
        self
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn file_type(&self) -> RifFileType {
        self.file_type
    }

    pub fn format(&self) -> RifFileFormat {
        self.format
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn source(&self) -> &RifFileSource {
        &self.source
    }

    /// Open a fresh byte stream over the file contents
    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match &self.source {
            RifFileSource::Local(path) => Ok(Box::new(File::open(path)?)),
            RifFileSource::InMemory(data) => Ok(Box::new(Cursor::new(data.clone()))),
        }
    }
}

impl fmt::Display for RifFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.file_type)
    }
}

/// The parts of a [`RifFilesEvent`] every file event needs to know about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSetInfo {
    pub timestamp: DateTime<Utc>,
    pub synthetic_data: bool,
}

/// One file of a data set
#[derive(Debug)]
pub struct RifFileEvent {
    parent: DataSetInfo,
    file: Arc<RifFile>,
}

impl RifFileEvent {
    pub fn new(parent: DataSetInfo, file: impl Into<Arc<RifFile>>) -> Self {
        Self {
            parent,
            file: file.into(),
        }
    }

    pub fn parent(&self) -> DataSetInfo {
        self.parent
    }

    pub fn file(&self) -> &RifFile {
        &self.file
    }

    pub fn file_type(&self) -> RifFileType {
        self.file.file_type()
    }
}

/// A whole data set, with its files in processing order
///
/// Beneficiary files come first, everything else follows in file-type
/// declaration order; files of the same type keep their input order.
#[derive(Debug, Clone)]
pub struct RifFilesEvent {
    info: DataSetInfo,
    file_events: Vec<Arc<RifFileEvent>>,
}

impl RifFilesEvent {
    pub fn new(timestamp: DateTime<Utc>, synthetic_data: bool, files: Vec<RifFile>) -> Result<Self> {
        if files.is_empty() {
            return Err(RifError::InvalidFilesEvent(
                "a data set must contain at least one file".to_string(),
            ));
        }

        let info = DataSetInfo {
            timestamp,
            synthetic_data,
        };
        let mut file_events: Vec<Arc<RifFileEvent>> = files
            .into_iter()
            .map(|file| Arc::new(RifFileEvent::new(info, file)))
            .collect();
        file_events.sort_by_key(|event| processing_rank(event.file_type()));

        Ok(Self { info, file_events })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.info.timestamp
    }

    pub fn is_synthetic_data(&self) -> bool {
        self.info.synthetic_data
    }

    pub fn info(&self) -> DataSetInfo {
        self.info
    }

    pub fn file_events(&self) -> &[Arc<RifFileEvent>] {
        &self.file_events
    }

    /// Split into the beneficiary prefix and the remaining files
    pub fn split_beneficiary_files(&self) -> (&[Arc<RifFileEvent>], &[Arc<RifFileEvent>]) {
        let boundary = self
            .file_events
            .iter()
            .position(|e| !e.file_type().is_beneficiary_type())
            .unwrap_or(self.file_events.len());
        self.file_events.split_at(boundary)
    }
}

fn processing_rank(file_type: RifFileType) -> (bool, usize) {
    (!file_type.is_beneficiary_type(), file_type.ordinal())
}
