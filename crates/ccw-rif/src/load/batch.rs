//! Load bookkeeping: which beneficiaries each loaded file touched

use crate::error::{Result, RifError};
use crate::file_type::RifFileType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Separator of the persisted beneficiary id list
pub const BENEFICIARY_SEPARATOR: char = ',';

/// One physical file whose load has started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedFile {
    pub id: Uuid,
    pub file_type: RifFileType,
    pub created: DateTime<Utc>,
}

impl LoadedFile {
    pub fn new(file_type: RifFileType) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_type,
            created: Utc::now(),
        }
    }
}

/// Immutable fact: these beneficiaries were touched by this file as of `created`
///
/// The id list is held in its persisted form, a single comma separated
/// string. The empty list is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedBatch {
    id: Uuid,
    loaded_file_id: Uuid,
    beneficiaries: String,
    created: DateTime<Utc>,
}

impl LoadedBatch {
    pub fn new<S: AsRef<str>>(
        loaded_file_id: Uuid,
        beneficiaries: &[S],
        created: DateTime<Utc>,
    ) -> Result<Self> {
        for id in beneficiaries {
            validate_beneficiary_id(id.as_ref())?;
        }
        let joined = beneficiaries
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",");
        Ok(Self::from_parts(Uuid::new_v4(), loaded_file_id, joined, created))
    }

    /// Rebuild a batch from its stored columns
    pub fn from_parts(
        id: Uuid,
        loaded_file_id: Uuid,
        beneficiaries: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            loaded_file_id,
            beneficiaries: beneficiaries.into(),
            created,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn loaded_file_id(&self) -> Uuid {
        self.loaded_file_id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// The stored form of the id list
    pub fn beneficiaries_text(&self) -> &str {
        &self.beneficiaries
    }

    pub fn beneficiaries(&self) -> Vec<String> {
        if self.beneficiaries.is_empty() {
            return Vec::new();
        }
        self.beneficiaries
            .split(BENEFICIARY_SEPARATOR)
            .map(str::to_string)
            .collect()
    }

    pub fn beneficiary_count(&self) -> usize {
        if self.beneficiaries.is_empty() {
            0
        } else {
            self.beneficiaries.matches(BENEFICIARY_SEPARATOR).count() + 1
        }
    }

    /// Merge another batch of the same file into this one
    ///
    /// The ids of `other` are appended after ours and the later `created`
    /// wins. Combining with `None` returns an equal copy of `self`.
    pub fn combine(&self, other: Option<&LoadedBatch>) -> Result<LoadedBatch> {
        let Some(other) = other else {
            return Ok(self.clone());
        };
        if other.loaded_file_id != self.loaded_file_id {
            return Err(RifError::InvalidBatch(format!(
                "cannot combine batches of loaded files {} and {}",
                self.loaded_file_id, other.loaded_file_id
            )));
        }

        let beneficiaries = match (self.beneficiaries.is_empty(), other.beneficiaries.is_empty()) {
            (_, true) => self.beneficiaries.clone(),
            (true, false) => other.beneficiaries.clone(),
            (false, false) => format!("{},{}", self.beneficiaries, other.beneficiaries),
        };
        Ok(Self {
            id: self.id,
            loaded_file_id: self.loaded_file_id,
            beneficiaries,
            created: self.created.max(other.created),
        })
    }
}

fn validate_beneficiary_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(RifError::InvalidBatch("beneficiary id must not be empty".to_string()));
    }
    if id.contains(BENEFICIARY_SEPARATOR) {
        return Err(RifError::InvalidBatch(format!(
            "beneficiary id '{}' contains the list separator",
            id
        )));
    }
    Ok(())
}

/// Accumulates beneficiary ids for one batch of one file
///
/// Safe to share between workers; every call takes the internal lock.
#[derive(Debug)]
pub struct LoadedBatchBuilder {
    loaded_file_id: Uuid,
    beneficiaries: Mutex<Vec<String>>,
}

impl LoadedBatchBuilder {
    pub fn new(loaded_file_id: Uuid, capacity_hint: usize) -> Self {
        Self {
            loaded_file_id,
            beneficiaries: Mutex::new(Vec::with_capacity(capacity_hint)),
        }
    }

    pub fn loaded_file_id(&self) -> Uuid {
        self.loaded_file_id
    }

    pub fn associate_beneficiary(&self, beneficiary_id: &str) -> Result<()> {
        validate_beneficiary_id(beneficiary_id)?;
        self.beneficiaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(beneficiary_id.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.beneficiaries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the ids gathered so far into a batch stamped now
    pub fn build(&self) -> LoadedBatch {
        let ids = self.beneficiaries.lock().unwrap_or_else(PoisonError::into_inner);
        LoadedBatch::from_parts(Uuid::new_v4(), self.loaded_file_id, ids.join(","), Utc::now())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[test]
    fn test_empty_list_round_trip() {
        let batch = LoadedBatch::new::<&str>(Uuid::new_v4(), &[], Utc::now()).unwrap();
        assert_eq!(batch.beneficiaries_text(), "");
        assert!(batch.beneficiaries().is_empty());
        assert_eq!(batch.beneficiary_count(), 0);
    }

    #[test]
    fn test_rejects_bad_ids() {
        let builder = LoadedBatchBuilder::new(Uuid::new_v4(), 4);
        assert!(builder.associate_beneficiary("").is_err());
        assert!(builder.associate_beneficiary("1,2").is_err());
        assert!(builder.is_empty());
    }

    #[test]
    fn test_combine_keeps_every_id() {
        let file = Uuid::new_v4();
        let now = Utc::now();
        let a = LoadedBatch::new(file, &["1", "2"], now).unwrap();
        let b = LoadedBatch::new(file, &["3"], now + Duration::seconds(5)).unwrap();
        let empty = LoadedBatch::new::<&str>(file, &[], now).unwrap();

        let ab = a.combine(Some(&b)).unwrap();
        assert_eq!(ab.beneficiaries(), vec!["1", "2", "3"]);
        assert_eq!(ab.created(), b.created());
        assert_eq!(a.combine(Some(&empty)).unwrap().beneficiaries(), a.beneficiaries());
        assert_eq!(empty.combine(Some(&b)).unwrap().beneficiaries(), vec!["3"]);
        assert_eq!(a.combine(None).unwrap(), a);

        let other_file = LoadedBatch::new(Uuid::new_v4(), &["9"], now).unwrap();
        assert!(a.combine(Some(&other_file)).is_err());
    }

    #[test]
    fn test_concurrent_builder() {
        let builder = Arc::new(LoadedBatchBuilder::new(Uuid::new_v4(), 400));
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let builder = builder.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        builder.associate_beneficiary(&format!("{}-{}", worker, i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let batch = builder.build();
        assert_eq!(batch.beneficiary_count(), 400);
        assert_eq!(batch.loaded_file_id(), builder.loaded_file_id());
    }
}
