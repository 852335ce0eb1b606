use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::metadata::{Metadata, MetadataRecord};

/// Unique dataset key. Doubles as the object key prefix for the dataset's
/// files, so it must be a single key-safe path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
        if !is_valid {
            return Err(StoreError::InvalidDatasetId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// A dataset as held in memory: local data file paths plus one metadata
/// record. Files are uploaded under the record's id on `put` and
/// materialized into the local cache on `get`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet<M = Metadata> {
    pub files: Vec<Utf8PathBuf>,
    pub metadata: M,
}

impl<M: MetadataRecord> DataSet<M> {
    pub fn new(files: Vec<Utf8PathBuf>, metadata: M) -> Self {
        Self { files, metadata }
    }

    pub fn id(&self) -> &DatasetId {
        self.metadata.dataset_id()
    }
}
