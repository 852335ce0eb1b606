use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetId;

/// The minimal contract the stores need from a metadata model: a dataset id
/// and a serde-serializable payload. The bundled [`Metadata`] implements it;
/// callers with their own metadata model can implement it instead.
pub trait MetadataRecord: Serialize + DeserializeOwned {
    fn dataset_id(&self) -> &DatasetId;
}

/// An observed parameter, e.g. a measured chemical species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub unit: String,
    /// URI of the observed property definition.
    pub observed_property: String,
}

/// Spatial coverage. Geometry handling is out of scope here, so the polygon
/// and coordinate reference system are carried as WKT strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialExtent {
    pub polygon: String,
    pub crs: String,
}

/// Temporal coverage: instants plus ISO 8601 interval strings, the latter
/// kept opaque at this layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalExtent {
    #[serde(default)]
    pub values: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub intervals: Vec<String>,
}

/// Descriptive metadata for one dataset, persisted as a single JSON object.
/// The id is immutable once created; the other fields may be updated and
/// re-put, overwriting the stored version (no versioning).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: DatasetId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub spatial: SpatialExtent,
    #[serde(default)]
    pub temporal: TemporalExtent,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl MetadataRecord for Metadata {
    fn dataset_id(&self) -> &DatasetId {
        &self.id
    }
}
