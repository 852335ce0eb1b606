//! Data-access layer for air quality datasets held in an S3-compatible
//! object store: a metadata store (one serialized record per dataset), a
//! dataset store (data files under a key prefix, materialized into a local
//! cache directory), and the static AURN site registry.

pub mod aurn;
pub mod cache;
pub mod client;
pub mod config;
pub mod dataset;
pub mod dataset_store;
pub mod error;
pub mod metadata;
pub mod metadata_store;

pub use crate::aurn::{AurnSite, AurnSiteStore, SiteType};
pub use crate::client::BucketClient;
pub use crate::config::{Credentials, StoreConfig};
pub use crate::dataset::{DataSet, DatasetId};
pub use crate::dataset_store::DataSetStore;
pub use crate::error::StoreError;
pub use crate::metadata::{Metadata, MetadataRecord, Parameter, SpatialExtent, TemporalExtent};
pub use crate::metadata_store::MetadataStore;
