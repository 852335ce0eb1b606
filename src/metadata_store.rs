use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::client::BucketClient;
use crate::config::StoreConfig;
use crate::dataset::DatasetId;
use crate::error::StoreError;
use crate::metadata::{Metadata, MetadataRecord};

/// Object key suffix for metadata records; dataset file listings exclude it.
pub const METADATA_SUFFIX: &str = ".metadata";

/// Maps a dataset id to one serialized metadata object stored at
/// `{id}/{id}.metadata`. Stateless; every call is one round trip.
pub struct MetadataStore<M: MetadataRecord = Metadata> {
    client: Arc<BucketClient>,
    _record: PhantomData<M>,
}

impl<M: MetadataRecord> MetadataStore<M> {
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self::from_client(Arc::new(BucketClient::connect(config)?)))
    }

    pub fn from_client(client: Arc<BucketClient>) -> Self {
        Self {
            client,
            _record: PhantomData,
        }
    }

    pub fn client(&self) -> &Arc<BucketClient> {
        &self.client
    }

    fn object_key(id: &DatasetId) -> String {
        format!("{id}/{id}{METADATA_SUFFIX}")
    }

    /// Serializes the record and overwrites any previously stored version.
    pub fn put(&self, record: &M) -> Result<(), StoreError> {
        if self.client.is_read_only() {
            return Err(StoreError::AccessDenied(
                "cannot write metadata in anonymous mode".to_string(),
            ));
        }
        let key = Self::object_key(record.dataset_id());
        let body =
            serde_json::to_vec(record).map_err(|err| StoreError::Serialization(err.to_string()))?;
        debug!(key, "writing metadata object");
        self.client.put_bytes(&key, Bytes::from(body))
    }

    pub fn get(&self, id: &DatasetId) -> Result<M, StoreError> {
        let key = Self::object_key(id);
        let body = self.client.get_bytes(&key)?;
        serde_json::from_slice(&body)
            .map_err(|err| StoreError::Deserialization(format!("metadata for {id}: {err}")))
    }

    /// Ids of all datasets that have a metadata object, sorted and
    /// deduplicated.
    pub fn available_datasets(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self
            .client
            .list(None)?
            .into_iter()
            .filter(|entry| entry.key.ends_with(METADATA_SUFFIX))
            .filter_map(|entry| entry.key.split('/').next().map(str::to_string))
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
