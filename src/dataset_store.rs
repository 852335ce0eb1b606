use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use bytes::Bytes;
use camino::Utf8PathBuf;
use tracing::debug;

use crate::cache::LocalCache;
use crate::client::BucketClient;
use crate::config::StoreConfig;
use crate::dataset::{DataSet, DatasetId};
use crate::error::StoreError;
use crate::metadata::{Metadata, MetadataRecord};
use crate::metadata_store::{METADATA_SUFFIX, MetadataStore};

/// Maps a dataset id to a set of data file objects under the `{id}/` key
/// prefix, delegating the metadata record to a [`MetadataStore`] on the same
/// bucket. `get` materializes files into the local cache directory.
pub struct DataSetStore<M: MetadataRecord = Metadata> {
    client: Arc<BucketClient>,
    metadata: MetadataStore<M>,
    cache: LocalCache,
}

impl<M: MetadataRecord> DataSetStore<M> {
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Arc::new(BucketClient::connect(config)?);
        Self::from_client(client, config.cache_dir.clone())
    }

    pub fn from_client(
        client: Arc<BucketClient>,
        cache_dir: Option<Utf8PathBuf>,
    ) -> Result<Self, StoreError> {
        let metadata = MetadataStore::from_client(Arc::clone(&client));
        let cache = LocalCache::new(cache_dir)?;
        Ok(Self {
            client,
            metadata,
            cache,
        })
    }

    pub fn metadata_store(&self) -> &MetadataStore<M> {
        &self.metadata
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Downloads every object under the dataset's prefix into the cache
    /// directory and fetches its metadata record. Cached files are reused
    /// while their recorded ETag matches the remote listing; otherwise they
    /// are re-downloaded.
    pub fn get(&self, id: &DatasetId) -> Result<DataSet<M>, StoreError> {
        let entries = self.client.list(Some(id.as_str()))?;
        if entries.is_empty() {
            return Err(StoreError::NotFound(id.as_str().to_string()));
        }
        let metadata = self.metadata.get(id)?;

        let dir = self.cache.dataset_dir(id);
        let prefix = format!("{id}/");
        let mut manifest = self.cache.load_manifest(id);
        let mut files = Vec::new();
        for entry in entries {
            if entry.key.ends_with(METADATA_SUFFIX) {
                continue;
            }
            let relative = entry.key.strip_prefix(&prefix).unwrap_or(&entry.key);
            let local = dir.join(relative);
            let fresh = local.as_std_path().exists()
                && manifest.is_fresh(relative, entry.e_tag.as_deref());
            if !fresh {
                let body = self.client.get_bytes(&entry.key)?;
                self.cache.write_file_atomic(&local, &body)?;
                manifest.record(relative, entry.e_tag.as_deref());
                debug!(key = %entry.key, path = %local, "cached datafile");
            }
            files.push(local);
        }
        self.cache.store_manifest(id, &manifest)?;

        files.sort();
        Ok(DataSet { files, metadata })
    }

    /// Uploads every file under the dataset's key prefix, then persists the
    /// metadata record. Not atomic: the first failure aborts the remaining
    /// transfers with no rollback, and remote files absent from this file set
    /// are left in place.
    pub fn put(&self, dataset: &DataSet<M>) -> Result<(), StoreError> {
        if self.client.is_read_only() {
            return Err(StoreError::AccessDenied(
                "cannot write datasets in anonymous mode".to_string(),
            ));
        }
        let id = dataset.metadata.dataset_id();
        let mut seen = HashSet::new();
        for file in &dataset.files {
            let name = file
                .file_name()
                .ok_or_else(|| StoreError::Filesystem(format!("not a file path: {file}")))?;
            // Objects are keyed by file name, so two source paths with the
            // same name would silently overwrite each other
            if !seen.insert(name) {
                return Err(StoreError::Filesystem(format!(
                    "duplicate file name in dataset: {name}"
                )));
            }
            let key = format!("{id}/{name}");
            debug!(file = %file, key, "uploading datafile");
            let body = fs::read(file.as_std_path())
                .map_err(|err| StoreError::Filesystem(format!("read {file}: {err}")))?;
            self.client.put_bytes(&key, Bytes::from(body))?;
        }
        self.metadata.put(&dataset.metadata)
    }

    /// Distinct dataset key prefixes present in the bucket, sorted.
    pub fn available_datasets(&self) -> Result<Vec<String>, StoreError> {
        let mut prefixes = self.client.list_prefixes()?;
        prefixes.sort();
        Ok(prefixes)
    }
}
