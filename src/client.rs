use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::StoreError;

/// One object in a bucket listing.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub key: String,
    pub size: usize,
    pub e_tag: Option<String>,
}

/// Blocking facade over an S3-compatible bucket. Wraps any
/// [`ObjectStore`] implementation and drives it on an owned current-thread
/// runtime, so the stores stay plain synchronous request/response calls.
///
/// In anonymous mode the client is read-only: anonymous principals get
/// `GetObject` and `ListBucket` only, so writes are refused up front with
/// [`StoreError::AccessDenied`] rather than failing mid-transfer.
pub struct BucketClient {
    store: Arc<dyn ObjectStore>,
    runtime: Runtime,
    bucket: String,
    read_only: bool,
}

impl BucketClient {
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut builder = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            // JASMIN ignores the region, but the builder requires one
            .with_region("us-east-1")
            .with_allow_http(true);

        if config.anonymous {
            builder = builder.with_skip_signature(true);
        } else if let Some(credentials) = config.resolve_credentials() {
            builder = builder
                .with_access_key_id(&credentials.access_key_id)
                .with_secret_access_key(&credentials.secret_access_key);
        }

        let store = builder
            .build()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        Self::from_store(Arc::new(store), &config.bucket, config.anonymous)
    }

    /// Wraps a pre-built object store. Tests use this with
    /// [`object_store::memory::InMemory`].
    pub fn from_store(
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        read_only: bool,
    ) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        Ok(Self {
            store,
            runtime,
            bucket: bucket.to_string(),
            read_only,
        })
    }

    pub fn in_memory(bucket: &str, read_only: bool) -> Result<Self, StoreError> {
        Self::from_store(Arc::new(InMemory::new()), bucket, read_only)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn get_bytes(&self, key: &str) -> Result<Bytes, StoreError> {
        let location = ObjectPath::from(key);
        let bytes = self
            .runtime
            .block_on(async { self.store.get(&location).await?.bytes().await })
            .map_err(|err| classify(key, err))?;
        debug!(bucket = %self.bucket, key, size = bytes.len(), "downloaded object");
        Ok(bytes)
    }

    pub fn put_bytes(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::AccessDenied(format!(
                "cannot write {key} in anonymous mode; provide credentials with write permissions"
            )));
        }
        let location = ObjectPath::from(key);
        debug!(bucket = %self.bucket, key, size = data.len(), "uploading object");
        self.runtime
            .block_on(async { self.store.put(&location, data).await })
            .map_err(|err| classify(key, err))?;
        Ok(())
    }

    /// Lists all objects, optionally below a key prefix. Ordering is whatever
    /// the underlying store returns.
    pub fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectEntry>, StoreError> {
        let prefix_path = prefix.map(ObjectPath::from);
        let metas = self
            .runtime
            .block_on(async {
                self.store
                    .list(prefix_path.as_ref())
                    .try_collect::<Vec<_>>()
                    .await
            })
            .map_err(|err| classify(prefix.unwrap_or(""), err))?;
        Ok(metas
            .into_iter()
            .map(|meta| ObjectEntry {
                key: meta.location.to_string(),
                size: meta.size,
                e_tag: meta.e_tag,
            })
            .collect())
    }

    /// Distinct top-level key prefixes in the bucket.
    pub fn list_prefixes(&self) -> Result<Vec<String>, StoreError> {
        let listing = self
            .runtime
            .block_on(async { self.store.list_with_delimiter(None).await })
            .map_err(|err| classify("", err))?;
        Ok(listing
            .common_prefixes
            .into_iter()
            .map(|prefix| prefix.to_string())
            .collect())
    }
}

fn classify(key: &str, err: object_store::Error) -> StoreError {
    match err {
        object_store::Error::NotFound { .. } => StoreError::NotFound(key.to_string()),
        other => StoreError::Transport(other.to_string()),
    }
}
