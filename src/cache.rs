use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::dataset::DatasetId;
use crate::error::StoreError;

const MANIFEST_FILE: &str = ".manifest.json";

/// Local directory holding downloaded copies of dataset files, laid out as
/// `{root}/{dataset_id}/{filename}`. Freshness is tracked per file via a
/// manifest of remote ETags; a file is reused only while its recorded ETag
/// still matches the remote listing.
#[derive(Debug)]
pub struct LocalCache {
    root: Utf8PathBuf,
    // Keeps the default temp directory alive for the cache's lifetime
    _tmp: Option<TempDir>,
}

impl LocalCache {
    pub fn new(dir: Option<Utf8PathBuf>) -> Result<Self, StoreError> {
        match dir {
            Some(root) => {
                fs::create_dir_all(root.as_std_path())
                    .map_err(|err| StoreError::Filesystem(err.to_string()))?;
                Ok(Self { root, _tmp: None })
            }
            None => {
                let tmp = tempfile::Builder::new()
                    .prefix("clean-air-store")
                    .tempdir()
                    .map_err(|err| StoreError::Filesystem(err.to_string()))?;
                let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
                    .map_err(|_| StoreError::Filesystem("non-utf8 temp dir".to_string()))?;
                Ok(Self {
                    root,
                    _tmp: Some(tmp),
                })
            }
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn dataset_dir(&self, id: &DatasetId) -> Utf8PathBuf {
        self.root.join(id.as_str())
    }

    pub fn file_path(&self, id: &DatasetId, name: &str) -> Utf8PathBuf {
        self.dataset_dir(id).join(name)
    }

    fn manifest_path(&self, id: &DatasetId) -> Utf8PathBuf {
        self.dataset_dir(id).join(MANIFEST_FILE)
    }

    pub fn write_file_atomic(&self, path: &Utf8Path, content: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| StoreError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| StoreError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| StoreError::Filesystem(err.to_string()))?;
        Ok(())
    }

    /// A missing or unreadable manifest only means everything is stale.
    pub fn load_manifest(&self, id: &DatasetId) -> CacheManifest {
        let path = self.manifest_path(id);
        fs::read_to_string(path.as_std_path())
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn store_manifest(
        &self,
        id: &DatasetId,
        manifest: &CacheManifest,
    ) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(manifest)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        self.write_file_atomic(&self.manifest_path(id), &content)
    }
}

/// Per-dataset record of the remote ETag each cached file was downloaded at.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheManifest {
    #[serde(default)]
    pub entries: BTreeMap<String, String>,
}

impl CacheManifest {
    /// A file with no remote ETag can never be proven fresh.
    pub fn is_fresh(&self, name: &str, e_tag: Option<&str>) -> bool {
        match e_tag {
            Some(tag) => self.entries.get(name).is_some_and(|recorded| recorded == tag),
            None => false,
        }
    }

    pub fn record(&mut self, name: &str, e_tag: Option<&str>) {
        match e_tag {
            Some(tag) => {
                self.entries.insert(name.to_string(), tag.to_string());
            }
            None => {
                self.entries.remove(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let cache = LocalCache::new(None).unwrap();
        let id: DatasetId = "aq-obs-2021".parse().unwrap();
        assert!(cache.root().as_std_path().exists());
        assert!(cache.dataset_dir(&id).ends_with("aq-obs-2021"));
        assert!(cache.file_path(&id, "a.nc").ends_with("aq-obs-2021/a.nc"));
    }

    #[test]
    fn atomic_write_creates_parents() {
        let cache = LocalCache::new(None).unwrap();
        let id: DatasetId = "ds".parse().unwrap();
        let path = cache.file_path(&id, "nested/file.nc");
        cache.write_file_atomic(&path, b"contents").unwrap();
        assert_eq!(fs::read(path.as_std_path()).unwrap(), b"contents");
    }

    #[test]
    fn manifest_freshness() {
        let mut manifest = CacheManifest::default();
        manifest.record("a.nc", Some("etag-1"));

        assert!(manifest.is_fresh("a.nc", Some("etag-1")));
        assert!(!manifest.is_fresh("a.nc", Some("etag-2")));
        assert!(!manifest.is_fresh("a.nc", None));
        assert!(!manifest.is_fresh("b.nc", Some("etag-1")));
    }

    #[test]
    fn manifest_round_trip() {
        let cache = LocalCache::new(None).unwrap();
        let id: DatasetId = "ds".parse().unwrap();

        let mut manifest = CacheManifest::default();
        manifest.record("a.nc", Some("etag-1"));
        cache.store_manifest(&id, &manifest).unwrap();

        let loaded = cache.load_manifest(&id);
        assert!(loaded.is_fresh("a.nc", Some("etag-1")));
    }

    #[test]
    fn missing_manifest_is_all_stale() {
        let cache = LocalCache::new(None).unwrap();
        let id: DatasetId = "ds".parse().unwrap();
        let manifest = cache.load_manifest(&id);
        assert!(!manifest.is_fresh("a.nc", Some("etag-1")));
    }
}
