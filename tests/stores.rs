use std::fs;
use std::sync::Arc;

use assert_matches::assert_matches;
use bytes::Bytes;
use camino::Utf8PathBuf;
use clean_air_store::{
    BucketClient, DataSet, DataSetStore, DatasetId, Metadata, MetadataStore, SpatialExtent,
    StoreError, TemporalExtent,
};
use tempfile::TempDir;

fn writable_client() -> Arc<BucketClient> {
    Arc::new(BucketClient::in_memory("caf-data", false).unwrap())
}

fn test_metadata(id: &str) -> Metadata {
    Metadata {
        id: id.parse().unwrap(),
        title: format!("test dataset {id}"),
        description: "A Test".to_string(),
        keywords: vec!["air-quality".to_string()],
        spatial: SpatialExtent {
            polygon: "POLYGON((-1 -1,-1 1,1 1,1 -1,-1 -1))".to_string(),
            crs: "EPSG:4326".to_string(),
        },
        temporal: TemporalExtent::default(),
        parameters: Vec::new(),
    }
}

fn write_datafile(dir: &TempDir, name: &str, content: &str) -> Utf8PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    Utf8PathBuf::from_path_buf(path).unwrap()
}

#[test]
fn dataset_round_trip() {
    let client = writable_client();
    let store: DataSetStore = DataSetStore::from_client(Arc::clone(&client), None).unwrap();

    let source = TempDir::new().unwrap();
    let dataset = DataSet::new(
        vec![
            write_datafile(&source, "a.nc", "alpha"),
            write_datafile(&source, "b.nc", "beta"),
        ],
        test_metadata("aq-obs-2021"),
    );
    store.put(&dataset).unwrap();

    let id: DatasetId = "aq-obs-2021".parse().unwrap();
    let fetched = store.get(&id).unwrap();

    assert_eq!(fetched.metadata, dataset.metadata);
    let names: Vec<_> = fetched
        .files
        .iter()
        .map(|path| path.file_name().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["a.nc", "b.nc"]);
    assert_eq!(fs::read_to_string(&fetched.files[0]).unwrap(), "alpha");
    assert_eq!(fs::read_to_string(&fetched.files[1]).unwrap(), "beta");
    for path in &fetched.files {
        assert!(path.starts_with(store.cache().root()));
    }
}

#[test]
fn available_datasets_includes_put_dataset() {
    let client = writable_client();
    let store: DataSetStore = DataSetStore::from_client(Arc::clone(&client), None).unwrap();

    let source = TempDir::new().unwrap();
    let dataset = DataSet::new(
        vec![write_datafile(&source, "a.nc", "alpha")],
        test_metadata("aq-obs-2021"),
    );
    store.put(&dataset).unwrap();

    assert!(
        store
            .available_datasets()
            .unwrap()
            .contains(&"aq-obs-2021".to_string())
    );
    assert_eq!(
        store.metadata_store().available_datasets().unwrap(),
        vec!["aq-obs-2021"]
    );
}

#[test]
fn get_missing_dataset_is_not_found() {
    let store: DataSetStore = DataSetStore::from_client(writable_client(), None).unwrap();
    let id: DatasetId = "does-not-exist".parse().unwrap();
    assert_matches!(store.get(&id), Err(StoreError::NotFound(_)));
}

#[test]
fn get_missing_metadata_is_not_found() {
    let store: MetadataStore = MetadataStore::from_client(writable_client());
    let id: DatasetId = "does-not-exist".parse().unwrap();
    assert_matches!(store.get(&id), Err(StoreError::NotFound(_)));
}

#[test]
fn metadata_round_trip() {
    let store: MetadataStore = MetadataStore::from_client(writable_client());
    let metadata = test_metadata("aq-obs-2021");
    store.put(&metadata).unwrap();

    let fetched = store.get(&metadata.id).unwrap();
    assert_eq!(fetched, metadata);
}

#[test]
fn metadata_put_overwrites() {
    let store: MetadataStore = MetadataStore::from_client(writable_client());
    let mut metadata = test_metadata("aq-obs-2021");
    store.put(&metadata).unwrap();

    metadata.description = "Updated description".to_string();
    store.put(&metadata).unwrap();

    let fetched = store.get(&metadata.id).unwrap();
    assert_eq!(fetched.description, "Updated description");
}

#[test]
fn malformed_metadata_is_deserialization_error() {
    let client = writable_client();
    client
        .put_bytes("broken/broken.metadata", Bytes::from_static(b"not json"))
        .unwrap();

    let store: MetadataStore = MetadataStore::from_client(client);
    let id: DatasetId = "broken".parse().unwrap();
    assert_matches!(store.get(&id), Err(StoreError::Deserialization(_)));
}

#[test]
fn second_put_leaves_stale_files_in_place() {
    let client = writable_client();
    let store: DataSetStore = DataSetStore::from_client(Arc::clone(&client), None).unwrap();
    let id: DatasetId = "aq-obs-2021".parse().unwrap();

    let first_source = TempDir::new().unwrap();
    store
        .put(&DataSet::new(
            vec![
                write_datafile(&first_source, "a.nc", "one"),
                write_datafile(&first_source, "shared.nc", "old"),
            ],
            test_metadata(id.as_str()),
        ))
        .unwrap();

    let second_source = TempDir::new().unwrap();
    store
        .put(&DataSet::new(
            vec![
                write_datafile(&second_source, "shared.nc", "new"),
                write_datafile(&second_source, "c.nc", "three"),
            ],
            test_metadata(id.as_str()),
        ))
        .unwrap();

    let fetched = store.get(&id).unwrap();
    let names: Vec<_> = fetched
        .files
        .iter()
        .map(|path| path.file_name().unwrap().to_string())
        .collect();
    // Files never removed by put remain visible alongside the latest set
    assert_eq!(names, vec!["a.nc", "c.nc", "shared.nc"]);
    assert_eq!(fs::read_to_string(&fetched.files[2]).unwrap(), "new");
}

#[test]
fn anonymous_dataset_put_is_access_denied() {
    let client = Arc::new(BucketClient::in_memory("caf-data", true).unwrap());
    let store: DataSetStore = DataSetStore::from_client(client, None).unwrap();

    let source = TempDir::new().unwrap();
    let dataset = DataSet::new(
        vec![write_datafile(&source, "a.nc", "alpha")],
        test_metadata("aq-obs-2021"),
    );
    assert_matches!(store.put(&dataset), Err(StoreError::AccessDenied(_)));
}

#[test]
fn anonymous_metadata_put_is_access_denied() {
    let client = Arc::new(BucketClient::in_memory("caf-data", true).unwrap());
    let store: MetadataStore = MetadataStore::from_client(client);
    assert_matches!(
        store.put(&test_metadata("aq-obs-2021")),
        Err(StoreError::AccessDenied(_))
    );
}

#[test]
fn get_reflects_remote_update() {
    let client = writable_client();
    let store: DataSetStore = DataSetStore::from_client(Arc::clone(&client), None).unwrap();
    let id: DatasetId = "aq-obs-2021".parse().unwrap();

    let source = TempDir::new().unwrap();
    store
        .put(&DataSet::new(
            vec![write_datafile(&source, "a.nc", "alpha")],
            test_metadata(id.as_str()),
        ))
        .unwrap();
    store.get(&id).unwrap();

    // Overwrite the remote object behind the cache's back
    client
        .put_bytes("aq-obs-2021/a.nc", Bytes::from_static(b"fresher"))
        .unwrap();

    let fetched = store.get(&id).unwrap();
    assert_eq!(fs::read_to_string(&fetched.files[0]).unwrap(), "fresher");
}

#[test]
fn unchanged_remote_reuses_cached_file() {
    let client = writable_client();
    let store: DataSetStore = DataSetStore::from_client(Arc::clone(&client), None).unwrap();
    let id: DatasetId = "aq-obs-2021".parse().unwrap();

    let source = TempDir::new().unwrap();
    store
        .put(&DataSet::new(
            vec![write_datafile(&source, "a.nc", "alpha")],
            test_metadata(id.as_str()),
        ))
        .unwrap();
    let fetched = store.get(&id).unwrap();

    // Scribble over the cached copy; with no remote change the recorded
    // ETag still matches, so the next get must not re-download
    fs::write(&fetched.files[0], "scribbled").unwrap();

    let refetched = store.get(&id).unwrap();
    assert_eq!(fs::read_to_string(&refetched.files[0]).unwrap(), "scribbled");
}

#[test]
fn put_rejects_duplicate_file_names() {
    let client = writable_client();
    let store: DataSetStore = DataSetStore::from_client(Arc::clone(&client), None).unwrap();

    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let dataset = DataSet::new(
        vec![
            write_datafile(&first_dir, "a.nc", "from first dir"),
            write_datafile(&second_dir, "a.nc", "from second dir"),
        ],
        test_metadata("aq-obs-2021"),
    );
    assert_matches!(store.put(&dataset), Err(StoreError::Filesystem(_)));
}

#[test]
fn metadata_object_excluded_from_dataset_files() {
    let client = writable_client();
    let store: DataSetStore = DataSetStore::from_client(Arc::clone(&client), None).unwrap();
    let id: DatasetId = "aq-obs-2021".parse().unwrap();

    let source = TempDir::new().unwrap();
    store
        .put(&DataSet::new(
            vec![write_datafile(&source, "a.nc", "alpha")],
            test_metadata(id.as_str()),
        ))
        .unwrap();

    let fetched = store.get(&id).unwrap();
    assert_eq!(fetched.files.len(), 1);
    assert!(
        fetched
            .files
            .iter()
            .all(|path| !path.as_str().ends_with(".metadata"))
    );
}

#[test]
fn explicit_cache_dir_is_used() {
    let client = writable_client();
    let cache_dir = TempDir::new().unwrap();
    let cache_root = Utf8PathBuf::from_path_buf(cache_dir.path().to_path_buf()).unwrap();
    let store: DataSetStore =
        DataSetStore::from_client(Arc::clone(&client), Some(cache_root.clone())).unwrap();
    let id: DatasetId = "aq-obs-2021".parse().unwrap();

    let source = TempDir::new().unwrap();
    store
        .put(&DataSet::new(
            vec![write_datafile(&source, "a.nc", "alpha")],
            test_metadata(id.as_str()),
        ))
        .unwrap();

    let fetched = store.get(&id).unwrap();
    assert_eq!(fetched.files[0], cache_root.join("aq-obs-2021/a.nc"));
}
