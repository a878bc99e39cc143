use dupekeep::duplicates::{DuplicateFinder, FinderConfig, FinderError};
use dupekeep::index::{FileIndex, FileRecord, IndexStore, StoreError};
use dupekeep::scanner::Digest;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn sample_index() -> FileIndex {
    let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    FileIndex::from_records(vec![
        FileRecord::new(PathBuf::from("/data/a"), 10, t).with_digest(Digest::from_u64(1)),
        FileRecord::new(PathBuf::from("/data/b"), 10, t).with_digest(Digest::from_u64(1)),
        FileRecord::new(PathBuf::from("/data/c"), 20, t),
    ])
}

#[test]
fn test_round_trip() {
    let dir = tempdir().unwrap();
    let store = IndexStore::new(dir.path().join("index.json"));
    let index = sample_index();

    store.write(&index).unwrap();
    let loaded = store.read().unwrap();

    assert_eq!(loaded, index);
    assert!(loaded.is_consistent());
}

#[test]
fn test_round_trip_empty() {
    let dir = tempdir().unwrap();
    let store = IndexStore::new(dir.path().join("index.json"));

    store.write(&FileIndex::new()).unwrap();
    assert!(store.read().unwrap().is_empty());
}

#[test]
fn test_missing_store_is_not_found() {
    let dir = tempdir().unwrap();
    let store = IndexStore::new(dir.path().join("nothing.json"));

    let err = store.read().unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn test_write_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/deeper/index.json");

    IndexStore::new(&path).write(&sample_index()).unwrap();
    assert!(path.exists());
    assert!(!path.with_file_name("index.json.tmp").exists());
}

#[test]
fn test_truncated_store_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.json");
    let store = IndexStore::new(&path);
    store.write(&sample_index()).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(matches!(store.read(), Err(StoreError::Corrupt { .. })));
}

#[test]
fn test_edited_store_fails_checksum() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.json");
    let store = IndexStore::new(&path);
    store.write(&sample_index()).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, text.replace("/data/c", "/data/d")).unwrap();

    match store.read() {
        Err(StoreError::Corrupt { reason, .. }) => assert!(reason.contains("checksum")),
        other => panic!("expected corrupt store, got {other:?}"),
    }
}

#[test]
fn test_corrupt_store_aborts_run_untouched() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("a"), b"dup").unwrap();
    fs::write(data.join("b"), b"dup").unwrap();
    let db = dir.path().join("index.json");
    fs::write(&db, b"not json at all").unwrap();

    let config = FinderConfig::new(vec![data.clone()]).with_store(db.clone());
    let err = DuplicateFinder::new(config).run().unwrap_err();

    assert!(matches!(err, FinderError::Store(StoreError::Corrupt { .. })));
    assert_eq!(fs::read(&db).unwrap(), b"not json at all");
    assert!(data.join("a").exists() && data.join("b").exists());
}

#[test]
fn test_stored_digests_are_hex() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.json");
    IndexStore::new(&path).write(&sample_index()).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"0000000000000001\""));
    assert!(text.contains("\"checksum\""));
}

#[test]
fn test_file_modified_before_epoch_is_saved() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("ok.txt"), b"same").unwrap();
    let old = data.join("old.txt");
    fs::write(&old, b"same").unwrap();
    filetime::set_file_mtime(&old, filetime::FileTime::from_unix_time(-86_400, 0)).unwrap();
    let db = dir.path().join("index.json");

    let config = || FinderConfig::new(vec![data.clone()]).with_store(db.clone());
    let first = DuplicateFinder::new(config()).run().unwrap();
    assert!(first.summary.persisted);
    assert_eq!(first.summary.hashing.hashed, 2);

    let stored = IndexStore::new(&db).read().unwrap();
    assert_eq!(
        stored.get(&old).unwrap().modified,
        SystemTime::UNIX_EPOCH - Duration::from_secs(86_400)
    );

    // The stored mtime matches disk, so nothing is rehashed.
    let second = DuplicateFinder::new(config()).run().unwrap();
    assert_eq!(second.summary.validation.unchanged, 2);
    assert_eq!(second.summary.hashing.hashed, 0);
}
