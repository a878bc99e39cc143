use dupekeep::duplicates::{DuplicateFinder, FinderConfig, KeepRule, Mode, RetentionPolicy, Stage};
use dupekeep::index::IndexStore;
use dupekeep::scanner::Hasher;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn write(root: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn indexed_run(data: &Path, db: &Path) -> dupekeep::duplicates::RunReport {
    let config = FinderConfig::new(vec![data.to_path_buf()]).with_store(db.to_path_buf());
    DuplicateFinder::new(config).run().unwrap()
}

#[test]
fn test_distinct_sizes_are_never_hashed() {
    let dir = tempdir().unwrap();
    write(dir.path(), "ten.bin", &[1u8; 10]);
    write(dir.path(), "twenty.bin", &[1u8; 20]);

    let config = FinderConfig::new(vec![dir.path().to_path_buf()])
        .with_policy(RetentionPolicy::default().with_keep(KeepRule::FirstByPath));
    let report = DuplicateFinder::new(config).run().unwrap();

    assert_eq!(report.summary.walk.new_files, 2);
    assert_eq!(report.summary.hashing.candidates, 0);
    assert_eq!(report.summary.hashing.hashed, 0);
    assert_eq!(report.summary.duplicate_groups, 0);
    assert_eq!(report.summary.enforcement.unwrap().removed, 0);
}

#[test]
fn test_empty_files_are_ignored() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.empty", b"");
    let b = write(dir.path(), "b.empty", b"");

    let config = FinderConfig::new(vec![dir.path().to_path_buf()])
        .with_policy(RetentionPolicy::default().with_keep(KeepRule::FirstByPath));
    let report = DuplicateFinder::new(config).run().unwrap();

    assert!(a.exists() && b.exists());
    assert_eq!(report.summary.walk.empty_skipped, 2);
    assert_eq!(report.summary.indexed_files, 0);
}

#[test]
fn test_second_run_recomputes_nothing() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    write(&data, "a.txt", b"same bytes");
    write(&data, "b.txt", b"same bytes");
    write(&data, "c.txt", b"different!");
    let db = dir.path().join("index.json");

    let first = indexed_run(&data, &db);
    assert_eq!(first.summary.hashing.hashed, 3);
    assert!(first.summary.persisted);

    let second = indexed_run(&data, &db);
    assert_eq!(second.summary.loaded, 3);
    assert_eq!(second.summary.validation.unchanged, 3);
    assert_eq!(second.summary.walk.new_files, 0);
    assert_eq!(second.summary.walk.known_skipped, 3);
    assert_eq!(second.summary.hashing.hashed, 0);
    assert_eq!(second.summary.hashing.already_hashed, 3);
    assert_eq!(second.summary.duplicate_groups, 1);
}

#[test]
fn test_modified_file_is_rehashed() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let x = write(&data, "x.txt", b"aaaa");
    let y = write(&data, "y.txt", b"aaaa");
    let db = dir.path().join("index.json");

    let first = indexed_run(&data, &db);
    assert_eq!(first.summary.duplicate_groups, 1);

    fs::write(&x, b"bbbb").unwrap();
    let later = SystemTime::now() + Duration::from_secs(120);
    filetime::set_file_mtime(&x, FileTime::from_system_time(later)).unwrap();

    let second = indexed_run(&data, &db);
    assert_eq!(second.summary.validation.rehomed, 1);
    assert_eq!(second.summary.hashing.hashed, 1);
    assert_eq!(second.summary.hashing.already_hashed, 1);
    assert_eq!(second.summary.duplicate_groups, 0);

    let stored = IndexStore::new(&db).read().unwrap();
    let expected = Hasher::new().full_hash(&x).unwrap();
    assert_eq!(stored.get(&x).unwrap().digest, Some(expected));
    assert_ne!(stored.get(&x).unwrap().digest, stored.get(&y).unwrap().digest);
}

#[test]
fn test_deleted_file_is_dropped_from_index() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let a = write(&data, "a", b"dup");
    write(&data, "b", b"dup");
    let db = dir.path().join("index.json");

    indexed_run(&data, &db);
    fs::remove_file(&a).unwrap();

    let second = indexed_run(&data, &db);
    assert_eq!(second.summary.validation.removed, 1);
    assert_eq!(second.summary.duplicate_groups, 0);

    let stored = IndexStore::new(&db).read().unwrap();
    assert!(!stored.contains(&a));
    assert!(stored.is_consistent());
}

#[test]
fn test_new_peer_triggers_hashing_of_known_file() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let a = write(&data, "a", b"lonely");
    let db = dir.path().join("index.json");

    let first = indexed_run(&data, &db);
    assert_eq!(first.summary.hashing.candidates, 0);
    assert!(IndexStore::new(&db).read().unwrap().get(&a).unwrap().digest.is_none());

    write(&data, "b", b"lonely");
    let second = indexed_run(&data, &db);
    assert_eq!(second.summary.hashing.hashed, 2);
    assert_eq!(second.summary.duplicate_groups, 1);
}

#[test]
fn test_index_only_then_enforce_from_database() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let a = write(&data, "a/1.txt", b"identical");
    let b = write(&data, "b/2.txt", b"identical");
    let db = dir.path().join("index.json");

    let config = FinderConfig::new(vec![data.clone()])
        .with_store(db.clone())
        .with_mode(Mode::IndexOnly)
        .with_policy(RetentionPolicy::default().with_keep(KeepRule::FirstByPath));
    let indexed = DuplicateFinder::new(config).run().unwrap();
    assert!(a.exists() && b.exists());
    assert!(indexed.summary.enforcement.is_none());
    assert_eq!(indexed.summary.stage, Stage::Done);

    // No roots: enforcement runs over the persisted index alone.
    let config = FinderConfig::new(Vec::new())
        .with_store(db.clone())
        .with_policy(RetentionPolicy::default().with_keep(KeepRule::FirstByPath));
    let enforced = DuplicateFinder::new(config).run().unwrap();

    assert!(a.exists());
    assert!(!b.exists());
    assert_eq!(enforced.summary.walk.new_files, 0);
    assert_eq!(enforced.summary.hashing.hashed, 0);
    assert_eq!(enforced.summary.enforcement.unwrap().removed, 1);

    let stored = IndexStore::new(&db).read().unwrap();
    assert!(!stored.contains(&b));
    assert_eq!(stored.len(), 1);
}

#[test]
fn test_overlapping_roots_record_each_file_once() {
    let dir = tempdir().unwrap();
    write(dir.path(), "sub/a", b"one");
    write(dir.path(), "sub/b", b"one");

    let config = FinderConfig::new(vec![dir.path().to_path_buf(), dir.path().join("sub")]);
    let report = DuplicateFinder::new(config).run().unwrap();

    assert_eq!(report.summary.walk.new_files, 2);
    assert_eq!(report.summary.walk.known_skipped, 2);
    assert_eq!(report.summary.indexed_files, 2);
    assert_eq!(report.groups[0].members.len(), 2);
}

#[test]
fn test_missing_root_does_not_abort_others() {
    let dir = tempdir().unwrap();
    write(dir.path(), "real/a", b"xy");
    write(dir.path(), "real/b", b"xy");

    let config = FinderConfig::new(vec![dir.path().join("absent"), dir.path().join("real")]);
    let report = DuplicateFinder::new(config).run().unwrap();

    assert!(report.summary.walk.errors >= 1);
    assert_eq!(report.summary.walk.new_files, 2);
    assert_eq!(report.summary.duplicate_groups, 1);
}

#[test]
fn test_mmap_and_streaming_agree() {
    let dir = tempdir().unwrap();
    let content = vec![7u8; 300_000];
    write(dir.path(), "a.bin", &content);
    write(dir.path(), "b.bin", &content);

    let mapped = FinderConfig::new(vec![dir.path().to_path_buf()])
        .with_mmap(true)
        .with_mmap_threshold(1024);
    let streamed = FinderConfig::new(vec![dir.path().to_path_buf()]).with_mmap(false);

    let mapped = DuplicateFinder::new(mapped).run().unwrap();
    let streamed = DuplicateFinder::new(streamed).run().unwrap();

    assert_eq!(mapped.groups.len(), 1);
    assert_eq!(mapped.groups[0].digest, streamed.groups[0].digest);
}
