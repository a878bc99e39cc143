use dupekeep::duplicates::{
    DuplicateFinder, FinderConfig, FinderError, KeepRule, MemberAction, RetentionPolicy, RunReport,
    Stage,
};
use dupekeep::index::IndexStore;
use dupekeep::progress::ProgressCallback;
use dupekeep::signal::CancellationToken;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

/// Cancels the token as soon as the named phase starts.
struct CancelAt {
    phase: &'static str,
    token: CancellationToken,
}

impl ProgressCallback for CancelAt {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        if phase == self.phase {
            self.token.cancel();
        }
    }

    fn on_progress(&self, _current: usize, _path: &str) {}

    fn on_phase_end(&self, _phase: &str) {}
}

fn write(root: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn stopped_at(phase: &'static str, data: &Path, db: &Path) -> RunReport {
    let token = CancellationToken::new();
    let config = FinderConfig::new(vec![data.to_path_buf()])
        .with_store(db.to_path_buf())
        .with_policy(RetentionPolicy::default().with_keep(KeepRule::FirstByPath))
        .with_cancellation(token.clone())
        .with_progress(Arc::new(CancelAt { phase, token }));

    match DuplicateFinder::new(config).run() {
        Err(FinderError::Stopped { report }) => *report,
        other => panic!("expected a stopped run, got {other:?}"),
    }
}

#[test]
fn test_cancel_during_walk() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let a = write(&data, "a", b"dup");
    let b = write(&data, "b", b"dup");
    let db = dir.path().join("index.json");

    let report = stopped_at("walking", &data, &db);

    assert!(report.summary.stopped);
    assert_eq!(report.summary.stage, Stage::Loaded);
    assert_eq!(report.summary.walk.new_files, 0);
    assert!(report.summary.persisted);
    assert!(a.exists() && b.exists());
    assert!(IndexStore::new(&db).read().unwrap().is_empty());
}

#[test]
fn test_cancel_during_hashing_saves_walked_files() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let a = write(&data, "a", b"dup");
    let b = write(&data, "b", b"dup");
    let db = dir.path().join("index.json");

    let report = stopped_at("hashing", &data, &db);

    assert_eq!(report.summary.stage, Stage::Indexed);
    assert!(report.summary.hashing.interrupted);
    assert_eq!(report.summary.hashing.hashed, 0);
    assert!(report.summary.enforcement.is_none());
    assert!(a.exists() && b.exists());

    let stored = IndexStore::new(&db).read().unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored.hashed_count(), 0);
}

#[test]
fn test_cancel_before_enforcement_skips_marks() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let a = write(&data, "a", b"dup");
    let b = write(&data, "b", b"dup");
    let db = dir.path().join("index.json");

    let report = stopped_at("enforcing", &data, &db);

    assert_eq!(report.summary.stage, Stage::Hashed);
    assert!(a.exists() && b.exists());
    let stats = report.summary.enforcement.unwrap();
    assert_eq!(stats.marked, 0);
    assert_eq!(stats.removed, 0);
    assert!(matches!(
        report.groups[0].members[1].action,
        MemberAction::Skipped { .. }
    ));

    // Digests computed before the stop are kept.
    let stored = IndexStore::new(&db).read().unwrap();
    assert_eq!(stored.hashed_count(), 2);

    // A fresh run picks up where the stopped one left off.
    let config = FinderConfig::new(vec![data.clone()])
        .with_store(db.clone())
        .with_policy(RetentionPolicy::default().with_keep(KeepRule::FirstByPath));
    let resumed = DuplicateFinder::new(config).run().unwrap();
    assert_eq!(resumed.summary.hashing.hashed, 0);
    assert!(a.exists());
    assert!(!b.exists());
}

#[test]
fn test_cancelled_token_without_store() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"dup");
    let token = CancellationToken::new();
    token.cancel();

    let config = FinderConfig::new(vec![dir.path().to_path_buf()]).with_cancellation(token);
    match DuplicateFinder::new(config).run() {
        Err(FinderError::Stopped { report }) => {
            assert!(report.summary.stopped);
            assert!(!report.summary.persisted);
        }
        other => panic!("expected a stopped run, got {other:?}"),
    }
}
