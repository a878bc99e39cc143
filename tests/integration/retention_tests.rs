use dupekeep::duplicates::{
    DuplicateFinder, FinderConfig, KeepRule, MarkReason, MemberAction, RetentionPolicy,
};
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

fn set_age(path: &Path, secs_ago: u64) {
    let when = SystemTime::now() - Duration::from_secs(secs_ago);
    filetime::set_file_mtime(path, FileTime::from_system_time(when)).unwrap();
}

fn run(root: &Path, policy: RetentionPolicy) -> dupekeep::duplicates::RunReport {
    let config = FinderConfig::new(vec![root.to_path_buf()])
        .with_workers(2)
        .with_policy(policy);
    DuplicateFinder::new(config).run().unwrap()
}

#[test]
fn test_keep_first_leaves_only_first_path() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a/1.txt", b"identical");
    let b = write(dir.path(), "b/2.txt", b"identical");
    let c = write(dir.path(), "c/3.txt", b"identical");

    let report = run(dir.path(), RetentionPolicy::default().with_keep(KeepRule::FirstByPath));

    assert!(a.exists());
    assert!(!b.exists());
    assert!(!c.exists());

    let stats = report.summary.enforcement.unwrap();
    assert_eq!(stats.marked, 2);
    assert_eq!(stats.removed, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.bytes_freed, 18);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].survivors(), 1);
    assert_eq!(report.summary.indexed_files, 1);
}

#[test]
fn test_keep_last_leaves_only_last_path() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.txt", b"same");
    let z = write(dir.path(), "z.txt", b"same");

    run(dir.path(), RetentionPolicy::default().with_keep(KeepRule::LastByPath));

    assert!(!a.exists());
    assert!(z.exists());
}

#[test]
fn test_keep_recent_and_keep_oldest() {
    let dir = tempdir().unwrap();
    let old = write(dir.path(), "recent/old.txt", b"payload");
    let new = write(dir.path(), "recent/new.txt", b"payload");
    let mid = write(dir.path(), "recent/mid.txt", b"payload");
    set_age(&old, 3000);
    set_age(&mid, 2000);
    set_age(&new, 1000);

    let report = run(
        &dir.path().join("recent"),
        RetentionPolicy::default().with_keep(KeepRule::MostRecent),
    );
    assert!(new.exists());
    assert!(!old.exists());
    assert!(!mid.exists());
    assert!(report.groups[0]
        .members
        .iter()
        .filter(|m| m.path != new)
        .all(|m| m.action
            == MemberAction::Deleted {
                reason: MarkReason::NotMostRecent
            }));

    let old = write(dir.path(), "oldest/old.txt", b"payload");
    let new = write(dir.path(), "oldest/new.txt", b"payload");
    set_age(&old, 3000);
    set_age(&new, 1000);

    run(
        &dir.path().join("oldest"),
        RetentionPolicy::default().with_keep(KeepRule::Oldest),
    );
    assert!(old.exists());
    assert!(!new.exists());
}

#[test]
fn test_keep_recent_tie_keeps_first_by_path() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.txt", b"tie");
    let b = write(dir.path(), "b.txt", b"tie");
    let when = FileTime::from_unix_time(1_700_000_000, 0);
    filetime::set_file_mtime(&a, when).unwrap();
    filetime::set_file_mtime(&b, when).unwrap();

    run(dir.path(), RetentionPolicy::default().with_keep(KeepRule::MostRecent));

    assert!(a.exists());
    assert!(!b.exists());
}

#[test]
fn test_keep_pattern_removes_copies_outside() {
    let dir = tempdir().unwrap();
    let kept = write(dir.path(), "important/report.pdf", b"quarterly numbers");
    let x = write(dir.path(), "downloads/report.pdf", b"quarterly numbers");
    let y = write(dir.path(), "tmp/report (1).pdf", b"quarterly numbers");

    let report = run(
        dir.path(),
        RetentionPolicy::default()
            .with_keep_pattern("/important/")
            .unwrap(),
    );

    assert!(kept.exists());
    assert!(!x.exists());
    assert!(!y.exists());
    assert_eq!(report.summary.enforcement.unwrap().removed, 2);
}

#[test]
fn test_delete_pattern() {
    let dir = tempdir().unwrap();
    let original = write(dir.path(), "photo.jpg", b"jpeg bytes");
    let backup = write(dir.path(), "photo.jpg.bak", b"jpeg bytes");

    run(
        dir.path(),
        RetentionPolicy::default()
            .with_delete_pattern(r"\.bak$")
            .unwrap(),
    );

    assert!(original.exists());
    assert!(!backup.exists());
}

#[test]
fn test_matching_every_member_still_keeps_one() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.bak", b"same");
    let b = write(dir.path(), "b.bak", b"same");
    let c = write(dir.path(), "c.bak", b"same");

    let report = run(
        dir.path(),
        RetentionPolicy::default()
            .with_delete_pattern(r"\.bak$")
            .unwrap(),
    );

    let remaining = [&a, &b, &c].iter().filter(|p| p.exists()).count();
    assert_eq!(remaining, 1);
    assert!(c.exists());
    assert_eq!(report.groups[0].survivors(), 1);
}

#[test]
fn test_no_rule_reports_only() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"dup");
    let b = write(dir.path(), "b", b"dup");

    let report = run(dir.path(), RetentionPolicy::report_only());

    assert!(a.exists() && b.exists());
    assert_eq!(report.summary.duplicate_groups, 1);
    assert_eq!(report.summary.reclaimable, 3);
    assert_eq!(report.summary.enforcement.unwrap().marked, 0);
    assert!(report.groups[0]
        .members
        .iter()
        .all(|m| m.action == MemberAction::Keep));
}

#[test]
fn test_dry_run_touches_nothing() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a/1.txt", b"identical");
    let b = write(dir.path(), "b/2.txt", b"identical");
    let c = write(dir.path(), "c/3.txt", b"identical");

    let config = FinderConfig::new(vec![dir.path().to_path_buf()])
        .with_policy(RetentionPolicy::default().with_keep(KeepRule::FirstByPath))
        .with_dry_run(true);
    let report = DuplicateFinder::new(config).run().unwrap();

    assert!(a.exists() && b.exists() && c.exists());
    let stats = report.summary.enforcement.unwrap();
    assert_eq!(stats.dry_run_selected, 2);
    assert_eq!(stats.removed, 0);
    assert_eq!(report.summary.indexed_files, 3);

    let members = &report.groups[0].members;
    assert_eq!(members[0].action, MemberAction::Keep);
    assert_eq!(
        members[1].action,
        MemberAction::WouldDelete {
            reason: MarkReason::NotFirst
        }
    );
}

#[test]
fn test_groups_are_independent() {
    let dir = tempdir().unwrap();
    let a1 = write(dir.path(), "a1", b"first group");
    let a2 = write(dir.path(), "a2", b"first group");
    let b1 = write(dir.path(), "b1", b"second group content");
    let b2 = write(dir.path(), "b2", b"second group content");
    let unique = write(dir.path(), "unique", b"nothing like it");

    let report = run(dir.path(), RetentionPolicy::default().with_keep(KeepRule::LastByPath));

    assert!(!a1.exists() && a2.exists());
    assert!(!b1.exists() && b2.exists());
    assert!(unique.exists());
    assert_eq!(report.summary.duplicate_groups, 2);

    let digests: Vec<_> = report.groups.iter().map(|g| g.digest).collect();
    let mut sorted = digests.clone();
    sorted.sort();
    assert_eq!(digests, sorted);
}
