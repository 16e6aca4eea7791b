use dupescan::actions::{ActionError, ActionExecutor, ActionPolicy, DeleteMode};
use dupescan::duplicates::{DuplicateFinder, DuplicateGroup, FinderConfig, ScanControl};
use dupescan::error_sink::{ErrorCategory, ErrorSink};
use dupescan::scanner::WalkerConfig;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn scan(root: &Path) -> Vec<DuplicateGroup> {
    DuplicateFinder::with_defaults()
        .find_duplicates(root, &ScanControl::new())
        .unwrap()
        .0
}

#[test]
fn test_move_resolves_name_collision() {
    let root = tempdir().unwrap();
    let dest = tempdir().unwrap();
    fs::create_dir(root.path().join("x")).unwrap();
    fs::create_dir(root.path().join("y")).unwrap();
    fs::write(root.path().join("x").join("a.txt"), b"same").unwrap();
    fs::write(root.path().join("y").join("a.txt"), b"same").unwrap();
    fs::write(dest.path().join("a.txt"), b"already here").unwrap();

    let groups = scan(root.path());
    assert_eq!(groups.len(), 1);

    let report = ActionExecutor::new(ActionPolicy::Move {
        destination: dest.path().to_path_buf(),
    })
    .execute(&groups)
    .unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].destination, Some(dest.path().join("a_1.txt")));
    assert!(root.path().join("x").join("a.txt").exists());
    assert!(!root.path().join("y").join("a.txt").exists());
    assert_eq!(fs::read(dest.path().join("a.txt")).unwrap(), b"already here");
    assert_eq!(fs::read(dest.path().join("a_1.txt")).unwrap(), b"same");
}

#[test]
fn test_delete_keeps_canonical_only() {
    let root = tempdir().unwrap();
    for name in ["a", "b", "c"] {
        fs::write(root.path().join(name), b"triplicate").unwrap();
    }
    fs::write(root.path().join("d"), b"unique!!!!").unwrap();

    let groups = scan(root.path());
    let report = ActionExecutor::new(ActionPolicy::Delete(DeleteMode::Permanent))
        .execute(&groups)
        .unwrap();

    assert_eq!(report.success_count(), 2);
    assert_eq!(report.bytes_reclaimed(), 20);
    assert!(root.path().join("a").exists());
    assert!(!root.path().join("b").exists());
    assert!(!root.path().join("c").exists());
    assert!(root.path().join("d").exists());
}

#[test]
fn test_vanished_member_fails_alone() {
    let root = tempdir().unwrap();
    for name in ["a", "b", "c"] {
        fs::write(root.path().join(name), b"content").unwrap();
    }

    let groups = scan(root.path());
    fs::remove_file(root.path().join("b")).unwrap();

    let sink = ErrorSink::new();
    let report = ActionExecutor::new(ActionPolicy::Delete(DeleteMode::Permanent))
        .with_error_sink(sink.clone())
        .execute(&groups)
        .unwrap();

    assert_eq!(report.success_count(), 1);
    assert_eq!(report.failure_count(), 1);
    assert!(!report.results[0].is_success());
    assert!(report.results[1].is_success());
    assert_eq!(sink.count(ErrorCategory::Action), 1);
    assert!(!root.path().join("c").exists());
}

#[test]
fn test_modified_member_is_left_alone() {
    let root = tempdir().unwrap();
    fs::write(root.path().join("a"), b"original").unwrap();
    fs::write(root.path().join("b"), b"original").unwrap();

    let groups = scan(root.path());
    fs::write(root.path().join("b"), b"edited after the scan").unwrap();

    let report = ActionExecutor::new(ActionPolicy::Delete(DeleteMode::Permanent))
        .execute(&groups)
        .unwrap();

    assert_eq!(report.failure_count(), 1);
    assert!(report.results[0].detail.contains("modified"));
    assert!(root.path().join("b").exists());
}

#[test]
fn test_unusable_destination_touches_nothing() {
    let root = tempdir().unwrap();
    fs::write(root.path().join("a"), b"dup").unwrap();
    fs::write(root.path().join("b"), b"dup").unwrap();
    let blocker = root.path().join("blocker");
    fs::write(&blocker, b"a file, not a directory").unwrap();

    let groups = scan(root.path());
    let result = ActionExecutor::new(ActionPolicy::Move {
        destination: blocker.clone(),
    })
    .execute(&groups);

    assert!(matches!(result, Err(ActionError::DestinationUnusable { .. })));
    assert!(root.path().join("a").exists());
    assert!(root.path().join("b").exists());
}

#[cfg(unix)]
#[test]
fn test_followed_symlink_never_costs_its_target() {
    let root = tempdir().unwrap();
    fs::write(root.path().join("b_real.txt"), b"only copy").unwrap();
    std::os::unix::fs::symlink(root.path().join("b_real.txt"), root.path().join("a_link.txt"))
        .unwrap();

    let finder = DuplicateFinder::new(
        FinderConfig::default().with_walker_config(WalkerConfig::new(true, false, vec![])),
    );
    let (groups, _) = finder.find_duplicates(root.path(), &ScanControl::new()).unwrap();
    assert!(groups.is_empty());

    // A real second copy groups with the first path the file was seen under.
    fs::write(root.path().join("c_copy.txt"), b"only copy").unwrap();
    let (groups, _) = finder.find_duplicates(root.path(), &ScanControl::new()).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(groups[0].canonical().path, root.path().join("a_link.txt"));

    let report = ActionExecutor::new(ActionPolicy::Delete(DeleteMode::Permanent))
        .execute(&groups)
        .unwrap();
    assert!(report.all_succeeded());
    assert_eq!(fs::read(root.path().join("a_link.txt")).unwrap(), b"only copy");
    assert_eq!(fs::read(root.path().join("b_real.txt")).unwrap(), b"only copy");
    assert!(!root.path().join("c_copy.txt").exists());
}
