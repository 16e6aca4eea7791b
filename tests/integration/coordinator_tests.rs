use dupescan::coordinator::{CoordinatorError, ScanCoordinator, ScanOutcome, ScanState, StateError};
use dupescan::duplicates::{FinderConfig, FinderError};
use dupescan::error_sink::{ErrorCategory, ErrorSink};
use dupescan::progress::{ProgressSink, PHASE_FINGERPRINT};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use tempfile::tempdir;

/// Progress sink that holds the scan open after fingerprinting until the
/// test releases it.
struct Gate {
    armed: AtomicBool,
    barrier: Barrier,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            armed: AtomicBool::new(true),
            barrier: Barrier::new(2),
        })
    }
}

impl ProgressSink for Gate {
    fn on_progress(&self, _processed: usize, _total: usize, _current_path: &Path) {}

    fn on_phase_end(&self, phase: &str) {
        if phase == PHASE_FINGERPRINT && self.armed.swap(false, Ordering::SeqCst) {
            self.barrier.wait();
            self.barrier.wait();
        }
    }
}

fn gated(gate: &Arc<Gate>) -> FinderConfig {
    FinderConfig::default().with_progress(Arc::clone(gate) as Arc<dyn ProgressSink>)
}

fn populate(root: &Path, files: usize) {
    for i in 0..files {
        fs::write(root.join(format!("f{:03}.bin", i)), vec![(i % 3) as u8; 8192]).unwrap();
    }
}

#[test]
fn test_start_and_complete() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 6);

    let coordinator = ScanCoordinator::new();
    assert_eq!(coordinator.state(), ScanState::Idle);

    coordinator.start(dir.path(), FinderConfig::default()).unwrap();
    match coordinator.wait().unwrap() {
        ScanOutcome::Completed { groups, summary } => {
            assert_eq!(groups.len(), 3);
            assert_eq!(summary.processed, 6);
        }
        ScanOutcome::Cancelled => panic!("not cancelled"),
    }
    assert_eq!(coordinator.state(), ScanState::Completed);
}

#[test]
fn test_start_invalid_root_schedules_nothing() {
    let coordinator = ScanCoordinator::new();
    let result = coordinator.start(Path::new("/no/such/dupescan/root"), FinderConfig::default());

    assert!(matches!(
        result,
        Err(CoordinatorError::Finder(FinderError::PathNotFound(_)))
    ));
    assert_eq!(coordinator.state(), ScanState::Idle);
    assert!(matches!(
        coordinator.wait(),
        Err(CoordinatorError::State(StateError::NoScan))
    ));
}

#[test]
fn test_pause_resume_cancel_rejected_when_idle() {
    let coordinator = ScanCoordinator::new();
    assert!(coordinator.pause().is_err());
    assert!(coordinator.resume().is_err());
    assert!(coordinator.cancel().is_err());
    assert_eq!(coordinator.state(), ScanState::Idle);
}

#[test]
fn test_cancel_then_restart() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 12);

    let gate = Gate::new();
    let coordinator = ScanCoordinator::new();
    coordinator.start(dir.path(), gated(&gate)).unwrap();
    gate.barrier.wait();

    coordinator.cancel().unwrap();
    assert_eq!(coordinator.state(), ScanState::Cancelled);
    gate.barrier.wait();

    assert!(matches!(coordinator.wait().unwrap(), ScanOutcome::Cancelled));
    assert_eq!(coordinator.state(), ScanState::Cancelled);

    coordinator.start(dir.path(), FinderConfig::default()).unwrap();
    match coordinator.wait().unwrap() {
        ScanOutcome::Completed { groups, .. } => assert_eq!(groups.len(), 3),
        ScanOutcome::Cancelled => panic!("second scan was not cancelled"),
    }
}

#[test]
fn test_second_start_while_paused_is_rejected() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 12);

    let gate = Gate::new();
    let coordinator = ScanCoordinator::new();
    coordinator.start(dir.path(), gated(&gate)).unwrap();
    gate.barrier.wait();
    coordinator.pause().unwrap();

    let sink = ErrorSink::new();
    let second = coordinator.start(dir.path(), FinderConfig::default().with_error_sink(sink.clone()));
    assert!(matches!(
        second,
        Err(CoordinatorError::State(StateError::InvalidTransition { action: "start", .. }))
    ));
    assert_eq!(sink.count(ErrorCategory::State), 1);
    assert_eq!(coordinator.state(), ScanState::Paused);

    coordinator.resume().unwrap();
    gate.barrier.wait();
    match coordinator.wait().unwrap() {
        ScanOutcome::Completed { groups, summary } => {
            assert_eq!(groups.len(), 3);
            assert_eq!(summary.processed, 12);
        }
        ScanOutcome::Cancelled => panic!("resumed scan should complete"),
    }
}

#[test]
fn test_progress_snapshot_after_scan() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 9);

    let coordinator = ScanCoordinator::new();
    coordinator.start(dir.path(), FinderConfig::default()).unwrap();
    while coordinator.state().is_active() {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    let snapshot = coordinator.progress();
    assert!(snapshot.processed <= snapshot.total || snapshot.total == 0);
    coordinator.wait().unwrap();
}
