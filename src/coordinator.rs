//! Scan lifecycle coordinator.
//!
//! [`ScanCoordinator`] owns the [`ScanState`] machine and runs at most one
//! scan at a time on a background thread:
//!
//! ```text
//! Idle ──start──▶ Scanning ──(finish)──▶ Completed
//!                  │    ▲
//!            pause │    │ resume
//!                  ▼    │
//!                  Paused
//!
//! Scanning | Paused ──cancel──▶ Cancelled
//! ```
//!
//! `start` is also accepted from `Completed` and `Cancelled`, which end the
//! previous scan's lifecycle. A cancelled scan's results are discarded even
//! if the pipeline happened to finish.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use serde::Serialize;

use crate::duplicates::{
    validate_root, DuplicateFinder, DuplicateGroup, FinderConfig, FinderError, ScanControl,
    ScanSummary,
};
use crate::error_sink::ErrorCategory;
use crate::progress::{ProgressRelay, ProgressSink, ScanEnd};

/// Lifecycle of the coordinator's current scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    /// No scan has been started.
    #[default]
    Idle,
    /// A scan is dispatching work.
    Scanning,
    /// A scan is suspended between units.
    Paused,
    /// The last scan finished and reported results.
    Completed,
    /// The last scan was cancelled; it reports nothing.
    Cancelled,
}

impl ScanState {
    /// Whether a scan is in flight.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Scanning | Self::Paused)
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A rejected state transition. The current scan is unaffected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The requested operation is not valid in the current state.
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        /// Operation that was requested
        action: &'static str,
        /// State at the time of the request
        state: ScanState,
    },

    /// `wait` was called with no scan to wait for.
    #[error("No scan has been started")]
    NoScan,
}

/// Errors returned by the coordinator.
#[derive(thiserror::Error, Debug)]
pub enum CoordinatorError {
    /// Invalid state transition.
    #[error(transparent)]
    State(#[from] StateError),

    /// Fatal scan error (invalid root, worker pool failure).
    #[error(transparent)]
    Finder(#[from] FinderError),

    /// A scan thread could not be spawned.
    #[error("Failed to spawn scan thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The scan thread panicked.
    #[error("Scan thread panicked")]
    Panicked,
}

/// Final result of one scan.
#[derive(Debug)]
pub enum ScanOutcome {
    /// The scan completed.
    Completed {
        /// Duplicate groups in deterministic order
        groups: Vec<DuplicateGroup>,
        /// Scan statistics
        summary: ScanSummary,
    },
    /// The scan was cancelled; partial results were discarded.
    Cancelled,
}

/// Progress as last delivered to the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Current phase name, empty before the first phase
    pub phase: String,
    /// Units finished in the current phase
    pub processed: usize,
    /// Units in the current phase (0 while enumerating)
    pub total: usize,
}

/// Records the latest progress and forwards to the caller's sink.
struct Tracker {
    phase: Mutex<String>,
    processed: AtomicUsize,
    total: AtomicUsize,
    downstream: Option<Arc<dyn ProgressSink>>,
}

impl Tracker {
    fn new(downstream: Option<Arc<dyn ProgressSink>>) -> Self {
        Self {
            phase: Mutex::new(String::new()),
            processed: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            downstream,
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase.lock().map(|p| p.clone()).unwrap_or_default(),
            processed: self.processed.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }
}

impl ProgressSink for Tracker {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase.to_string();
        }
        self.processed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        if let Some(sink) = &self.downstream {
            sink.on_phase_start(phase, total);
        }
    }

    fn on_progress(&self, processed: usize, total: usize, current_path: &Path) {
        self.processed.store(processed, Ordering::SeqCst);
        if let Some(sink) = &self.downstream {
            sink.on_progress(processed, total, current_path);
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if let Some(sink) = &self.downstream {
            sink.on_phase_end(phase);
        }
    }

    fn on_finished(&self, end: ScanEnd) {
        if let Some(sink) = &self.downstream {
            sink.on_finished(end);
        }
    }
}

struct ActiveScan {
    control: Arc<ScanControl>,
    tracker: Arc<Tracker>,
    handle: JoinHandle<Result<ScanOutcome, FinderError>>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<ScanState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, ScanState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Runs scans one at a time and owns their state.
///
/// # Example
///
/// ```no_run
/// use dupescan::coordinator::{ScanCoordinator, ScanOutcome};
/// use dupescan::duplicates::FinderConfig;
/// use std::path::Path;
///
/// let coordinator = ScanCoordinator::new();
/// coordinator.start(Path::new("."), FinderConfig::default()).unwrap();
/// if let ScanOutcome::Completed { groups, .. } = coordinator.wait().unwrap() {
///     println!("{} groups", groups.len());
/// }
/// ```
pub struct ScanCoordinator {
    inner: Arc<Inner>,
    active: Mutex<Option<ActiveScan>>,
}

impl Default for ScanCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScanCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanCoordinator")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ScanCoordinator {
    /// Create an idle coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::default()),
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveScan>> {
        self.active.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ScanState {
        *self.inner.state()
    }

    /// Latest progress delivered by the current or last scan.
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        self.active()
            .as_ref()
            .map(|scan| scan.tracker.snapshot())
            .unwrap_or_default()
    }

    /// Start scanning `root` in the background.
    ///
    /// # Errors
    ///
    /// - [`StateError::InvalidTransition`] if a scan is already running or
    ///   paused; it is recorded in `config.error_sink` and the running scan
    ///   continues untouched.
    /// - [`FinderError`] if `root` is not an existing directory; no work is
    ///   scheduled.
    pub fn start(&self, root: &Path, config: FinderConfig) -> Result<(), CoordinatorError> {
        let mut active = self.active();
        {
            let state = self.inner.state();
            if state.is_active() {
                let err = StateError::InvalidTransition {
                    action: "start",
                    state: *state,
                };
                log::warn!("{}", err);
                config
                    .error_sink
                    .record(ErrorCategory::State, "start", err.to_string());
                return Err(err.into());
            }
        }
        validate_root(root)?;

        // A cancelled predecessor may still be draining in-flight units.
        if let Some(previous) = active.take() {
            if previous.handle.join().is_err() {
                log::warn!("Previous scan thread panicked");
            }
        }

        let control = Arc::new(ScanControl::new());
        let tracker = Arc::new(Tracker::new(config.progress.clone()));
        let inner = Arc::clone(&self.inner);
        let thread_control = Arc::clone(&control);
        let thread_tracker = Arc::clone(&tracker);
        let root: PathBuf = root.to_path_buf();

        *self.inner.state() = ScanState::Scanning;
        let spawned = std::thread::Builder::new()
            .name("dupescan-scan".into())
            .spawn(move || run_scan(&root, config, &thread_control, thread_tracker, &inner));

        match spawned {
            Ok(handle) => {
                log::debug!("Scan thread started");
                *active = Some(ActiveScan {
                    control,
                    tracker,
                    handle,
                });
                Ok(())
            }
            Err(e) => {
                *self.inner.state() = ScanState::Idle;
                Err(CoordinatorError::Spawn(e))
            }
        }
    }

    fn transition(
        &self,
        action: &'static str,
        from: &[ScanState],
        to: ScanState,
        apply: impl FnOnce(&ScanControl),
    ) -> Result<(), StateError> {
        let active = self.active();
        let mut state = self.inner.state();
        match active.as_ref() {
            Some(scan) if from.contains(&*state) => {
                apply(&scan.control);
                log::debug!("Scan {} -> {}", *state, to);
                *state = to;
                Ok(())
            }
            _ => Err(StateError::InvalidTransition {
                action,
                state: *state,
            }),
        }
    }

    /// Stop dispatching new units. In-flight units finish.
    ///
    /// # Errors
    ///
    /// [`StateError`] unless the state is `Scanning`.
    pub fn pause(&self) -> Result<(), StateError> {
        self.transition("pause", &[ScanState::Scanning], ScanState::Paused, |c| {
            c.pause();
        })
    }

    /// Resume dispatching remaining units.
    ///
    /// # Errors
    ///
    /// [`StateError`] unless the state is `Paused`.
    pub fn resume(&self) -> Result<(), StateError> {
        self.transition("resume", &[ScanState::Paused], ScanState::Scanning, |c| {
            c.resume();
        })
    }

    /// Cancel the scan. In-flight units finish; results are discarded.
    ///
    /// # Errors
    ///
    /// [`StateError`] unless the state is `Scanning` or `Paused`.
    pub fn cancel(&self) -> Result<(), StateError> {
        self.transition(
            "cancel",
            &[ScanState::Scanning, ScanState::Paused],
            ScanState::Cancelled,
            |c| c.cancel(),
        )
    }

    /// Wait for the current scan to end and take its outcome.
    ///
    /// # Errors
    ///
    /// [`StateError::NoScan`] if nothing was started since the last wait,
    /// or the scan's fatal error.
    pub fn wait(&self) -> Result<ScanOutcome, CoordinatorError> {
        let scan = self.active().take().ok_or(StateError::NoScan)?;
        let result = scan.handle.join().map_err(|_| CoordinatorError::Panicked)?;
        Ok(result?)
    }
}

/// Body of the scan thread.
fn run_scan(
    root: &Path,
    config: FinderConfig,
    control: &ScanControl,
    tracker: Arc<Tracker>,
    inner: &Inner,
) -> Result<ScanOutcome, FinderError> {
    let relay = Arc::new(ProgressRelay::spawn(Arc::clone(&tracker) as Arc<dyn ProgressSink>));
    let finder = DuplicateFinder::new(config.with_progress(relay.clone() as Arc<dyn ProgressSink>));
    let result = finder.find_duplicates(root, control);
    drop(finder);

    // Queued progress is delivered before the outcome is settled; the scan
    // stays cancellable until then.
    match Arc::try_unwrap(relay) {
        Ok(relay) => relay.finish(),
        Err(_) => log::debug!("Progress relay still shared; flushing on drop"),
    }

    let mut state = inner.state();
    let (outcome, end) = match result {
        Ok(_) if *state == ScanState::Cancelled => (Ok(ScanOutcome::Cancelled), ScanEnd::Cancelled),
        Ok((groups, summary)) => {
            *state = ScanState::Completed;
            (Ok(ScanOutcome::Completed { groups, summary }), ScanEnd::Completed)
        }
        Err(FinderError::Interrupted) => {
            *state = ScanState::Cancelled;
            (Ok(ScanOutcome::Cancelled), ScanEnd::Cancelled)
        }
        Err(e) => {
            log::error!("Scan failed: {}", e);
            *state = ScanState::Cancelled;
            (Err(e), ScanEnd::Cancelled)
        }
    };
    drop(state);

    tracker.on_finished(end);
    log::info!("Scan {}", if end == ScanEnd::Completed { "completed" } else { "cancelled" });
    outcome
}
