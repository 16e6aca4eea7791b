//! Progress reporting.
//!
//! The scan pipeline reports through the [`ProgressSink`] trait:
//! `(processed, total, current_path)` per completed unit, plus phase and
//! terminal events. [`ProgressRelay`] sits between the pipeline and a
//! sink so that a slow sink never stalls fingerprinting: events are queued
//! on a channel and delivered in order on a dedicated thread.
//! [`TerminalProgress`] draws `indicatif` bars.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase name for directory enumeration.
pub const PHASE_WALK: &str = "walking";
/// Phase name for fingerprinting.
pub const PHASE_FINGERPRINT: &str = "fingerprint";
/// Phase name for byte-for-byte verification.
pub const PHASE_VERIFY: &str = "verify";

/// How a scan ended, as seen by a progress sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    /// Every forwarded candidate was fingerprinted.
    Completed,
    /// The scan was cancelled; no results will be reported.
    Cancelled,
}

/// Receiver of scan progress.
///
/// Implementations must be `Send + Sync`. When wrapped in a
/// [`ProgressRelay`] all calls arrive on the relay's thread, in order.
/// Under a `ScanCoordinator`, `on_finished` comes from the scan thread
/// after every queued event was delivered.
pub trait ProgressSink: Send + Sync {
    /// A phase starts. `total` is 0 when unknown (enumeration).
    fn on_phase_start(&self, _phase: &str, _total: usize) {}

    /// One more unit finished. `processed` never decreases within a phase.
    fn on_progress(&self, processed: usize, total: usize, current_path: &Path);

    /// A phase finished.
    fn on_phase_end(&self, _phase: &str) {}

    /// Terminal event; sent exactly once per scan.
    fn on_finished(&self, _end: ScanEnd) {}
}

enum RelayEvent {
    PhaseStart(String, usize),
    Progress(usize, usize, PathBuf),
    PhaseEnd(String),
    Finished(ScanEnd),
}

/// Asynchronous adapter in front of another [`ProgressSink`].
///
/// Sending never blocks. Dropping the relay (or calling
/// [`ProgressRelay::finish`]) flushes queued events before returning.
pub struct ProgressRelay {
    sender: Mutex<Option<Sender<RelayEvent>>>,
    worker: Option<JoinHandle<()>>,
}

impl ProgressRelay {
    /// Start a delivery thread that forwards to `sink`.
    #[must_use]
    pub fn spawn(sink: Arc<dyn ProgressSink>) -> Self {
        let (sender, receiver) = mpsc::channel::<RelayEvent>();
        let worker = std::thread::Builder::new()
            .name("dupescan-progress".into())
            .spawn(move || {
                for event in receiver {
                    match event {
                        RelayEvent::PhaseStart(phase, total) => sink.on_phase_start(&phase, total),
                        RelayEvent::Progress(done, total, path) => {
                            sink.on_progress(done, total, &path)
                        }
                        RelayEvent::PhaseEnd(phase) => sink.on_phase_end(&phase),
                        RelayEvent::Finished(end) => sink.on_finished(end),
                    }
                }
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Failed to start progress thread, progress disabled: {}", e);
                None
            }
        };

        Self {
            sender: Mutex::new(worker.as_ref().map(|_| sender)),
            worker,
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<Sender<RelayEvent>>> {
        self.sender.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn send(&self, event: RelayEvent) {
        if let Some(sender) = self.sender().as_ref() {
            // The receiver only goes away after the sender is dropped.
            let _ = sender.send(event);
        }
    }

    /// Stop accepting events and wait until queued ones are delivered.
    pub fn finish(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.sender().take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Progress sink panicked");
            }
        }
    }
}

impl Drop for ProgressRelay {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl ProgressSink for ProgressRelay {
    fn on_phase_start(&self, phase: &str, total: usize) {
        self.send(RelayEvent::PhaseStart(phase.to_string(), total));
    }

    fn on_progress(&self, processed: usize, total: usize, current_path: &Path) {
        self.send(RelayEvent::Progress(
            processed,
            total,
            current_path.to_path_buf(),
        ));
    }

    fn on_phase_end(&self, phase: &str) {
        self.send(RelayEvent::PhaseEnd(phase.to_string()));
    }

    fn on_finished(&self, end: ScanEnd) {
        self.send(RelayEvent::Finished(end));
    }
}

impl std::fmt::Debug for ProgressRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressRelay")
            .field("running", &self.worker.is_some())
            .finish()
    }
}

/// Terminal progress bars using indicatif.
///
/// A spinner while walking, a bar per counted phase.
pub struct TerminalProgress {
    multi: MultiProgress,
    active: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl TerminalProgress {
    /// Create a reporter. With `quiet` nothing is drawn.
    ///
    /// ```
    /// use dupescan::progress::TerminalProgress;
    ///
    /// let progress = TerminalProgress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            active: Mutex::new(None),
            quiet,
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.active.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn walking_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }
}

impl ProgressSink for TerminalProgress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = if phase == PHASE_WALK {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(Self::walking_style());
            pb.set_message("Walking directory");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(Self::bar_style());
            pb.set_message(match phase {
                PHASE_FINGERPRINT => "Fingerprinting".to_string(),
                PHASE_VERIFY => "Verifying".to_string(),
                other => other.to_string(),
            });
            pb
        };

        if let Some(previous) = self.active().replace(pb) {
            previous.finish_and_clear();
        }
    }

    fn on_progress(&self, processed: usize, _total: usize, current_path: &Path) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.active().as_ref() {
            pb.set_position(processed as u64);
            pb.set_message(truncate_path(&current_path.to_string_lossy(), 30));
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.active().take() {
            pb.finish_with_message(format!("{} complete", phase));
        }
    }

    fn on_finished(&self, end: ScanEnd) {
        if let Some(pb) = self.active().take() {
            match end {
                ScanEnd::Completed => pb.finish_and_clear(),
                ScanEnd::Cancelled => pb.abandon_with_message("Cancelled"),
            }
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name.chars().skip(name_len + 3 - max_len).collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}
