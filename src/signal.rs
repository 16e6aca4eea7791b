//! Ctrl+C handling.
//!
//! The handler only raises a flag. [`ShutdownHandler::supervise`] watches
//! that flag while a scan runs and turns it into a coordinator `cancel`,
//! so cancellation always goes through the scan state machine.
//!
//! ```rust,no_run
//! use dupescan::coordinator::ScanCoordinator;
//! use dupescan::duplicates::FinderConfig;
//! use dupescan::signal::install_handler;
//! use std::path::Path;
//!
//! let handler = install_handler().expect("signal handler");
//! let coordinator = ScanCoordinator::new();
//! coordinator.start(Path::new("."), FinderConfig::default()).unwrap();
//! let outcome = handler.supervise(&coordinator).unwrap();
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::coordinator::{CoordinatorError, ScanCoordinator, ScanOutcome};

/// How often a supervised scan checks the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared flag raised when Ctrl+C is pressed.
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown as if Ctrl+C had been pressed.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clone of the underlying flag.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Wait for the coordinator's scan to end, cancelling it if shutdown
    /// is requested in the meantime.
    ///
    /// # Errors
    ///
    /// Whatever [`ScanCoordinator::wait`] returns.
    pub fn supervise(&self, coordinator: &ScanCoordinator) -> Result<ScanOutcome, CoordinatorError> {
        let mut cancel_sent = false;
        while coordinator.state().is_active() {
            if !cancel_sent && self.is_shutdown_requested() {
                cancel_sent = true;
                match coordinator.cancel() {
                    Ok(()) => log::info!("Cancelling scan"),
                    Err(e) => log::debug!("Cancel not applied: {}", e),
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        coordinator.wait()
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler, or reuse the installed one.
///
/// A reused handler has its flag cleared, so tests and repeated runs in one
/// process start clean.
///
/// # Errors
///
/// [`SignalError::InstallFailed`] if no handler could be installed and none
/// was installed before.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    match ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cancelling scan...");
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(ctrlc::Error::MultipleHandlers) => {
            // Registered by someone else in this process; manual requests still work.
            log::debug!("Ctrl+C handler already registered, using unhooked handler");
            let fallback = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone();
            fallback.reset();
            Ok(fallback)
        }
        Err(e) => Err(e.into()),
    }
}
