//! Append-only failure log shared by every pipeline stage.
//!
//! Per-file failures (unreadable directory entries, undecodable images,
//! delete/move errors) never abort a scan or an action pass. They are
//! appended here as `(timestamp, context, message)` records and, when a
//! log file is configured, mirrored to it one complete line at a time.
//!
//! # Example
//!
//! ```
//! use dupescan::error_sink::{ErrorCategory, ErrorSink};
//!
//! let sink = ErrorSink::new();
//! sink.record(ErrorCategory::Fingerprint, "/tmp/broken.png", "not an image");
//! assert_eq!(sink.len(), 1);
//! ```

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use serde::Serialize;

/// Which stage produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Directory entry could not be read during traversal.
    Enumeration,
    /// File could not be read or decoded for fingerprinting.
    Fingerprint,
    /// Delete or move of a redundant member failed.
    Action,
    /// Invalid scan state transition was requested.
    State,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enumeration => "enumeration",
            Self::Fingerprint => "fingerprint",
            Self::Action => "action",
            Self::State => "state",
        };
        f.write_str(name)
    }
}

/// One entry in the error sink.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// When the failure was recorded
    pub timestamp: DateTime<Local>,
    /// Stage that produced the failure
    pub category: ErrorCategory,
    /// What the failure relates to, usually a path
    pub context: String,
    /// Human-readable description
    pub message: String,
}

impl ErrorRecord {
    /// Render as a single log line (no trailing newline).
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{} - [{}] {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.category,
            self.context,
            self.message
        )
    }
}

#[derive(Debug, Default)]
struct SinkInner {
    records: Vec<ErrorRecord>,
    file: Option<File>,
}

/// Concurrent-safe, append-only error log.
///
/// Cloning yields another handle to the same log.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    inner: Arc<Mutex<SinkInner>>,
}

impl ErrorSink {
    /// Create an in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that also appends every record to `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the log file cannot be opened for appending.
    pub fn with_log_file(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::debug!("Error log mirrored to {}", path.display());
        Ok(Self {
            inner: Arc::new(Mutex::new(SinkInner {
                records: Vec::new(),
                file: Some(file),
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SinkInner> {
        // Records are pushed whole, so a poisoned log is still consistent.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Append a failure record.
    pub fn record(
        &self,
        category: ErrorCategory,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        let record = ErrorRecord {
            timestamp: Local::now(),
            category,
            context: context.into(),
            message: message.into(),
        };

        let mut inner = self.lock();
        if let Some(file) = inner.file.as_mut() {
            let line = format!("{}\n", record.to_line());
            if let Err(e) = file.write_all(line.as_bytes()) {
                log::warn!("Failed to write error log: {}", e);
            }
        }
        inner.records.push(record);
    }

    /// Number of records appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether no failures have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Snapshot of the records in append order.
    #[must_use]
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.lock().records.clone()
    }

    /// Number of records in a category.
    #[must_use]
    pub fn count(&self, category: ErrorCategory) -> usize {
        self.lock()
            .records
            .iter()
            .filter(|r| r.category == category)
            .count()
    }
}
