//! Process exit codes and structured error reports.

use serde::Serialize;

/// Exit codes for the dupescan binary.
///
/// - 0: scan completed and duplicate groups were found
/// - 1: fatal error
/// - 2: scan completed, no duplicate groups
/// - 3: scan completed but some files or actions failed
/// - 130: cancelled (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Duplicates were found.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// No duplicate groups.
    NoDuplicates = 2,
    /// Completed with per-file failures.
    PartialSuccess = 3,
    /// Cancelled by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code name.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DS000",
            Self::GeneralError => "DS001",
            Self::NoDuplicates => "DS002",
            Self::PartialSuccess => "DS003",
            Self::Interrupted => "DS130",
        }
    }

    /// Exit code for a finished scan.
    ///
    /// Failures outrank "no duplicates", which outranks plain success.
    #[must_use]
    pub fn for_scan(groups: usize, errors: usize) -> Self {
        if errors > 0 {
            Self::PartialSuccess
        } else if groups == 0 {
            Self::NoDuplicates
        } else {
            Self::Success
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DS001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the scan was cancelled
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
