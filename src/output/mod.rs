//! Report writers for scan results and action results.
//!
//! - [`text`] - the "Duplicates found:" listing, one group per paragraph
//! - [`csv`] - one row per redundant member, for spreadsheets
//! - [`json`] - groups, summary and exit code for automation
//!
//! # Example
//!
//! ```no_run
//! use dupescan::duplicates::{DuplicateFinder, ScanControl};
//! use dupescan::output::TextOutput;
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (groups, _summary) = finder
//!     .find_duplicates(Path::new("."), &ScanControl::new())
//!     .unwrap();
//! TextOutput::new(&groups).write_to(std::io::stdout()).unwrap();
//! ```

use thiserror::Error;

pub mod csv;
pub mod json;
pub mod text;

pub use self::csv::{CsvActionOutput, CsvOutput};
pub use self::json::JsonOutput;
pub use self::text::{TextActionOutput, TextOutput};

/// Errors raised while writing a report.
#[derive(Debug, Error)]
pub enum OutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
