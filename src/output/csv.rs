//! CSV output for spreadsheets and data analysis.
//!
//! One row per redundant member, paired with its group's canonical file.
//!
//! # Columns
//!
//! - `filename`: file name of the redundant member
//! - `size`: size in bytes
//! - `original_path`: path of the group's canonical member
//! - `duplicate_path`: path of the redundant member
//!
//! Action results use `path`, `outcome`, `destination`, `bytes`, `detail`.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::duplicates::{DuplicateFinder, ScanControl};
//! use dupescan::output::csv::CsvOutput;
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (groups, _) = finder
//!     .find_duplicates(Path::new("."), &ScanControl::new())
//!     .unwrap();
//!
//! CsvOutput::new(&groups).write_to(std::io::stdout()).unwrap();
//! ```

use std::io;

use serde::Serialize;

use super::OutputError;
use crate::actions::ActionReport;
use crate::duplicates::DuplicateGroup;

#[derive(Debug, Serialize)]
struct DuplicateRow<'a> {
    filename: String,
    size: u64,
    original_path: &'a str,
    duplicate_path: String,
}

#[derive(Debug, Serialize)]
struct ActionRow {
    path: String,
    outcome: &'static str,
    destination: String,
    bytes: u64,
    detail: String,
}

/// CSV formatter for duplicate groups.
pub struct CsvOutput<'a> {
    groups: &'a [DuplicateGroup],
}

impl<'a> CsvOutput<'a> {
    /// Create a new CSV output formatter.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup]) -> Self {
        Self { groups }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError`] if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), OutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        for group in self.groups {
            let original = group.canonical().path.to_string_lossy();
            for member in group.redundant() {
                csv_writer.serialize(DuplicateRow {
                    filename: member.file_name(),
                    size: member.size_bytes,
                    original_path: &original,
                    duplicate_path: member.path.to_string_lossy().into_owned(),
                })?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError`] if serialization fails.
    pub fn to_string(&self) -> Result<String, OutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// CSV formatter for action results.
pub struct CsvActionOutput<'a> {
    report: &'a ActionReport,
}

impl<'a> CsvActionOutput<'a> {
    /// Create a formatter over `report`.
    #[must_use]
    pub fn new(report: &'a ActionReport) -> Self {
        Self { report }
    }

    /// Write one row per action result.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError`] if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), OutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for result in &self.report.results {
            csv_writer.serialize(ActionRow {
                path: result.path.to_string_lossy().into_owned(),
                outcome: if result.is_success() { "success" } else { "failed" },
                destination: result
                    .destination
                    .as_ref()
                    .map(|d| d.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                bytes: result.bytes,
                detail: result.detail.clone(),
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
