//! JSON output for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "duplicates": [
//!     {
//!       "fingerprint": { "strategy": "exact", "value": "ab12..." },
//!       "size": 1024,
//!       "canonical": "/path/to/file1.txt",
//!       "files": ["/path/to/file1.txt", "/path/to/file2.txt"]
//!     }
//!   ],
//!   "summary": {
//!     "strategy": "exact",
//!     "files_enumerated": 100,
//!     "processed": 12,
//!     "duplicate_groups": 5,
//!     "errors": 0,
//!     "exit_code": 0,
//!     "exit_code_name": "DS000"
//!   },
//!   "actions": null
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use super::OutputError;
use crate::actions::ActionReport;
use crate::duplicates::{DuplicateGroup, ScanSummary};
use crate::error::ExitCode;
use crate::scanner::{Fingerprint, Strategy};

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// Shared fingerprint
    pub fingerprint: Fingerprint,
    /// Size of the canonical member in bytes
    pub size: u64,
    /// The member kept by actions
    pub canonical: String,
    /// All members in discovery order, canonical first
    pub files: Vec<String>,
}

impl JsonDuplicateGroup {
    /// Convert a [`DuplicateGroup`].
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup) -> Self {
        Self {
            fingerprint: group.fingerprint.clone(),
            size: group.canonical().size_bytes,
            canonical: group.canonical().path.to_string_lossy().into_owned(),
            files: group
                .members
                .iter()
                .map(|m| m.path.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Strategy used
    pub strategy: Strategy,
    /// Regular files found by the walk
    pub files_enumerated: usize,
    /// Files the strategy does not apply to
    pub not_applicable: usize,
    /// Candidates forwarded by the pre-filter
    pub candidates: usize,
    /// Candidates fingerprinted
    pub processed: usize,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Redundant members across all groups
    pub duplicate_files: usize,
    /// Bytes freed by removing every redundant member
    pub reclaimable_space: u64,
    /// Errors logged during the scan
    pub errors: usize,
    /// Duration of the scan in milliseconds
    pub scan_duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DS000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from a [`ScanSummary`] and an exit code.
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            strategy: summary.strategy,
            files_enumerated: summary.files_enumerated,
            not_applicable: summary.not_applicable,
            candidates: summary.prefilter.forwarded,
            processed: summary.processed,
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            reclaimable_space: summary.reclaimable_space,
            errors: summary.errors(),
            scan_duration_ms: u64::try_from(summary.scan_duration.as_millis()).unwrap_or(u64::MAX),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Duplicate groups in result order
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Scan summary statistics
    pub summary: JsonSummary,
    /// Results of the action pass, if one ran
    pub actions: Option<ActionReport>,
}

impl JsonOutput {
    /// Create JSON output from groups, summary and exit code.
    ///
    /// ```
    /// use dupescan::duplicates::ScanSummary;
    /// use dupescan::error::ExitCode;
    /// use dupescan::output::json::JsonOutput;
    ///
    /// let output = JsonOutput::new(&[], &ScanSummary::default(), ExitCode::NoDuplicates);
    /// assert!(output.duplicates.is_empty());
    /// assert_eq!(output.summary.exit_code, 2);
    /// ```
    #[must_use]
    pub fn new(groups: &[DuplicateGroup], summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            duplicates: groups
                .iter()
                .map(JsonDuplicateGroup::from_duplicate_group)
                .collect(),
            summary: JsonSummary::from_scan_summary(summary, exit_code),
            actions: None,
        }
    }

    /// Attach the results of an action pass.
    #[must_use]
    pub fn with_actions(mut self, report: ActionReport) -> Self {
        self.actions = Some(report);
        self
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), OutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
