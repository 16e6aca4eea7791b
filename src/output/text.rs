//! Plain-text duplicate listing.
//!
//! The layout is the one users save to a file and read back by eye:
//!
//! ```text
//! Duplicates found:
//! /photos/a.jpg
//! /backup/a.jpg
//!
//! /docs/report.pdf
//! /docs/report (1).pdf
//!
//! ```
//!
//! One group per paragraph, canonical member first, each group followed by
//! a blank line.

use std::io::{self, Write};

use crate::actions::{ActionOutcome, ActionReport};
use crate::duplicates::DuplicateGroup;

/// Text listing of duplicate groups.
pub struct TextOutput<'a> {
    groups: &'a [DuplicateGroup],
}

impl<'a> TextOutput<'a> {
    /// Create a text formatter over `groups`.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup]) -> Self {
        Self { groups }
    }

    /// Write the listing.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "Duplicates found:")?;
        for group in self.groups {
            for member in &group.members {
                writeln!(writer, "{}", member.path.display())?;
            }
            writeln!(writer)?;
        }
        writer.flush()
    }

    /// Render the listing into a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Text listing of action results, one line per redundant member.
pub struct TextActionOutput<'a> {
    report: &'a ActionReport,
}

impl<'a> TextActionOutput<'a> {
    /// Create a formatter over `report`.
    #[must_use]
    pub fn new(report: &'a ActionReport) -> Self {
        Self { report }
    }

    /// Write one line per result followed by the report summary.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for result in &self.report.results {
            let tag = match result.outcome {
                ActionOutcome::Success => "ok",
                ActionOutcome::Failed => "FAILED",
            };
            match &result.destination {
                Some(dest) if result.is_success() => writeln!(
                    writer,
                    "[{}] {} -> {}",
                    tag,
                    result.path.display(),
                    dest.display()
                )?,
                _ => writeln!(
                    writer,
                    "[{}] {}: {}",
                    tag,
                    result.path.display(),
                    result.detail
                )?,
            }
        }
        writeln!(writer, "{}", self.report.summary())?;
        writer.flush()
    }
}
