//! Command-line interface definitions.
//!
//! Global options (verbosity, config file, error format) come before the
//! subcommand. Scan options left unset fall back to the layered settings
//! (defaults, settings file, `DUPESCAN_*` environment).
//!
//! # Example
//!
//! ```bash
//! # List exact duplicates under ~/Downloads
//! dupescan scan ~/Downloads
//!
//! # Near-duplicate images, CSV report
//! dupescan scan ~/Pictures --strategy perceptual --threshold 8 --output csv
//!
//! # Move redundant copies aside
//! dupescan scan ~/Downloads --action move --destination ~/dupes --yes
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::scanner::{HashAlgorithm, PerceptualAlgorithm, Strategy};

/// Duplicate and near-duplicate file finder.
///
/// Groups files with identical content (or visually similar images) and
/// can delete or move the redundant copies, always keeping the first one
/// found.
#[derive(Debug, Parser)]
#[command(name = "dupescan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Settings file to use instead of the platform default
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Print fatal errors as a JSON object on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory for duplicate files
    Scan(ScanArgs),
    /// Print the effective settings, optionally saving them
    Settings(SettingsArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "ROOT")]
    pub path: PathBuf,

    /// Fingerprint strategy
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<Strategy>,

    /// Content hash algorithm for the exact strategy (sha256, sha224, sha384, sha512, blake3)
    #[arg(long, value_name = "NAME")]
    pub algorithm: Option<HashAlgorithm>,

    /// Image hash for the perceptual strategy (ahash, dhash, phash)
    #[arg(long, value_name = "NAME")]
    pub perceptual_algorithm: Option<PerceptualAlgorithm>,

    /// Maximum Hamming distance for near-duplicate images
    #[arg(long, value_name = "N")]
    pub threshold: Option<u32>,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1KB, 1MB, 1GB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Only consider these media types (image/png, image/*, image); repeatable
    #[arg(long = "include-type", value_name = "TYPE")]
    pub include_types: Vec<String>,

    /// Skip these media types; repeatable
    #[arg(long = "exclude-type", value_name = "TYPE")]
    pub exclude_types: Vec<String>,

    /// Only group files that also share a modification time
    #[arg(long)]
    pub bucket_by_mtime: bool,

    /// Confirm exact groups byte for byte
    #[arg(long)]
    pub verify: bool,

    /// Number of fingerprinting threads
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// What to do with redundant copies
    #[arg(long, value_enum)]
    pub action: Option<ActionKind>,

    /// Destination directory for --action move
    #[arg(long, value_name = "DIR")]
    pub destination: Option<PathBuf>,

    /// Delete to the system trash instead of permanently
    #[arg(long)]
    pub trash: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Append scan and action failures to this file
    #[arg(long, value_name = "FILE")]
    pub error_log: Option<PathBuf>,

    /// Gitignore-style patterns to skip (can be specified multiple times)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Follow symbolic links during the walk
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories
    #[arg(long)]
    pub skip_hidden: bool,

    /// Confirm destructive actions without prompting
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the settings subcommand.
#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// Write the effective settings to the settings file
    #[arg(long)]
    pub save: bool,
}

/// Action applied to redundant group members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Report only
    #[default]
    None,
    /// Delete redundant copies
    Delete,
    /// Move redundant copies into the destination directory
    Move,
}

impl ActionKind {
    /// Whether the action modifies the filesystem.
    #[must_use]
    pub fn is_destructive(self) -> bool {
        self != Self::None
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::None => write!(f, "none"),
            ActionKind::Delete => write!(f, "delete"),
            ActionKind::Move => write!(f, "move"),
        }
    }
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// "Duplicates found:" listing
    #[default]
    Text,
    /// CSV for spreadsheets
    Csv,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupescan::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    // Find where the number ends and the suffix begins
    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
