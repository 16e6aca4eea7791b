//! dupescan - duplicate and near-duplicate file finder.
//!
//! A scan walks one directory tree, buckets files by size (and optionally
//! modification time), fingerprints only the files that share a bucket,
//! and groups files whose fingerprints match. Exact scans use a
//! cryptographic digest; perceptual scans hash images and group those
//! within a Hamming-distance threshold. The first file found in each group
//! is canonical; the rest can be deleted or moved aside.
//!
//! ```no_run
//! use dupescan::duplicates::{DuplicateFinder, ScanControl};
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (groups, summary) = finder
//!     .find_duplicates(Path::new("."), &ScanControl::new())
//!     .unwrap();
//! for group in &groups {
//!     println!("{} copies of {}", group.len(), group.canonical().path.display());
//! }
//! println!("{} reclaimable", summary.reclaimable_display());
//! ```

pub mod actions;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod duplicates;
pub mod error;
pub mod error_sink;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use yansi::Paint;

use crate::actions::{ActionExecutor, ActionReport};
use crate::cli::{Cli, Commands, OutputFormat, ScanArgs, SettingsArgs};
use crate::config::ScanSettings;
use crate::coordinator::{ScanCoordinator, ScanOutcome};
use crate::duplicates::{DuplicateGroup, ScanSummary};
use crate::error::ExitCode;
use crate::error_sink::ErrorSink;
use crate::output::{CsvActionOutput, CsvOutput, JsonOutput, TextActionOutput, TextOutput};
use crate::progress::{ProgressSink, TerminalProgress};

/// Run the command described by `cli` and return the process exit code.
///
/// # Errors
///
/// Fatal failures: unreadable settings, an invalid root, an unusable
/// destination, a report that cannot be written, or a refused destructive
/// action. Per-file failures are not errors; they yield
/// [`ExitCode::PartialSuccess`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    match &cli.command {
        Commands::Scan(args) => run_scan(&cli, args),
        Commands::Settings(args) => run_settings(&cli, args),
    }
}

fn run_settings(cli: &Cli, args: &SettingsArgs) -> Result<ExitCode> {
    let settings = ScanSettings::load(cli.config.as_deref()).context("Failed to load settings")?;
    settings.validate()?;

    print!("{}", settings.to_toml()?);
    if args.save {
        let path = settings.save(cli.config.as_deref())?;
        eprintln!("Settings saved to {}", path.display());
    }
    Ok(ExitCode::Success)
}

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<ExitCode> {
    let mut settings =
        ScanSettings::load(cli.config.as_deref()).context("Failed to load settings")?;
    settings.merge_scan_args(args);
    settings.validate()?;

    let policy = settings.action_policy();
    if let Some(policy) = &policy {
        if !args.yes {
            bail!(
                "Refusing to {} redundant files without --yes",
                policy
            );
        }
    }

    // An unusable destination is fatal before any scan work is scheduled.
    let executor = policy
        .map(|policy| ActionExecutor::new(policy).prepare())
        .transpose()?;

    let error_sink = match &settings.error_log {
        Some(path) => ErrorSink::with_log_file(path)
            .with_context(|| format!("Failed to open error log {}", path.display()))?,
        None => ErrorSink::new(),
    };

    let mut finder_config = settings.to_finder_config(error_sink.clone());
    if !cli.quiet {
        finder_config =
            finder_config.with_progress(Arc::new(TerminalProgress::new(false)) as Arc<dyn ProgressSink>);
    }

    let handler = signal::install_handler()?;
    let coordinator = ScanCoordinator::new();
    coordinator.start(&args.path, finder_config)?;

    let (groups, summary) = match handler.supervise(&coordinator)? {
        ScanOutcome::Completed { groups, summary } => (groups, summary),
        ScanOutcome::Cancelled => {
            eprintln!("Scan cancelled; no results reported.");
            return Ok(ExitCode::Interrupted);
        }
    };

    let report = match executor {
        Some(executor) => Some(
            executor
                .with_error_sink(error_sink.clone())
                .execute(&groups)?,
        ),
        None => None,
    };

    let exit_code = ExitCode::for_scan(groups.len(), error_sink.len());
    write_report(args, &groups, &summary, report, exit_code)?;
    print_summary(&summary, error_sink.len());

    Ok(exit_code)
}

fn write_report(
    args: &ScanArgs,
    groups: &[DuplicateGroup],
    summary: &ScanSummary,
    report: Option<ActionReport>,
    exit_code: ExitCode,
) -> Result<()> {
    let mut writer: Box<dyn Write> = match &args.report {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create report {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    match args.output {
        OutputFormat::Text => {
            TextOutput::new(groups).write_to(&mut writer)?;
            if let Some(report) = &report {
                TextActionOutput::new(report).write_to(&mut writer)?;
            }
        }
        OutputFormat::Csv => {
            CsvOutput::new(groups).write_to(&mut writer)?;
            if let Some(report) = &report {
                writeln!(writer)?;
                CsvActionOutput::new(report).write_to(&mut writer)?;
            }
        }
        OutputFormat::Json => {
            let mut output = JsonOutput::new(groups, summary, exit_code);
            if let Some(report) = report {
                output = output.with_actions(report);
            }
            output.write_to(&mut writer, true)?;
        }
    }
    writer.flush()?;

    if let Some(path) = &args.report {
        log::info!("Report written to {}", path.display());
    }
    Ok(())
}

/// Processed count, group count and error count, always on stderr.
fn print_summary(summary: &ScanSummary, errors: usize) {
    let errors_text = format!("{} error(s) logged", errors);
    eprintln!(
        "Processed {} file(s), found {} duplicate group(s) ({} redundant, {} reclaimable), {} in {:.2?}",
        summary.processed,
        summary.duplicate_groups.bold(),
        summary.duplicate_files,
        summary.reclaimable_display().green(),
        if errors > 0 {
            errors_text.red().to_string()
        } else {
            errors_text
        },
        summary.scan_duration
    );
}
