//! Diagnostic logging through the `log` facade and `env_logger`.
//!
//! The level comes from `RUST_LOG` when it is set, otherwise from the CLI:
//! `-q` errors only, default info, `-v` debug, `-vv` trace.
//!
//! Logs are diagnostics. Per-file failures that the operator must see go
//! to the [`ErrorSink`](crate::error_sink::ErrorSink) as well.
//!
//! ```rust,no_run
//! use dupescan::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible with -v");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Dependencies whose own debug output drowns the pipeline's.
const NOISY_MODULES: &[&str] = &["jwalk", "ignore", "image"];

/// Initialize logging from the CLI verbosity flags.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(verbose: u8, quiet: bool) {
    let from_env = env::var("RUST_LOG").is_ok();
    let mut builder = Builder::new();

    if from_env {
        builder.parse_default_env();
    } else {
        let level = determine_level(verbose, quiet);
        builder.filter_level(level);
        if level > LevelFilter::Info {
            for module in NOISY_MODULES {
                builder.filter_module(module, LevelFilter::Info);
            }
        }
    }

    configure_format(&mut builder, verbose);

    if builder.try_init().is_ok() {
        log::debug!(
            "Logging initialized at {:?}{}",
            log::max_level(),
            if from_env { " from RUST_LOG" } else { "" }
        );
    }
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Debug builds: timestamp, level, and the module path from `-v` up.
/// Release builds: level and message only.
fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let timestamp = buf.timestamp_seconds();
            let level = record.level();
            let style = buf.default_level_style(level);
            if verbose >= 1 {
                writeln!(
                    buf,
                    "{} {style}{:<5}{style:#} [{}] {}",
                    timestamp,
                    level,
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            } else {
                writeln!(buf, "{} {style}{:<5}{style:#} {}", timestamp, level, record.args())
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        });
    }
}
