//! Shared helpers for the dtn binaries.

pub mod args;

/// Map `-v`/`-q` counts to a log level filter.
pub fn log_level(verbosity: u8, quiet: u8) -> log::LevelFilter {
    if quiet > 0 {
        match quiet {
            1 => log::LevelFilter::Warn,
            _ => log::LevelFilter::Error,
        }
    } else {
        match verbosity {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
