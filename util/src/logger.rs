//! Session logger
//!
//! Log records are written to the terminal with coloured level tags and to
//! the session's log file without colours. Every line is stamped with the
//! number of seconds since the session started.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{info, Level, Record};
use std::fmt::Arguments;
use thiserror::Error;

// Internal imports
use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The minimum log level must include `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Cannot open the session log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("Cannot install the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// # Notes
///
/// - `min_level` must be `Info` or more verbose.
/// - Debug and trace records include their target module.
/// - Only the first call in a process succeeds, later calls return
///   `FernInitError`.
pub fn logger_init(
    min_level: LevelFilter,
    session: &Session
) -> Result<(), LoggerInitError> {

    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}",
                format_line(level_tag(record.level()), message, record)
            ))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}",
                format_line(level_tag_plain(record.level()), message, record)
            ))
        })
        .chain(log_file);

    fern::Dispatch::new()
        .level(min_level)
        .chain(console)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn format_line<T: std::fmt::Display>(
    tag: T,
    message: &Arguments,
    record: &Record
) -> String {
    let elapsed_s = session::get_elapsed_seconds();

    if record.level() > Level::Info {
        format!("[{:10.6} {}] {}: {}", elapsed_s, tag, record.target(), message)
    }
    else {
        format!("[{:10.6} {}] {}", elapsed_s, tag, message)
    }
}

/// Coloured tag for the terminal
fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => level_tag_plain(level).dimmed().italic(),
        Level::Debug => level_tag_plain(level).dimmed(),
        Level::Info  => level_tag_plain(level).normal(),
        Level::Warn  => level_tag_plain(level).yellow(),
        Level::Error => level_tag_plain(level).red().bold()
    }
}

fn level_tag_plain(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info  => "INF",
        Level::Warn  => "WRN",
        Level::Error => "ERR"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level_tags() {
        assert_eq!(level_tag_plain(Level::Warn), "WRN");
        assert!(level_tag(Level::Error).to_string().contains("ERR"));
    }

    #[test]
    fn test_format_line() {
        // Debug records carry their target
        let line = format_line(
            "DBG",
            &format_args!("steering limited"),
            &Record::builder()
                .level(Level::Debug)
                .target("ackermann_lib::controller")
                .build()
        );
        assert!(line.ends_with("DBG] ackermann_lib::controller: steering limited"));

        let line = format_line(
            "INF",
            &format_args!("steering limited"),
            &Record::builder()
                .level(Level::Info)
                .target("ackermann_exec")
                .build()
        );
        assert!(line.ends_with("INF] steering limited"));
    }
}
