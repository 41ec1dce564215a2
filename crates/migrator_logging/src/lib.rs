#![deny(missing_docs)]
//! Shared logging utilities for the migrator workspace.
//!
//! This crate provides the `migrator_*` logging macros used across the codebase,
//! the batch logger (terminal plus an appended log file) and a minimal test
//! initializer for the global logger.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// File name of the batch log inside the configured log directory.
pub const BATCH_LOG_FILENAME: &str = "batch_migrate.log";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! migrator_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! migrator_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! migrator_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! migrator_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! migrator_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Initialize the global logger for a batch run.
///
/// Logs go to the terminal and are appended to `{log_dir}/batch_migrate.log`.
/// If the log file cannot be opened the run continues with terminal output only.
pub fn initialize(level: LevelFilter, log_dir: Option<&Path>) {
    let loggers = build_loggers(level, log_dir);
    let _ = CombinedLogger::init(loggers);
}

fn build_loggers(level: LevelFilter, log_dir: Option<&Path>) -> Vec<Box<dyn SharedLogger>> {
    let config = build_config();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(dir) = log_dir {
        if let Some(file_logger) = create_file_logger(level, config, dir) {
            loggers.push(file_logger);
        }
    }
    loggers
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(
    level: LevelFilter,
    config: Config,
    dir: &Path,
) -> Option<Box<WriteLogger<File>>> {
    let log_path: PathBuf = dir.join(BATCH_LOG_FILENAME);
    let opened = fs::create_dir_all(dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
    });
    match opened {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not open log file at {:?}: {}", log_path, err);
            None
        }
    }
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::{build_loggers, BATCH_LOG_FILENAME};
    use log::LevelFilter;

    #[test]
    fn file_logger_is_added_and_directory_created() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("logs");

        let loggers = build_loggers(LevelFilter::Info, Some(&dir));

        assert_eq!(loggers.len(), 2);
        assert!(dir.join(BATCH_LOG_FILENAME).exists());
    }

    #[test]
    fn unusable_log_dir_falls_back_to_terminal_only() {
        let temp = tempfile::TempDir::new().unwrap();
        let blocker = temp.path().join("not_a_dir");
        std::fs::write(&blocker, "x").unwrap();

        let loggers = build_loggers(LevelFilter::Info, Some(&blocker));

        assert_eq!(loggers.len(), 1);
    }

    #[test]
    fn terminal_only_without_log_dir() {
        assert_eq!(build_loggers(LevelFilter::Debug, None).len(), 1);
    }
}
