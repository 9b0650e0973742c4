use anyhow::Context;
use std::fs::File;
use std::path::PathBuf;

/// Simplifies file paths by extracting relevant parts from cargo registry paths
///
/// # Arguments
/// * `file_path` - The file path to simplify
///
/// # Returns
/// A simplified version of the file path
fn simplify_file_path(file_path: &str) -> String {
    if file_path.contains("chatpane") {
        if let Some(pos) = file_path.rfind("/src/") {
            return file_path[(pos + 1)..].to_string();
        }
    }

    if let Some((_, suffix)) = file_path.split_once(".cargo/registry/src/") {
        if let Some(first_slash) = suffix.find('/') {
            suffix[(first_slash + 1)..].to_string()
        } else {
            suffix.to_string()
        }
    } else {
        file_path.to_string()
    }
}

/// Formats log messages for file output with detailed information
///
/// # Arguments
/// * `out` - The format callback to write the formatted message
/// * `message` - The log message to format
/// * `record` - The log record containing metadata
///
/// # Features
/// * Complete date-time format (YYYY-MM-DD HH:MM:SS)
/// * Includes file location for troubleshooting
pub fn file_log_formatter(
    out: fern::FormatCallback,
    message: &std::fmt::Arguments,
    record: &log::Record,
) {
    out.finish(format_args!(
        "{}[{}] {}:{} {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%3f "),
        get_level(record.level()),
        simplify_file_path(record.file().unwrap_or("")),
        record.line().unwrap_or(0),
        message
    ))
}

/// Resolves the directory the log file is written to, creating it if needed.
fn log_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::data_local_dir()
        .context("could not determine the local data directory")?
        .join("chatpane");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    Ok(dir)
}

/// Sets up the application logger.
///
/// The panel owns the terminal while the application runs, so all output goes
/// to a log file under the platform's local data directory.
pub fn setup_logger() -> anyhow::Result<()> {
    let log_file_path = log_dir()?.join("chatpane.log");
    File::create(&log_file_path)
        .with_context(|| format!("failed to create log file {}", log_file_path.display()))?;

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    fern::Dispatch::new()
        .level(level)
        .filter(|record| {
            record.target().contains("chatpane") || record.level() < log::LevelFilter::Info
        })
        .format(file_log_formatter)
        .chain(fern::log_file(&log_file_path).context("failed to open log file")?)
        .apply()
        .context("failed to initialize logger")?;

    log::debug!(
        "Logger initialized successfully, log file path: {:?}",
        log_file_path
    );
    Ok(())
}

fn get_level(level: log::Level) -> String {
    match level {
        log::Level::Error => "E",
        log::Level::Warn => "W",
        log::Level::Info => "I",
        log::Level::Debug => "D",
        log::Level::Trace => "T",
    }
    .to_string()
}

/// Formats log messages for console output with a simplified format, used by
/// the test logger.
#[cfg(test)]
pub fn console_log_formatter(
    out: fern::FormatCallback,
    message: &std::fmt::Arguments,
    record: &log::Record,
) {
    let level = record.level();
    let level_color = match level {
        log::Level::Error => "\x1B[31m", // red
        log::Level::Warn => "\x1B[33m",  // yellow
        log::Level::Info => "\x1B[32m",  // green
        log::Level::Debug => "\x1B[0m",  // normal
        log::Level::Trace => "\x1B[35m", // purple
    };
    let reset = "\x1B[0m";

    out.finish(format_args!(
        "{}{}[{}] {}:{} {}{}",
        level_color,
        chrono::Local::now().format("%H:%M:%S.%3f "),
        get_level(level),
        simplify_file_path(record.file().unwrap_or("")),
        record.line().unwrap_or(0),
        message,
        reset,
    ))
}

#[cfg(test)]
use log::SetLoggerError;

/// Console-only logger for tests.
#[cfg(test)]
pub fn setup_test_logger() -> Result<(), SetLoggerError> {
    if log::logger().enabled(&log::Metadata::builder().level(log::Level::Debug).build()) {
        return Ok(()); // logger already initialized
    }

    fern::Dispatch::new()
        .format(console_log_formatter)
        .level(log::LevelFilter::Debug)
        .filter(|record| {
            record.target().contains("chatpane") || record.level() < log::LevelFilter::Debug
        })
        .chain(std::io::stdout())
        .apply()?;

    log::debug!("Test logger initialized successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simplifies_registry_paths() {
        let simplified = simplify_file_path(
            "/home/u/.cargo/registry/src/index.crates.io-6f17d22bba15001f/reqwest-0.12.8/src/lib.rs",
        );
        assert_eq!(simplified, "reqwest-0.12.8/src/lib.rs");
    }

    #[test]
    fn simplifies_project_paths() {
        let simplified = simplify_file_path("/work/chatpane/src/ai/network/stream.rs");
        assert_eq!(simplified, "src/ai/network/stream.rs");
    }
}
