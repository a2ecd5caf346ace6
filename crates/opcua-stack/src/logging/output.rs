// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging output backends (console and file).

use crate::types::DateTime;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Log level enumeration for filtering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warning => "WARN ",
            Self::Error => "ERROR",
        }
    }

    pub(crate) fn to_filter(self) -> log::LevelFilter {
        match self {
            Self::Debug => log::LevelFilter::Trace,
            Self::Info => log::LevelFilter::Info,
            Self::Warning => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace | log::Level::Debug => Self::Debug,
            log::Level::Info => Self::Info,
            log::Level::Warn => Self::Warning,
            log::Level::Error => Self::Error,
        }
    }
}

/// Output destination for log messages.
pub trait Output: Send + Sync {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()>;

    fn flush(&self) -> io::Result<()>;
}

/// Writes to stderr with a level prefix.
pub struct ConsoleOutput {
    level_filter: LogLevel,
}

impl ConsoleOutput {
    pub fn new(level_filter: LogLevel) -> Self {
        Self { level_filter }
    }
}

impl Output for ConsoleOutput {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        if level < self.level_filter {
            return Ok(());
        }
        eprintln!("[{}] {}", level.as_str(), message);
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Appends to a file (truncated on creation). Lines start with the Unix
/// time in seconds and milliseconds.
pub struct FileOutput {
    file: Mutex<std::fs::File>,
    level_filter: LogLevel,
}

impl FileOutput {
    pub fn new<P: AsRef<Path>>(path: P, level_filter: LogLevel) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            level_filter,
        })
    }
}

impl Output for FileOutput {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        if level < self.level_filter {
            return Ok(());
        }
        let now = DateTime::now();
        let millis = (now.ticks() / 10_000).rem_euclid(1000);
        let mut file = self.file.lock();
        writeln!(
            file,
            "{}.{:03} [{}] {}",
            now.unix_seconds(),
            millis,
            level.as_str(),
            message
        )
    }

    fn flush(&self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_console_output() {
        let output = ConsoleOutput::new(LogLevel::Info);
        assert!(output.write(LogLevel::Error, "test").is_ok());
        assert!(output.flush().is_ok());
    }

    #[test]
    fn test_file_output_level_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.log");
        let output = FileOutput::new(&path, LogLevel::Warning).unwrap();
        output.write(LogLevel::Debug, "dropped").unwrap();
        output.write(LogLevel::Warning, "kept").unwrap();
        output.flush().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("dropped"));
        assert!(text.contains("[WARN ] kept"));
    }
}
