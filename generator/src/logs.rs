//! Pipeline logging.
//!
//! Leveled entries written to stderr, as indented text or as JSON lines
//! for machine consumption. The report itself never goes through here.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting level for text output
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Output format of log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Global logger
pub static LOGGER: Lazy<Logger> = Lazy::new(Logger::new);

/// Writes log entries to stderr.
pub struct Logger {
    format: AtomicU8,
    quiet: AtomicBool,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            format: AtomicU8::new(LogFormat::Text as u8),
            quiet: AtomicBool::new(false),
        }
    }

    pub fn set_format(&self, format: LogFormat) {
        self.format.store(format as u8, Ordering::Relaxed);
    }

    pub fn format(&self) -> LogFormat {
        match self.format.load(Ordering::Relaxed) {
            x if x == LogFormat::Json as u8 => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    /// Drop everything but errors.
    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    pub fn log(&self, entry: LogEntry) {
        if self.quiet.load(Ordering::Relaxed) && entry.level != LogLevel::Error {
            return;
        }
        let line = render(&entry, self.format());
        // Nothing sensible to do when stderr is gone
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry as a single output line.
pub fn render(entry: &LogEntry, format: LogFormat) -> String {
    match format {
        LogFormat::Json => serde_json::to_string(entry).unwrap_or_else(|_| entry.message.clone()),
        LogFormat::Text => {
            let prefix = match entry.level {
                LogLevel::Info => "   ",
                LogLevel::Success => "   ✓",
                LogLevel::Warning => "   ⚠️",
                LogLevel::Error => "   ❌",
            };
            let indent = "   ".repeat(entry.indent as usize);
            format!("{}{} {}", indent, prefix, entry.message)
        }
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LOGGER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOGGER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOGGER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOGGER.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOGGER.log(LogEntry::info(msg).with_indent(indent));
}
