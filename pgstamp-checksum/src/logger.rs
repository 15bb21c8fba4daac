//! Pluggable sink for engine progress messages.

use std::fmt;

use tracing::{debug, error, info};

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// Detailed progress.
    Debug,
    /// Normal progress.
    Info,
    /// A failure.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A structured key/value attached to a log message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogField {
    /// Field name.
    pub key: &'static str,
    /// Rendered value.
    pub value: String,
}

impl LogField {
    /// Create a field.
    pub fn new(key: &'static str, value: impl fmt::Display) -> Self {
        Self {
            key,
            value: value.to_string(),
        }
    }
}

/// Receives messages from [`ChecksumEngine`](crate::ChecksumEngine).
pub trait MigrationLogger: Send + Sync + fmt::Debug {
    /// Record one message.
    fn log(&self, level: LogLevel, message: &str, fields: &[LogField]);
}

/// Forwards messages to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl MigrationLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, fields: &[LogField]) {
        let fields = Fields(fields);
        match level {
            LogLevel::Debug => debug!(%fields, "{}", message),
            LogLevel::Info => info!(%fields, "{}", message),
            LogLevel::Error => error!(%fields, "{}", message),
        }
    }
}

struct Fields<'a>(&'a [LogField]);

impl fmt::Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={}", field.key, field.value)?;
        }
        Ok(())
    }
}
