//! Error types shared by every migrator backend.

use std::fmt;

use thiserror::Error;

/// Result type alias for migrator operations.
pub type MigratorResult<T> = Result<T, MigratorError>;

/// Errors that can occur while fingerprinting, applying or verifying migrations.
#[derive(Debug, Error)]
pub enum MigratorError {
    /// Reading a migration source failed.
    #[error("failed to read '{path}': {source}")]
    Io {
        /// Path that could not be read or listed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid glob pattern.
    #[error("invalid pattern: {0}")]
    Pattern(String),

    /// The external program could not be started.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        /// Program name or path.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The external program exited unsuccessfully.
    #[error("'{program}' failed ({status}): {stderr}")]
    CommandFailed {
        /// Program name or path.
        program: String,
        /// Exit status description.
        status: String,
        /// Captured diagnostic output.
        stderr: String,
    },

    /// The external program was terminated because the caller cancelled.
    #[error("'{program}' was cancelled")]
    Cancelled {
        /// Program name or path.
        program: String,
    },

    /// The external program exceeded its deadline and was terminated.
    #[error("'{program}' timed out after {timeout_ms}ms")]
    TimedOut {
        /// Program name or path.
        program: String,
        /// Deadline in milliseconds.
        timeout_ms: u64,
    },

    /// Database operation error.
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A single migration failed to apply.
    #[error("migration '{id}' failed: {source}")]
    MigrationFailed {
        /// Migration identifier or path.
        id: String,
        /// Underlying database error.
        #[source]
        source: tokio_postgres::Error,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid migration file or content.
    #[error("invalid migration: {0}")]
    InvalidMigration(String),

    /// One or more post-migration consistency checks failed.
    #[error("{0}")]
    Verification(VerificationErrors),
}

impl MigratorError {
    /// Create an I/O error for a path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid migration error.
    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Check if this error came from a failed verification.
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification(_))
    }

    /// Check if this error came from an external program.
    pub fn is_command_error(&self) -> bool {
        matches!(
            self,
            Self::Launch { .. }
                | Self::CommandFailed { .. }
                | Self::Cancelled { .. }
                | Self::TimedOut { .. }
        )
    }
}

/// Every inconsistency found by a verification pass.
///
/// Verification never stops at the first failure; all messages are kept and
/// rendered together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationErrors {
    messages: Vec<String>,
}

impl VerificationErrors {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure.
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Individual failure messages, in detection order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Number of recorded failures.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `Ok(())` when empty, otherwise a [`MigratorError::Verification`].
    pub fn into_result(self) -> MigratorResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(MigratorError::Verification(self))
        }
    }
}

impl<S: Into<String>> FromIterator<S> for VerificationErrors {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for VerificationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.messages.as_slice() {
            [] => write!(f, "verification failed"),
            [only] => write!(f, "verification failed: {}", only),
            many => {
                write!(f, "verification failed with {} errors:", many.len())?;
                for message in many {
                    write!(f, "\n  - {}", message)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = MigratorError::io(
            "db/migrations/0001_users.sql",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("0001_users.sql"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn test_command_failed_contains_stderr() {
        let err = MigratorError::CommandFailed {
            program: "atlas".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "Error: relation \"users\" already exists".to_string(),
        };
        assert!(err.is_command_error());
        assert!(err.to_string().contains("relation \"users\" already exists"));
    }

    #[test]
    fn test_verification_lists_every_message() {
        let errors: VerificationErrors = ["first problem", "second problem"].into_iter().collect();
        let err = errors.into_result().unwrap_err();

        assert!(err.is_verification());
        let msg = err.to_string();
        assert!(msg.contains("2 errors"));
        assert!(msg.contains("first problem"));
        assert!(msg.contains("second problem"));
    }

    #[test]
    fn test_empty_verification_is_ok() {
        assert!(VerificationErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_single_verification_message() {
        let mut errors = VerificationErrors::new();
        errors.push("only problem");
        assert_eq!(errors.to_string(), "verification failed: only problem");
    }
}
