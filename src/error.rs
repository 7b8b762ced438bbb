//! Error types for the taos-cursor binding.
//!
//! Translates native error codes and messages into one typed error with
//! three kinds: programming (usage), operational (sequencing), and database
//! (any nonzero native return).

use std::backtrace::Backtrace;
use std::fmt::{Display, Formatter};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TaosError>;

/// Error type for taos-cursor operations.
///
/// Contains contextual information about the error including backtrace
/// for debugging callback-driven async paths.
#[derive(Debug)]
pub struct TaosError {
    kind: ErrorKind,
    backtrace: Backtrace,
}

impl TaosError {
    /// Creates a usage error: the caller violated the API contract before
    /// any native call was made.
    pub(crate) fn programming(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Programming(msg.into()),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a sequencing error, e.g. a fetch without a prior execute.
    pub(crate) fn operational(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Operational(msg.into()),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a database error carrying the native code and error string.
    pub(crate) fn database(code: i32, msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Database {
                code,
                message: msg.into(),
            },
            backtrace: Backtrace::capture(),
        }
    }

    /// Returns the backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Returns true if this is a usage/programming error.
    pub fn is_programming(&self) -> bool {
        matches!(self.kind, ErrorKind::Programming(_))
    }

    /// Returns true if this is an operational (sequencing) error.
    pub fn is_operational(&self) -> bool {
        matches!(self.kind, ErrorKind::Operational(_))
    }

    /// Returns true if this is a database/interface error.
    pub fn is_database(&self) -> bool {
        matches!(self.kind, ErrorKind::Database { .. })
    }

    /// Returns the native error code for database errors.
    pub fn code(&self) -> Option<i32> {
        match self.kind {
            ErrorKind::Database { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl Display for TaosError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::Programming(msg) => write!(f, "Programming error: {}", msg),
            ErrorKind::Operational(msg) => write!(f, "Operational error: {}", msg),
            ErrorKind::Database { code, message } => {
                write!(f, "Database error ({}): {}", code, message)
            }
        }
    }
}

impl std::error::Error for TaosError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

#[derive(Debug)]
enum ErrorKind {
    Programming(String),
    Operational(String),
    Database { code: i32, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_programming_error() {
        let err = TaosError::programming("no statement passed");
        assert!(err.is_programming());
        assert!(!err.is_operational());
        assert!(!err.is_database());
        assert_eq!(err.code(), None);
        assert!(err.to_string().contains("Programming error"));
    }

    #[test]
    fn test_operational_error() {
        let err = TaosError::operational("fetch_all before execute");
        assert!(err.is_operational());
        assert!(!err.is_programming());
        assert_eq!(err.code(), None);
        assert!(err.to_string().contains("Operational error"));
    }

    #[test]
    fn test_database_error() {
        let err = TaosError::database(0x216, "Table does not exist");
        assert!(err.is_database());
        assert_eq!(err.code(), Some(0x216));
        let text = err.to_string();
        assert!(text.contains("Database error"));
        assert!(text.contains("Table does not exist"));
    }
}
