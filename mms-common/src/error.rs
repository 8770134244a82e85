//! Common error types for the mentorship core

use thiserror::Error;

/// Common result type for MMS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every component
///
/// Validation, not-found and conflict errors fail fast to the immediate
/// caller. Sync and archival errors are scoped to one meeting or one document
/// and are reported in aggregate by the engines that produce them.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed identifier, out-of-range semester, bad time format
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced mentor, mentee, session or document is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write would violate a uniqueness rule in a way that is not an upsert
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Projection refresh failed for a single meeting
    #[error("Sync error: {0}")]
    Sync(String),

    /// Relocation of a single document into the historical store failed
    #[error("Archival error: {0}")]
    Archival(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Document (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for transport/storage-layer outages that abort a whole batch
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Io(_))
    }

    /// True when the database reported lock contention
    pub fn is_lock_contention(&self) -> bool {
        match self {
            // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
            Error::Database(db_err) => match db_err.as_database_error().and_then(|e| e.code()) {
                Some(code) => matches!(code.as_ref(), "5" | "6" | "261" | "262" | "517"),
                None => db_err.to_string().contains("database is locked"),
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_failure_classification() {
        assert!(Error::Io(std::io::Error::other("disk")).is_storage_failure());
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_storage_failure());
        assert!(!Error::Validation("bad".into()).is_storage_failure());
        assert!(!Error::NotFound("x".into()).is_storage_failure());
    }

    #[test]
    fn test_display_names_the_kind() {
        let err = Error::NotFound("mentor MUJ00001".to_string());
        assert_eq!(err.to_string(), "Not found: mentor MUJ00001");
    }
}
