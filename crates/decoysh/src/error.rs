//! Error types for decoysh
//!
//! This module provides error types for the simulation core with the following design goals:
//! - Nothing here ever reaches the remote party verbatim
//! - Clear categorization for programmatic handling
//! - "Absent" is modelled with `Option`, not with an error variant

use thiserror::Error;

/// Result type alias using decoysh's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// decoysh error types.
///
/// Dispatch never returns these; they surface from the supporting
/// infrastructure (audit log, transcripts) and are logged. Path and
/// backend failures keep their own types, `PathError` and `BackendError`.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from audit, transcript, or scenario file operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error for unexpected failures (blocking task died, lock poisoned).
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let err: Error = std::io::Error::other("disk full").into();
        assert_eq!(err.to_string(), "io error: disk full");

        let err: Error = serde_json::from_str::<u32>("x").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));

        let err = Error::Internal("log lock poisoned".to_string());
        assert_eq!(err.to_string(), "internal error: log lock poisoned");
    }
}
