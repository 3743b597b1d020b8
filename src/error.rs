//! Error types for deltarepo

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for deltarepo operations
#[derive(Error, Debug)]
pub enum DeltaRepoError {
    #[error("parse error in {location}: {reason}")]
    Parse { location: String, reason: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not a delta repository: {0}")]
    NotADeltaRepository(PathBuf),

    #[error("not a repository: {0}")]
    NotARepository(PathBuf),

    #[error("no path found from {source_hash} to {target_hash}")]
    Unreachable {
        source_hash: String,
        target_hash: String,
    },

    #[error("source and target snapshots are identical: {0}")]
    IdenticalEndpoints(String),

    #[error("unknown content-hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("bad compression argument: {0}")]
    BadCompression(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("unknown plugin: {name} {version}")]
    UnknownPlugin { name: String, version: String },

    #[error("repository metadata error: {0}")]
    Repomd(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for deltarepo operations
pub type Result<T> = std::result::Result<T, DeltaRepoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeltaRepoError::Parse {
            location: "deltarepos/A-B".to_string(),
            reason: "missing location href".to_string(),
        };
        assert!(err.to_string().contains("deltarepos/A-B"));

        let err = DeltaRepoError::IdenticalEndpoints("abc123".to_string());
        assert!(err.to_string().contains("abc123"));

        let err = DeltaRepoError::Unreachable {
            source_hash: "a".to_string(),
            target_hash: "b".to_string(),
        };
        assert!(err.to_string().contains('a'));
        assert!(err.to_string().contains('b'));

        let err = DeltaRepoError::ChecksumMismatch {
            expected: "deadbeef".to_string(),
            actual: "feedface".to_string(),
        };
        assert!(err.to_string().contains("deadbeef"));
        assert!(err.to_string().contains("feedface"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DeltaRepoError = io_err.into();
        assert!(matches!(err, DeltaRepoError::Io(_)));
    }
}
