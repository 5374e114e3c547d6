//! Error types for the snapshot cache.

use crate::fetch::FetchError;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
///
/// `NotFound` and `Conflict` are expected outcomes under normal operation,
/// not exceptional ones: a miss on an unknown coordinate is how every lineage
/// starts, and a conflict is how a losing concurrent writer learns that the
/// coordinate is already taken.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The (key, bucket) coordinate does not exist.
    #[error("bucket not found: {key}@{bucket}")]
    NotFound { key: String, bucket: String },

    /// The write-once coordinate is already occupied.
    #[error("bucket already exists: {key}@{bucket}")]
    Conflict { key: String, bucket: String },

    /// The bucket label sorts strictly before the latest existing bucket.
    /// Signals a stale or incorrect label from the caller; never retried.
    #[error("bucket '{attempted}' for {key} sorts before latest '{latest}'")]
    OrderViolation {
        key: String,
        attempted: String,
        latest: String,
    },

    /// The external fetch collaborator failed. Propagated unchanged; retry
    /// and backoff policy belong to the collaborator or the caller.
    #[error("fetch failed for {resource}")]
    Fetch {
        resource: String,
        #[source]
        source: FetchError,
    },

    /// A bucket that should exist could not be read back intact.
    #[error("store corruption at {key}@{bucket}: {message}")]
    Corruption {
        key: String,
        bucket: String,
        message: String,
    },

    /// Underlying storage I/O failure.
    #[error("store I/O error: {message}")]
    Io { message: String },

    /// Invalid per-source policy configuration.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl CacheError {
    /// Returns true if this error indicates an unknown coordinate.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this error indicates a lost write race.
    /// Useful for idempotent write handling.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Suggested exit code for CLI consumers.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 2,
            Self::Conflict { .. } => 0, // Idempotent success
            Self::OrderViolation { .. } => 3,
            Self::Config { .. } => 4,
            Self::Fetch { .. } => 5,
            Self::Corruption { .. } => 6,
            Self::Io { .. } => 1,
        }
    }
}
