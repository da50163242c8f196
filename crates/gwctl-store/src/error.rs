//! Error types for the store adapter.

/// Errors surfaced by a [`crate::StoreAdapter`] implementation.
///
/// The adapter does not retry; every variant is a transient-or-not failure
/// that callers must handle themselves (propagate to an HTTP 500/503, log
/// and skip, etc).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The caller-supplied deadline elapsed before the operation completed.
    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    /// The underlying connection to the store is unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A lease ID referenced by a write does not exist (expired or unknown).
    #[error("unknown lease id {0}")]
    UnknownLease(i64),

    /// A watch stream terminated unexpectedly.
    #[error("watch stream closed: {0}")]
    WatchClosed(String),

    /// The backend returned malformed data that couldn't be decoded.
    #[error("malformed store response: {0}")]
    Malformed(String),
}
