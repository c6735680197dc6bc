//! Error taxonomy for the vitals telemetry pipeline.
//!
//! Every layer — storage, transport, middleware — returns this one error
//! type instead of inventing its own. The variants name *kinds* of failure
//! (spec category, not implementation detail) so callers can branch on
//! `is_retryable()` / `is_integrity_violation()` without matching strings.
//!
//! ```
//! use vitals_core::Error;
//!
//! let err = Error::UnknownMetric { id: "Alloc".into() };
//! assert!(!err.is_retryable());
//! ```

use thiserror::Error;

/// Result type alias for vitals operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the vitals pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Request body or value failed to parse or validate.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A gauge or counter id was requested that does not exist in storage.
    #[error("unknown metric: {id}")]
    UnknownMetric {
        /// The id that was not found.
        id: String,
    },

    /// A transport-level failure (connection reset, timeout) that is safe
    /// to retry with the same payload.
    #[error("transient transport error: {0}")]
    TransientTransport(String),

    /// A storage connectivity failure (pool exhausted, connection dropped)
    /// that is safe to retry.
    #[error("transient storage error: {0}")]
    TransientStorage(String),

    /// A storage failure that retrying will not fix (schema mismatch,
    /// constraint violation). The triggering transaction has been rolled
    /// back.
    #[error("fatal storage error: {0}")]
    FatalStorage(String),

    /// HMAC mismatch, subnet rejection, or decryption failure. Never
    /// retried; always reported as a client-facing rejection.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// The operation was cancelled by the root shutdown signal. Surfaced
    /// to callers but never logged as an error.
    #[error("cancelled")]
    Cancelled,

    /// I/O error (file snapshot, socket, process memory reads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for errors whose operation is safe to retry with the same
    /// payload (transient transport/storage failures).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TransientTransport(_) | Error::TransientStorage(_)
        )
    }

    /// True for HMAC/subnet/decrypt rejections — these map to client
    /// errors (HTTP 400/403, gRPC `Aborted`/`Unavailable`) and are never
    /// retried.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Error::IntegrityViolation(_))
    }

    /// True when the operation was cut short by shutdown, not by failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
