//! Error types for remote datastore access.

use thiserror::Error;

/// A failed call against the remote tabular datastore.
///
/// Any `RemoteError` raised while paginating aborts the whole fetch; the
/// records already retrieved for that invocation are discarded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The server answered with a non-2xx HTTP status.
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// The response envelope carried `success: false`.
    #[error("datastore reported failure: {reason}")]
    Unsuccessful { reason: String },

    /// The request never produced a response (connect, timeout, TLS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be interpreted as a datastore envelope.
    #[error("malformed response: {0}")]
    Malformed(String),
}
