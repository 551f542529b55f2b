//! Remote-call error types.

use thiserror::Error;

/// Errors returned by control-plane API calls.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure: connect, TLS, or the per-call timeout.
    #[error("request failed: {0}")]
    Transport(String),

    /// The control plane answered with a non-success envelope.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// True when the envelope reported 404. Delete treats this as
    /// idempotent success.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Api { status: 404, .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Result type for remote calls.
pub type Result<T> = std::result::Result<T, RemoteError>;
