//! Error types for rebranch-remote

use thiserror::Error;

/// Message the service attaches to writes blocked by an existing policy.
pub const POLICY_REJECTION_MESSAGE: &str = "The update is rejected by policy.";

/// Errors returned by the remote Git, build and policy services
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Credentials missing, expired or lacking the required scope
    #[error("Authorization failed: {0}")]
    Unauthorized(String),

    /// A write was refused by a branch policy
    #[error("Rejected by policy: {0}")]
    PolicyRejected(String),

    /// Requested object does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Compare-and-swap ref update failed
    #[error("Ref update rejected for {name}: {status}")]
    RefUpdateRejected { name: String, status: String },

    /// Any other non-success response
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Payload could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl RemoteError {
    /// Convenience constructor for `NotFound`.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        RemoteError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Whether this error stems from missing or insufficient credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RemoteError::Unauthorized(_))
    }

    /// Whether a branch policy blocked the write.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, RemoteError::PolicyRejected(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Serialization(err.to_string())
    }
}
