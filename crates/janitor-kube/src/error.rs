//! Error types for janitor-kube

use thiserror::Error;

/// Result type for janitor-kube operations
pub type Result<T> = std::result::Result<T, JanitorError>;

/// Errors that abort a clean-up cycle.
///
/// Most failures inside a cycle (a single kind that cannot be listed, a
/// failed event or delete) are logged and absorbed where they happen;
/// only errors that make the rest of the cycle meaningless are raised.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JanitorError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Listed object has no metadata.name
    #[error("object has no metadata.name")]
    MissingName,

    /// Listed object could not be converted to a raw object tree
    #[error("invalid object: {0}")]
    InvalidObject(String),
}
