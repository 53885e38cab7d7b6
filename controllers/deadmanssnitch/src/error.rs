//! Controller-specific error types.
//!
//! `ControllerError` carries what went wrong; `ReconcileError` tags it as
//! retryable or permanent so the error policy can pick a requeue strategy.

use dms_client::DmsError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Dead Man's Snitch Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Optimistic concurrency conflict on a write (HTTP 409)
    #[error("Write conflict on {0}")]
    Conflict(String),

    /// Dead Man's Snitch API error
    #[error("Dead Man's Snitch error: {0}")]
    Dms(#[from] DmsError),

    /// Malformed ClusterDeployment selector on an integration
    #[error("Invalid ClusterDeployment selector: {0}")]
    InvalidSelector(String),

    /// API key secret or key inside it not found
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Installed ClusterDeployment without a cluster id
    #[error("ClusterDeployment {0} has no cluster id")]
    MissingClusterId(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics/probe server failed
    #[error("Server error: {0}")]
    Server(String),
}

impl ControllerError {
    /// Whether retrying without a change to the inputs can never succeed
    pub fn is_permanent(&self) -> bool {
        match self {
            ControllerError::Kube(_) | ControllerError::Conflict(_) => false,
            ControllerError::Dms(e) => matches!(e, DmsError::Authentication(_)),
            ControllerError::InvalidSelector(_)
            | ControllerError::MissingCredential(_)
            | ControllerError::MissingClusterId(_)
            | ControllerError::InvalidConfig(_) => true,
            ControllerError::Watch(_) | ControllerError::Server(_) => false,
        }
    }
}

/// Outcome of a failed reconciliation pass
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Transient; requeue with backoff
    #[error("retryable: {cause}")]
    Retryable { cause: ControllerError },

    /// Needs a change to the integration, a secret or a cluster to resolve
    #[error("permanent: {cause}")]
    Permanent { cause: ControllerError },
}

impl ReconcileError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, ReconcileError::Permanent { .. })
    }

    /// Label used for the error metric
    pub fn class(&self) -> &'static str {
        match self {
            ReconcileError::Retryable { .. } => "retryable",
            ReconcileError::Permanent { .. } => "permanent",
        }
    }
}

impl From<ControllerError> for ReconcileError {
    fn from(cause: ControllerError) -> Self {
        if cause.is_permanent() {
            ReconcileError::Permanent { cause }
        } else {
            ReconcileError::Retryable { cause }
        }
    }
}
