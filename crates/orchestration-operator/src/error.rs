//! Error types for the OrchestrationCluster operator

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during operator operations
#[derive(Error, Debug)]
pub enum OperatorError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// The OrchestrationCluster being reconciled no longer exists
    #[error("OrchestrationCluster not found: {0}")]
    ClusterNotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The declared version is not a semantic version
    #[error("invalid version format: {0}")]
    InvalidVersionFormat(String),

    /// A registered version range could not be parsed
    #[error("invalid version constraint: {0}")]
    InvalidVersionConstraint(String),

    /// No registered version range accepts the declared version
    #[error("no strategy found for version {0}")]
    NoStrategyFound(String),

    /// Creating or updating a managed resource failed
    #[error("failed to apply {kind}/{name}: {reason}")]
    ApplyFailed {
        kind: String,
        name: String,
        reason: String,
    },

    /// Optimistic concurrency conflict that survived the single retry
    #[error("write conflict on {0}")]
    Conflict(String),

    /// No service exposing the management port was found
    #[error("no management service found for cluster {0}")]
    ServiceNotFound(String),

    /// Querying the cluster topology failed
    #[error("topology query failed: {0}")]
    TopologyQueryError(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Result type for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OperatorError::KubeError(_)
                | OperatorError::ClusterNotFound(_)
                | OperatorError::ApplyFailed { .. }
                | OperatorError::Conflict(_)
                | OperatorError::Timeout(_)
        )
    }

    /// Get a suggested requeue delay for retryable errors
    pub fn requeue_delay(&self) -> Option<Duration> {
        match self {
            // Conflicts usually clear as soon as the informer cache catches up
            OperatorError::Conflict(_) => Some(Duration::from_secs(5)),
            _ if self.is_retryable() => Some(Duration::from_secs(30)),
            _ => None,
        }
    }

    /// Whether the error belongs to the health-evaluation path.
    ///
    /// Health errors are logged by the reconciler but never fail the cycle.
    pub fn is_health_error(&self) -> bool {
        matches!(
            self,
            OperatorError::ServiceNotFound(_) | OperatorError::TopologyQueryError(_)
        )
    }
}
