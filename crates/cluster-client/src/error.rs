//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the Kubernetes API
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Transport or API error reported by kube
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object with the same name already exists
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Any other API failure (used by the mock client and for wrapped messages)
    #[error("API error: {0}")]
    Api(String),
}

impl ClusterError {
    /// Classify a kube error, turning 404 and 409 responses into typed variants
    pub fn from_kube(err: kube::Error, object: &str) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound(object.to_string()),
            kube::Error::Api(ae) if ae.code == 409 => ClusterError::Conflict(object.to_string()),
            other => ClusterError::Kube(other),
        }
    }

    /// True when the object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }
}
