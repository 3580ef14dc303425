//! Controller-specific error types.
//!
//! Errors are split by how the controller reacts to them:
//! - `ConfigurationError`: the AgentType spec itself is wrong. Permanent; the
//!   resource is only retried after the user changes it.
//! - everything else from the cluster (`Cluster`, `Kube`, `DeleteTimeout`):
//!   transient, retried with backoff by the watcher's error policy.

use cluster_client::ClusterError;
use kube::Error as KubeError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Kind of spec problem detected while building the Pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigErrorKind {
    /// Agent or sidecar image missing or empty
    MissingImage,
    /// A field has the wrong JSON type (e.g. sidecar is not a mapping)
    InvalidShape,
    /// `resources`, `requests` or `limits` is not a mapping, or a value is not a quantity
    InvalidResourceShape,
    /// A resource key other than `cpu` or `memory`
    InvalidResourceType,
}

impl ConfigErrorKind {
    /// PascalCase name, used as the status condition reason
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigErrorKind::MissingImage => "MissingImage",
            ConfigErrorKind::InvalidShape => "InvalidShape",
            ConfigErrorKind::InvalidResourceShape => "InvalidResourceShape",
            ConfigErrorKind::InvalidResourceType => "InvalidResourceType",
        }
    }
}

impl fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An invalid AgentType spec
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ConfigurationError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

impl ConfigurationError {
    pub fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_image(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::MissingImage, message)
    }

    pub fn invalid_shape(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::InvalidShape, message)
    }

    pub fn invalid_resource_shape(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::InvalidResourceShape, message)
    }

    pub fn invalid_resource_type(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::InvalidResourceType, message)
    }
}

/// Errors that can occur in the AgentType controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Cluster API call failed
    #[error("Cluster API error: {0}")]
    Cluster(#[from] ClusterError),

    /// AgentType spec is invalid
    #[error("Invalid AgentType spec: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Previous Pod did not disappear in time
    #[error("Timed out after {timeout:?} waiting for Pod {pod} to be deleted")]
    DeleteTimeout { pod: String, timeout: Duration },

    /// Invalid controller or resource configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Failure while reconciling a specific resource
    #[error("Reconciliation of AgentType {resource} failed: {source}")]
    Reconcile {
        resource: String,
        #[source]
        source: Box<ControllerError>,
    },
}

impl ControllerError {
    /// Attach the `namespace/name` of the resource being reconciled
    pub fn reconcile(resource: impl Into<String>, source: ControllerError) -> Self {
        ControllerError::Reconcile {
            resource: resource.into(),
            source: Box::new(source),
        }
    }

    /// Errors that retrying cannot fix without a spec change
    pub fn is_permanent(&self) -> bool {
        match self {
            ControllerError::Configuration(_) | ControllerError::InvalidConfig(_) => true,
            ControllerError::Reconcile { source, .. } => source.is_permanent(),
            _ => false,
        }
    }

    /// The underlying spec problem, if this is one
    pub fn configuration_error(&self) -> Option<&ConfigurationError> {
        match self {
            ControllerError::Configuration(e) => Some(e),
            ControllerError::Reconcile { source, .. } => source.configuration_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_permanent() {
        let err = ControllerError::from(ConfigurationError::missing_image("agent.image must be set"));
        assert!(err.is_permanent());
        assert_eq!(
            err.configuration_error().map(|e| e.kind),
            Some(ConfigErrorKind::MissingImage)
        );
    }

    #[test]
    fn test_infra_errors_are_transient() {
        let timeout = ControllerError::DeleteTimeout {
            pod: "default/a-pod".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert!(!timeout.is_permanent());

        let api = ControllerError::from(ClusterError::Api("etcd unavailable".to_string()));
        assert!(!api.is_permanent());
        assert!(api.configuration_error().is_none());
    }

    #[test]
    fn test_reconcile_wrapper_preserves_kind_and_reason() {
        let inner = ConfigurationError::invalid_resource_type("gpu is not allowed");
        let err = ControllerError::reconcile("default/agent-a", inner.into());

        assert!(err.is_permanent());
        assert_eq!(
            err.configuration_error().map(|e| e.kind),
            Some(ConfigErrorKind::InvalidResourceType)
        );
        let message = err.to_string();
        assert!(message.contains("default/agent-a"));
        assert!(message.contains("InvalidResourceType: gpu is not allowed"));
    }
}
