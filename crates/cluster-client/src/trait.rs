//! ClusterClient trait for mocking
//!
//! This trait abstracts the handful of Kubernetes API calls the agent
//! controller makes, so reconciliation can be unit tested against
//! `MockClusterClient` instead of a live API server.

use crate::error::ClusterError;
use k8s_openapi::api::core::v1::Pod;

/// Trait for the Kubernetes object API operations used by the controller
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    /// Create a Pod; returns the object as stored by the API server
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError>;

    /// Delete a Pod; `ClusterError::NotFound` when it does not exist
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// Read a Pod; `ClusterError::NotFound` when it does not exist
    async fn read_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError>;

    /// Merge-patch the status subresource of a namespaced custom resource.
    ///
    /// `patch` is the full merge-patch body, i.e. `{"status": {...}}`.
    async fn patch_custom_resource_status(
        &self,
        group: &str,
        version: &str,
        namespace: &str,
        plural: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ClusterError>;
}
