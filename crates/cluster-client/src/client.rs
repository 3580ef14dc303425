//! Kubernetes-backed cluster client
//!
//! Implements `ClusterClientTrait` on top of `kube::Api`. Pods go through the
//! typed core/v1 API; custom resource status goes through `DynamicObject` so
//! the client does not depend on the CRD crate.

use crate::error::ClusterError;
use crate::cluster_trait::ClusterClientTrait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use kube::discovery::ApiResource;
use kube::Client;
use tracing::debug;

/// Cluster client backed by a `kube::Client`
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Wrap an existing kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from in-cluster config or the local kubeconfig
    pub async fn try_default() -> Result<Self, ClusterError> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for KubeClusterClient {
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError> {
        let name = pod.metadata.name.as_deref().unwrap_or_default();
        debug!("Creating Pod {}/{}", namespace, name);
        self.pods(namespace)
            .create(&PostParams::default(), pod)
            .await
            .map_err(|e| ClusterError::from_kube(e, &format!("pod {namespace}/{name}")))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        debug!("Deleting Pod {}/{}", namespace, name);
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::from_kube(e, &format!("pod {namespace}/{name}")))
    }

    async fn read_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError> {
        self.pods(namespace)
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, &format!("pod {namespace}/{name}")))
    }

    async fn patch_custom_resource_status(
        &self,
        group: &str,
        version: &str,
        namespace: &str,
        plural: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ClusterError> {
        // Status patches only need the URL path, which is built from
        // group/version/plural; kind is not part of it.
        let resource = ApiResource {
            group: group.to_string(),
            version: version.to_string(),
            api_version: format!("{group}/{version}"),
            kind: String::new(),
            plural: plural.to_string(),
        };
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &resource);
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::from_kube(e, &format!("{plural}.{group} {namespace}/{name}")))
    }
}
