//! Main controller implementation.
//!
//! Wires the Kubernetes client, the cluster client, the event publisher and
//! the reconciler together, then runs the AgentType watcher.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::KubeEventPublisher;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use cluster_client::KubeClusterClient;
use crds::AgentType;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for AgentType resources.
#[derive(Debug)]
pub struct Controller {
    agent_type_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing AgentType controller");

        let kube_client = Client::try_default().await?;

        let cluster_client = KubeClusterClient::new(kube_client.clone());
        let events = KubeEventPublisher::new(kube_client.clone(), &config.controller_name);
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(cluster_client),
            Arc::new(events),
            config.delete_wait,
        ));

        let (agent_type_api, pod_api): (Api<AgentType>, Api<Pod>) = match config.namespace.as_deref() {
            Some(ns) => (Api::namespaced(kube_client.clone(), ns), Api::namespaced(kube_client, ns)),
            None => (Api::all(kube_client.clone()), Api::all(kube_client)),
        };

        let watcher = Watcher::new(reconciler, agent_type_api, pod_api, config.concurrency);
        let agent_type_watcher = tokio::spawn(async move { watcher.watch_agent_types().await });

        Ok(Self { agent_type_watcher })
    }

    /// Runs until the watcher stops (shutdown signal) or fails.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("AgentType controller running");

        self.agent_type_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("AgentType watcher panicked: {}", e)))?
            .map_err(|e| ControllerError::Watch(format!("AgentType watcher error: {}", e)))?;

        info!("AgentType controller stopped");
        Ok(())
    }
}
