//! Kubernetes resource watcher.
//!
//! Watches AgentType resources and drives reconciliation through
//! `kube_runtime::Controller`, which handles reconnects, debouncing and at
//! most one concurrent reconcile per object. Pods carrying the `managed-by`
//! label are watched as owned objects so phase changes reach their AgentType.

use crate::error::ControllerError;
use crate::pod::MANAGED_BY;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crds::AgentType;
use k8s_openapi::api::core::v1::Pod;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::{controller::{Action, Config as ControllerConfig}, watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Map a reconcile outcome to the next controller action
fn next_action(outcome: &ReconcileOutcome) -> Action {
    match outcome {
        ReconcileOutcome::Created { .. } | ReconcileOutcome::UpToDate => Action::await_change(),
        ReconcileOutcome::Deferred(delay) => Action::requeue(*delay),
    }
}

/// Error policy: invalid specs wait for an edit, everything else backs off
fn error_policy(agent: Arc<AgentType>, error: &ControllerError, reconciler: Arc<Reconciler>) -> Action {
    let resource_key = format!(
        "{}/{}",
        agent.namespace().unwrap_or_else(|| "default".to_string()),
        agent.name_any()
    );
    if error.is_permanent() {
        warn!("AgentType {} will not be retried until it changes: {}", resource_key, error);
        return Action::await_change();
    }

    let delay = reconciler.schedule_retry(&resource_key, agent.metadata.generation);
    error!("Reconciliation error for AgentType {}: {} (retry in {:?})", resource_key, error, delay);
    Action::requeue(delay)
}

/// Label selector matching the Pods this controller creates
fn owned_pod_selector() -> String {
    format!("managed-by={}", MANAGED_BY)
}

async fn watch_resource(
    api: Api<AgentType>,
    pod_api: Api<Pod>,
    reconciler: Arc<Reconciler>,
    concurrency: u16,
) -> Result<(), ControllerError> {
    info!("Starting AgentType watcher");

    let reconcile = |agent: Arc<AgentType>, ctx: Arc<Reconciler>| async move {
        debug!("Reconciling AgentType {}", agent.name_any());
        ctx.reconcile_agent_type(&agent).await.map(|outcome| next_action(&outcome))
    };

    // Debounce batches the status and Pod events our own writes cause
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(concurrency);

    Controller::new(api, watcher::Config::default())
        .owns(pod_api, watcher::Config::default().labels(&owned_pod_selector()))
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled AgentType {}", obj.name),
                Err(e) => debug!("AgentType controller event: {}", e),
            }
        })
        .await;

    Ok(())
}

/// Watches AgentType resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    agent_type_api: Api<AgentType>,
    pod_api: Api<Pod>,
    concurrency: u16,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        reconciler: Arc<Reconciler>,
        agent_type_api: Api<AgentType>,
        pod_api: Api<Pod>,
        concurrency: u16,
    ) -> Self {
        Self {
            reconciler,
            agent_type_api,
            pod_api,
            concurrency,
        }
    }

    /// Watches AgentType resources until the controller stream ends.
    pub async fn watch_agent_types(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.agent_type_api.clone(),
            self.pod_api.clone(),
            self.reconciler.clone(),
            self.concurrency,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_outcomes_wait_for_changes() {
        assert_eq!(next_action(&ReconcileOutcome::UpToDate), Action::await_change());
        let created = ReconcileOutcome::Created {
            pod_name: "a-pod".to_string(),
            pod_uid: None,
        };
        assert_eq!(next_action(&created), Action::await_change());
    }

    #[test]
    fn test_owned_pods_selected_by_managed_by_label() {
        assert_eq!(owned_pod_selector(), "managed-by=agent-operator");
    }

    #[test]
    fn test_deferred_outcome_requeues_after_remaining_delay() {
        let action = next_action(&ReconcileOutcome::Deferred(Duration::from_secs(42)));
        assert_eq!(action, Action::requeue(Duration::from_secs(42)));
    }
}
