//! Reconciliation of AgentType resources into Pods.
//!
//! - `agent_type`: the per-resource reconcile flow
//!
//! This module holds the shared pieces: the `Reconciler` itself, status patch
//! builders and per-resource retry tracking.

pub mod agent_type;

use crate::backoff::FibonacciBackoff;
use crate::events::EventPublisher;
use crate::wait::DeleteWait;
use chrono::{SecondsFormat, Utc};
use cluster_client::ClusterClientTrait;
use crds::{AgentCondition, AgentPhase, AgentTypeStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Condition type: the Pod was created
pub const CONDITION_CREATED: &str = "Created";
/// Condition type: the Pod is running
pub const CONDITION_READY: &str = "Ready";

/// Condition reasons
pub mod condition_reasons {
    pub const POD_CREATED: &str = "PodCreated";
    pub const POD_RUNNING: &str = "PodRunning";
    pub const POD_PENDING: &str = "PodPending";
    pub const POD_CREATE_FAILED: &str = "PodCreateFailed";
    pub const POD_DELETE_TIMEOUT: &str = "PodDeleteTimeout";
    pub const POD_DELETE_FAILED: &str = "PodDeleteFailed";
    pub const INVALID_CONFIGURATION: &str = "InvalidConfiguration";
}

/// Result of a successful reconcile call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A fresh Pod was created
    Created {
        pod_name: String,
        pod_uid: Option<String>,
    },
    /// This generation was already handled
    UpToDate,
    /// Still backing off from a transient failure; try again after the delay
    Deferred(Duration),
}

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
    /// Not reconciled again before this instant
    retry_at: Option<Instant>,
    /// Generation that failed; a spec change lifts the deferral
    failed_generation: Option<i64>,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::default(),
            error_count: 0,
            retry_at: None,
            failed_generation: None,
        }
    }

    fn reset(&mut self) {
        self.backoff.reset();
        self.error_count = 0;
        self.retry_at = None;
        self.failed_generation = None;
    }
}

/// Reconciles AgentType resources.
pub struct Reconciler {
    pub(crate) client: Arc<dyn ClusterClientTrait>,
    pub(crate) events: Arc<dyn EventPublisher>,
    pub(crate) delete_wait: DeleteWait,
    /// Error tracking per resource (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("delete_wait", &self.delete_wait)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        client: Arc<dyn ClusterClientTrait>,
        events: Arc<dyn EventPublisher>,
        delete_wait: DeleteWait,
    ) -> Self {
        Self {
            client,
            events,
            delete_wait,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Status patch marking the start of a reconciliation.
    ///
    /// Only `phase` is sent so the rest of the status survives the merge.
    pub(crate) fn reconciling_status_patch() -> serde_json::Value {
        serde_json::json!({
            "status": {
                "phase": AgentPhase::Reconciling.as_str(),
            }
        })
    }

    /// Status patch for a created Pod
    pub(crate) fn succeeded_status_patch(
        pod_name: &str,
        pod_namespace: &str,
        pod_uid: Option<&str>,
        conditions: &[AgentCondition],
        observed_generation: Option<i64>,
    ) -> serde_json::Value {
        serde_json::json!({
            "status": {
                "phase": AgentPhase::Succeeded.as_str(),
                "podName": pod_name,
                "podNamespace": pod_namespace,
                "podUid": pod_uid,
                "conditions": conditions,
                "error": null,
                "observedGeneration": observed_generation,
            }
        })
    }

    /// Status patch for a failed reconciliation.
    ///
    /// `observedGeneration` is only written when the failure is final for
    /// this generation; otherwise the key is left out so the generation is
    /// retried.
    pub(crate) fn failed_status_patch(
        error: &str,
        conditions: &[AgentCondition],
        observed_generation: Option<i64>,
    ) -> serde_json::Value {
        let mut patch = serde_json::json!({
            "status": {
                "phase": AgentPhase::Failed.as_str(),
                "podName": null,
                "podNamespace": null,
                "podUid": null,
                "conditions": conditions,
                "error": error,
            }
        });
        if let Some(generation) = observed_generation {
            patch["status"]["observedGeneration"] = serde_json::json!(generation);
        }
        patch
    }

    /// Status patch replacing only the condition list
    pub(crate) fn conditions_status_patch(conditions: &[AgentCondition]) -> serde_json::Value {
        serde_json::json!({
            "status": {
                "conditions": conditions,
            }
        })
    }

    /// `Ready` condition for a Pod in the given phase
    pub(crate) fn ready_condition(phase: Option<&str>, previous: Option<&AgentTypeStatus>) -> AgentCondition {
        match phase {
            Some("Running") => {
                Self::condition(CONDITION_READY, true, condition_reasons::POD_RUNNING, "Pod is running", previous)
            }
            other => Self::condition(
                CONDITION_READY,
                false,
                condition_reasons::POD_PENDING,
                format!("Pod phase is {}", other.unwrap_or("Unknown")),
                previous,
            ),
        }
    }

    /// Build a condition, keeping `lastTransitionTime` from `previous` when
    /// the condition's status did not change.
    pub(crate) fn condition(
        type_: &str,
        status: bool,
        reason: &str,
        message: impl Into<String>,
        previous: Option<&AgentTypeStatus>,
    ) -> AgentCondition {
        let status = if status { "True" } else { "False" };
        let last_transition_time = previous
            .and_then(|s| s.conditions.iter().find(|c| c.type_ == type_))
            .filter(|c| c.status == status)
            .map_or_else(
                || Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                |c| c.last_transition_time.clone(),
            );
        AgentCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            last_transition_time,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    /// Merge-patch the AgentType status. Failures are logged, not returned.
    pub(crate) async fn patch_agent_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) {
        if let Err(e) = self
            .client
            .patch_custom_resource_status(crds::GROUP, crds::VERSION, namespace, crds::PLURAL, name, patch)
            .await
        {
            warn!("Failed to update AgentType {}/{} status: {}", namespace, name, e);
        }
    }

    /// Remaining backoff for a resource that failed at this generation
    pub fn pending_retry(&self, resource_key: &str, generation: Option<i64>) -> Option<Duration> {
        let states = match self.backoff_states.lock() {
            Ok(states) => states,
            Err(e) => {
                warn!("Failed to lock backoff_states: {}", e);
                return None;
            }
        };
        let state = states.get(resource_key)?;
        if state.failed_generation != generation {
            return None;
        }
        let remaining = state.retry_at?.checked_duration_since(Instant::now())?;
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Record a transient failure and return how long to wait before retrying
    pub fn schedule_retry(&self, resource_key: &str, generation: Option<i64>) -> Duration {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(BackoffState::new);
                state.error_count += 1;
                let delay = state.backoff.next_delay();
                state.retry_at = Some(Instant::now() + delay);
                state.failed_generation = generation;
                debug!(
                    "AgentType {} failed {} time(s), retrying in {:?}",
                    resource_key, state.error_count, delay
                );
                delay
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                Duration::from_secs(60)
            }
        }
    }

    /// Forget failures for a resource (on successful reconciliation)
    pub fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_reconciler;

    #[test]
    fn test_failed_patch_omits_generation_for_transient_errors() {
        let patch = Reconciler::failed_status_patch("timeout", &[], None);
        assert_eq!(patch["status"]["phase"], "Failed");
        assert!(patch["status"].get("observedGeneration").is_none());
        assert!(patch["status"]["podName"].is_null());

        let patch = Reconciler::failed_status_patch("bad image", &[], Some(3));
        assert_eq!(patch["status"]["observedGeneration"], 3);
    }

    #[test]
    fn test_condition_keeps_transition_time_when_status_unchanged() {
        let previous = AgentTypeStatus {
            conditions: vec![AgentCondition {
                type_: CONDITION_CREATED.to_string(),
                status: "False".to_string(),
                last_transition_time: "2024-01-01T00:00:00Z".to_string(),
                reason: condition_reasons::POD_CREATE_FAILED.to_string(),
                message: "boom".to_string(),
            }],
            ..Default::default()
        };

        let same = Reconciler::condition(CONDITION_CREATED, false, "PodCreateFailed", "again", Some(&previous));
        assert_eq!(same.last_transition_time, "2024-01-01T00:00:00Z");
        assert_eq!(same.message, "again");

        let flipped = Reconciler::condition(CONDITION_CREATED, true, "PodCreated", "ok", Some(&previous));
        assert_ne!(flipped.last_transition_time, "2024-01-01T00:00:00Z");
        assert!(flipped.last_transition_time.ends_with('Z'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_follows_fibonacci_and_resets() {
        let (reconciler, _, _) = test_reconciler();

        assert_eq!(reconciler.schedule_retry("default/a", Some(1)), Duration::from_secs(60));
        assert_eq!(reconciler.schedule_retry("default/a", Some(1)), Duration::from_secs(60));
        assert_eq!(reconciler.schedule_retry("default/a", Some(1)), Duration::from_secs(120));

        reconciler.reset_error("default/a");
        assert!(reconciler.pending_retry("default/a", Some(1)).is_none());
        assert_eq!(reconciler.schedule_retry("default/a", Some(1)), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_retry_expires_and_ignores_new_generation() {
        let (reconciler, _, _) = test_reconciler();
        reconciler.schedule_retry("default/a", Some(1));

        assert_eq!(reconciler.pending_retry("default/a", Some(1)), Some(Duration::from_secs(60)));
        assert!(reconciler.pending_retry("default/a", Some(2)).is_none());
        assert!(reconciler.pending_retry("default/b", Some(1)).is_none());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(reconciler.pending_retry("default/a", Some(1)).is_none());
    }
}
