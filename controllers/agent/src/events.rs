//! Events emitted while reconciling AgentTypes.
//!
//! A failed publish is only logged. Errors go out as `Warning`, everything
//! else as `Normal`.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// One Event about an AgentType
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEvent {
    pub warning: bool,
    pub reason: &'static str,
    pub action: &'static str,
    pub note: Option<String>,
}

impl AgentEvent {
    pub fn normal(reason: &'static str, action: &'static str, note: impl Into<String>) -> Self {
        Self {
            warning: false,
            reason,
            action,
            note: Some(note.into()),
        }
    }

    pub fn warning(reason: &'static str, action: &'static str, note: impl Into<String>) -> Self {
        Self {
            warning: true,
            ..Self::normal(reason, action, note)
        }
    }
}

impl From<AgentEvent> for Event {
    fn from(event: AgentEvent) -> Self {
        Event {
            type_: if event.warning { EventType::Warning } else { EventType::Normal },
            reason: event.reason.to_string(),
            note: event.note,
            action: event.action.to_string(),
            secondary: None,
        }
    }
}

/// Sink for AgentType Events; the reconciler never waits on the outcome
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, target: &ObjectReference, event: AgentEvent);
}

/// Writes Events to the API server through a kube `Recorder`
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventPublisher").finish_non_exhaustive()
    }
}

impl KubeEventPublisher {
    /// Events are attributed to `controller_name` (`reportingComponent`)
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, target: &ObjectReference, event: AgentEvent) {
        let reason = event.reason;
        if let Err(e) = self.recorder.publish(&event.into(), target).await {
            warn!(
                "Failed to record {} event on {}/{}: {}",
                reason,
                target.namespace.as_deref().unwrap_or_default(),
                target.name.as_deref().unwrap_or_default(),
                e
            );
        }
    }
}

/// Event reasons, shown in the REASON column of `kubectl get events`
pub mod reasons {
    /// Pod created for the AgentType
    pub const POD_CREATED: &str = "PodCreated";
    /// Previous Pod deleted before recreating
    pub const POD_REPLACED: &str = "PodReplaced";
    /// Pod creation failed
    pub const POD_CREATE_FAILED: &str = "PodCreateFailed";
    /// Previous Pod did not go away in time
    pub const POD_DELETE_TIMEOUT: &str = "PodDeleteTimeout";
    /// Previous Pod could not be deleted
    pub const POD_DELETE_FAILED: &str = "PodDeleteFailed";
    /// AgentType spec is invalid
    pub const VALIDATION_FAILED: &str = "ValidationFailed";
}

/// Event actions
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const CREATE_POD: &str = "CreatePod";
    pub const DELETE_POD: &str = "DeletePod";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<KubeEventPublisher>();
    }

    #[test]
    fn test_agent_event_maps_to_kube_event() {
        let event: Event = AgentEvent::warning(reasons::POD_CREATE_FAILED, actions::CREATE_POD, "denied").into();
        assert!(matches!(event.type_, EventType::Warning));
        assert_eq!(event.reason, "PodCreateFailed");
        assert_eq!(event.action, "CreatePod");
        assert_eq!(event.note.as_deref(), Some("denied"));

        let event: Event = AgentEvent::normal(reasons::POD_CREATED, actions::CREATE_POD, "ok").into();
        assert!(matches!(event.type_, EventType::Normal));
    }

    #[test]
    fn test_reasons_are_pascal_case() {
        for reason in [
            reasons::POD_CREATED,
            reasons::POD_REPLACED,
            reasons::POD_CREATE_FAILED,
            reasons::POD_DELETE_TIMEOUT,
            reasons::POD_DELETE_FAILED,
            reasons::VALIDATION_FAILED,
        ] {
            assert!(reason.chars().next().is_some_and(char::is_uppercase), "{reason}");
            assert!(!reason.contains(['_', '-', ' ']), "{reason}");
        }
    }
}
