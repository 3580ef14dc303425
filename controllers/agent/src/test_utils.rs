//! Test utilities for unit testing the reconciler
//!
//! This module provides helpers for creating test data and setting up test scenarios.

#[cfg(test)]
use crate::events::{AgentEvent, EventPublisher};
#[cfg(test)]
use crate::reconciler::Reconciler;
#[cfg(test)]
use crate::wait::DeleteWait;
#[cfg(test)]
use cluster_client::MockClusterClient;
#[cfg(test)]
use crds::*;
#[cfg(test)]
use k8s_openapi::api::core::v1::{ObjectReference, Pod};
#[cfg(test)]
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Helper to create a test AgentType CRD at generation 1
#[cfg(test)]
pub fn create_test_agent_type(
    name: &str,
    namespace: &str,
    image: &str,
    env: Vec<EnvVarSpec>,
    sidecar: Option<serde_json::Value>,
) -> AgentType {
    AgentType {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("{name}-uid")),
            generation: Some(1),
            ..Default::default()
        },
        spec: AgentTypeSpec {
            agent: AgentContainerSpec {
                image: image.to_string(),
                environment: (!env.is_empty()).then(|| Environment { variables: env }),
            },
            sidecar,
        },
        status: None,
    }
}

/// Helper to create a Pod as it would already exist in the cluster
#[cfg(test)]
pub fn create_test_pod(name: &str, namespace: &str, image: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("{name}-old-uid")),
            ..Default::default()
        },
        spec: Some(k8s_openapi::api::core::v1::PodSpec {
            containers: vec![k8s_openapi::api::core::v1::Container {
                name: "agent".to_string(),
                image: Some(image.to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: None,
    }
}

/// An event captured by `RecordingEventPublisher`
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

/// Event publisher that keeps every event in memory
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingEventPublisher {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

#[cfg(test)]
impl RecordingEventPublisher {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, _target: &ObjectReference, event: AgentEvent) {
        self.events.lock().unwrap().push(RecordedEvent {
            warning: event.warning,
            reason: event.reason.to_string(),
            action: event.action.to_string(),
            note: event.note,
        });
    }
}

/// Helper to create a reconciler over a mock cluster.
///
/// Returns handles to the mock cluster and the event recorder for assertions.
#[cfg(test)]
pub fn test_reconciler() -> (Reconciler, MockClusterClient, RecordingEventPublisher) {
    let client = MockClusterClient::new();
    let events = RecordingEventPublisher::default();
    let reconciler = Reconciler::new(
        Arc::new(client.clone()),
        Arc::new(events.clone()),
        DeleteWait::default(),
    );
    (reconciler, client, events)
}
