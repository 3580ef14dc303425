//! Mock ClusterClient for unit testing
//!
//! Stores Pods in memory and records every status patch, so reconciliation can
//! be exercised without an API server. Pod deletion can be made to lag (the Pod
//! stays readable for a number of reads, like a terminating Pod) and create or
//! status calls can be made to fail.

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A status patch captured by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPatch {
    pub group: String,
    pub version: String,
    pub namespace: String,
    pub plural: String,
    pub name: String,
    pub patch: serde_json::Value,
}

#[derive(Debug, Clone)]
struct StoredPod {
    pod: Pod,
    /// Reads left before a deleted Pod disappears; `None` while not terminating
    terminating_reads: Option<usize>,
}

#[derive(Debug, Default)]
struct CallCounts {
    create: usize,
    delete: usize,
    read: usize,
}

/// Mock ClusterClient for testing
#[derive(Debug, Clone)]
pub struct MockClusterClient {
    pods: Arc<Mutex<HashMap<(String, String), StoredPod>>>,
    status_patches: Arc<Mutex<Vec<StatusPatch>>>,
    calls: Arc<Mutex<CallCounts>>,
    deletion_lag: Arc<Mutex<usize>>,
    create_failure: Arc<Mutex<Option<String>>>,
    status_failure: Arc<Mutex<Option<String>>>,
    created_pod_phase: Arc<Mutex<String>>,
}

impl Default for MockClusterClient {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

impl MockClusterClient {
    /// Create an empty mock cluster
    pub fn new() -> Self {
        Self {
            pods: Arc::new(Mutex::new(HashMap::new())),
            status_patches: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(CallCounts::default())),
            deletion_lag: Arc::new(Mutex::new(0)),
            create_failure: Arc::new(Mutex::new(None)),
            status_failure: Arc::new(Mutex::new(None)),
            created_pod_phase: Arc::new(Mutex::new("Pending".to_string())),
        }
    }

    /// Add a Pod to the mock store (for test setup)
    pub fn add_pod(&self, pod: Pod) {
        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        let name = pod.metadata.name.clone().unwrap_or_default();
        lock(&self.pods).insert(
            key(&namespace, &name),
            StoredPod {
                pod,
                terminating_reads: None,
            },
        );
    }

    /// Number of reads a deleted Pod stays visible for (0 = removed immediately)
    pub fn set_deletion_lag(&self, reads: usize) {
        *lock(&self.deletion_lag) = reads;
    }

    /// Make every `create_pod` call fail with the given message
    pub fn fail_creates(&self, message: impl Into<String>) {
        *lock(&self.create_failure) = Some(message.into());
    }

    /// Make every status patch fail with the given message
    pub fn fail_status_patches(&self, message: impl Into<String>) {
        *lock(&self.status_failure) = Some(message.into());
    }

    /// Phase reported on Pods returned by `create_pod` (default "Pending")
    pub fn set_created_pod_phase(&self, phase: impl Into<String>) {
        *lock(&self.created_pod_phase) = phase.into();
    }

    /// Overwrite the phase of a stored Pod, as the kubelet would
    pub fn set_pod_phase(&self, namespace: &str, name: &str, phase: impl Into<String>) {
        if let Some(stored) = lock(&self.pods).get_mut(&key(namespace, name)) {
            stored.pod.status = Some(PodStatus {
                phase: Some(phase.into()),
                ..Default::default()
            });
        }
    }

    /// Remove a Pod outright, bypassing deletion lag and call counters
    pub fn delete_pod_now(&self, namespace: &str, name: &str) {
        lock(&self.pods).remove(&key(namespace, name));
    }

    /// Pod currently stored under namespace/name, including terminating Pods
    pub fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        lock(&self.pods).get(&key(namespace, name)).map(|p| p.pod.clone())
    }

    /// Number of Pods in the store
    pub fn pod_count(&self) -> usize {
        lock(&self.pods).len()
    }

    /// All status patches in call order
    pub fn status_patches(&self) -> Vec<StatusPatch> {
        lock(&self.status_patches).clone()
    }

    /// Most recent status patch
    pub fn last_status_patch(&self) -> Option<StatusPatch> {
        lock(&self.status_patches).last().cloned()
    }

    pub fn create_calls(&self) -> usize {
        lock(&self.calls).create
    }

    pub fn delete_calls(&self) -> usize {
        lock(&self.calls).delete
    }

    pub fn read_calls(&self) -> usize {
        lock(&self.calls).read
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError> {
        lock(&self.calls).create += 1;
        if let Some(message) = lock(&self.create_failure).clone() {
            return Err(ClusterError::Api(message));
        }

        let name = pod
            .metadata
            .name
            .clone()
            .ok_or_else(|| ClusterError::Api("pod name is required".to_string()))?;
        let mut pods = lock(&self.pods);
        if pods.contains_key(&key(namespace, &name)) {
            return Err(ClusterError::Conflict(format!("pod {namespace}/{name}")));
        }

        let mut created = pod.clone();
        created.metadata.namespace = Some(namespace.to_string());
        created.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        created.status = Some(PodStatus {
            phase: Some(lock(&self.created_pod_phase).clone()),
            ..Default::default()
        });
        pods.insert(
            key(namespace, &name),
            StoredPod {
                pod: created.clone(),
                terminating_reads: None,
            },
        );
        Ok(created)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        lock(&self.calls).delete += 1;
        let lag = *lock(&self.deletion_lag);
        let mut pods = lock(&self.pods);
        let Some(stored) = pods.get_mut(&key(namespace, name)) else {
            return Err(ClusterError::NotFound(format!("pod {namespace}/{name}")));
        };
        if lag == 0 {
            pods.remove(&key(namespace, name));
        } else if stored.terminating_reads.is_none() {
            stored.terminating_reads = Some(lag);
        }
        Ok(())
    }

    async fn read_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError> {
        lock(&self.calls).read += 1;
        let mut pods = lock(&self.pods);
        let not_found = || ClusterError::NotFound(format!("pod {namespace}/{name}"));
        let stored = pods.get_mut(&key(namespace, name)).ok_or_else(not_found)?;
        match stored.terminating_reads {
            Some(0) => {
                pods.remove(&key(namespace, name));
                Err(not_found())
            }
            Some(remaining) => {
                stored.terminating_reads = Some(remaining - 1);
                Ok(stored.pod.clone())
            }
            None => Ok(stored.pod.clone()),
        }
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
        if let Some(message) = lock(&self.status_failure).clone() {
            return Err(ClusterError::Api(message));
        }
        lock(&self.status_patches).push(StatusPatch {
            group: group.to_string(),
            version: version.to_string(),
            namespace: namespace.to_string(),
            plural: plural.to_string(),
            name: name.to_string(),
            patch: patch.clone(),
        });
        Ok(())
    }
}
