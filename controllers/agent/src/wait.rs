//! Bounded wait for a Pod deletion to complete.
//!
//! The wait is a plain future: if the caller drops it (controller shutdown,
//! reconcile cancelled) polling stops at the next `sleep`.

use crate::error::ControllerError;
use cluster_client::ClusterClientTrait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Timeout and poll interval for deleting the previous Pod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteWait {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for DeleteWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Delete a Pod and wait until reads report it gone.
///
/// Returns `Ok(false)` if there was no Pod to delete, `Ok(true)` once a
/// deleted Pod has disappeared, and `DeleteTimeout` if it is still readable
/// after `wait.timeout`.
pub async fn delete_and_wait(
    client: &dyn ClusterClientTrait,
    namespace: &str,
    name: &str,
    wait: DeleteWait,
) -> Result<bool, ControllerError> {
    match client.delete_pod(namespace, name).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(false),
        Err(e) => return Err(e.into()),
    }

    let deadline = Instant::now() + wait.timeout;
    loop {
        match client.read_pod(namespace, name).await {
            Err(e) if e.is_not_found() => return Ok(true),
            Err(e) => return Err(e.into()),
            Ok(_) => debug!("Pod {}/{} still terminating", namespace, name),
        }

        if Instant::now() >= deadline {
            return Err(ControllerError::DeleteTimeout {
                pod: format!("{namespace}/{name}"),
                timeout: wait.timeout,
            });
        }
        sleep(wait.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_client::MockClusterClient;
    use k8s_openapi::api::core::v1::Pod;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::sync::Arc;

    fn existing_pod(client: &MockClusterClient, name: &str) {
        client.add_pod(Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_pod_skips_wait() {
        let client = MockClusterClient::new();

        let deleted = delete_and_wait(&client, "default", "a-pod", DeleteWait::default())
            .await
            .unwrap();

        assert!(!deleted);
        assert_eq!(client.read_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_terminating_pod() {
        let client = MockClusterClient::new();
        existing_pod(&client, "a-pod");
        client.set_deletion_lag(3);

        let start = Instant::now();
        let deleted = delete_and_wait(&client, "default", "a-pod", DeleteWait::default())
            .await
            .unwrap();

        assert!(deleted);
        assert_eq!(client.read_calls(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(client.pod_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_bound() {
        let client = MockClusterClient::new();
        existing_pod(&client, "a-pod");
        client.set_deletion_lag(usize::MAX);

        let wait = DeleteWait {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
        };
        let start = Instant::now();
        let err = delete_and_wait(&client, "default", "a-pod", wait).await.unwrap_err();

        assert!(matches!(err, ControllerError::DeleteTimeout { .. }));
        assert!(!err.is_permanent());
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_wait_stops_polling() {
        let client = MockClusterClient::new();
        existing_pod(&client, "a-pod");
        client.set_deletion_lag(usize::MAX);

        let task_client = client.clone();
        let handle = tokio::spawn(async move {
            let client: Arc<dyn ClusterClientTrait> = Arc::new(task_client);
            delete_and_wait(client.as_ref(), "default", "a-pod", DeleteWait::default()).await
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        let reads = client.read_calls();
        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;
        assert_eq!(client.read_calls(), reads);
    }
}
