//! Integration tests for the cluster client
//!
//! These tests require a reachable Kubernetes cluster (kubeconfig or
//! in-cluster config) and create a throwaway Pod in `default`.

use cluster_client::{ClusterClientTrait, KubeClusterClient};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn test_pod(name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "main".to_string(),
                image: Some("busybox:latest".to_string()),
                command: Some(vec!["sleep".to_string(), "30".to_string()]),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore] // Requires running Kubernetes cluster
async fn test_read_missing_pod_is_not_found() {
    let client = KubeClusterClient::try_default()
        .await
        .expect("Failed to create client");

    let err = client
        .read_pod("default", "cluster-client-does-not-exist")
        .await
        .expect_err("Pod should not exist");
    assert!(err.is_not_found());
}

#[tokio::test]
#[ignore]
async fn test_create_and_delete_pod() {
    let client = KubeClusterClient::try_default()
        .await
        .expect("Failed to create client");
    let name = "cluster-client-it-pod";

    let created = client
        .create_pod("default", &test_pod(name))
        .await
        .expect("Failed to create pod");
    assert!(created.metadata.uid.is_some());

    client
        .delete_pod("default", name)
        .await
        .expect("Failed to delete pod");

    // Deleting twice reports NotFound once the Pod is gone or already terminating
    match client.delete_pod("default", name).await {
        Ok(()) => println!("Pod still terminating"),
        Err(e) => assert!(e.is_not_found(), "unexpected error: {e}"),
    }
}
