//! Cluster API client for the agent operator
//!
//! A narrow client over the Kubernetes object API: create/read/delete Pods and
//! merge-patch custom resource status. The controller only depends on
//! `ClusterClientTrait`, so tests can swap in `MockClusterClient`.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClientTrait, KubeClusterClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeClusterClient::try_default().await?;
//!
//! match client.read_pod("default", "my-agent-pod").await {
//!     Ok(pod) => println!("found {:?}", pod.metadata.uid),
//!     Err(e) if e.is_not_found() => println!("no pod yet"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeClusterClient;
pub use cluster_trait::ClusterClientTrait;
pub use error::ClusterError;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockClusterClient, StatusPatch};
