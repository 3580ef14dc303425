//! Pod construction for AgentType resources.
//!
//! Everything here is pure: the same AgentType always yields the same Pod.
//! - `volume`: the shared `emptyDir` every container mounts
//! - `init`: the init container seeding the shared volume
//! - `agent`: the main container
//! - `sidecar`: validation and building of the optional sidecar

pub mod agent;
pub mod init;
pub mod sidecar;
pub mod volume;

use crate::error::ConfigurationError;
use crds::EnvVarSpec;
use k8s_openapi::api::core::v1::{EnvVar, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

pub use agent::build_agent_container;
pub use init::build_init_container;
pub use sidecar::{build_sidecar_from_spec, validate_sidecar};
pub use volume::plan_volume;

/// Value of the `managed-by` label on every Pod this controller creates
pub const MANAGED_BY: &str = "agent-operator";

/// Name of the Pod owned by the AgentType `resource_name`
pub fn pod_name(resource_name: &str) -> String {
    format!("{resource_name}-pod")
}

/// Controller owner reference pointing at an AgentType
pub fn owner_reference(resource_name: &str, owner_uid: &str) -> OwnerReference {
    OwnerReference {
        api_version: crds::API_VERSION.to_string(),
        kind: crds::KIND.to_string(),
        name: resource_name.to_string(),
        uid: owner_uid.to_string(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

pub(crate) fn env_vars(env: &[EnvVarSpec]) -> Option<Vec<EnvVar>> {
    if env.is_empty() {
        return None;
    }
    Some(
        env.iter()
            .map(|var| EnvVar {
                name: var.name.clone(),
                value: Some(var.value.clone()),
                ..Default::default()
            })
            .collect(),
    )
}

/// Assemble the complete Pod for an AgentType.
///
/// Fails without producing anything if the agent image is empty or the
/// sidecar does not validate. The agent container always comes first.
pub fn assemble_pod(
    resource_name: &str,
    namespace: &str,
    owner_uid: &str,
    agent_image: &str,
    agent_env: &[EnvVarSpec],
    sidecar: Option<&serde_json::Value>,
) -> Result<Pod, ConfigurationError> {
    if agent_image.is_empty() {
        return Err(ConfigurationError::missing_image("agent.image must be set"));
    }

    let mut containers = vec![build_agent_container(agent_image, agent_env)];
    if let Some(raw) = sidecar {
        let spec = validate_sidecar(raw)?;
        containers.push(build_sidecar_from_spec(&spec));
    }

    let (volume, _) = plan_volume();
    let labels = BTreeMap::from([
        ("app".to_string(), resource_name.to_string()),
        ("managed-by".to_string(), MANAGED_BY.to_string()),
    ]);

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(pod_name(resource_name)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            owner_references: Some(vec![owner_reference(resource_name, owner_uid)]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            init_containers: Some(vec![build_init_container()]),
            containers,
            volumes: Some(vec![volume]),
            ..Default::default()
        }),
        status: None,
    })
}
