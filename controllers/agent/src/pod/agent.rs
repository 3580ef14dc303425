//! Main agent container.

use super::env_vars;
use super::volume::shared_mount;
use crds::EnvVarSpec;
use k8s_openapi::api::core::v1::Container;

pub const AGENT_CONTAINER_NAME: &str = "agent";

/// Build the agent container.
///
/// `image` must already be checked non-empty by the caller. Environment
/// variables keep their input order; no `env` is set when the list is empty.
pub fn build_agent_container(image: &str, env: &[EnvVarSpec]) -> Container {
    Container {
        name: AGENT_CONTAINER_NAME.to_string(),
        image: Some(image.to_string()),
        env: env_vars(env),
        volume_mounts: Some(vec![shared_mount()]),
        ..Default::default()
    }
}
