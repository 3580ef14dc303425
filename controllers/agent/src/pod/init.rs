//! Init container that seeds the shared volume before the agent starts.

use super::volume::{shared_mount, SHARED_MOUNT_PATH};
use k8s_openapi::api::core::v1::Container;

pub const INIT_CONTAINER_NAME: &str = "init-wrapper";
pub const INIT_CONTAINER_IMAGE: &str = "busybox:latest";

/// Build the init container.
///
/// Writes a stub `wrapper.js` into the shared volume. Not configurable per
/// AgentType yet.
pub fn build_init_container() -> Container {
    Container {
        name: INIT_CONTAINER_NAME.to_string(),
        image: Some(INIT_CONTAINER_IMAGE.to_string()),
        command: Some(vec!["sh".to_string(), "-c".to_string()]),
        args: Some(vec![format!(
            "echo 'console.log(\"wrapped\");' > {SHARED_MOUNT_PATH}/wrapper.js"
        )]),
        volume_mounts: Some(vec![shared_mount()]),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_container_writes_into_shared_volume() {
        let container = build_init_container();

        assert_eq!(container.name, "init-wrapper");
        assert_eq!(container.image.as_deref(), Some("busybox:latest"));
        assert_eq!(
            container.args,
            Some(vec!["echo 'console.log(\"wrapped\");' > /shared/wrapper.js".to_string()])
        );
        assert_eq!(container.volume_mounts, Some(vec![shared_mount()]));
    }
}
