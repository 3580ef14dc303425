//! Shared scratch volume mounted into every container of an agent Pod.

use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, Volume, VolumeMount};

/// Name of the shared volume, referenced by the volume and every mount
pub const SHARED_VOLUME_NAME: &str = "shared-volume";

/// Mount path of the shared volume in every container
pub const SHARED_MOUNT_PATH: &str = "/shared";

/// The Pod-lifetime `emptyDir` volume and the mount that goes with it
pub fn plan_volume() -> (Volume, VolumeMount) {
    let volume = Volume {
        name: SHARED_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    };
    (volume, shared_mount())
}

/// Mount of the shared volume, as used by each container builder
pub fn shared_mount() -> VolumeMount {
    VolumeMount {
        name: SHARED_VOLUME_NAME.to_string(),
        mount_path: SHARED_MOUNT_PATH.to_string(),
        ..Default::default()
    }
}
