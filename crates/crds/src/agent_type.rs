//! AgentType CRD
//!
//! Declares an agent workload: a main container image with optional
//! environment, plus an optional sidecar container. The controller turns each
//! AgentType into exactly one Pod named `<name>-pod`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the AgentType resource
pub const GROUP: &str = "agents.example.com";

/// API version of the AgentType resource
pub const VERSION: &str = "v1";

/// Kind of the AgentType resource
pub const KIND: &str = "AgentType";

/// Plural resource name used in API paths
pub const PLURAL: &str = "agenttypes";

/// Full `apiVersion` string written into owner references
pub const API_VERSION: &str = "agents.example.com/v1";

/// Desired state of an AgentType
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "agents.example.com",
    version = "v1",
    kind = "AgentType",
    plural = "agenttypes",
    namespaced,
    status = "AgentTypeStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Pod","type":"string","jsonPath":".status.podName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AgentTypeSpec {
    /// Main agent container
    pub agent: AgentContainerSpec,

    /// Optional sidecar container.
    ///
    /// Kept as raw JSON so that malformed input reaches the controller's
    /// validator (and is reported in status) instead of failing decoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_object")]
    pub sidecar: Option<serde_json::Value>,
}

impl AgentTypeSpec {
    /// Environment variables declared for the agent container, in order
    pub fn agent_env(&self) -> &[EnvVarSpec] {
        self.agent
            .environment
            .as_ref()
            .map_or(&[], |env| env.variables.as_slice())
    }
}

/// The agent's main container
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentContainerSpec {
    /// Container image for the agent (e.g. "nginx:latest")
    pub image: String,

    /// Environment configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
}

/// Environment block of a container
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Ordered list of environment variables
    #[serde(default)]
    pub variables: Vec<EnvVarSpec>,
}

/// A single `name=value` environment variable
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub struct EnvVarSpec {
    /// Variable name
    pub name: String,

    /// Variable value; empty when omitted
    #[serde(default)]
    pub value: String,
}

impl EnvVarSpec {
    /// Build a variable from its name and value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Observed state of an AgentType
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentTypeStatus {
    /// Reconciliation phase
    #[serde(default)]
    pub phase: AgentPhase,

    /// Name of the managed Pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,

    /// Namespace of the managed Pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_namespace: Option<String>,

    /// UID of the managed Pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_uid: Option<String>,

    /// Latest observations of the resource's state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<AgentCondition>,

    /// Error message if the last reconciliation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Generation whose outcome is final (Pod created, or rejected as invalid).
    /// Transient failures leave this untouched so the generation is retried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Reconciliation phase of an AgentType
///
/// Serializes as PascalCase ("Reconciling", "Failed", etc.) to match the
/// CRD schema.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum AgentPhase {
    /// Observed but not yet reconciled
    #[default]
    Pending,

    /// Reconciliation in progress
    Reconciling,

    /// Pod created
    Succeeded,

    /// Last reconciliation failed
    Failed,
}

impl AgentPhase {
    /// Name of the phase as written to the status subresource
    pub fn as_str(self) -> &'static str {
        match self {
            AgentPhase::Pending => "Pending",
            AgentPhase::Reconciling => "Reconciling",
            AgentPhase::Succeeded => "Succeeded",
            AgentPhase::Failed => "Failed",
        }
    }
}

/// Status condition in the standard Kubernetes shape
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCondition {
    /// Condition type ("Created", "Ready")
    #[serde(rename = "type")]
    pub type_: String,

    /// "True", "False" or "Unknown"
    pub status: String,

    /// RFC3339 UTC timestamp of the last status change
    pub last_transition_time: String,

    /// Machine-readable reason in PascalCase
    pub reason: String,

    /// Human-readable details
    pub message: String,
}

fn preserve_unknown_object(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "nullable": true,
        "x-kubernetes-preserve-unknown-fields": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::{CustomResourceExt, Resource};

    #[test]
    fn test_constants_match_derived_resource() {
        assert_eq!(AgentType::group(&()), GROUP);
        assert_eq!(AgentType::version(&()), VERSION);
        assert_eq!(AgentType::kind(&()), KIND);
        assert_eq!(AgentType::plural(&()), PLURAL);
        assert_eq!(AgentType::api_version(&()), API_VERSION);
    }

    #[test]
    fn test_spec_deserializes_minimal_agent() {
        let spec: AgentTypeSpec = serde_json::from_value(serde_json::json!({
            "agent": { "image": "nginx:latest" }
        }))
        .unwrap();

        assert_eq!(spec.agent.image, "nginx:latest");
        assert!(spec.agent_env().is_empty());
        assert!(spec.sidecar.is_none());
    }

    #[test]
    fn test_spec_keeps_env_order_and_raw_sidecar() {
        let spec: AgentTypeSpec = serde_json::from_value(serde_json::json!({
            "agent": {
                "image": "nginx:latest",
                "environment": {
                    "variables": [
                        { "name": "B", "value": "2" },
                        { "name": "A", "value": "1" }
                    ]
                }
            },
            "sidecar": { "image": "busybox:latest", "resources": "invalid" }
        }))
        .unwrap();

        let names: Vec<&str> = spec.agent_env().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        // Malformed sidecar content survives decoding untouched
        assert_eq!(
            spec.sidecar.unwrap()["resources"],
            serde_json::Value::String("invalid".to_string())
        );
    }

    #[test]
    fn test_phase_serializes_pascal_case() {
        let status = AgentTypeStatus {
            phase: AgentPhase::Succeeded,
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["phase"], "Succeeded");
        assert_eq!(AgentPhase::Reconciling.as_str(), "Reconciling");
    }

    #[test]
    fn test_condition_type_field_name() {
        let condition = AgentCondition {
            type_: "Created".to_string(),
            status: "True".to_string(),
            last_transition_time: "2024-01-01T00:00:00Z".to_string(),
            reason: "PodCreated".to_string(),
            message: "ok".to_string(),
        };
        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(json["type"], "Created");
        assert_eq!(json["lastTransitionTime"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_crd_is_namespaced_with_status() {
        let crd = AgentType::crd();
        assert_eq!(crd.spec.group, GROUP);
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.plural, PLURAL);
        let version = &crd.spec.versions[0];
        assert!(version.subresources.as_ref().and_then(|s| s.status.as_ref()).is_some());
    }
}
