//! Sidecar validation and container building.
//!
//! The sidecar arrives as raw JSON from the AgentType. `validate_sidecar` is
//! the only way to obtain a `SidecarSpec`, and a `SidecarSpec` always builds,
//! so the builder itself has no failure path.

use super::agent::AGENT_CONTAINER_NAME;
use super::env_vars;
use super::init::INIT_CONTAINER_NAME;
use super::volume::shared_mount;
use crate::error::ConfigurationError;
use crds::EnvVarSpec;
use k8s_openapi::api::core::v1::{Container, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Container name used when the sidecar does not set one
pub const DEFAULT_SIDECAR_NAME: &str = "tool-manager";

/// Resource names a sidecar may request or limit
pub const ALLOWED_RESOURCE_TYPES: [&str; 2] = ["cpu", "memory"];

/// Sidecar validation failures use the same kinds as the rest of the Pod spec
pub type SidecarError = ConfigurationError;

/// A validated sidecar definition
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SidecarSpec {
    pub name: Option<String>,
    pub image: String,
    pub command: Option<Vec<String>>,
    pub args: Option<Vec<String>>,
    pub resources: Option<SidecarResources>,
    pub env: Vec<EnvVarSpec>,
}

/// Requests and limits, keyed by `cpu` / `memory`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SidecarResources {
    pub requests: Option<BTreeMap<String, String>>,
    pub limits: Option<BTreeMap<String, String>>,
}

/// Validate a raw sidecar definition.
///
/// Checks run in a fixed order so the reported kind is stable: mapping shape,
/// then image, then `resources`, then `requests`/`limits`, then resource keys,
/// then quantity values. Remaining fields are type-checked last.
///
/// A `name` must be non-empty and must not collide with the agent or init
/// container, since container names are unique within a Pod.
pub fn validate_sidecar(spec: &Value) -> Result<SidecarSpec, SidecarError> {
    let fields = spec
        .as_object()
        .ok_or_else(|| ConfigurationError::invalid_shape("sidecar must be a mapping"))?;

    let image = match fields.get("image") {
        Some(Value::String(image)) if !image.is_empty() => image.clone(),
        _ => {
            return Err(ConfigurationError::missing_image(
                "sidecar.image must be a non-empty string",
            ))
        }
    };

    let resources = match fields.get("resources") {
        Some(value) => Some(parse_resources(value)?),
        None => None,
    };

    let name = optional_string(fields, "name")?;
    if let Some(name) = name.as_deref() {
        check_container_name(name)?;
    }

    Ok(SidecarSpec {
        name,
        image,
        command: optional_string_list(fields, "command")?,
        args: optional_string_list(fields, "args")?,
        resources,
        env: parse_environment(fields)?,
    })
}

fn parse_resources(value: &Value) -> Result<SidecarResources, SidecarError> {
    let sections = value.as_object().ok_or_else(|| {
        ConfigurationError::invalid_resource_shape("sidecar.resources must be a mapping")
    })?;

    // Shapes of both sections, then keys of both, then values.
    let requests = sections.get("requests").map(|v| section_map("requests", v)).transpose()?;
    let limits = sections.get("limits").map(|v| section_map("limits", v)).transpose()?;

    for (section, entries) in [("requests", requests), ("limits", limits)] {
        if let Some(entries) = entries {
            check_resource_keys(section, entries)?;
        }
    }

    Ok(SidecarResources {
        requests: requests.map(|m| parse_quantities("requests", m)).transpose()?,
        limits: limits.map(|m| parse_quantities("limits", m)).transpose()?,
    })
}

fn section_map<'a>(section: &str, value: &'a Value) -> Result<&'a Map<String, Value>, SidecarError> {
    value.as_object().ok_or_else(|| {
        ConfigurationError::invalid_resource_shape(format!(
            "sidecar.resources.{section} must be a mapping"
        ))
    })
}

fn check_resource_keys(section: &str, entries: &Map<String, Value>) -> Result<(), SidecarError> {
    match entries
        .keys()
        .find(|key| !ALLOWED_RESOURCE_TYPES.contains(&key.as_str()))
    {
        Some(key) => Err(ConfigurationError::invalid_resource_type(format!(
            "sidecar.resources.{section}.{key} is not one of cpu, memory"
        ))),
        None => Ok(()),
    }
}

fn parse_quantities(
    section: &str,
    entries: &Map<String, Value>,
) -> Result<BTreeMap<String, String>, SidecarError> {
    entries
        .iter()
        .map(|(key, value)| {
            let quantity = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(ConfigurationError::invalid_resource_shape(format!(
                        "sidecar.resources.{section}.{key} must be a quantity, got {other}"
                    )))
                }
            };
            Ok((key.clone(), quantity))
        })
        .collect()
}

fn optional_string(fields: &Map<String, Value>, key: &str) -> Result<Option<String>, SidecarError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigurationError::invalid_shape(format!(
            "sidecar.{key} must be a string"
        ))),
    }
}

fn check_container_name(name: &str) -> Result<(), SidecarError> {
    if name.is_empty() {
        return Err(ConfigurationError::invalid_shape("sidecar.name must not be empty"));
    }
    if name == AGENT_CONTAINER_NAME || name == INIT_CONTAINER_NAME {
        return Err(ConfigurationError::invalid_shape(format!(
            "sidecar.name {name:?} is already used by another container in the pod"
        )));
    }
    Ok(())
}

fn optional_string_list(
    fields: &Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<String>>, SidecarError> {
    let invalid = || ConfigurationError::invalid_shape(format!("sidecar.{key} must be a list of strings"));
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(invalid()),
    }
}

fn parse_environment(fields: &Map<String, Value>) -> Result<Vec<EnvVarSpec>, SidecarError> {
    let environment = match fields.get("environment") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(environment)) => environment,
        Some(_) => {
            return Err(ConfigurationError::invalid_shape(
                "sidecar.environment must be a mapping",
            ))
        }
    };

    let variables = match environment.get("variables") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(variables)) => variables,
        Some(_) => {
            return Err(ConfigurationError::invalid_shape(
                "sidecar.environment.variables must be a list",
            ))
        }
    };

    variables
        .iter()
        .enumerate()
        .map(|(i, var)| {
            let name = var.get("name").and_then(Value::as_str).ok_or_else(|| {
                ConfigurationError::invalid_shape(format!(
                    "sidecar.environment.variables[{i}].name must be a string"
                ))
            })?;
            let value = match var.get("value") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(_) => {
                    return Err(ConfigurationError::invalid_shape(format!(
                        "sidecar.environment.variables[{i}].value must be a string"
                    )))
                }
            };
            Ok(EnvVarSpec::new(name, value))
        })
        .collect()
}

/// Build the sidecar container from a validated spec
pub fn build_sidecar_from_spec(spec: &SidecarSpec) -> Container {
    build_sidecar_container(
        spec.name.as_deref(),
        &spec.image,
        spec.command.as_deref(),
        spec.args.as_deref(),
        spec.resources.as_ref(),
        &spec.env,
    )
}

/// Build a sidecar container from its parts.
///
/// Empty `command`/`args` lists are left unset.
pub fn build_sidecar_container(
    name: Option<&str>,
    image: &str,
    command: Option<&[String]>,
    args: Option<&[String]>,
    resources: Option<&SidecarResources>,
    env: &[EnvVarSpec],
) -> Container {
    Container {
        name: name.unwrap_or(DEFAULT_SIDECAR_NAME).to_string(),
        image: Some(image.to_string()),
        command: non_empty(command),
        args: non_empty(args),
        resources: resources.map(resource_requirements),
        env: env_vars(env),
        volume_mounts: Some(vec![shared_mount()]),
        ..Default::default()
    }
}

fn non_empty(list: Option<&[String]>) -> Option<Vec<String>> {
    list.filter(|l| !l.is_empty()).map(<[String]>::to_vec)
}

fn resource_requirements(resources: &SidecarResources) -> ResourceRequirements {
    let quantities = |map: &BTreeMap<String, String>| {
        map.iter()
            .map(|(k, v)| (k.clone(), Quantity(v.clone())))
            .collect::<BTreeMap<_, _>>()
    };
    ResourceRequirements {
        requests: resources.requests.as_ref().map(quantities),
        limits: resources.limits.as_ref().map(quantities),
        ..Default::default()
    }
}
