//! Controller configuration from environment variables.

use crate::error::ControllerError;
use crate::wait::DeleteWait;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default reporting component name for Events
pub const DEFAULT_CONTROLLER_NAME: &str = "agent-operator";

/// Default number of AgentTypes reconciled concurrently
pub const DEFAULT_CONCURRENCY: u16 = 3;

/// Runtime configuration of the AgentType controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Reporting component name on Events
    pub controller_name: String,
    /// Bound on waiting for a replaced Pod to disappear
    pub delete_wait: DeleteWait,
    /// Maximum concurrent reconciliations
    pub concurrency: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            controller_name: DEFAULT_CONTROLLER_NAME.to_string(),
            delete_wait: DeleteWait::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `WATCH_NAMESPACE` | all namespaces |
    /// | `CONTROLLER_NAME` | `agent-operator` |
    /// | `DELETE_TIMEOUT_SECS` | 10 |
    /// | `DELETE_POLL_INTERVAL_SECS` | 1 |
    /// | `RECONCILE_CONCURRENCY` | 3 |
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout = parse_or("DELETE_TIMEOUT_SECS", get("DELETE_TIMEOUT_SECS"), 10u64)?;
        let poll_interval =
            parse_or("DELETE_POLL_INTERVAL_SECS", get("DELETE_POLL_INTERVAL_SECS"), 1u64)?;
        if poll_interval == 0 {
            return Err(ControllerError::InvalidConfig(
                "DELETE_POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let concurrency =
            parse_or("RECONCILE_CONCURRENCY", get("RECONCILE_CONCURRENCY"), defaults.concurrency)?;
        if concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            namespace: get("WATCH_NAMESPACE"),
            controller_name: get("CONTROLLER_NAME").unwrap_or(defaults.controller_name),
            delete_wait: DeleteWait {
                timeout: Duration::from_secs(timeout),
                poll_interval: Duration::from_secs(poll_interval),
            },
            concurrency,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, ControllerError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ControllerError::InvalidConfig(format!("{key} must be a non-negative integer, got {raw:?}"))
        }),
    }
}
