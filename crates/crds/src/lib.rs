//! Agent Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the agent operator.

/// The AgentType resource and its status
pub mod agent_type;

pub use agent_type::*;
