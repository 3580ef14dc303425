//! Prints the AgentType CustomResourceDefinition as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > agenttype-crd.yaml`

use crds::AgentType;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(&AgentType::crd())?;
    print!("{yaml}");
    Ok(())
}
