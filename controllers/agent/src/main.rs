//! AgentType Controller
//!
//! Reconciles `AgentType` custom resources into Pods made of an init
//! container, the agent container and an optional sidecar, all sharing one
//! scratch volume. The Pod is owned by its AgentType, so deleting the
//! AgentType removes the Pod through garbage collection.

mod backoff;
mod config;
mod controller;
mod error;
mod events;
mod pod;
mod reconciler;
mod wait;
mod watcher;
#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Failed to install rustls crypto provider: {:?}", e);
        std::process::exit(1);
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting AgentType Controller");

    let config = ControllerConfig::from_env().inspect_err(|e| error!("{}", e))?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Controller name: {}", config.controller_name);
    info!(
        "  Delete wait: {:?} (poll every {:?})",
        config.delete_wait.timeout, config.delete_wait.poll_interval
    );
    info!("  Concurrency: {}", config.concurrency);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
