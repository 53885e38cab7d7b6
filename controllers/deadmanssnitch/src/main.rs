//! Dead Man's Snitch Controller
//!
//! Binds `DeadmansSnitchIntegration` resources to Hive `ClusterDeployment`s:
//! - creates one snitch per matching, installed, running cluster
//! - ships the snitch check-in URL to the cluster through a Secret and a SyncSet
//! - tears everything down on hibernation, selector loss or deletion
//!
//! Finalizers on both sides keep external state from leaking.

mod backoff;
mod config;
mod controller;
mod credentials;
mod error;
mod metrics;
mod reconciler;
mod server;
mod store;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube and reqwest both pull rustls; pick the provider explicitly
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting Dead Man's Snitch Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  DMS API URL: {}", config.dms_api_url);
    info!("  Naming strategy: {:?}", config.naming);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Metrics port: {}", config.metrics_port);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
