//! Main controller implementation.
//!
//! Wires the Kubernetes client, the Dead Man's Snitch client factory and the
//! reconciler together, then runs the integration watcher next to the
//! metrics/probe server.

use crate::backoff::BackoffTracker;
use crate::config::ControllerConfig;
use crate::credentials::{HttpDmsClientFactory, SecretCredentialResolver};
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::{Reconciler, ReconcilerSettings};
use crate::server::{start_server, ServerState};
use crate::store::KubeStore;
use crate::watcher::{Context, Watcher};
use crds::{ClusterDeployment, DeadmansSnitchIntegration, SyncSet};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use prometheus::Registry;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for Dead Man's Snitch integrations.
pub struct Controller {
    integration_watcher: JoinHandle<Result<(), ControllerError>>,
    server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Dead Man's Snitch Controller");

        let kube_client = Client::try_default().await?;

        let registry = Registry::new();
        let metrics = Metrics::new(&registry)
            .map_err(|e| ControllerError::Server(format!("failed to register metrics: {}", e)))?;

        let store = Arc::new(KubeStore::new(kube_client.clone()));
        let credentials = Arc::new(SecretCredentialResolver::new(store.clone(), config.api_key_secret_key.clone()));
        let clients = Arc::new(HttpDmsClientFactory::new(config.dms_api_url.clone(), metrics.clone()));
        let reconciler = Arc::new(Reconciler::new(store, credentials, clients, ReconcilerSettings::from(&config)));

        let context = Arc::new(Context {
            reconciler,
            metrics,
            backoff: BackoffTracker::default(),
            permanent_requeue: config.permanent_error_requeue,
        });

        let integrations: Api<DeadmansSnitchIntegration> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };
        let cluster_deployments: Api<ClusterDeployment> = Api::all(kube_client.clone());
        let sync_sets: Api<SyncSet> = Api::all(kube_client.clone());
        let secrets: Api<Secret> = Api::all(kube_client);

        let ready = Arc::new(AtomicBool::new(false));
        let state = Arc::new(ServerState {
            is_ready: ready.clone(),
            registry,
        });

        let port = config.metrics_port;
        let server = tokio::spawn(async move {
            start_server(port, state)
                .await
                .map_err(|e| ControllerError::Server(e.to_string()))
        });

        let watcher = Watcher::new(context, integrations, cluster_deployments, sync_sets, secrets, ready);
        let integration_watcher = tokio::spawn(async move { watcher.watch_integrations().await });

        Ok(Self {
            integration_watcher,
            server,
        })
    }

    /// Runs until the watcher or the server exits.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Dead Man's Snitch Controller running");

        tokio::select! {
            result = &mut self.integration_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("DeadmansSnitchIntegration watcher panicked: {}", e)))??;
            }
            result = &mut self.server => {
                result.map_err(|e| ControllerError::Server(format!("HTTP server panicked: {}", e)))??;
            }
        }

        Ok(())
    }
}
