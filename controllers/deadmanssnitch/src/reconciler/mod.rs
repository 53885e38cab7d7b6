//! Reconciliation logic for DeadmansSnitchIntegration.
//!
//! One pass loads the integration and every ClusterDeployment, then drives
//! each (integration, ClusterDeployment) pair toward its desired state:
//! - `matcher`: which ClusterDeployments the integration selects
//! - `finalizer`: guards on both sides
//! - `snitch`: the Dead Man's Snitch monitor
//! - `artifacts`: Secret and SyncSet delivering the check-in URL

pub mod artifacts;
pub mod finalizer;
pub mod matcher;
pub mod snitch;

use crate::config::{ControllerConfig, NamingStrategy};
use crate::credentials::{CredentialResolver, DmsClientFactory};
use crate::error::{ControllerError, ReconcileError};
use crate::store::ClusterStore;
use crds::{ClusterDeployment, DeadmansSnitchIntegration};
use dms_client::DmsClientTrait;
use finalizer::has_finalizer;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) fn object_key(metadata: &ObjectMeta) -> String {
    format!(
        "{}/{}",
        metadata.namespace.as_deref().unwrap_or_default(),
        metadata.name.as_deref().unwrap_or_default()
    )
}

/// Settings the reconciler needs from the controller configuration
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub naming: NamingStrategy,
    pub snitch_url_key: String,
    pub runbook_url: String,
}

impl From<&ControllerConfig> for ReconcilerSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            naming: config.naming,
            snitch_url_key: config.snitch_url_key.clone(),
            runbook_url: config.runbook_url.clone(),
        }
    }
}

/// Reconciles DeadmansSnitchIntegration resources.
pub struct Reconciler {
    pub(crate) store: Arc<dyn ClusterStore>,
    credentials: Arc<dyn CredentialResolver>,
    clients: Arc<dyn DmsClientFactory>,
    pub(crate) settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        credentials: Arc<dyn CredentialResolver>,
        clients: Arc<dyn DmsClientFactory>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            credentials,
            clients,
            settings,
        }
    }

    /// Run one pass for the integration `namespace/name`
    pub async fn reconcile_integration(&self, namespace: &str, name: &str) -> Result<(), ReconcileError> {
        self.reconcile(namespace, name).await.map_err(ReconcileError::from)
    }

    async fn reconcile(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        info!("Reconciling DeadmansSnitchIntegration {}/{}", namespace, name);

        let Some(mut integration) = self.store.get_integration(namespace, name).await? else {
            debug!("DeadmansSnitchIntegration {}/{} not found, nothing to do", namespace, name);
            return Ok(());
        };

        let api_key = self
            .credentials
            .resolve(&integration.spec.dms_api_key_secret_ref)
            .await?;
        let dms = self.clients.client(&api_key)?;
        let cluster_deployments = self.store.list_cluster_deployments().await?;
        let finalizer = integration.finalizer();

        if integration.metadata.deletion_timestamp.is_some() {
            return self
                .reconcile_deletion(&mut integration, &cluster_deployments, dms.as_ref())
                .await;
        }

        let matched: HashSet<String> = matcher::matching_cluster_deployments(&integration, &cluster_deployments)?
            .into_iter()
            .map(|cd| object_key(&cd.metadata))
            .collect();
        debug!(
            "DeadmansSnitchIntegration {}/{} selects {} of {} ClusterDeployments",
            namespace,
            name,
            matched.len(),
            cluster_deployments.len()
        );

        let mut guarded = 0usize;
        for cd in &cluster_deployments {
            let selected = matched.contains(&object_key(&cd.metadata));
            if self
                .converge(&mut integration, cd, selected, dms.as_ref())
                .await?
            {
                guarded += 1;
            }
        }

        if guarded == 0 && has_finalizer(&integration.metadata, &finalizer) {
            debug!("No ClusterDeployment carries {}, releasing integration", finalizer);
            self.remove_integration_guard(&mut integration).await?;
        }

        Ok(())
    }

    /// Tear down every guarded ClusterDeployment, then release the integration
    async fn reconcile_deletion(
        &self,
        integration: &mut DeadmansSnitchIntegration,
        cluster_deployments: &[ClusterDeployment],
        dms: &dyn DmsClientTrait,
    ) -> Result<(), ControllerError> {
        let finalizer = integration.finalizer();
        info!(
            "DeadmansSnitchIntegration {} is being deleted, cleaning up",
            object_key(&integration.metadata)
        );

        for cd in cluster_deployments
            .iter()
            .filter(|cd| has_finalizer(&cd.metadata, &finalizer))
        {
            self.teardown(integration, cd, dms).await?;
        }

        self.remove_integration_guard(integration).await
    }

    /// Drive one ClusterDeployment; returns whether it holds the guard afterwards
    async fn converge(
        &self,
        integration: &mut DeadmansSnitchIntegration,
        cd: &ClusterDeployment,
        selected: bool,
        dms: &dyn DmsClientTrait,
    ) -> Result<bool, ControllerError> {
        let finalizer = integration.finalizer();
        let key = object_key(&cd.metadata);

        if !selected || cd.is_deleting() {
            if has_finalizer(&cd.metadata, &finalizer) {
                info!(
                    "ClusterDeployment {} is {}, removing its snitch",
                    key,
                    if selected { "being deleted" } else { "no longer selected" }
                );
                self.teardown(integration, cd, dms).await?;
            }
            return Ok(false);
        }

        if !cd.spec.installed {
            debug!("ClusterDeployment {} is not installed yet, skipping", key);
            return Ok(has_finalizer(&cd.metadata, &finalizer));
        }

        let cd = self.ensure_guard(integration, cd).await?;
        let present = self.artifact_presence(integration, &cd).await?;

        if cd.is_hibernating() {
            if present.any() {
                info!("ClusterDeployment {} is hibernating, removing its snitch", key);
                self.delete_snitches(integration, &cd, dms).await?;
                self.teardown_artifacts(integration, &cd).await?;
            }
            return Ok(true);
        }

        if present.complete() {
            debug!("ClusterDeployment {} already has its Secret and SyncSet", key);
            return Ok(true);
        }

        let snitch = self.find_or_create_snitch(integration, &cd, dms).await?;
        if snitch.is_pending() {
            dms.check_in(&snitch).await?;
            info!("Checked in snitch {} for ClusterDeployment {}", snitch.name, key);
        }
        self.ensure_artifacts(integration, &cd, &snitch.check_in_url, present)
            .await?;

        Ok(true)
    }

    /// Snitch, then SyncSet and Secret, then the guard
    async fn teardown(
        &self,
        integration: &DeadmansSnitchIntegration,
        cd: &ClusterDeployment,
        dms: &dyn DmsClientTrait,
    ) -> Result<(), ControllerError> {
        self.delete_snitches(integration, cd, dms).await?;
        self.teardown_artifacts(integration, cd).await?;
        self.remove_guard(integration, cd).await
    }
}
