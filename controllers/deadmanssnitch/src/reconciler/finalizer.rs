//! Finalizer handling for integrations and ClusterDeployments.
//!
//! The ClusterDeployment is always guarded before the integration and
//! released before the integration, so a crash in between leaves at most
//! an extra guard on the ClusterDeployment.

use super::{object_key, Reconciler};
use crate::error::ControllerError;
use crds::{ClusterDeployment, DeadmansSnitchIntegration};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::info;

pub(crate) fn has_finalizer(metadata: &ObjectMeta, finalizer: &str) -> bool {
    metadata
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == finalizer))
}

fn with_finalizer(metadata: &ObjectMeta, finalizer: &str) -> Vec<String> {
    let mut finalizers = metadata.finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_string());
    finalizers
}

fn without_finalizer(metadata: &ObjectMeta, finalizer: &str) -> Vec<String> {
    metadata
        .finalizers
        .iter()
        .flatten()
        .filter(|f| f.as_str() != finalizer)
        .cloned()
        .collect()
}

impl Reconciler {
    /// Guard `cd` and the integration; returns the ClusterDeployment as stored
    pub(crate) async fn ensure_guard(
        &self,
        integration: &mut DeadmansSnitchIntegration,
        cd: &ClusterDeployment,
    ) -> Result<ClusterDeployment, ControllerError> {
        let finalizer = integration.finalizer();

        let cd = if has_finalizer(&cd.metadata, &finalizer) {
            cd.clone()
        } else {
            let updated = self
                .store
                .set_cluster_deployment_finalizers(cd, with_finalizer(&cd.metadata, &finalizer))
                .await?;
            info!("Added finalizer {} to ClusterDeployment {}", finalizer, object_key(&cd.metadata));
            updated
        };

        self.ensure_integration_guard(integration).await?;
        Ok(cd)
    }

    async fn ensure_integration_guard(
        &self,
        integration: &mut DeadmansSnitchIntegration,
    ) -> Result<(), ControllerError> {
        let finalizer = integration.finalizer();
        if has_finalizer(&integration.metadata, &finalizer) {
            return Ok(());
        }

        let finalizers = with_finalizer(&integration.metadata, &finalizer);
        *integration = self.store.set_integration_finalizers(integration, finalizers).await?;
        info!(
            "Added finalizer {} to DeadmansSnitchIntegration {}",
            finalizer,
            object_key(&integration.metadata)
        );
        Ok(())
    }

    /// Drop the guard from `cd`, patching from the given snapshot
    pub(crate) async fn remove_guard(
        &self,
        integration: &DeadmansSnitchIntegration,
        cd: &ClusterDeployment,
    ) -> Result<(), ControllerError> {
        let finalizer = integration.finalizer();
        if !has_finalizer(&cd.metadata, &finalizer) {
            return Ok(());
        }

        self.store
            .set_cluster_deployment_finalizers(cd, without_finalizer(&cd.metadata, &finalizer))
            .await?;
        info!("Removed finalizer {} from ClusterDeployment {}", finalizer, object_key(&cd.metadata));
        Ok(())
    }

    /// Drop the integration's own guard
    pub(crate) async fn remove_integration_guard(
        &self,
        integration: &mut DeadmansSnitchIntegration,
    ) -> Result<(), ControllerError> {
        let finalizer = integration.finalizer();
        if !has_finalizer(&integration.metadata, &finalizer) {
            return Ok(());
        }

        let finalizers = without_finalizer(&integration.metadata, &finalizer);
        *integration = self.store.set_integration_finalizers(integration, finalizers).await?;
        info!(
            "Removed finalizer {} from DeadmansSnitchIntegration {}",
            finalizer,
            object_key(&integration.metadata)
        );
        Ok(())
    }
}
