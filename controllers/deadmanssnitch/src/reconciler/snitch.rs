//! Snitch lookup, creation and removal for one ClusterDeployment.

use super::{object_key, Reconciler};
use crate::error::ControllerError;
use crds::{ClusterDeployment, DeadmansSnitchIntegration};
use dms_client::{CreateSnitchRequest, DmsClientTrait, Snitch};
use tracing::{debug, info, warn};

/// Earliest created snitch, ties broken by token; unknown creation times sort last
pub fn canonical_snitch(snitches: Vec<Snitch>) -> Option<Snitch> {
    snitches
        .into_iter()
        .min_by(|a, b| {
            (a.created_at.is_none(), a.created_at, &a.token).cmp(&(b.created_at.is_none(), b.created_at, &b.token))
        })
}

/// Notes attached to every created snitch
pub fn snitch_notes(cluster_id: &str, runbook_url: &str) -> String {
    format!("cluster_id: {}\\nrunbook: {}", cluster_id, runbook_url)
}

impl Reconciler {
    /// Existing snitch for `cd`, or a newly created one
    pub(crate) async fn find_or_create_snitch(
        &self,
        integration: &DeadmansSnitchIntegration,
        cd: &ClusterDeployment,
        dms: &dyn DmsClientTrait,
    ) -> Result<Snitch, ControllerError> {
        let naming = self.settings.naming;
        let name = naming.snitch_name(cd, integration.snitch_postfix())?;
        let cluster_id = naming.cluster_id(cd)?;

        let existing = dms.find_snitches_by_name(&name).await?;
        if existing.len() > 1 {
            warn!(
                "Found {} snitches named {} for ClusterDeployment {}, using the earliest created",
                existing.len(),
                name,
                object_key(&cd.metadata)
            );
        }
        if let Some(snitch) = canonical_snitch(existing) {
            debug!("Snitch {} already exists (token {})", name, snitch.token);
            return Ok(snitch);
        }

        let request = CreateSnitchRequest::new(name.as_str())
            .with_tags(integration.spec.tags.clone())
            .with_notes(snitch_notes(&cluster_id, &self.settings.runbook_url));
        let snitch = dms.create_snitch(&request).await?;
        info!(
            "Created snitch {} (token {}) for ClusterDeployment {}",
            snitch.name,
            snitch.token,
            object_key(&cd.metadata)
        );
        Ok(snitch)
    }

    /// Delete every snitch carrying the name derived for `cd`
    pub(crate) async fn delete_snitches(
        &self,
        integration: &DeadmansSnitchIntegration,
        cd: &ClusterDeployment,
        dms: &dyn DmsClientTrait,
    ) -> Result<(), ControllerError> {
        let name = self.settings.naming.snitch_name(cd, integration.snitch_postfix())?;

        let snitches = dms.find_snitches_by_name(&name).await?;
        if snitches.is_empty() {
            debug!("No snitch named {} to delete", name);
            return Ok(());
        }

        for snitch in snitches {
            if dms.delete_snitch(&snitch.token).await? {
                info!("Deleted snitch {} (token {})", name, snitch.token);
            } else {
                debug!("Snitch {} (token {}) already gone", name, snitch.token);
            }
        }
        Ok(())
    }
}
