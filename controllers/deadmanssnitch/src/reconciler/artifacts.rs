//! Secret and SyncSet carrying the check-in URL into the cluster.
//!
//! Both objects live in the ClusterDeployment's namespace, share one name
//! and have the ClusterDeployment as controller owner.

use super::{object_key, Reconciler};
use crate::error::ControllerError;
use crds::{
    ClusterDeployment, DeadmansSnitchIntegration, LocalObjectReference, SecretMapping, SecretReference,
    SyncSet, SyncSetSpec, RESOURCE_APPLY_MODE_SYNC,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::Resource;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Name shared by the Secret and the SyncSet
pub fn artifact_name(cd: &ClusterDeployment, postfix: Option<&str>) -> String {
    match postfix {
        Some(postfix) => format!("{}-{}-dms-secret", cd.spec.cluster_name, postfix),
        None => format!("{}-dms-secret", cd.spec.cluster_name),
    }
}

fn owned_metadata(cd: &ClusterDeployment, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: cd.metadata.namespace.clone(),
        owner_references: cd.controller_owner_ref(&()).map(|owner| vec![owner]),
        ..Default::default()
    }
}

/// Opaque secret holding the check-in URL under `url_key`
pub fn build_secret(cd: &ClusterDeployment, name: &str, url_key: &str, check_in_url: &str) -> Secret {
    Secret {
        metadata: owned_metadata(cd, name),
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([(
            url_key.to_string(),
            ByteString(check_in_url.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

/// SyncSet copying the secret to `target` inside the cluster
pub fn build_sync_set(cd: &ClusterDeployment, name: &str, target: &SecretReference) -> SyncSet {
    let namespace = cd.metadata.namespace.clone().unwrap_or_default();
    let mut sync_set = SyncSet::new(
        name,
        SyncSetSpec {
            cluster_deployment_refs: vec![LocalObjectReference {
                name: cd.metadata.name.clone().unwrap_or_default(),
            }],
            resource_apply_mode: Some(RESOURCE_APPLY_MODE_SYNC.to_string()),
            secret_mappings: vec![SecretMapping {
                source_ref: SecretReference::new(name, namespace),
                target_ref: target.clone(),
            }],
        },
    );
    sync_set.metadata = owned_metadata(cd, name);
    sync_set
}

/// Which of the two artifacts currently exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ArtifactPresence {
    pub secret: bool,
    pub sync_set: bool,
}

impl ArtifactPresence {
    pub fn any(&self) -> bool {
        self.secret || self.sync_set
    }

    pub fn complete(&self) -> bool {
        self.secret && self.sync_set
    }
}

impl Reconciler {
    pub(crate) async fn artifact_presence(
        &self,
        integration: &DeadmansSnitchIntegration,
        cd: &ClusterDeployment,
    ) -> Result<ArtifactPresence, ControllerError> {
        let namespace = cd.metadata.namespace.as_deref().unwrap_or_default();
        let name = artifact_name(cd, integration.snitch_postfix());

        Ok(ArtifactPresence {
            secret: self.store.get_secret(namespace, &name).await?.is_some(),
            sync_set: self.store.get_sync_set(namespace, &name).await?.is_some(),
        })
    }

    /// Create whichever of the Secret and SyncSet is missing
    pub(crate) async fn ensure_artifacts(
        &self,
        integration: &DeadmansSnitchIntegration,
        cd: &ClusterDeployment,
        check_in_url: &str,
        present: ArtifactPresence,
    ) -> Result<(), ControllerError> {
        let namespace = cd.metadata.namespace.as_deref().unwrap_or_default();
        let name = artifact_name(cd, integration.snitch_postfix());

        if !present.secret {
            let secret = build_secret(cd, &name, &self.settings.snitch_url_key, check_in_url);
            self.store.create_secret(secret).await?;
            info!("Created Secret {}/{} for ClusterDeployment {}", namespace, name, object_key(&cd.metadata));
        }

        if !present.sync_set {
            let sync_set = build_sync_set(cd, &name, &integration.spec.target_secret_ref);
            self.store.create_sync_set(sync_set).await?;
            info!("Created SyncSet {}/{} for ClusterDeployment {}", namespace, name, object_key(&cd.metadata));
        }

        Ok(())
    }

    /// Delete the SyncSet and the Secret; absence is fine
    pub(crate) async fn teardown_artifacts(
        &self,
        integration: &DeadmansSnitchIntegration,
        cd: &ClusterDeployment,
    ) -> Result<(), ControllerError> {
        let namespace = cd.metadata.namespace.as_deref().unwrap_or_default();
        let name = artifact_name(cd, integration.snitch_postfix());

        if self.store.delete_sync_set(namespace, &name).await? {
            info!("Deleted SyncSet {}/{}", namespace, name);
        } else {
            debug!("SyncSet {}/{} already absent", namespace, name);
        }

        if self.store.delete_secret(namespace, &name).await? {
            info!("Deleted Secret {}/{}", namespace, name);
        } else {
            debug!("Secret {}/{} already absent", namespace, name);
        }

        Ok(())
    }
}
