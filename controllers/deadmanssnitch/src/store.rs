//! Object store access.
//!
//! The reconciler talks to Kubernetes only through [`ClusterStore`], so the
//! whole reconciliation algorithm can run against an in-memory store in
//! unit tests. [`KubeStore`] is the `kube::Api` implementation.
//!
//! Finalizer writes are JSON merge patches built from the caller's snapshot
//! and carry its `resourceVersion`; a concurrent write surfaces as
//! [`ControllerError::Conflict`].

use crate::error::ControllerError;
use crds::{ClusterDeployment, DeadmansSnitchIntegration, SyncSet};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

/// Kubernetes operations used by the reconciler
#[async_trait::async_trait]
pub trait ClusterStore: Send + Sync {
    /// `None` when the integration does not exist
    async fn get_integration(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeadmansSnitchIntegration>, ControllerError>;

    /// Replace the integration's finalizers, based on `snapshot`
    async fn set_integration_finalizers(
        &self,
        snapshot: &DeadmansSnitchIntegration,
        finalizers: Vec<String>,
    ) -> Result<DeadmansSnitchIntegration, ControllerError>;

    /// All ClusterDeployments in all namespaces
    async fn list_cluster_deployments(&self) -> Result<Vec<ClusterDeployment>, ControllerError>;

    /// Replace the ClusterDeployment's finalizers, based on `snapshot`
    async fn set_cluster_deployment_finalizers(
        &self,
        snapshot: &ClusterDeployment,
        finalizers: Vec<String>,
    ) -> Result<ClusterDeployment, ControllerError>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ControllerError>;
    async fn create_secret(&self, secret: Secret) -> Result<(), ControllerError>;
    /// `false` when there was nothing to delete
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool, ControllerError>;

    async fn get_sync_set(&self, namespace: &str, name: &str) -> Result<Option<SyncSet>, ControllerError>;
    async fn create_sync_set(&self, sync_set: SyncSet) -> Result<(), ControllerError>;
    /// `false` when there was nothing to delete
    async fn delete_sync_set(&self, namespace: &str, name: &str) -> Result<bool, ControllerError>;
}

/// Merge patch replacing `metadata.finalizers`, guarded by the snapshot's resourceVersion
pub(crate) fn finalizer_patch(snapshot: &ObjectMeta, finalizers: &[String]) -> serde_json::Value {
    let mut metadata = serde_json::json!({ "finalizers": finalizers });
    if let Some(version) = &snapshot.resource_version {
        metadata["resourceVersion"] = serde_json::Value::String(version.clone());
    }
    serde_json::json!({ "metadata": metadata })
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

fn meta_key(metadata: &ObjectMeta) -> String {
    key(
        metadata.namespace.as_deref().unwrap_or_default(),
        metadata.name.as_deref().unwrap_or_default(),
    )
}

fn write_error(error: kube::Error, object: String) -> ControllerError {
    match error {
        kube::Error::Api(api_err) if api_err.code == 409 => ControllerError::Conflict(object),
        other => ControllerError::Kube(other),
    }
}

/// `kube::Api` backed store
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn create_ignoring_existing<K>(&self, api: Api<K>, object: &K, object_key: String) -> Result<(), ControllerError>
    where
        K: kube::Resource + Clone + std::fmt::Debug + serde::Serialize + serde::de::DeserializeOwned,
    {
        match api.create(&PostParams::default(), object).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                debug!("{} already exists", object_key);
                Ok(())
            }
            Err(e) => Err(ControllerError::Kube(e)),
        }
    }

    async fn delete_if_present<K>(&self, api: Api<K>, name: &str) -> Result<bool, ControllerError>
    where
        K: kube::Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
    {
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(false),
            Err(e) => Err(ControllerError::Kube(e)),
        }
    }
}

#[async_trait::async_trait]
impl ClusterStore for KubeStore {
    async fn get_integration(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeadmansSnitchIntegration>, ControllerError> {
        let api: Api<DeadmansSnitchIntegration> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn set_integration_finalizers(
        &self,
        snapshot: &DeadmansSnitchIntegration,
        finalizers: Vec<String>,
    ) -> Result<DeadmansSnitchIntegration, ControllerError> {
        let namespace = snapshot.metadata.namespace.as_deref().unwrap_or_default();
        let name = snapshot.metadata.name.as_deref().unwrap_or_default();
        let api: Api<DeadmansSnitchIntegration> = Api::namespaced(self.client.clone(), namespace);
        let patch = finalizer_patch(&snapshot.metadata, &finalizers);

        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| write_error(e, key(namespace, name)))
    }

    async fn list_cluster_deployments(&self) -> Result<Vec<ClusterDeployment>, ControllerError> {
        let api: Api<ClusterDeployment> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn set_cluster_deployment_finalizers(
        &self,
        snapshot: &ClusterDeployment,
        finalizers: Vec<String>,
    ) -> Result<ClusterDeployment, ControllerError> {
        let namespace = snapshot.metadata.namespace.as_deref().unwrap_or_default();
        let name = snapshot.metadata.name.as_deref().unwrap_or_default();
        let api: Api<ClusterDeployment> = Api::namespaced(self.client.clone(), namespace);
        let patch = finalizer_patch(&snapshot.metadata, &finalizers);

        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| write_error(e, key(namespace, name)))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ControllerError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_secret(&self, secret: Secret) -> Result<(), ControllerError> {
        let namespace = secret.metadata.namespace.clone().unwrap_or_default();
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        self.create_ignoring_existing(api, &secret, meta_key(&secret.metadata)).await
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool, ControllerError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        self.delete_if_present(api, name).await
    }

    async fn get_sync_set(&self, namespace: &str, name: &str) -> Result<Option<SyncSet>, ControllerError> {
        let api: Api<SyncSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_sync_set(&self, sync_set: SyncSet) -> Result<(), ControllerError> {
        let namespace = sync_set.metadata.namespace.clone().unwrap_or_default();
        let api: Api<SyncSet> = Api::namespaced(self.client.clone(), &namespace);
        self.create_ignoring_existing(api, &sync_set, meta_key(&sync_set.metadata)).await
    }

    async fn delete_sync_set(&self, namespace: &str, name: &str) -> Result<bool, ControllerError> {
        let api: Api<SyncSet> = Api::namespaced(self.client.clone(), namespace);
        self.delete_if_present(api, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalizer_patch_carries_resource_version() {
        let meta = ObjectMeta {
            name: Some("prod-a".to_string()),
            namespace: Some("uhc-prod-a".to_string()),
            resource_version: Some("4711".to_string()),
            finalizers: Some(vec!["hive.openshift.io/deprovision".to_string()]),
            ..Default::default()
        };
        let finalizers = vec![
            "hive.openshift.io/deprovision".to_string(),
            "dms.managed.openshift.io/deadmanssnitch-osd".to_string(),
        ];

        let patch = finalizer_patch(&meta, &finalizers);
        assert_eq!(
            patch,
            serde_json::json!({
                "metadata": {
                    "finalizers": ["hive.openshift.io/deprovision", "dms.managed.openshift.io/deadmanssnitch-osd"],
                    "resourceVersion": "4711"
                }
            })
        );
    }

    #[test]
    fn test_finalizer_patch_empty_list_clears() {
        let patch = finalizer_patch(&ObjectMeta::default(), &[]);
        assert_eq!(patch, serde_json::json!({"metadata": {"finalizers": []}}));
    }
}
