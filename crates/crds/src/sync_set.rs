//! Hive SyncSet (produced subset)
//!
//! A SyncSet tells Hive to copy objects into the target cluster. The
//! snitch controller only ever uses secret mappings.

use crate::references::{LocalObjectReference, SecretReference};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Apply mode that also removes synced objects once they leave the SyncSet
pub const RESOURCE_APPLY_MODE_SYNC: &str = "Sync";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize)]
#[kube(
    group = "hive.openshift.io",
    version = "v1",
    kind = "SyncSet",
    plural = "syncsets",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct SyncSetSpec {
    /// ClusterDeployments (same namespace) the SyncSet applies to
    #[serde(default)]
    pub cluster_deployment_refs: Vec<LocalObjectReference>,

    /// `Upsert` or `Sync`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_apply_mode: Option<String>,

    /// Secrets copied from the hub into the target cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_mappings: Vec<SecretMapping>,
}

/// Copies one secret from the hub cluster into the target cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretMapping {
    /// Secret on the hub
    pub source_ref: SecretReference,

    /// Secret created in the target cluster
    pub target_ref: SecretReference,
}
