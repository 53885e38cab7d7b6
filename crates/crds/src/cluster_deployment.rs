//! Hive ClusterDeployment (consumed subset)
//!
//! ClusterDeployments are owned by Hive. Only the fields the snitch
//! controller reads are modelled; everything else in the object is
//! ignored on deserialization.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// API version string used in owner references
pub const CLUSTER_DEPLOYMENT_API_VERSION: &str = "hive.openshift.io/v1";

/// Kind string used in owner references
pub const CLUSTER_DEPLOYMENT_KIND: &str = "ClusterDeployment";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize)]
#[kube(
    group = "hive.openshift.io",
    version = "v1",
    kind = "ClusterDeployment",
    plural = "clusterdeployments",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentSpec {
    /// Cluster name, also the prefix of derived secret names
    #[serde(default)]
    pub cluster_name: String,

    /// Base DNS domain of the cluster
    #[serde(default)]
    pub base_domain: String,

    /// Set by Hive once installation has completed
    #[serde(default)]
    pub installed: bool,

    /// Desired power state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_state: Option<ClusterPowerState>,

    /// Metadata assigned by the installer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_metadata: Option<ClusterMetadata>,
}

/// Desired power state of a cluster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClusterPowerState {
    /// Cluster is (or should be) running
    Running,

    /// Cluster is (or should be) hibernating
    Hibernating,

    /// Any value this controller does not know about, including ""
    #[serde(other)]
    Unknown,
}

/// Installer-assigned identifiers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    /// External cluster ID
    #[serde(rename = "clusterID", default)]
    pub cluster_id: String,

    /// Infrastructure ID
    #[serde(rename = "infraID", default)]
    pub infra_id: String,
}

impl ClusterDeployment {
    /// Whether the spec asks for the cluster to hibernate
    pub fn is_hibernating(&self) -> bool {
        self.spec.power_state == Some(ClusterPowerState::Hibernating)
    }

    /// Whether a deletion timestamp has been set
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// External cluster ID, if the installer has assigned a non-empty one
    pub fn cluster_id(&self) -> Option<&str> {
        self.spec
            .cluster_metadata
            .as_ref()
            .map(|metadata| metadata.cluster_id.as_str())
            .filter(|id| !id.is_empty())
    }
}
