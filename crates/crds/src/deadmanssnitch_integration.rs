//! DeadmansSnitchIntegration CRD
//!
//! Declares that every ClusterDeployment matching a selector gets a
//! Dead Man's Snitch heartbeat monitor, and where the check-in URL
//! must be delivered inside the target cluster.

use crate::references::SecretReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix of the finalizer placed on integrations and ClusterDeployments.
/// The integration name is appended to form the full token.
pub const DEADMANSSNITCH_FINALIZER_PREFIX: &str = "dms.managed.openshift.io/deadmanssnitch-";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "deadmanssnitch.managed.openshift.io",
    version = "v1alpha1",
    kind = "DeadmansSnitchIntegration",
    plural = "deadmanssnitchintegrations",
    shortname = "dmsi",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct DeadmansSnitchIntegrationSpec {
    /// Secret holding the Dead Man's Snitch API key
    pub dms_api_key_secret_ref: SecretReference,

    /// Selects the ClusterDeployments that need a snitch
    #[serde(default)]
    pub cluster_deployment_selector: ClusterDeploymentSelector,

    /// ClusterDeployments carrying any of these annotations are skipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_deployment_annotations_to_skip: Vec<AnnotationToSkip>,

    /// Optional suffix appended to snitch and secret names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snitch_name_post_fix: Option<String>,

    /// Tags applied to created snitches
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Where the SyncSet places the check-in URL secret in the target cluster
    pub target_secret_ref: SecretReference,
}

/// Label selector over ClusterDeployments.
///
/// Same shape and semantics as a Kubernetes `LabelSelector`: all
/// `matchLabels` entries and all `matchExpressions` must hold. An empty
/// selector matches every object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentSelector {
    /// Exact label key/value requirements
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    /// Set-based requirements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// A single set-based selector requirement
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    /// Label key the requirement applies to
    pub key: String,

    /// One of `In`, `NotIn`, `Exists`, `DoesNotExist`
    pub operator: String,

    /// Values for `In`/`NotIn`; must be empty for `Exists`/`DoesNotExist`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Annotation key/value pair that excludes a ClusterDeployment
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationToSkip {
    /// Annotation key
    pub name: String,

    /// Annotation value that triggers the skip
    pub value: String,
}

impl DeadmansSnitchIntegration {
    /// Finalizer token owned by this integration
    pub fn finalizer(&self) -> String {
        let name = self.metadata.name.as_deref().unwrap_or_default();
        format!("{DEADMANSSNITCH_FINALIZER_PREFIX}{name}")
    }

    /// Snitch name postfix, with an empty string treated as unset
    pub fn snitch_postfix(&self) -> Option<&str> {
        self.spec
            .snitch_name_post_fix
            .as_deref()
            .filter(|postfix| !postfix.is_empty())
    }
}
