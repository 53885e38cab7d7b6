//! Kubernetes object references shared by the CRDs
//!
//! Hive and the integration CRD both point at secrets by explicit
//! name/namespace pairs, and at ClusterDeployments by local name only.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a Secret in an explicit namespace.
///
/// Mirrors Hive's `SecretReference`, so the same type is used for the
/// integration's API key and target secret as well as inside SyncSet
/// secret mappings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Name of the secret
    pub name: String,

    /// Namespace of the secret
    pub namespace: String,
}

impl SecretReference {
    /// Create a reference from a name and namespace
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl std::fmt::Display for SecretReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Reference to an object in the same namespace as the referrer
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    /// Name of the referenced object
    pub name: String,
}
