//! Controller configuration.
//!
//! Everything is read from environment variables once at startup. The
//! naming strategy is resolved here so the reconciler never branches on
//! the FedRAMP flag itself.

use crate::error::ControllerError;
use crate::reconciler::object_key;
use crds::ClusterDeployment;
use dms_client::DEFAULT_BASE_URL;
use std::env;
use std::time::Duration;

/// Default key inside the API key secret
pub const DEFAULT_API_KEY_SECRET_KEY: &str = "deadmanssnitch-api-key";

/// Default key under which the check-in URL is stored in the cluster secret
pub const DEFAULT_SNITCH_URL_KEY: &str = "SNITCH_URL";

/// Runbook linked from every snitch's notes
pub const DEFAULT_RUNBOOK_URL: &str =
    "https://github.com/openshift/ops-sop/blob/master/v4/alerts/cluster_has_gone_missing.md";

const DEFAULT_METRICS_PORT: u16 = 8080;
const DEFAULT_PERMANENT_ERROR_REQUEUE_SECS: u64 = 1800;

/// How snitch names and cluster ids are derived from a ClusterDeployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingStrategy {
    /// `<clusterName>.<baseDomain>[-<postfix>]`, cluster id from cluster metadata
    ClusterDomain,
    /// FedRAMP: the internal id taken from the last `-` segment of the namespace
    InternalClusterId,
}

impl NamingStrategy {
    pub fn from_fedramp(fedramp: bool) -> Self {
        if fedramp {
            NamingStrategy::InternalClusterId
        } else {
            NamingStrategy::ClusterDomain
        }
    }

    /// Name of the snitch monitoring `cd`
    pub fn snitch_name(&self, cd: &ClusterDeployment, postfix: Option<&str>) -> Result<String, ControllerError> {
        match self {
            NamingStrategy::ClusterDomain => {
                let mut name = format!("{}.{}", cd.spec.cluster_name, cd.spec.base_domain);
                if let Some(postfix) = postfix {
                    name.push('-');
                    name.push_str(postfix);
                }
                Ok(name)
            }
            NamingStrategy::InternalClusterId => internal_id(cd),
        }
    }

    /// Cluster id written into the snitch notes.
    ///
    /// Both strategies refuse a cluster that has no installer-assigned id yet.
    pub fn cluster_id(&self, cd: &ClusterDeployment) -> Result<String, ControllerError> {
        let external = cd.cluster_id().ok_or_else(|| ControllerError::MissingClusterId(object_key(&cd.metadata)))?;
        match self {
            NamingStrategy::ClusterDomain => Ok(external.to_string()),
            NamingStrategy::InternalClusterId => internal_id(cd),
        }
    }
}

fn internal_id(cd: &ClusterDeployment) -> Result<String, ControllerError> {
    cd.metadata
        .namespace
        .as_deref()
        .and_then(|ns| ns.rsplit('-').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ControllerError::MissingClusterId(object_key(&cd.metadata)))
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub naming: NamingStrategy,
    pub dms_api_url: String,
    pub api_key_secret_key: String,
    pub snitch_url_key: String,
    pub runbook_url: String,
    /// Namespace holding DeadmansSnitchIntegrations; `None` watches all
    pub namespace: Option<String>,
    pub metrics_port: u16,
    pub permanent_error_requeue: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            naming: NamingStrategy::ClusterDomain,
            dms_api_url: DEFAULT_BASE_URL.to_string(),
            api_key_secret_key: DEFAULT_API_KEY_SECRET_KEY.to_string(),
            snitch_url_key: DEFAULT_SNITCH_URL_KEY.to_string(),
            runbook_url: DEFAULT_RUNBOOK_URL.to_string(),
            namespace: None,
            metrics_port: DEFAULT_METRICS_PORT,
            permanent_error_requeue: Duration::from_secs(DEFAULT_PERMANENT_ERROR_REQUEUE_SECS),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let fedramp = match var("FEDRAMP") {
            Some(value) => value.trim().parse::<bool>().map_err(|_| {
                ControllerError::InvalidConfig(format!("FEDRAMP must be true or false, got '{}'", value))
            })?,
            None => false,
        };

        let metrics_port = match var("METRICS_PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|e| {
                ControllerError::InvalidConfig(format!("METRICS_PORT '{}' is not a port: {}", value, e))
            })?,
            None => defaults.metrics_port,
        };

        let permanent_error_requeue = match var("PERMANENT_ERROR_REQUEUE_SECS") {
            Some(value) => Duration::from_secs(value.trim().parse::<u64>().map_err(|e| {
                ControllerError::InvalidConfig(format!(
                    "PERMANENT_ERROR_REQUEUE_SECS '{}' is not a number of seconds: {}",
                    value, e
                ))
            })?),
            None => defaults.permanent_error_requeue,
        };

        Ok(Self {
            naming: NamingStrategy::from_fedramp(fedramp),
            dms_api_url: var("DMS_API_URL").unwrap_or(defaults.dms_api_url),
            api_key_secret_key: var("DMS_API_KEY_SECRET_KEY").unwrap_or(defaults.api_key_secret_key),
            snitch_url_key: var("SNITCH_URL_KEY").unwrap_or(defaults.snitch_url_key),
            runbook_url: var("DMS_RUNBOOK_URL").unwrap_or(defaults.runbook_url),
            namespace: var("WATCH_NAMESPACE"),
            metrics_port,
            permanent_error_requeue,
        })
    }
}
