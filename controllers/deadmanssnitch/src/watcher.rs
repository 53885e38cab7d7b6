//! Kubernetes resource watchers.
//!
//! A single `kube_runtime::Controller` over DeadmansSnitchIntegrations.
//! ClusterDeployment changes, and changes to Secrets and SyncSets owned by a
//! ClusterDeployment, requeue every known integration.

use crate::backoff::BackoffTracker;
use crate::error::{ControllerError, ReconcileError};
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crds::{ClusterDeployment, DeadmansSnitchIntegration, SyncSet, CLUSTER_DEPLOYMENT_API_VERSION, CLUSTER_DEPLOYMENT_KIND};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Api, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::controller::{Action, Config as ControllerConfig, Error as RunError};
use kube_runtime::{watcher, Controller};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Shared state handed to every reconciliation
pub struct Context {
    pub reconciler: Arc<Reconciler>,
    pub metrics: Metrics,
    pub backoff: BackoffTracker,
    /// Requeue delay after a permanent error
    pub permanent_requeue: Duration,
}

fn integration_key(integration: &DeadmansSnitchIntegration) -> String {
    format!("{}/{}", integration.namespace().unwrap_or_default(), integration.name_any())
}

/// Drop the failure history of an integration that no longer exists
pub(crate) fn forget_integration(ctx: &Context, namespace: Option<&str>, name: &str) {
    let key = format!("{}/{}", namespace.unwrap_or_default(), name);
    debug!("DeadmansSnitchIntegration {} is gone, clearing its backoff", key);
    ctx.backoff.reset(&key);
}

/// Reconcile one integration and translate the outcome into an [`Action`]
pub(crate) async fn reconcile(
    integration: Arc<DeadmansSnitchIntegration>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let namespace = integration.namespace().unwrap_or_default();
    let name = integration.name_any();

    ctx.metrics.reconciliations_total.inc();
    let timer = ctx.metrics.reconcile_duration_seconds.start_timer();
    let result = ctx.reconciler.reconcile_integration(&namespace, &name).await;
    timer.observe_duration();

    result?;
    ctx.backoff.reset(&integration_key(&integration));
    Ok(Action::await_change())
}

/// Fibonacci backoff for retryable errors, a long fixed requeue for permanent ones
pub(crate) fn error_policy(
    integration: Arc<DeadmansSnitchIntegration>,
    error: &ReconcileError,
    ctx: Arc<Context>,
) -> Action {
    let key = integration_key(&integration);
    ctx.metrics.record_reconcile_error(error.class());

    if error.is_permanent() {
        error!(
            "Reconciliation of DeadmansSnitchIntegration {} failed permanently: {}, retrying in {}s",
            key,
            error,
            ctx.permanent_requeue.as_secs()
        );
        return Action::requeue(ctx.permanent_requeue);
    }

    let (delay, error_count) = ctx.backoff.record_failure(&key);
    warn!(
        "Reconciliation of DeadmansSnitchIntegration {} failed (attempt {}): {}, retrying in {}s",
        key,
        error_count,
        error,
        delay.as_secs()
    );
    Action::requeue(delay)
}

/// Whether `metadata` names a ClusterDeployment among its owners
pub(crate) fn owned_by_cluster_deployment(metadata: &ObjectMeta) -> bool {
    metadata
        .owner_references
        .iter()
        .flatten()
        .any(|owner| owner.kind == CLUSTER_DEPLOYMENT_KIND && owner.api_version == CLUSTER_DEPLOYMENT_API_VERSION)
}

/// References to every cached integration
pub(crate) fn integration_refs(integrations: &[Arc<DeadmansSnitchIntegration>]) -> Vec<ObjectRef<DeadmansSnitchIntegration>> {
    integrations
        .iter()
        .map(|integration| ObjectRef::from_obj(integration.as_ref()))
        .collect()
}

/// Watches DeadmansSnitchIntegrations and the objects they depend on.
pub struct Watcher {
    context: Arc<Context>,
    integrations: Api<DeadmansSnitchIntegration>,
    cluster_deployments: Api<ClusterDeployment>,
    sync_sets: Api<SyncSet>,
    secrets: Api<Secret>,
    ready: Arc<AtomicBool>,
}

impl Watcher {
    pub fn new(
        context: Arc<Context>,
        integrations: Api<DeadmansSnitchIntegration>,
        cluster_deployments: Api<ClusterDeployment>,
        sync_sets: Api<SyncSet>,
        secrets: Api<Secret>,
        ready: Arc<AtomicBool>,
    ) -> Self {
        Self {
            context,
            integrations,
            cluster_deployments,
            sync_sets,
            secrets,
            ready,
        }
    }

    /// Runs until the watch streams end
    pub async fn watch_integrations(&self) -> Result<(), ControllerError> {
        info!("Starting DeadmansSnitchIntegration watcher");

        let controller = Controller::new(self.integrations.clone(), watcher::Config::default());
        let store = controller.store();
        let cd_store = store.clone();
        let sync_set_store = store.clone();
        let secret_store = store;

        // Debounce batches bursts of ClusterDeployment updates into one pass
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(5))
            .concurrency(3);

        let stream = controller
            .with_config(controller_config)
            .watches(
                self.cluster_deployments.clone(),
                watcher::Config::default(),
                move |_cd: ClusterDeployment| integration_refs(&cd_store.state()),
            )
            .watches(
                self.sync_sets.clone(),
                watcher::Config::default(),
                move |sync_set: SyncSet| {
                    if owned_by_cluster_deployment(&sync_set.metadata) {
                        integration_refs(&sync_set_store.state())
                    } else {
                        Vec::new()
                    }
                },
            )
            .watches(
                self.secrets.clone(),
                watcher::Config::default().fields("type=Opaque"),
                move |secret: Secret| {
                    if owned_by_cluster_deployment(&secret.metadata) {
                        integration_refs(&secret_store.state())
                    } else {
                        Vec::new()
                    }
                },
            )
            .run(reconcile, error_policy, self.context.clone());

        self.ready.store(true, Ordering::Relaxed);

        let ctx = self.context.clone();
        stream
            .for_each(|res| {
                let ctx = ctx.clone();
                async move {
                    match res {
                        Ok((obj, _)) => debug!("Reconciled DeadmansSnitchIntegration {}/{}", obj.namespace.as_deref().unwrap_or_default(), obj.name),
                        // requeued after the object left the cache
                        Err(RunError::ObjectNotFound(obj)) => forget_integration(&ctx, obj.namespace.as_deref(), &obj.name),
                        Err(e) => error!("Controller error for DeadmansSnitchIntegration: {}", e),
                    }
                }
            })
            .await;

        self.ready.store(false, Ordering::Relaxed);
        Err(ControllerError::Watch("DeadmansSnitchIntegration watch stream ended".to_string()))
    }
}
