//! Test utilities for unit testing the reconciler
//!
//! Provides an in-memory [`ClusterStore`], a Dead Man's Snitch client that
//! writes into the same journal, and fixtures for integrations and
//! ClusterDeployments.

use crate::config::{NamingStrategy, DEFAULT_API_KEY_SECRET_KEY, DEFAULT_RUNBOOK_URL, DEFAULT_SNITCH_URL_KEY};
use crate::credentials::{DmsClientFactory, SecretCredentialResolver};
use crate::error::{ControllerError, ReconcileError};
use crate::reconciler::{Reconciler, ReconcilerSettings};
use crate::store::ClusterStore;
use crds::*;
use dms_client::{CreateSnitchRequest, DmsClientTrait, DmsError, MockDmsClient, Snitch};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use k8s_openapi::ByteString;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

pub const INTEGRATION_NAMESPACE: &str = "deadmanssnitch-operator";
pub const API_KEY_SECRET: &str = "dms-api-key";

/// Side effects in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ClusterDeploymentGuarded(String),
    ClusterDeploymentReleased(String),
    IntegrationGuarded(String),
    IntegrationReleased(String),
    SecretCreated(String),
    SecretDeleted(String),
    SyncSetCreated(String),
    SyncSetDeleted(String),
    SnitchCreated(String),
    SnitchCheckedIn(String),
    SnitchDeleted(String),
}

pub type Journal = Arc<Mutex<Vec<Event>>>;

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

fn meta_key(metadata: &ObjectMeta) -> String {
    key(
        metadata.namespace.as_deref().unwrap_or_default(),
        metadata.name.as_deref().unwrap_or_default(),
    )
}

fn guard_count(metadata: &ObjectMeta) -> usize {
    metadata
        .finalizers
        .iter()
        .flatten()
        .filter(|f| f.starts_with(DEADMANSSNITCH_FINALIZER_PREFIX))
        .count()
}

pub fn deletion_timestamp() -> Time {
    serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z")).unwrap()
}

/// In-memory object store with resourceVersion checks
#[derive(Default)]
pub struct MemoryStore {
    integrations: Mutex<BTreeMap<String, DeadmansSnitchIntegration>>,
    cluster_deployments: Mutex<BTreeMap<String, ClusterDeployment>>,
    secrets: Mutex<BTreeMap<String, Secret>>,
    sync_sets: Mutex<BTreeMap<String, SyncSet>>,
    conflicts: Mutex<HashSet<String>>,
    version: Mutex<u64>,
    journal: Journal,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self { journal, ..Self::default() }
    }

    fn next_version(&self) -> String {
        let mut version = self.version.lock().unwrap();
        *version += 1;
        version.to_string()
    }

    fn record(&self, event: Event) {
        self.journal.lock().unwrap().push(event);
    }

    pub fn insert_integration(&self, mut integration: DeadmansSnitchIntegration) {
        integration.metadata.resource_version = Some(self.next_version());
        self.integrations
            .lock()
            .unwrap()
            .insert(meta_key(&integration.metadata), integration);
    }

    pub fn insert_cluster_deployment(&self, mut cd: ClusterDeployment) {
        cd.metadata.resource_version = Some(self.next_version());
        self.cluster_deployments
            .lock()
            .unwrap()
            .insert(meta_key(&cd.metadata), cd);
    }

    pub fn insert_secret(&self, secret: Secret) {
        self.secrets.lock().unwrap().insert(meta_key(&secret.metadata), secret);
    }

    /// Make the next finalizer write to `namespace/name` fail with a conflict
    pub fn conflict_once(&self, namespace: &str, name: &str) {
        self.conflicts.lock().unwrap().insert(key(namespace, name));
    }

    /// Flag an object for deletion, as the API server does when finalizers remain
    pub fn mark_integration_deleted(&self, namespace: &str, name: &str) {
        if let Some(integration) = self.integrations.lock().unwrap().get_mut(&key(namespace, name)) {
            integration.metadata.deletion_timestamp = Some(deletion_timestamp());
        }
    }

    pub fn mark_cluster_deployment_deleted(&self, namespace: &str, name: &str) {
        if let Some(cd) = self.cluster_deployments.lock().unwrap().get_mut(&key(namespace, name)) {
            cd.metadata.deletion_timestamp = Some(deletion_timestamp());
        }
    }

    /// Change a stored ClusterDeployment, as Hive or a user would
    pub fn update_cluster_deployment<F: FnOnce(&mut ClusterDeployment)>(&self, namespace: &str, name: &str, change: F) {
        let version = self.next_version();
        if let Some(cd) = self.cluster_deployments.lock().unwrap().get_mut(&key(namespace, name)) {
            change(cd);
            cd.metadata.resource_version = Some(version);
        }
    }

    pub fn integration(&self, namespace: &str, name: &str) -> Option<DeadmansSnitchIntegration> {
        self.integrations.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn cluster_deployment(&self, namespace: &str, name: &str) -> Option<ClusterDeployment> {
        self.cluster_deployments.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn sync_set(&self, namespace: &str, name: &str) -> Option<SyncSet> {
        self.sync_sets.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    fn check_write(&self, object_key: &str, snapshot: &ObjectMeta, stored: &ObjectMeta) -> Result<(), ControllerError> {
        if self.conflicts.lock().unwrap().remove(object_key) {
            return Err(ControllerError::Conflict(object_key.to_string()));
        }
        if snapshot.resource_version.is_some() && snapshot.resource_version != stored.resource_version {
            return Err(ControllerError::Conflict(object_key.to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClusterStore for MemoryStore {
    async fn get_integration(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeadmansSnitchIntegration>, ControllerError> {
        Ok(self.integration(namespace, name))
    }

    async fn set_integration_finalizers(
        &self,
        snapshot: &DeadmansSnitchIntegration,
        finalizers: Vec<String>,
    ) -> Result<DeadmansSnitchIntegration, ControllerError> {
        let object_key = meta_key(&snapshot.metadata);
        let version = self.next_version();
        let mut integrations = self.integrations.lock().unwrap();
        let stored = integrations
            .get_mut(&object_key)
            .ok_or_else(|| ControllerError::Conflict(object_key.clone()))?;
        self.check_write(&object_key, &snapshot.metadata, &stored.metadata)?;

        let before = guard_count(&stored.metadata);
        stored.metadata.finalizers = Some(finalizers);
        stored.metadata.resource_version = Some(version);
        let after = guard_count(&stored.metadata);
        let updated = stored.clone();

        if after > before {
            self.record(Event::IntegrationGuarded(object_key.clone()));
        } else if after < before {
            self.record(Event::IntegrationReleased(object_key.clone()));
        }
        if updated.metadata.deletion_timestamp.is_some() && updated.metadata.finalizers.iter().flatten().next().is_none() {
            integrations.remove(&object_key);
        }
        Ok(updated)
    }

    async fn list_cluster_deployments(&self) -> Result<Vec<ClusterDeployment>, ControllerError> {
        Ok(self.cluster_deployments.lock().unwrap().values().cloned().collect())
    }

    async fn set_cluster_deployment_finalizers(
        &self,
        snapshot: &ClusterDeployment,
        finalizers: Vec<String>,
    ) -> Result<ClusterDeployment, ControllerError> {
        let object_key = meta_key(&snapshot.metadata);
        let version = self.next_version();
        let mut cds = self.cluster_deployments.lock().unwrap();
        let stored = cds
            .get_mut(&object_key)
            .ok_or_else(|| ControllerError::Conflict(object_key.clone()))?;
        self.check_write(&object_key, &snapshot.metadata, &stored.metadata)?;

        let before = guard_count(&stored.metadata);
        stored.metadata.finalizers = Some(finalizers);
        stored.metadata.resource_version = Some(version);
        let after = guard_count(&stored.metadata);
        let updated = stored.clone();

        if after > before {
            self.record(Event::ClusterDeploymentGuarded(object_key.clone()));
        } else if after < before {
            self.record(Event::ClusterDeploymentReleased(object_key.clone()));
        }
        if updated.metadata.deletion_timestamp.is_some() && updated.metadata.finalizers.iter().flatten().next().is_none() {
            cds.remove(&object_key);
        }
        Ok(updated)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ControllerError> {
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, secret: Secret) -> Result<(), ControllerError> {
        let object_key = meta_key(&secret.metadata);
        self.secrets.lock().unwrap().insert(object_key.clone(), secret);
        self.record(Event::SecretCreated(object_key));
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool, ControllerError> {
        let object_key = key(namespace, name);
        let existed = self.secrets.lock().unwrap().remove(&object_key).is_some();
        if existed {
            self.record(Event::SecretDeleted(object_key));
        }
        Ok(existed)
    }

    async fn get_sync_set(&self, namespace: &str, name: &str) -> Result<Option<SyncSet>, ControllerError> {
        Ok(self.sync_set(namespace, name))
    }

    async fn create_sync_set(&self, sync_set: SyncSet) -> Result<(), ControllerError> {
        let object_key = meta_key(&sync_set.metadata);
        self.sync_sets.lock().unwrap().insert(object_key.clone(), sync_set);
        self.record(Event::SyncSetCreated(object_key));
        Ok(())
    }

    async fn delete_sync_set(&self, namespace: &str, name: &str) -> Result<bool, ControllerError> {
        let object_key = key(namespace, name);
        let existed = self.sync_sets.lock().unwrap().remove(&object_key).is_some();
        if existed {
            self.record(Event::SyncSetDeleted(object_key));
        }
        Ok(existed)
    }
}

/// Mock client that also writes snitch side effects into the journal
pub struct RecordingDmsClient {
    inner: MockDmsClient,
    journal: Journal,
}

#[async_trait::async_trait]
impl DmsClientTrait for RecordingDmsClient {
    fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    async fn list_snitches(&self) -> Result<Vec<Snitch>, DmsError> {
        self.inner.list_snitches().await
    }

    async fn get_snitch(&self, token: &str) -> Result<Snitch, DmsError> {
        self.inner.get_snitch(token).await
    }

    async fn find_snitches_by_name(&self, name: &str) -> Result<Vec<Snitch>, DmsError> {
        self.inner.find_snitches_by_name(name).await
    }

    async fn create_snitch(&self, request: &CreateSnitchRequest) -> Result<Snitch, DmsError> {
        let snitch = self.inner.create_snitch(request).await?;
        self.journal.lock().unwrap().push(Event::SnitchCreated(snitch.name.clone()));
        Ok(snitch)
    }

    async fn check_in(&self, snitch: &Snitch) -> Result<(), DmsError> {
        self.inner.check_in(snitch).await?;
        self.journal.lock().unwrap().push(Event::SnitchCheckedIn(snitch.name.clone()));
        Ok(())
    }

    async fn delete_snitch(&self, token: &str) -> Result<bool, DmsError> {
        let deleted = self.inner.delete_snitch(token).await?;
        if deleted {
            self.journal.lock().unwrap().push(Event::SnitchDeleted(token.to_string()));
        }
        Ok(deleted)
    }
}

/// Hands out recording clients over one shared mock; remembers the API keys used
pub struct MockDmsClientFactory {
    mock: MockDmsClient,
    journal: Journal,
    pub api_keys: Arc<Mutex<Vec<String>>>,
}

impl DmsClientFactory for MockDmsClientFactory {
    fn client(&self, api_key: &str) -> Result<Box<dyn DmsClientTrait>, ControllerError> {
        self.api_keys.lock().unwrap().push(api_key.to_string());
        Ok(Box::new(RecordingDmsClient {
            inner: self.mock.clone(),
            journal: self.journal.clone(),
        }))
    }
}

/// Helper to create a Secret with one key
pub fn create_test_secret(namespace: &str, name: &str, data_key: &str, value: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            data_key.to_string(),
            ByteString(value.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

/// Helper to create a test DeadmansSnitchIntegration
pub fn create_test_integration(
    name: &str,
    match_labels: &[(&str, &str)],
    skip: &[(&str, &str)],
    postfix: Option<&str>,
) -> DeadmansSnitchIntegration {
    DeadmansSnitchIntegration {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(INTEGRATION_NAMESPACE.to_string()),
            ..Default::default()
        },
        spec: DeadmansSnitchIntegrationSpec {
            dms_api_key_secret_ref: SecretReference::new(API_KEY_SECRET, INTEGRATION_NAMESPACE),
            cluster_deployment_selector: ClusterDeploymentSelector {
                match_labels: match_labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                match_expressions: Vec::new(),
            },
            cluster_deployment_annotations_to_skip: skip
                .iter()
                .map(|(k, v)| AnnotationToSkip { name: k.to_string(), value: v.to_string() })
                .collect(),
            snitch_name_post_fix: postfix.map(str::to_string),
            tags: vec!["production".to_string()],
            target_secret_ref: SecretReference::new("dms-secret", "openshift-monitoring"),
        },
    }
}

/// Helper to create an installed, running ClusterDeployment
pub fn create_test_cluster_deployment(
    namespace: &str,
    name: &str,
    base_domain: &str,
    cluster_id: &str,
) -> ClusterDeployment {
    let mut cd = ClusterDeployment::new(
        name,
        ClusterDeploymentSpec {
            cluster_name: name.to_string(),
            base_domain: base_domain.to_string(),
            installed: true,
            power_state: Some(ClusterPowerState::Running),
            cluster_metadata: Some(ClusterMetadata {
                cluster_id: cluster_id.to_string(),
                infra_id: format!("{}-infra", name),
            }),
        },
    );
    cd.metadata.namespace = Some(namespace.to_string());
    cd.metadata.uid = Some(format!("uid-{}", name));
    cd
}

/// Builder-style tweaks for ClusterDeployment fixtures
pub trait ClusterDeploymentExt {
    fn with_labels(self, labels: &[(&str, &str)]) -> Self;
    fn with_annotations(self, annotations: &[(&str, &str)]) -> Self;
    fn hibernating(self) -> Self;
    fn not_installed(self) -> Self;
}

impl ClusterDeploymentExt for ClusterDeployment {
    fn with_labels(mut self, labels: &[(&str, &str)]) -> Self {
        self.metadata.labels = Some(labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());
        self
    }

    fn with_annotations(mut self, annotations: &[(&str, &str)]) -> Self {
        self.metadata.annotations = Some(annotations.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());
        self
    }

    fn hibernating(mut self) -> Self {
        self.spec.power_state = Some(ClusterPowerState::Hibernating);
        self
    }

    fn not_installed(mut self) -> Self {
        self.spec.installed = false;
        self.spec.cluster_metadata = None;
        self
    }
}

/// Reconciler wired to a [`MemoryStore`] and a shared [`MockDmsClient`]
pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub dms: MockDmsClient,
    pub journal: Journal,
    pub api_keys: Arc<Mutex<Vec<String>>>,
    pub reconciler: Arc<Reconciler>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_naming(NamingStrategy::ClusterDomain)
    }

    pub fn with_naming(naming: NamingStrategy) -> Self {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryStore::with_journal(journal.clone()));
        store.insert_secret(create_test_secret(
            INTEGRATION_NAMESPACE,
            API_KEY_SECRET,
            DEFAULT_API_KEY_SECRET_KEY,
            "test-api-key",
        ));

        let dms = MockDmsClient::new("http://dms.test");
        let api_keys = Arc::new(Mutex::new(Vec::new()));
        let factory = MockDmsClientFactory {
            mock: dms.clone(),
            journal: journal.clone(),
            api_keys: api_keys.clone(),
        };
        let resolver = SecretCredentialResolver::new(store.clone(), DEFAULT_API_KEY_SECRET_KEY);
        let settings = ReconcilerSettings {
            naming,
            snitch_url_key: DEFAULT_SNITCH_URL_KEY.to_string(),
            runbook_url: DEFAULT_RUNBOOK_URL.to_string(),
        };
        let reconciler = Arc::new(Reconciler::new(store.clone(), Arc::new(resolver), Arc::new(factory), settings));

        Self {
            store,
            dms,
            journal,
            api_keys,
            reconciler,
        }
    }

    pub async fn reconcile(&self, name: &str) -> Result<(), ReconcileError> {
        self.reconciler.reconcile_integration(INTEGRATION_NAMESPACE, name).await
    }

    pub fn events(&self) -> Vec<Event> {
        self.journal.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.journal.lock().unwrap().clear();
    }

    /// Position of `event` in the journal
    pub fn position(&self, event: &Event) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("event {:?} not recorded in {:?}", event, self.events()))
    }
}
