//! API key resolution and per-pass Dead Man's Snitch clients.
//!
//! The reconciler resolves the integration's API key and builds a fresh
//! client on every pass through these two seams.

use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::store::ClusterStore;
use crds::SecretReference;
use dms_client::{CreateSnitchRequest, DeadMansSnitchClient, DmsClientTrait, DmsError, Snitch};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Resolves the API key an integration points at
#[async_trait::async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, reference: &SecretReference) -> Result<String, ControllerError>;
}

/// Reads the API key from a key of a Kubernetes Secret
pub struct SecretCredentialResolver {
    store: Arc<dyn ClusterStore>,
    key: String,
}

impl SecretCredentialResolver {
    pub fn new(store: Arc<dyn ClusterStore>, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }
}

#[async_trait::async_trait]
impl CredentialResolver for SecretCredentialResolver {
    async fn resolve(&self, reference: &SecretReference) -> Result<String, ControllerError> {
        let secret = self
            .store
            .get_secret(&reference.namespace, &reference.name)
            .await?
            .ok_or_else(|| ControllerError::MissingCredential(format!("secret {} not found", reference)))?;

        let value = secret
            .data
            .as_ref()
            .and_then(|data| data.get(&self.key))
            .map(|bytes| String::from_utf8_lossy(&bytes.0).trim().to_string())
            .or_else(|| {
                secret
                    .string_data
                    .as_ref()
                    .and_then(|data| data.get(&self.key))
                    .map(|value| value.trim().to_string())
            })
            .filter(|value| !value.is_empty());

        value.ok_or_else(|| {
            ControllerError::MissingCredential(format!("key {} missing from secret {}", self.key, reference))
        })
    }
}

/// Builds a Dead Man's Snitch client for one API key
pub trait DmsClientFactory: Send + Sync {
    fn client(&self, api_key: &str) -> Result<Box<dyn DmsClientTrait>, ControllerError>;
}

/// Builds HTTP clients wrapped with metrics
pub struct HttpDmsClientFactory {
    base_url: String,
    metrics: Metrics,
}

impl HttpDmsClientFactory {
    pub fn new(base_url: impl Into<String>, metrics: Metrics) -> Self {
        Self { base_url: base_url.into(), metrics }
    }
}

impl DmsClientFactory for HttpDmsClientFactory {
    fn client(&self, api_key: &str) -> Result<Box<dyn DmsClientTrait>, ControllerError> {
        let client = DeadMansSnitchClient::new(self.base_url.clone(), api_key.to_string())?;
        Ok(Box::new(InstrumentedDmsClient::new(Box::new(client), self.metrics.clone())))
    }
}

/// Records a call count and duration for every API call
pub struct InstrumentedDmsClient {
    inner: Box<dyn DmsClientTrait>,
    metrics: Metrics,
}

impl InstrumentedDmsClient {
    pub fn new(inner: Box<dyn DmsClientTrait>, metrics: Metrics) -> Self {
        Self { inner, metrics }
    }

    async fn observe<T, F>(&self, operation: &str, call: F) -> Result<T, DmsError>
    where
        F: Future<Output = Result<T, DmsError>> + Send,
    {
        let started = Instant::now();
        let result = call.await;
        self.metrics
            .record_dms_call(operation, result.is_ok(), started.elapsed().as_secs_f64());
        result
    }
}

#[async_trait::async_trait]
impl DmsClientTrait for InstrumentedDmsClient {
    fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    async fn list_snitches(&self) -> Result<Vec<Snitch>, DmsError> {
        self.observe("list_snitches", self.inner.list_snitches()).await
    }

    async fn get_snitch(&self, token: &str) -> Result<Snitch, DmsError> {
        self.observe("get_snitch", self.inner.get_snitch(token)).await
    }

    async fn find_snitches_by_name(&self, name: &str) -> Result<Vec<Snitch>, DmsError> {
        self.observe("find_snitches_by_name", self.inner.find_snitches_by_name(name)).await
    }

    async fn create_snitch(&self, request: &CreateSnitchRequest) -> Result<Snitch, DmsError> {
        self.observe("create_snitch", self.inner.create_snitch(request)).await
    }

    async fn check_in(&self, snitch: &Snitch) -> Result<(), DmsError> {
        self.observe("check_in", self.inner.check_in(snitch)).await
    }

    async fn delete_snitch(&self, token: &str) -> Result<bool, DmsError> {
        self.observe("delete_snitch", self.inner.delete_snitch(token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use dms_client::{MockDmsClient, MockOperation};
    use prometheus::Registry;

    #[tokio::test]
    async fn test_resolves_key_from_secret() {
        let store = Arc::new(MemoryStore::new());
        store.insert_secret(create_test_secret("deadmanssnitch-operator", "dms-api-key", "deadmanssnitch-api-key", " abc123\n"));
        let resolver = SecretCredentialResolver::new(store, "deadmanssnitch-api-key");

        let key = resolver
            .resolve(&SecretReference::new("dms-api-key", "deadmanssnitch-operator"))
            .await
            .unwrap();
        assert_eq!(key, "abc123");
    }

    #[tokio::test]
    async fn test_missing_secret_or_key_is_missing_credential() {
        let store = Arc::new(MemoryStore::new());
        store.insert_secret(create_test_secret("deadmanssnitch-operator", "dms-api-key", "other-key", "abc"));
        let resolver = SecretCredentialResolver::new(store, "deadmanssnitch-api-key");

        let err = resolver
            .resolve(&SecretReference::new("dms-api-key", "deadmanssnitch-operator"))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::MissingCredential(_)));

        let err = resolver
            .resolve(&SecretReference::new("absent", "deadmanssnitch-operator"))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::MissingCredential(_)));
    }

    #[tokio::test]
    async fn test_instrumented_client_records_outcomes() {
        let metrics = Metrics::new(&Registry::new()).unwrap();
        let mock = MockDmsClient::new("http://dms.test");
        let client = InstrumentedDmsClient::new(Box::new(mock.clone()), metrics.clone());

        client.find_snitches_by_name("a.example.com").await.unwrap();
        mock.fail(MockOperation::Create, 500);
        assert!(client.create_snitch(&CreateSnitchRequest::new("a.example.com")).await.is_err());

        let calls = &metrics.dms_api_calls_total;
        assert_eq!(calls.with_label_values(&["find_snitches_by_name", "success"]).get(), 1);
        assert_eq!(calls.with_label_values(&["create_snitch", "error"]).get(), 1);
    }

    #[test]
    fn test_http_factory_rejects_empty_key() {
        let factory = HttpDmsClientFactory::new("http://dms.test", Metrics::new(&Registry::new()).unwrap());
        assert!(factory.client("").is_err());
        assert!(factory.client("key").is_ok());
    }
}
