//! Mock DmsClient for unit testing
//!
//! In-memory implementation of [`DmsClientTrait`] so the controller can be
//! exercised without network access.

use crate::dms_trait::DmsClientTrait;
use crate::error::DmsError;
use crate::models::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    List,
    Create,
    CheckIn,
    Delete,
}

/// One recorded call against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    List,
    Create(String),
    CheckIn(String),
    Delete(String),
}

/// Mock Dead Man's Snitch client
///
/// Clones share state, so a test can keep one handle for assertions while
/// the controller owns another.
#[derive(Clone)]
pub struct MockDmsClient {
    base_url: String,
    // Insertion order is kept so duplicate names stay observable
    snitches: Arc<Mutex<Vec<Snitch>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    failures: Arc<Mutex<HashMap<MockOperation, u16>>>,
    next_id: Arc<Mutex<u64>>,
}

impl MockDmsClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            snitches: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Build a snitch the way the API would return it
    pub fn snitch(&self, name: &str, status: SnitchStatus) -> Snitch {
        let token = {
            let mut id = self.next_id.lock().unwrap();
            let current = *id;
            *id += 1;
            format!("{:06}{}", current, &uuid::Uuid::new_v4().simple().to_string()[..4])
        };
        Snitch {
            href: format!("/v1/snitches/{}", token),
            check_in_url: format!("https://nosnch.in/{}", token),
            token,
            name: name.to_string(),
            tags: Vec::new(),
            notes: None,
            status,
            interval: DEFAULT_INTERVAL.to_string(),
            alert_type: DEFAULT_ALERT_TYPE.to_string(),
            created_at: Some(Utc::now()),
            checked_in_at: None,
        }
    }

    /// Add a snitch to the mock store (for test setup)
    pub fn add_snitch(&self, snitch: Snitch) {
        self.snitches.lock().unwrap().push(snitch);
    }

    /// Seed a snitch by name and return it
    pub fn seed(&self, name: &str, status: SnitchStatus) -> Snitch {
        let snitch = self.snitch(name, status);
        self.add_snitch(snitch.clone());
        snitch
    }

    /// Make every later call of `operation` fail with `status`
    pub fn fail(&self, operation: MockOperation, status: u16) {
        self.failures.lock().unwrap().insert(operation, status);
    }

    /// Clear all injected failures
    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn snitches(&self) -> Vec<Snitch> {
        self.snitches.lock().unwrap().clone()
    }

    pub fn snitches_named(&self, name: &str) -> Vec<Snitch> {
        self.snitches().into_iter().filter(|s| s.name == name).collect()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, MockCall::Create(_))).count()
    }

    pub fn check_in_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, MockCall::CheckIn(_))).count()
    }

    pub fn delete_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, MockCall::Delete(_))).count()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn injected(&self, operation: MockOperation) -> Result<(), DmsError> {
        match self.failures.lock().unwrap().get(&operation) {
            None => Ok(()),
            Some(401) | Some(403) => Err(DmsError::Authentication("injected".to_string())),
            Some(status) => Err(DmsError::Api {
                status: *status,
                message: format!("injected {:?} failure", operation),
            }),
        }
    }
}

#[async_trait::async_trait]
impl DmsClientTrait for MockDmsClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_snitches(&self) -> Result<Vec<Snitch>, DmsError> {
        self.record(MockCall::List);
        self.injected(MockOperation::List)?;
        Ok(self.snitches())
    }

    async fn get_snitch(&self, token: &str) -> Result<Snitch, DmsError> {
        self.injected(MockOperation::List)?;
        self.snitches()
            .into_iter()
            .find(|s| s.token == token)
            .ok_or_else(|| DmsError::NotFound(format!("snitch {}", token)))
    }

    async fn find_snitches_by_name(&self, name: &str) -> Result<Vec<Snitch>, DmsError> {
        self.record(MockCall::List);
        self.injected(MockOperation::List)?;
        Ok(self.snitches_named(name))
    }

    async fn create_snitch(&self, request: &CreateSnitchRequest) -> Result<Snitch, DmsError> {
        self.record(MockCall::Create(request.name.clone()));
        self.injected(MockOperation::Create)?;
        if request.name.is_empty() {
            return Err(DmsError::InvalidRequest("snitch name is empty".to_string()));
        }

        let mut snitch = self.snitch(&request.name, SnitchStatus::Pending);
        snitch.tags = request.tags.clone();
        snitch.notes = request.notes.clone();
        snitch.interval = request.interval.clone();
        snitch.alert_type = request.alert_type.clone();
        self.add_snitch(snitch.clone());
        Ok(snitch)
    }

    async fn check_in(&self, snitch: &Snitch) -> Result<(), DmsError> {
        self.record(MockCall::CheckIn(snitch.token.clone()));
        self.injected(MockOperation::CheckIn)?;

        let mut snitches = self.snitches.lock().unwrap();
        match snitches.iter_mut().find(|s| s.token == snitch.token) {
            Some(stored) => {
                stored.status = SnitchStatus::Healthy;
                stored.checked_in_at = Some(Utc::now());
                Ok(())
            }
            None => Err(DmsError::NotFound(format!("snitch {}", snitch.token))),
        }
    }

    async fn delete_snitch(&self, token: &str) -> Result<bool, DmsError> {
        self.record(MockCall::Delete(token.to_string()));
        self.injected(MockOperation::Delete)?;

        let mut snitches = self.snitches.lock().unwrap();
        let before = snitches.len();
        snitches.retain(|s| s.token != token);
        Ok(snitches.len() != before)
    }
}
