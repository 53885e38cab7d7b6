//! DmsClient trait for mocking
//!
//! The concrete client implements this trait so the controller can run
//! against [`crate::mock::MockDmsClient`] in unit tests.

use crate::error::DmsError;
use crate::models::*;

/// Dead Man's Snitch API operations used by the operator
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait DmsClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    async fn list_snitches(&self) -> Result<Vec<Snitch>, DmsError>;
    async fn get_snitch(&self, token: &str) -> Result<Snitch, DmsError>;

    /// All snitches whose name equals `name` exactly (possibly several)
    async fn find_snitches_by_name(&self, name: &str) -> Result<Vec<Snitch>, DmsError>;

    async fn create_snitch(&self, request: &CreateSnitchRequest) -> Result<Snitch, DmsError>;

    /// Send one heartbeat to the snitch's check-in URL
    async fn check_in(&self, snitch: &Snitch) -> Result<(), DmsError>;

    /// Delete by token; `Ok(false)` when the snitch was already gone
    async fn delete_snitch(&self, token: &str) -> Result<bool, DmsError>;
}
