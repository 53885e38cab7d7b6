//! Dead Man's Snitch API client
//!
//! Implements the subset of the Dead Man's Snitch REST API the operator needs.
//! Based on the API structure: /v1/snitches and /v1/snitches/{token}

use crate::dms_trait::DmsClientTrait;
use crate::error::DmsError;
use crate::models::*;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Public API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.deadmanssnitch.com";

/// Dead Man's Snitch API client
///
/// Authenticates with HTTP basic auth: the API key is the user name and the
/// password is empty.
pub struct DeadMansSnitchClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl DeadMansSnitchClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., "https://api.deadmanssnitch.com")
    /// * `api_key` - account API key
    pub fn new(base_url: String, api_key: String) -> Result<Self, DmsError> {
        if api_key.is_empty() {
            return Err(DmsError::InvalidRequest("API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(DmsError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn snitches_url(&self) -> String {
        format!("{}/v1/snitches", self.base_url)
    }

    fn snitch_url(&self, token: &str) -> String {
        format!("{}/v1/snitches/{}", self.base_url, urlencoding::encode(token))
    }

    /// Map a non-success response onto a [`DmsError`]
    async fn error_for(response: Response, context: &str) -> DmsError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                DmsError::Authentication(format!("{}: {} - {}", context, status, body))
            }
            StatusCode::NOT_FOUND => DmsError::NotFound(context.to_string()),
            _ => DmsError::Api {
                status: status.as_u16(),
                message: format!("{}: {}", context, body),
            },
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, DmsError> {
        let text = response.text().await.map_err(DmsError::Http)?;
        serde_json::from_str(&text).map_err(DmsError::Serialization)
    }

    /// List every snitch on the account
    pub async fn list_snitches(&self) -> Result<Vec<Snitch>, DmsError> {
        debug!("Listing snitches");

        let response = self
            .client
            .get(self.snitches_url())
            .basic_auth(&self.api_key, Some(""))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(DmsError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "list snitches").await);
        }

        Self::parse(response).await
    }

    /// Fetch one snitch by token
    pub async fn get_snitch(&self, token: &str) -> Result<Snitch, DmsError> {
        debug!("Getting snitch {}", token);

        let response = self
            .client
            .get(self.snitch_url(token))
            .basic_auth(&self.api_key, Some(""))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(DmsError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, &format!("snitch {}", token)).await);
        }

        Self::parse(response).await
    }

    /// All snitches whose name matches exactly
    pub async fn find_snitches_by_name(&self, name: &str) -> Result<Vec<Snitch>, DmsError> {
        let snitches = self.list_snitches().await?;
        let matching: Vec<Snitch> = snitches.into_iter().filter(|s| s.name == name).collect();
        debug!("Found {} snitch(es) named {}", matching.len(), name);
        Ok(matching)
    }

    /// Create a snitch
    pub async fn create_snitch(&self, request: &CreateSnitchRequest) -> Result<Snitch, DmsError> {
        if request.name.is_empty() {
            return Err(DmsError::InvalidRequest("snitch name is empty".to_string()));
        }
        debug!("Creating snitch {}", request.name);

        let response = self
            .client
            .post(self.snitches_url())
            .basic_auth(&self.api_key, Some(""))
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(DmsError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, &format!("create snitch {}", request.name)).await);
        }

        Self::parse(response).await
    }

    /// Send a heartbeat to the snitch's check-in URL
    pub async fn check_in(&self, snitch: &Snitch) -> Result<(), DmsError> {
        if snitch.check_in_url.is_empty() {
            return Err(DmsError::InvalidRequest(format!(
                "snitch {} has no check-in URL",
                snitch.token
            )));
        }
        debug!("Checking in snitch {}", snitch.name);

        let response = self
            .client
            .get(&snitch.check_in_url)
            .send()
            .await
            .map_err(DmsError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, &format!("check in {}", snitch.name)).await);
        }

        Ok(())
    }

    /// Delete a snitch; a snitch that no longer exists is not an error
    pub async fn delete_snitch(&self, token: &str) -> Result<bool, DmsError> {
        debug!("Deleting snitch {}", token);

        let response = self
            .client
            .delete(self.snitch_url(token))
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await
            .map_err(DmsError::Http)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::error_for(response, &format!("delete snitch {}", token)).await);
        }

        Ok(true)
    }
}

#[async_trait::async_trait]
impl DmsClientTrait for DeadMansSnitchClient {
    fn base_url(&self) -> &str {
        self.base_url()
    }

    async fn list_snitches(&self) -> Result<Vec<Snitch>, DmsError> {
        self.list_snitches().await
    }

    async fn get_snitch(&self, token: &str) -> Result<Snitch, DmsError> {
        self.get_snitch(token).await
    }

    async fn find_snitches_by_name(&self, name: &str) -> Result<Vec<Snitch>, DmsError> {
        self.find_snitches_by_name(name).await
    }

    async fn create_snitch(&self, request: &CreateSnitchRequest) -> Result<Snitch, DmsError> {
        self.create_snitch(request).await
    }

    async fn check_in(&self, snitch: &Snitch) -> Result<(), DmsError> {
        self.check_in(snitch).await
    }

    async fn delete_snitch(&self, token: &str) -> Result<bool, DmsError> {
        self.delete_snitch(token).await
    }
}
