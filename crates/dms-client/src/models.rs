//! Dead Man's Snitch API data models
//!
//! Mirrors the JSON shapes of the `/v1/snitches` endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Check-in interval used for every snitch the operator creates
pub const DEFAULT_INTERVAL: &str = "15_minute";

/// Alert type used for every snitch the operator creates
pub const DEFAULT_ALERT_TYPE: &str = "basic";

/// Snitch status as reported by the API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SnitchStatus {
    /// Created but never checked in
    Pending,
    Healthy,
    Failed,
    Errored,
    Missing,
    Paused,
    /// Any status this client does not know about
    #[serde(other)]
    Unknown,
}

/// A snitch (heartbeat monitor)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snitch {
    /// Opaque unique identifier
    pub token: String,
    #[serde(default)]
    pub href: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: SnitchStatus,
    /// URL a heartbeat is sent to
    pub check_in_url: String,
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub alert_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl Snitch {
    /// A snitch that has never received a heartbeat
    pub fn is_pending(&self) -> bool {
        self.status == SnitchStatus::Pending
    }
}

/// Body of `POST /v1/snitches`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSnitchRequest {
    pub name: String,
    pub interval: String,
    pub alert_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CreateSnitchRequest {
    /// Request with the default interval and alert type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval: DEFAULT_INTERVAL.to_string(),
            alert_type: DEFAULT_ALERT_TYPE.to_string(),
            tags: Vec::new(),
            notes: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
