//! Dead Man's Snitch REST API Client
//!
//! A Rust client library for the Dead Man's Snitch heartbeat monitoring API.
//! Provides type-safe models and the snitch lifecycle operations the
//! operator needs.
//!
//! # Example
//!
//! ```no_run
//! use dms_client::{CreateSnitchRequest, DeadMansSnitchClient, DEFAULT_BASE_URL};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DeadMansSnitchClient::new(
//!     DEFAULT_BASE_URL.to_string(),
//!     "your-api-key".to_string(),
//! )?;
//!
//! // Look for an existing monitor before creating one
//! let existing = client.find_snitches_by_name("cluster1.example.com").await?;
//! let snitch = match existing.into_iter().next() {
//!     Some(snitch) => snitch,
//!     None => {
//!         let request = CreateSnitchRequest::new("cluster1.example.com")
//!             .with_tags(vec!["production".to_string()]);
//!         client.create_snitch(&request).await?
//!     }
//! };
//!
//! // A fresh snitch stays pending until its first heartbeat
//! if snitch.is_pending() {
//!     client.check_in(&snitch).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Snitch lifecycle**: list, look up by name, create, check in, delete
//! - **Idempotent delete**: deleting a missing snitch reports `false`
//! - **Mocking**: `test-util` feature exposes an in-memory [`MockDmsClient`]

pub mod client;
#[path = "trait.rs"]
pub mod dms_trait;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod models;

pub use client::{DeadMansSnitchClient, DEFAULT_BASE_URL};
pub use dms_trait::DmsClientTrait;
pub use error::DmsError;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCall, MockDmsClient, MockOperation};
pub use models::*;
