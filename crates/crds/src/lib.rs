//! Dead Man's Snitch operator CRD definitions
//!
//! The `DeadmansSnitchIntegration` CRD is owned by this project. The Hive
//! `ClusterDeployment` and `SyncSet` types are partial models of CRDs
//! owned by Hive, kept to the fields the controller reads or writes.

pub mod cluster_deployment;
pub mod deadmanssnitch_integration;
pub mod references;
pub mod sync_set;

pub use cluster_deployment::*;
pub use deadmanssnitch_integration::*;
pub use references::*;
pub use sync_set::*;
