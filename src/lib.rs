//! Managed cluster import controllers
//!
//! Hub-side controllers that drive a managed cluster through import:
//! aggregating klusterlet manifest availability into the import condition,
//! turning caller-provided credentials into a bootstrap secret with bounded
//! retry, and deleting cluster namespaces once nothing inside still needs
//! them. The library is used by the binary and by the integration tests.

pub mod cli;
pub mod condition;
pub mod config;
pub mod controller;
pub mod error;
pub mod hub;
pub mod models;
pub mod watcher;

// Re-export commonly used types for convenience
pub use condition::{Condition, ConditionStatus, find_condition, set_condition};
pub use error::Error;
pub use hub::{HubClient, KubeHubClient};
pub use watcher::{EventKind, Notification, Router};
