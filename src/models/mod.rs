//! Model layer
//!
//! Rust types for the hub resources the controllers read and write.
//!
//! Structure:
//! - `managed_cluster.rs` - ManagedCluster and its import condition reasons
//! - `manifest_work.rs` - ManifestWork and its availability
//! - `resource_kind.rs` - The fixed set of watched kinds
//! - `constants.rs` - Names, labels and annotations shared with other writers

pub mod constants;
pub mod managed_cluster;
pub mod manifest_work;
pub mod resource_kind;

pub use managed_cluster::{
    DeployMode, ImportReason, ManagedCluster, ManagedClusterSpec, ManagedClusterStatus,
};
pub use manifest_work::{ManifestWork, ManifestWorkSpec, ManifestWorkStatus};
pub use resource_kind::ResourceKind;
