//! ManagedCluster resource
//!
//! Only the fields these controllers read or write are modelled. The CRD is
//! installed by the cluster-manager, so no schema is generated here.

use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::constants::{
    CONDITION_MANAGED_CLUSTER_IMPORT_SUCCEEDED, KLUSTERLET_DEPLOY_MODE_ANNOTATION,
};
use crate::condition::{Condition, find_condition};

/// Spec of a managed cluster
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "cluster.open-cluster-management.io",
    version = "v1",
    kind = "ManagedCluster",
    plural = "managedclusters",
    status = "ManagedClusterStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterSpec {
    #[serde(default)]
    pub hub_accepts_client: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_duration_seconds: Option<i32>,
}

/// Status of a managed cluster
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Where the klusterlet agent runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployMode {
    /// Agent runs on the managed cluster itself
    #[default]
    Default,
    /// Agent runs on a hosting cluster, status handled elsewhere
    Hosted,
}

impl FromStr for DeployMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Default" => Ok(DeployMode::Default),
            "Hosted" => Ok(DeployMode::Hosted),
            _ => Err(format!("Unknown klusterlet deploy mode: {}", s)),
        }
    }
}

/// Reasons of the import condition, in progression order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportReason {
    WaitForImporting,
    Importing,
    ImportFailed,
    Imported,
}

impl ImportReason {
    /// Reason string as stored on the condition
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportReason::WaitForImporting => "ManagedClusterWaitForImporting",
            ImportReason::Importing => "ManagedClusterImporting",
            ImportReason::ImportFailed => "ManagedClusterImportFailed",
            ImportReason::Imported => "ManagedClusterImported",
        }
    }

    pub fn parse_optional(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

impl fmt::Display for ImportReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImportReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ManagedClusterWaitForImporting" => Ok(ImportReason::WaitForImporting),
            "ManagedClusterImporting" => Ok(ImportReason::Importing),
            "ManagedClusterImportFailed" => Ok(ImportReason::ImportFailed),
            "ManagedClusterImported" => Ok(ImportReason::Imported),
            _ => Err(format!("Unknown import condition reason: {}", s)),
        }
    }
}

impl ManagedCluster {
    /// Deploy mode from the klusterlet annotation; unknown values count as default
    pub fn deploy_mode(&self) -> DeployMode {
        self.annotations()
            .get(KLUSTERLET_DEPLOY_MODE_ANNOTATION)
            .and_then(|mode| mode.parse().ok())
            .unwrap_or_default()
    }

    /// Whether removal of the cluster has been requested
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// The import condition, if any writer has initialized it
    pub fn import_condition(&self) -> Option<&Condition> {
        find_condition(self.conditions(), CONDITION_MANAGED_CLUSTER_IMPORT_SUCCEEDED)
    }

    /// Reason of the import condition; `None` if absent or not a known reason
    pub fn import_reason(&self) -> Option<ImportReason> {
        self.import_condition()
            .and_then(|c| ImportReason::parse_optional(&c.reason))
    }
}
