//! ManifestWork resource
//!
//! Written by the deployment applier; these controllers only read its labels
//! and the `Available` condition.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

use super::constants::WORK_AVAILABLE_CONDITION;
use crate::condition::{Condition, find_condition};

/// Spec of a manifest work
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "work.open-cluster-management.io",
    version = "v1",
    kind = "ManifestWork",
    plural = "manifestworks",
    namespaced,
    status = "ManifestWorkStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkSpec {
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub workload: serde_json::Value,
}

/// Status of a manifest work
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl ManifestWork {
    /// Whether the applier reported `Available=True`
    ///
    /// A work whose `Available` condition was never reported is treated the
    /// same as one reporting `False`.
    pub fn is_available(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| find_condition(&s.conditions, WORK_AVAILABLE_CONDITION))
            .is_some_and(Condition::is_true)
    }
}
