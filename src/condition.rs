//! Status condition model
//!
//! Conditions are kept as an ordered list keyed by `type`. The only way to
//! change the list is [`set_condition`], an idempotent upsert: writing the
//! same status and reason twice reports "unchanged" so callers can skip the
//! API write entirely and avoid reconcile loops driven by their own updates.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl ConditionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named status condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., ManagedClusterImportSucceeded)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the status transitioned
    pub last_transition_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a new condition stamped with the current time
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: now(),
            observed_generation: None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Find a condition by type
///
/// `None` means the condition was never written, which is not the same
/// thing as any particular reason.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Insert or update a condition, returning whether anything changed
///
/// - Same status and reason as the existing entry: nothing changes, not even
///   the message, and `false` is returned.
/// - Status changed: the entry is rewritten with a fresh transition time.
/// - Only reason/message changed: the transition time is kept.
/// - No entry of this type: appended at the end.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == type_) {
        Some(existing) => {
            if existing.status == status && existing.reason == reason {
                return false;
            }
            if existing.status != status {
                existing.last_transition_time = now();
            }
            existing.status = status;
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            true
        }
        None => {
            conditions.push(Condition::new(type_, status, reason, message));
            true
        }
    }
}

// The API server stores transition times with second precision
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}
