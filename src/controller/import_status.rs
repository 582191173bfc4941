//! Import status aggregation
//!
//! Moves a cluster's import condition out of `Importing` once every klusterlet
//! manifest work reports `Available=True`. The aggregator never initializes
//! the condition and never overrides a reason set by another writer.

use kube::ResourceExt;
use std::collections::BTreeSet;

use crate::condition::{ConditionStatus, set_condition};
use crate::error::Error;
use crate::hub::HubClient;
use crate::models::constants::{
    CONDITION_MANAGED_CLUSTER_IMPORT_SUCCEEDED, expected_klusterlet_works,
};
use crate::models::{DeployMode, ImportReason, ManifestWork};

/// Result of one aggregation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatusOutcome {
    /// Nothing to do for this cluster in its current state
    Skipped,
    /// The computed condition already matches what is stored
    Unchanged,
    /// The condition was written
    Updated(ImportReason),
}

/// Reconcile the import condition of one cluster
pub async fn reconcile_import_status(
    hub: &dyn HubClient,
    cluster_name: &str,
) -> Result<ImportStatusOutcome, Error> {
    let Some(cluster) = hub.get_managed_cluster(cluster_name).await? else {
        tracing::debug!(cluster = %cluster_name, "Cluster not found, skipping import status");
        return Ok(ImportStatusOutcome::Skipped);
    };

    if cluster.deploy_mode() == DeployMode::Hosted {
        tracing::debug!(cluster = %cluster_name, "Hosted cluster, skipping import status");
        return Ok(ImportStatusOutcome::Skipped);
    }

    if cluster.is_deleting() {
        tracing::debug!(cluster = %cluster_name, "Cluster is deleting, skipping import status");
        return Ok(ImportStatusOutcome::Skipped);
    }

    // Absent condition and any reason other than Importing belong to other writers
    if cluster.import_condition().is_none() {
        tracing::debug!(cluster = %cluster_name, "Import condition not initialized yet");
        return Ok(ImportStatusOutcome::Skipped);
    }
    if cluster.import_reason() != Some(ImportReason::Importing) {
        return Ok(ImportStatusOutcome::Skipped);
    }

    let works = hub.list_klusterlet_works(&cluster.name_any()).await?;
    let pending = pending_works(&cluster.name_any(), &works);

    let (status, reason, message) = if pending.is_empty() {
        (
            ConditionStatus::True,
            ImportReason::Imported,
            "Import succeeded".to_string(),
        )
    } else {
        (
            ConditionStatus::False,
            ImportReason::Importing,
            format!("Wait for importing: {} not available", pending.join(", ")),
        )
    };

    let mut conditions = cluster.conditions().to_vec();
    if !set_condition(
        &mut conditions,
        CONDITION_MANAGED_CLUSTER_IMPORT_SUCCEEDED,
        status,
        reason.as_str(),
        &message,
    ) {
        return Ok(ImportStatusOutcome::Unchanged);
    }

    hub.update_cluster_conditions(&cluster, &conditions).await?;
    tracing::info!(cluster = %cluster_name, reason = %reason, "Updated import condition");
    Ok(ImportStatusOutcome::Updated(reason))
}

/// Expected klusterlet works that are missing or not yet available
///
/// Works are matched by label when listed; an unexpected extra work never
/// blocks success, and its availability is ignored.
pub fn pending_works(cluster_name: &str, works: &[ManifestWork]) -> Vec<String> {
    let available: BTreeSet<String> = works
        .iter()
        .filter(|w| w.is_available())
        .map(|w| w.name_any())
        .collect();

    expected_klusterlet_works(cluster_name)
        .into_iter()
        .filter(|name| !available.contains(name))
        .collect()
}
