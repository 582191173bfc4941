//! Cluster namespace deletion
//!
//! Acts as a barrier in front of namespace deletion: a cluster namespace is
//! removed only once its cluster is gone (or going) and no provisioning
//! record that another controller still has to finalize is left inside it.
//! The dependent records themselves are never deleted here.

use kube::ResourceExt;

use crate::error::Error;
use crate::hub::HubClient;
use crate::models::ResourceKind;
use crate::models::constants::CLUSTER_NAMESPACE_LABEL;

/// Result of one deletion pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceDeletionOutcome {
    /// Namespace absent, not a cluster namespace, or already terminating
    Skipped,
    /// The managed cluster still exists and is not being deleted
    ClusterPresent,
    /// Dependent records remain, as `kind/name`
    Blocked(Vec<String>),
    /// The namespace delete was issued
    Deleted,
}

/// Reconcile the namespace of one cluster
pub async fn reconcile_namespace_deletion(
    hub: &dyn HubClient,
    namespace: &str,
) -> Result<NamespaceDeletionOutcome, Error> {
    let Some(ns) = hub.get_namespace(namespace).await? else {
        return Ok(NamespaceDeletionOutcome::Skipped);
    };
    if !ns.labels().contains_key(CLUSTER_NAMESPACE_LABEL) {
        tracing::debug!(namespace = %namespace, "Not a cluster namespace");
        return Ok(NamespaceDeletionOutcome::Skipped);
    }
    if ns.metadata.deletion_timestamp.is_some() {
        return Ok(NamespaceDeletionOutcome::Skipped);
    }

    if let Some(cluster) = hub.get_managed_cluster(namespace).await? {
        if !cluster.is_deleting() {
            return Ok(NamespaceDeletionOutcome::ClusterPresent);
        }
    }

    let mut remaining = Vec::new();
    for kind in ResourceKind::namespace_dependents() {
        for name in hub.list_names(*kind, namespace).await? {
            remaining.push(format!("{}/{}", kind, name));
        }
    }
    if !remaining.is_empty() {
        tracing::debug!(
            namespace = %namespace,
            remaining = %remaining.join(", "),
            "Waiting for dependent records before deleting namespace"
        );
        return Ok(NamespaceDeletionOutcome::Blocked(remaining));
    }

    hub.delete_namespace(namespace).await?;
    tracing::info!(namespace = %namespace, "Deleted cluster namespace");
    Ok(NamespaceDeletionOutcome::Deleted)
}
