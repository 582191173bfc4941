//! Auto-import retry machine
//!
//! Turns the auto-import secret of a cluster namespace into an import
//! attempt. Every decision is re-derived from the secret and cluster as read
//! at the start of the reconcile:
//!
//! ```text
//! retry >= max                 -> exhausted: ImportFailed, delete secret
//! restore label                -> refresh bootstrap payload, delete unless kept
//! attempt ok                   -> Importing, delete unless kept
//! credential failure, retry+1 < max  -> annotate retry+1, requeue
//! credential failure, retry+1 >= max -> exhausted
//! hub failure                  -> error, nothing charged
//! ```
//!
//! The retry counter lives in an annotation and is only ever incremented by
//! one, through a replace conditional on the resourceVersion that was read.

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::access::{AccessConfig, AccessProbe};
use crate::condition::{ConditionStatus, set_condition};
use crate::error::Error;
use crate::hub::HubClient;
use crate::models::constants::{
    ANNOTATION_AUTO_IMPORT_CURRENT_RETRY, ANNOTATION_KEEPING_AUTO_IMPORT_SECRET,
    AUTO_IMPORT_RETRY_KEY, AUTO_IMPORT_SECRET_NAME, CLUSTER_IMPORT_SECRET_LABEL,
    CONDITION_MANAGED_CLUSTER_IMPORT_SUCCEEDED, KUBECONFIG_KEY, LABEL_AUTO_IMPORT_RESTORE,
    bootstrap_secret_name,
};
use crate::models::{ImportReason, ManagedCluster};

/// Result of one auto-import pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoImportOutcome {
    /// No secret, or the cluster is absent or deleting
    Skipped,
    /// Access worked and the bootstrap secret is current
    Imported { kept: bool },
    /// A restore-marked secret refreshed the bootstrap payload
    Restored { kept: bool },
    /// The attempt failed and the counter now holds `attempt`
    RetryScheduled { attempt: u32 },
    /// The retry budget is spent and the secret was deleted
    Exhausted,
}

/// View of the auto-import secret's control fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretState {
    pub retry: u32,
    pub max_retry: u32,
    pub keep: bool,
    pub restore: bool,
}

impl SecretState {
    /// Read the control fields; `default_max_retry` applies unless the
    /// secret carries its own positive `autoImportRetry`
    pub fn from_secret(secret: &Secret, default_max_retry: u32) -> Self {
        let retry = match secret.annotations().get(ANNOTATION_AUTO_IMPORT_CURRENT_RETRY) {
            None => 0,
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %value, "Ignoring malformed retry annotation");
                0
            }),
        };

        let max_retry = secret
            .data
            .as_ref()
            .and_then(|d| d.get(AUTO_IMPORT_RETRY_KEY))
            .and_then(|b| std::str::from_utf8(&b.0).ok())
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(default_max_retry);

        Self {
            retry,
            max_retry,
            keep: secret
                .annotations()
                .contains_key(ANNOTATION_KEEPING_AUTO_IMPORT_SECRET),
            restore: secret.labels().contains_key(LABEL_AUTO_IMPORT_RESTORE),
        }
    }
}

/// Fingerprint of everything in the secret except the retry counter
///
/// Used to ignore the watch event caused by our own counter write, so a
/// failed attempt waits for its requeue instead of retrying at once.
pub fn secret_fingerprint(secret: &Secret) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (key, value) in secret.data.iter().flatten() {
        key.hash(&mut hasher);
        value.0.hash(&mut hasher);
    }
    secret.labels().hash(&mut hasher);
    secret
        .annotations()
        .iter()
        .filter(|(key, _)| key.as_str() != ANNOTATION_AUTO_IMPORT_CURRENT_RETRY)
        .for_each(|entry| entry.hash(&mut hasher));
    hasher.finish()
}

/// Reconcile the auto-import secret of one cluster namespace
pub async fn reconcile_auto_import(
    hub: &dyn HubClient,
    probe: &dyn AccessProbe,
    cluster_name: &str,
    default_max_retry: u32,
) -> Result<AutoImportOutcome, Error> {
    let Some(secret) = hub.get_secret(cluster_name, AUTO_IMPORT_SECRET_NAME).await? else {
        return Ok(AutoImportOutcome::Skipped);
    };

    let Some(cluster) = hub.get_managed_cluster(cluster_name).await? else {
        tracing::debug!(cluster = %cluster_name, "Cluster not found, waiting before auto-import");
        return Ok(AutoImportOutcome::Skipped);
    };
    if cluster.is_deleting() {
        tracing::debug!(cluster = %cluster_name, "Cluster is deleting, skipping auto-import");
        return Ok(AutoImportOutcome::Skipped);
    }

    let state = SecretState::from_secret(&secret, default_max_retry);

    if state.keep && import_handed_over(hub, &cluster, &secret).await? {
        tracing::trace!(cluster = %cluster_name, "Kept auto-import secret already applied");
        return Ok(AutoImportOutcome::Skipped);
    }

    if state.retry >= state.max_retry {
        let message = format!(
            "Auto-import retries exhausted ({}/{})",
            state.retry, state.max_retry
        );
        return exhaust(hub, &cluster, &state, &message).await;
    }

    let attempt = if state.restore {
        restore_bootstrap(hub, cluster_name, &secret).await
    } else {
        import_with(hub, probe, cluster_name, &secret).await
    };

    match attempt {
        Ok(()) => {
            if state.restore {
                tracing::info!(cluster = %cluster_name, "Refreshed bootstrap secret from restored auto-import secret");
            } else {
                mark_importing(hub, &cluster).await?;
            }
            if !state.keep {
                hub.delete_secret(cluster_name, AUTO_IMPORT_SECRET_NAME)
                    .await?;
                tracing::info!(cluster = %cluster_name, "Deleted auto-import secret");
            }
            Ok(if state.restore {
                AutoImportOutcome::Restored { kept: state.keep }
            } else {
                AutoImportOutcome::Imported { kept: state.keep }
            })
        }
        Err(e) if e.is_credential_failure() => {
            let attempt = state.retry + 1;
            if attempt >= state.max_retry {
                let message = format!(
                    "Try to import managed cluster, retry times: {}/{}, error: {}",
                    attempt, state.max_retry, e
                );
                return exhaust(hub, &cluster, &state, &message).await;
            }

            let mut updated = secret.clone();
            updated.annotations_mut().insert(
                ANNOTATION_AUTO_IMPORT_CURRENT_RETRY.to_string(),
                attempt.to_string(),
            );
            hub.replace_secret(&updated).await?;
            tracing::warn!(
                cluster = %cluster_name,
                attempt,
                max_retry = state.max_retry,
                error = %e,
                "Auto-import attempt failed, will retry"
            );
            Ok(AutoImportOutcome::RetryScheduled { attempt })
        }
        Err(e) => Err(e),
    }
}

async fn import_with(
    hub: &dyn HubClient,
    probe: &dyn AccessProbe,
    cluster_name: &str,
    secret: &Secret,
) -> Result<(), Error> {
    let access = AccessConfig::from_secret(cluster_name, secret)?;
    probe.probe(cluster_name, &access).await?;
    ensure_bootstrap_secret(hub, cluster_name, &access).await?;
    Ok(())
}

// Backup replay: the cluster was imported on another hub, only the payload moves
async fn restore_bootstrap(
    hub: &dyn HubClient,
    cluster_name: &str,
    secret: &Secret,
) -> Result<(), Error> {
    let access = AccessConfig::from_secret(cluster_name, secret)?;
    ensure_bootstrap_secret(hub, cluster_name, &access).await?;
    Ok(())
}

// A kept secret whose payload is already in the bootstrap secret of a cluster
// that is importing or imported has nothing left to do
async fn import_handed_over(
    hub: &dyn HubClient,
    cluster: &ManagedCluster,
    secret: &Secret,
) -> Result<bool, Error> {
    if !matches!(
        cluster.import_reason(),
        Some(ImportReason::Importing) | Some(ImportReason::Imported)
    ) {
        return Ok(false);
    }

    let cluster_name = cluster.name_any();
    let Ok(data) =
        AccessConfig::from_secret(&cluster_name, secret).and_then(|access| bootstrap_data(&access))
    else {
        return Ok(false);
    };

    let bootstrap = hub
        .get_secret(&cluster_name, &bootstrap_secret_name(&cluster_name))
        .await?;
    Ok(bootstrap.is_some_and(|existing| existing.data.as_ref() == Some(&data)))
}

fn bootstrap_data(access: &AccessConfig) -> Result<BTreeMap<String, ByteString>, Error> {
    Ok(BTreeMap::from([(
        KUBECONFIG_KEY.to_string(),
        ByteString(access.kubeconfig_yaml()?.into_bytes()),
    )]))
}

/// Write the bootstrap secret for the deployment applier
///
/// Returns whether a write happened; equal data means no write.
pub async fn ensure_bootstrap_secret(
    hub: &dyn HubClient,
    cluster_name: &str,
    access: &AccessConfig,
) -> Result<bool, Error> {
    let name = bootstrap_secret_name(cluster_name);
    let data = bootstrap_data(access)?;

    match hub.get_secret(cluster_name, &name).await? {
        Some(existing) if existing.data.as_ref() == Some(&data) => Ok(false),
        Some(mut existing) => {
            existing.data = Some(data);
            hub.replace_secret(&existing).await?;
            tracing::info!(cluster = %cluster_name, secret = %name, "Updated bootstrap secret");
            Ok(true)
        }
        None => {
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(name.clone()),
                    namespace: Some(cluster_name.to_string()),
                    labels: Some(BTreeMap::from([(
                        CLUSTER_IMPORT_SECRET_LABEL.to_string(),
                        "true".to_string(),
                    )])),
                    ..Default::default()
                },
                data: Some(data),
                type_: Some("Opaque".to_string()),
                ..Default::default()
            };
            hub.create_secret(&secret).await?;
            tracing::info!(cluster = %cluster_name, secret = %name, "Created bootstrap secret");
            Ok(true)
        }
    }
}

// Hand over to the status aggregator unless it already owns or finished the
// import. The condition's first write belongs to the cluster registration.
async fn mark_importing(hub: &dyn HubClient, cluster: &ManagedCluster) -> Result<(), Error> {
    if cluster.import_condition().is_none()
        || matches!(
            cluster.import_reason(),
            Some(ImportReason::Imported) | Some(ImportReason::Importing)
        )
    {
        return Ok(());
    }

    let mut conditions = cluster.conditions().to_vec();
    if set_condition(
        &mut conditions,
        CONDITION_MANAGED_CLUSTER_IMPORT_SUCCEEDED,
        ConditionStatus::False,
        ImportReason::Importing.as_str(),
        "Import started with the auto-import secret",
    ) {
        hub.update_cluster_conditions(cluster, &conditions).await?;
        tracing::info!(cluster = %cluster.name_any(), "Import condition moved to importing");
    }
    Ok(())
}

async fn exhaust(
    hub: &dyn HubClient,
    cluster: &ManagedCluster,
    state: &SecretState,
    message: &str,
) -> Result<AutoImportOutcome, Error> {
    let cluster_name = cluster.name_any();

    // Condition first: once the secret is gone nothing triggers this path again
    if !state.restore && cluster.import_reason() != Some(ImportReason::Imported) {
        let mut conditions = cluster.conditions().to_vec();
        if set_condition(
            &mut conditions,
            CONDITION_MANAGED_CLUSTER_IMPORT_SUCCEEDED,
            ConditionStatus::False,
            ImportReason::ImportFailed.as_str(),
            message,
        ) {
            hub.update_cluster_conditions(cluster, &conditions).await?;
        }
    }

    hub.delete_secret(&cluster_name, AUTO_IMPORT_SECRET_NAME)
        .await?;
    tracing::warn!(cluster = %cluster_name, message = %message, "Deleted auto-import secret after exhausting retries");
    Ok(AutoImportOutcome::Exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::access::MockAccessProbe;
    use crate::hub::MockHubClient;
    use serde_json::json;

    fn cluster() -> ManagedCluster {
        serde_json::from_value(json!({
            "apiVersion": "cluster.open-cluster-management.io/v1",
            "kind": "ManagedCluster",
            "metadata": { "name": "c1", "resourceVersion": "3" },
            "spec": {}
        }))
        .unwrap()
    }

    fn token_secret(annotations: serde_json::Value) -> Secret {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": "auto-import-secret",
                "namespace": "c1",
                "resourceVersion": "11",
                "annotations": annotations
            },
            "data": {
                "server": "aHR0cHM6Ly9hcGkuc3Bva2U6NjQ0Mw==",
                "token": "dDBr"
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_secret_state_defaults() {
        let state = SecretState::from_secret(&token_secret(json!({})), 5);
        assert_eq!(
            state,
            SecretState {
                retry: 0,
                max_retry: 5,
                keep: false,
                restore: false,
            }
        );
    }

    #[test]
    fn test_secret_state_reads_annotations_and_override() {
        let mut secret = token_secret(json!({
            "managedcluster-import-controller.open-cluster-management.io/current-retry": "2",
            "managedcluster-import-controller.open-cluster-management.io/keeping-auto-import-secret": ""
        }));
        secret.data.get_or_insert_with(BTreeMap::new).insert(
            AUTO_IMPORT_RETRY_KEY.to_string(),
            ByteString(b"8".to_vec()),
        );
        let state = SecretState::from_secret(&secret, 5);
        assert_eq!(state.retry, 2);
        assert_eq!(state.max_retry, 8);
        assert!(state.keep);
    }

    #[test]
    fn test_zero_override_falls_back_to_default() {
        let mut secret = token_secret(json!({}));
        secret.data.get_or_insert_with(BTreeMap::new).insert(
            AUTO_IMPORT_RETRY_KEY.to_string(),
            ByteString(b"0".to_vec()),
        );
        assert_eq!(SecretState::from_secret(&secret, 5).max_retry, 5);
    }

    #[test]
    fn test_fingerprint_ignores_retry_counter() {
        let fresh = token_secret(json!({}));
        let retried = token_secret(json!({
            "managedcluster-import-controller.open-cluster-management.io/current-retry": "1"
        }));
        let kept = token_secret(json!({
            "managedcluster-import-controller.open-cluster-management.io/keeping-auto-import-secret": ""
        }));
        assert_eq!(secret_fingerprint(&fresh), secret_fingerprint(&retried));
        assert_ne!(secret_fingerprint(&fresh), secret_fingerprint(&kept));
    }

    #[tokio::test]
    async fn test_hub_error_is_not_charged() {
        let mut hub = MockHubClient::new();
        hub.expect_get_secret()
            .withf(|_, name| name == AUTO_IMPORT_SECRET_NAME)
            .returning(|_, _| Ok(Some(token_secret(json!({})))));
        hub.expect_get_managed_cluster()
            .returning(|_| Ok(Some(cluster())));
        hub.expect_get_secret()
            .withf(|_, name| name != AUTO_IMPORT_SECRET_NAME)
            .returning(|_, _| {
                Err(Error::Timeout {
                    operation: "get secret".to_string(),
                    seconds: 30,
                })
            });
        hub.expect_replace_secret().never();
        hub.expect_delete_secret().never();

        let mut probe = MockAccessProbe::new();
        probe.expect_probe().returning(|_, _| Ok(()));

        let result = reconcile_auto_import(&hub, &probe, "c1", 5).await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_conflict_on_increment_surfaces() {
        let mut hub = MockHubClient::new();
        hub.expect_get_secret()
            .returning(|_, _| Ok(Some(token_secret(json!({})))));
        hub.expect_get_managed_cluster()
            .returning(|_| Ok(Some(cluster())));
        hub.expect_replace_secret()
            .times(1)
            .returning(|_| Err(Error::config("conflict")));
        hub.expect_delete_secret().never();

        let mut probe = MockAccessProbe::new();
        probe
            .expect_probe()
            .returning(|cluster, _| Err(Error::access(cluster, "connection refused")));

        assert!(reconcile_auto_import(&hub, &probe, "c1", 5).await.is_err());
    }
}
