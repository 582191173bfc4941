//! Import controllers
//!
//! Three independent state machines, each reconciling one key at a time:
//! - `import_status` - klusterlet works → `ManagedClusterImportSucceeded`
//! - `auto_import` - auto-import secret → bootstrap secret, with bounded retry
//! - `namespace_deletion` - cluster namespace removal once nothing blocks it
//!
//! The functions in those modules take a [`HubClient`] and a key and return
//! an outcome; the wrappers here adapt them to `kube::runtime::Controller`.

pub mod access;
pub mod auto_import;
pub mod import_status;
pub mod namespace_deletion;
pub mod runner;

use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::ResourceExt;
use kube::runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::Error;
use crate::hub::HubClient;
use crate::models::ManagedCluster;
use access::AccessProbe;
use auto_import::AutoImportOutcome;

/// Scheduling settings shared by the controllers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Default auto-import retry budget
    pub max_retry: u32,
    /// Delay before the next auto-import attempt
    pub retry_requeue: Duration,
    /// Delay after a reconcile returned an error
    pub error_requeue: Duration,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            max_retry: config.auto_import.max_retry,
            retry_requeue: config.auto_import.requeue(),
            error_requeue: config.error_requeue(),
        }
    }
}

/// Shared reconcile context
pub struct Context {
    pub hub: Arc<dyn HubClient>,
    pub probe: Arc<dyn AccessProbe>,
    pub settings: Settings,
}

impl Context {
    pub fn new(hub: Arc<dyn HubClient>, probe: Arc<dyn AccessProbe>, settings: Settings) -> Self {
        Self {
            hub,
            probe,
            settings,
        }
    }
}

/// Reconcile the import condition of a managed cluster
pub async fn reconcile_cluster_import(
    cluster: Arc<ManagedCluster>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let name = cluster.name_any();
    let outcome = import_status::reconcile_import_status(ctx.hub.as_ref(), &name).await?;
    tracing::debug!(cluster = %name, outcome = ?outcome, "Import status reconciled");
    Ok(Action::await_change())
}

/// Reconcile an auto-import secret; its namespace names the cluster
pub async fn reconcile_auto_import_secret(
    secret: Arc<Secret>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let Some(cluster) = secret.namespace() else {
        return Ok(Action::await_change());
    };

    let outcome = auto_import::reconcile_auto_import(
        ctx.hub.as_ref(),
        ctx.probe.as_ref(),
        &cluster,
        ctx.settings.max_retry,
    )
    .await?;
    tracing::debug!(cluster = %cluster, outcome = ?outcome, "Auto-import reconciled");

    Ok(match outcome {
        AutoImportOutcome::RetryScheduled { .. } => Action::requeue(ctx.settings.retry_requeue),
        _ => Action::await_change(),
    })
}

/// Reconcile a cluster namespace
pub async fn reconcile_cluster_namespace(
    namespace: Arc<Namespace>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let name = namespace.name_any();
    let outcome = namespace_deletion::reconcile_namespace_deletion(ctx.hub.as_ref(), &name).await?;
    tracing::debug!(namespace = %name, outcome = ?outcome, "Namespace deletion reconciled");
    Ok(Action::await_change())
}

/// Requeue after a failed reconcile
///
/// Conflicts are expected when another writer got there first; the requeue
/// re-reads fresh state.
pub fn error_policy<K: ResourceExt>(obj: Arc<K>, error: &Error, ctx: Arc<Context>) -> Action {
    if error.is_conflict() {
        tracing::debug!(name = %obj.name_any(), error = %error, "Write conflict, requeueing");
    } else {
        tracing::error!(name = %obj.name_any(), error = %error, "Reconcile failed");
    }
    Action::requeue(ctx.settings.error_requeue)
}
