//! Controller wiring
//!
//! Each state machine runs as a `kube::runtime::Controller` over its primary
//! kind. Notifications on related kinds are turned into keys of the primary
//! kind by the correlation routers and fed in with `reconcile_on`. The
//! scheduler guarantees one in-flight reconcile per key.

use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt, future};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{Api, DynamicObject};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::{self, ObjectRef};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Client, Resource};
use std::sync::Arc;

use super::auto_import::secret_fingerprint;
use super::{
    Context, error_policy, reconcile_auto_import_secret, reconcile_cluster_import,
    reconcile_cluster_namespace,
};
use crate::config::ControllersConfig;
use crate::error::Error;
use crate::models::constants::{AUTO_IMPORT_SECRET_NAME, CLUSTER_NAMESPACE_LABEL};
use crate::models::{ManagedCluster, ManifestWork, ResourceKind};
use crate::watcher::{
    AUTO_IMPORT_ROUTER, IMPORT_STATUS_ROUTER, NAMESPACE_DELETION_ROUTER, changed_only,
    routed_triggers,
};

type ReconcileResult<K> =
    Result<(ObjectRef<K>, Action), kube::runtime::controller::Error<Error, watcher::Error>>;

/// Run the enabled controllers until a termination signal arrives
pub async fn run(client: Client, ctx: Arc<Context>, enabled: &ControllersConfig) {
    let mut controllers = Vec::new();

    if enabled.import_status {
        controllers.push(import_status_controller(client.clone(), ctx.clone()).boxed());
    }
    if enabled.auto_import {
        controllers.push(auto_import_controller(client.clone(), ctx.clone()).boxed());
    }
    if enabled.namespace_deletion {
        controllers.push(namespace_deletion_controller(client, ctx).boxed());
    }

    if controllers.is_empty() {
        tracing::warn!("All controllers are disabled, nothing to run");
        return;
    }

    tracing::info!(count = controllers.len(), "Starting controllers");
    future::join_all(controllers).await;
    tracing::info!("Controllers stopped");
}

async fn import_status_controller(client: Client, ctx: Arc<Context>) {
    let clusters: Api<ManagedCluster> = Api::all(client.clone());
    let works: Api<ManifestWork> = Api::all(client);

    let triggers = routed_triggers(
        works,
        watcher::Config::default(),
        ResourceKind::ManifestWork,
        IMPORT_STATUS_ROUTER,
    )
    .map(|key| ObjectRef::<ManagedCluster>::new(&key));

    Controller::new(clusters, watcher::Config::default())
        .reconcile_on(triggers)
        .shutdown_on_signal()
        .run(reconcile_cluster_import, error_policy, ctx)
        .for_each(|result| {
            log_reconcile_result("import-status", result);
            future::ready(())
        })
        .await;
}

async fn auto_import_controller(client: Client, ctx: Arc<Context>) {
    let secrets: Api<Secret> = Api::all(client.clone());
    let clusters: Api<ManagedCluster> = Api::all(client);

    let secret_config =
        watcher::Config::default().fields(&format!("metadata.name={}", AUTO_IMPORT_SECRET_NAME));
    let (reader, writer) = reflector::store();
    let secret_events = watcher(secrets, secret_config)
        .default_backoff()
        .reflect(writer);
    // Our own retry-counter writes must not short-circuit the requeue delay
    let secret_stream = changed_only(secret_events, secret_fingerprint);

    let triggers = routed_triggers(
        clusters,
        watcher::Config::default(),
        ResourceKind::ManagedCluster,
        AUTO_IMPORT_ROUTER,
    )
    .map(|key| ObjectRef::<Secret>::new(AUTO_IMPORT_SECRET_NAME).within(&key));

    Controller::for_stream(secret_stream, reader)
        .reconcile_on(triggers)
        .shutdown_on_signal()
        .run(reconcile_auto_import_secret, error_policy, ctx)
        .for_each(|result| {
            log_reconcile_result("auto-import", result);
            future::ready(())
        })
        .await;
}

async fn namespace_deletion_controller(client: Client, ctx: Arc<Context>) {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let clusters: Api<ManagedCluster> = Api::all(client.clone());

    let mut sources: Vec<BoxStream<'static, String>> = vec![
        routed_triggers(
            clusters,
            watcher::Config::default(),
            ResourceKind::ManagedCluster,
            NAMESPACE_DELETION_ROUTER,
        )
        .boxed(),
    ];
    for kind in ResourceKind::namespace_dependents() {
        let api: Api<DynamicObject> = Api::all_with(client.clone(), &kind.api_resource());
        sources.push(
            routed_triggers(
                api,
                watcher::Config::default(),
                *kind,
                NAMESPACE_DELETION_ROUTER,
            )
            .boxed(),
        );
    }
    let triggers = stream::select_all(sources).map(|key| ObjectRef::<Namespace>::new(&key));

    let namespace_config = watcher::Config::default().labels(CLUSTER_NAMESPACE_LABEL);
    Controller::new(namespaces, namespace_config)
        .reconcile_on(triggers)
        .shutdown_on_signal()
        .run(reconcile_cluster_namespace, error_policy, ctx)
        .for_each(|result| {
            log_reconcile_result("namespace-deletion", result);
            future::ready(())
        })
        .await;
}

fn log_reconcile_result<K: Resource>(controller: &str, result: ReconcileResult<K>) {
    match result {
        Ok((obj, _)) => {
            tracing::trace!(controller, name = %obj.name, namespace = ?obj.namespace, "Reconciled");
        }
        Err(e) => {
            tracing::warn!(controller, error = %e, "Reconcile error");
        }
    }
}
