//! Correlation routes
//!
//! Each controller owns a static table mapping a resource kind to a
//! predicate over the change notification and a function extracting the
//! reconcile key (always a managed cluster name, which is also the name of the
//! cluster namespace). To make a controller react to another kind:
//! 1. Add the kind to `ResourceKind` in src/models/resource_kind.rs
//! 2. Add a `Route` entry to the controller's table below
//! 3. Add a `routed_triggers` stream for it in src/controller/runner.rs

use super::{EventKind, Notification};
use crate::models::ResourceKind;
use crate::models::constants::{
    AUTO_IMPORT_SECRET_NAME, CLUSTER_NAMESPACE_LABEL, KLUSTERLET_WORKS_LABEL,
};

/// One entry of a routing table
#[derive(Clone, Copy)]
pub struct Route {
    pub kind: ResourceKind,
    /// Whether the notification should cause a reconcile at all
    pub accepts: fn(&Notification) -> bool,
    /// Reconcile key for an accepted notification
    pub key: fn(&Notification) -> Option<String>,
}

/// Maps notifications of several kinds onto reconcile keys
#[derive(Clone, Copy)]
pub struct Router {
    routes: &'static [Route],
}

impl Router {
    pub const fn new(routes: &'static [Route]) -> Self {
        Self { routes }
    }

    /// Reconcile key for a notification, or `None` if it should be dropped
    pub fn route(&self, notification: &Notification) -> Option<String> {
        let route = self.routes.iter().find(|r| r.kind == notification.kind)?;
        if !(route.accepts)(notification) {
            return None;
        }
        (route.key)(notification).filter(|key| !key.is_empty())
    }

    /// Kinds this router knows about
    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.routes.iter().map(|r| r.kind)
    }
}

fn by_name(n: &Notification) -> Option<String> {
    Some(n.name.clone())
}

fn by_namespace(n: &Notification) -> Option<String> {
    n.namespace.clone()
}

fn any(_: &Notification) -> bool {
    true
}

fn deleted(n: &Notification) -> bool {
    n.event == EventKind::Deleted
}

// Deletion requested (deletionTimestamp set) or completed
fn cluster_removal(n: &Notification) -> bool {
    n.event == EventKind::Deleted || n.deleting
}

fn cluster_namespace(n: &Notification) -> bool {
    n.event != EventKind::Deleted && n.labels.contains_key(CLUSTER_NAMESPACE_LABEL)
}

fn klusterlet_work(n: &Notification) -> bool {
    n.labels.contains_key(KLUSTERLET_WORKS_LABEL)
}

fn auto_import_secret(n: &Notification) -> bool {
    n.event != EventKind::Deleted && n.name == AUTO_IMPORT_SECRET_NAME
}

// Status writes on the cluster must not re-run an import
fn cluster_created(n: &Notification) -> bool {
    n.event == EventKind::Created && !n.deleting
}

/// Triggers of the namespace deletion coordinator
pub const NAMESPACE_DELETION_ROUTES: &[Route] = &[
    Route {
        kind: ResourceKind::ManagedCluster,
        accepts: cluster_removal,
        key: by_name,
    },
    Route {
        kind: ResourceKind::Namespace,
        accepts: cluster_namespace,
        key: by_name,
    },
    Route {
        kind: ResourceKind::ClusterDeployment,
        accepts: deleted,
        key: by_namespace,
    },
    Route {
        kind: ResourceKind::ManagedClusterAddOn,
        accepts: deleted,
        key: by_namespace,
    },
    Route {
        kind: ResourceKind::InfraEnv,
        accepts: deleted,
        key: by_namespace,
    },
];

/// Triggers of the import status aggregator
pub const IMPORT_STATUS_ROUTES: &[Route] = &[
    Route {
        kind: ResourceKind::ManagedCluster,
        accepts: any,
        key: by_name,
    },
    Route {
        kind: ResourceKind::ManifestWork,
        accepts: klusterlet_work,
        key: by_namespace,
    },
];

/// Triggers of the auto-import retry machine
pub const AUTO_IMPORT_ROUTES: &[Route] = &[
    Route {
        kind: ResourceKind::Secret,
        accepts: auto_import_secret,
        key: by_namespace,
    },
    Route {
        kind: ResourceKind::ManagedCluster,
        accepts: cluster_created,
        key: by_name,
    },
];

pub const NAMESPACE_DELETION_ROUTER: Router = Router::new(NAMESPACE_DELETION_ROUTES);
pub const IMPORT_STATUS_ROUTER: Router = Router::new(IMPORT_STATUS_ROUTES);
pub const AUTO_IMPORT_ROUTER: Router = Router::new(AUTO_IMPORT_ROUTES);
