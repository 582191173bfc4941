//! Hub API access
//!
//! [`HubClient`] is the whole contract the reconcilers have with the hub API
//! server: get/list/create/replace/delete by namespace and name, list by
//! label, and a conditional status update. Keeping it behind a trait lets the
//! state machines run against mocks and in-memory fakes in tests.
//!
//! Not-found is never an error at this boundary: reads return `None` (or an
//! empty list) and deletes of absent objects succeed.

mod connect;

pub use connect::create_client;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use std::future::Future;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use crate::condition::Condition;
use crate::error::{Error, is_not_found};
use crate::models::constants::KLUSTERLET_WORKS_LABEL;
use crate::models::{ManagedCluster, ManifestWork, ResourceKind};

/// Field manager name used for every write
pub const FIELD_MANAGER: &str = "cluster-import-controller";

/// Trait abstracting hub API operations used by the reconcilers
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Get a ManagedCluster by name
    async fn get_managed_cluster(&self, name: &str) -> Result<Option<ManagedCluster>, Error>;

    /// Replace the status conditions of a ManagedCluster
    ///
    /// The update is conditional on the resourceVersion of `cluster`; a
    /// concurrent writer makes it fail with a conflict instead of being
    /// overwritten.
    async fn update_cluster_conditions(
        &self,
        cluster: &ManagedCluster,
        conditions: &[Condition],
    ) -> Result<(), Error>;

    /// List the klusterlet manifest works in a cluster namespace
    async fn list_klusterlet_works(&self, namespace: &str) -> Result<Vec<ManifestWork>, Error>;

    /// Get a Secret by namespace and name
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// Create a Secret
    async fn create_secret(&self, secret: &Secret) -> Result<(), Error>;

    /// Replace a Secret, conditional on its resourceVersion
    async fn replace_secret(&self, secret: &Secret) -> Result<(), Error>;

    /// Delete a Secret; an absent secret counts as deleted
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Get a Namespace by name
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error>;

    /// Delete a Namespace; an absent namespace counts as deleted
    async fn delete_namespace(&self, name: &str) -> Result<(), Error>;

    /// Names of the objects of `kind` left in a namespace
    ///
    /// A kind whose CRD is not installed has no objects.
    async fn list_names(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<String>, Error>;
}

/// Real hub client backed by kube-rs
#[derive(Clone)]
pub struct KubeHubClient {
    client: Client,
    timeout: Duration,
}

impl KubeHubClient {
    /// Wrap a kube client; every call is bounded by `timeout`
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, kube::Error>>,
    ) -> Result<T, Error> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Timeout {
                operation: operation.to_string(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl HubClient for KubeHubClient {
    async fn get_managed_cluster(&self, name: &str) -> Result<Option<ManagedCluster>, Error> {
        let api: Api<ManagedCluster> = Api::all(self.client.clone());
        self.bounded("get managedcluster", api.get_opt(name)).await
    }

    async fn update_cluster_conditions(
        &self,
        cluster: &ManagedCluster,
        conditions: &[Condition],
    ) -> Result<(), Error> {
        let api: Api<ManagedCluster> = Api::all(self.client.clone());
        let name = cluster.name_any();

        // resourceVersion in a merge patch makes the API server reject stale writes
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": cluster.resource_version() },
            "status": { "conditions": conditions }
        });

        self.bounded(
            "update managedcluster status",
            api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await?;
        Ok(())
    }

    async fn list_klusterlet_works(&self, namespace: &str) -> Result<Vec<ManifestWork>, Error> {
        let api: Api<ManifestWork> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(KLUSTERLET_WORKS_LABEL);
        let works = self.bounded("list manifestworks", api.list(&params)).await?;
        Ok(works.items)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        self.bounded("get secret", self.secrets(namespace).get_opt(name))
            .await
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), Error> {
        let namespace = secret.namespace().unwrap_or_default();
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.bounded(
            "create secret",
            self.secrets(&namespace).create(&params, secret),
        )
        .await?;
        Ok(())
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<(), Error> {
        let namespace = secret.namespace().unwrap_or_default();
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.bounded(
            "replace secret",
            self.secrets(&namespace)
                .replace(&secret.name_any(), &params, secret),
        )
        .await?;
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api = self.secrets(namespace);
        match self
            .bounded("delete secret", api.delete(name, &DeleteParams::default()))
            .await
        {
            Ok(_) => Ok(()),
            Err(Error::Kube { source }) if is_not_found(&source) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        self.bounded("get namespace", api.get_opt(name)).await
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match self
            .bounded(
                "delete namespace",
                api.delete(name, &DeleteParams::default()),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(Error::Kube { source }) if is_not_found(&source) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_names(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<String>, Error> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource());
        match self
            .bounded("list metadata", api.list_metadata(&ListParams::default()))
            .await
        {
            Ok(list) => Ok(list.items.iter().map(|obj| obj.name_any()).collect()),
            Err(Error::Kube { source }) if is_not_found(&source) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
