//! In-memory hub shared by the integration tests
//!
//! `FakeHub` keeps clusters, works, secrets, namespaces and dependent records
//! in memory and records every write the reconcilers issue, so tests can
//! assert both on the resulting state and on the absence of writes.

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::ResourceExt;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use cluster_import_controller::condition::Condition;
use cluster_import_controller::controller::access::{AccessConfig, AccessProbe};
use cluster_import_controller::error::Error;
use cluster_import_controller::hub::HubClient;
use cluster_import_controller::models::constants::KLUSTERLET_WORKS_LABEL;
use cluster_import_controller::models::{ManagedCluster, ManagedClusterStatus, ManifestWork, ResourceKind};

/// A write issued against the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    ClusterConditions(String),
    SecretCreated(String, String),
    SecretReplaced(String, String),
    SecretDeleted(String, String),
    NamespaceDeleted(String),
}

#[derive(Default)]
pub struct State {
    pub clusters: BTreeMap<String, ManagedCluster>,
    pub works: Vec<ManifestWork>,
    pub secrets: BTreeMap<(String, String), Secret>,
    pub namespaces: BTreeMap<String, Namespace>,
    /// (kind, namespace, name)
    pub dependents: Vec<(ResourceKind, String, String)>,
    pub writes: Vec<Write>,
    version: u64,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

#[derive(Default)]
pub struct FakeHub {
    pub state: Mutex<State>,
}

impl FakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cluster(&self, mut cluster: ManagedCluster) {
        let mut state = self.state.lock().unwrap();
        cluster.metadata.resource_version = Some(state.next_version());
        state.clusters.insert(cluster.name_any(), cluster);
    }

    pub fn add_work(&self, work: ManifestWork) {
        self.state.lock().unwrap().works.push(work);
    }

    pub fn add_secret(&self, mut secret: Secret) {
        let mut state = self.state.lock().unwrap();
        secret.metadata.resource_version = Some(state.next_version());
        let key = (secret.namespace().unwrap_or_default(), secret.name_any());
        state.secrets.insert(key, secret);
    }

    pub fn add_namespace(&self, namespace: Namespace) {
        let mut state = self.state.lock().unwrap();
        state.namespaces.insert(namespace.name_any(), namespace);
    }

    pub fn add_dependent(&self, kind: ResourceKind, namespace: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .dependents
            .push((kind, namespace.to_string(), name.to_string()));
    }

    pub fn remove_dependent(&self, kind: ResourceKind, namespace: &str) {
        self.state
            .lock()
            .unwrap()
            .dependents
            .retain(|(k, ns, _)| !(*k == kind && ns == namespace));
    }

    pub fn remove_cluster(&self, name: &str) {
        self.state.lock().unwrap().clusters.remove(name);
    }

    pub fn cluster(&self, name: &str) -> Option<ManagedCluster> {
        self.state.lock().unwrap().clusters.get(name).cloned()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.state.lock().unwrap().namespaces.contains_key(name)
    }

    pub fn dependents_in(&self, namespace: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .dependents
            .iter()
            .filter(|(_, ns, _)| ns == namespace)
            .count()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }
}

fn stale(kind: &str, name: &str) -> Error {
    Error::config(format!("stale resourceVersion for {} {}", kind, name))
}

#[async_trait]
impl HubClient for FakeHub {
    async fn get_managed_cluster(&self, name: &str) -> Result<Option<ManagedCluster>, Error> {
        Ok(self.cluster(name))
    }

    async fn update_cluster_conditions(
        &self,
        cluster: &ManagedCluster,
        conditions: &[Condition],
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        let name = cluster.name_any();
        let version = state.next_version();
        let stored = state
            .clusters
            .get_mut(&name)
            .ok_or_else(|| Error::config(format!("cluster {} not found", name)))?;
        if stored.metadata.resource_version != cluster.metadata.resource_version {
            return Err(stale("cluster", &name));
        }
        stored.status = Some(ManagedClusterStatus {
            conditions: conditions.to_vec(),
        });
        stored.metadata.resource_version = Some(version);
        state.writes.push(Write::ClusterConditions(name));
        Ok(())
    }

    async fn list_klusterlet_works(&self, namespace: &str) -> Result<Vec<ManifestWork>, Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .works
            .iter()
            .filter(|w| w.namespace().as_deref() == Some(namespace))
            .filter(|w| w.labels().contains_key(KLUSTERLET_WORKS_LABEL))
            .cloned()
            .collect())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        let key = (secret.namespace().unwrap_or_default(), secret.name_any());
        if state.secrets.contains_key(&key) {
            return Err(Error::config(format!("secret {} already exists", key.1)));
        }
        let mut created = secret.clone();
        created.metadata.resource_version = Some(state.next_version());
        state.secrets.insert(key.clone(), created);
        state.writes.push(Write::SecretCreated(key.0, key.1));
        Ok(())
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        let key = (secret.namespace().unwrap_or_default(), secret.name_any());
        let version = state.next_version();
        let stored = state
            .secrets
            .get_mut(&key)
            .ok_or_else(|| Error::config(format!("secret {} not found", key.1)))?;
        if stored.metadata.resource_version != secret.metadata.resource_version {
            return Err(stale("secret", &key.1));
        }
        *stored = secret.clone();
        stored.metadata.resource_version = Some(version);
        state.writes.push(Write::SecretReplaced(key.0, key.1));
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state
            .secrets
            .remove(&(namespace.to_string(), name.to_string()));
        state
            .writes
            .push(Write::SecretDeleted(namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        Ok(self.state.lock().unwrap().namespaces.get(name).cloned())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.namespaces.remove(name);
        state.writes.push(Write::NamespaceDeleted(name.to_string()));
        Ok(())
    }

    async fn list_names(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .dependents
            .iter()
            .filter(|(k, ns, _)| *k == kind && ns == namespace)
            .map(|(_, _, name)| name.clone())
            .collect())
    }
}

/// Probe whose answer is set by the test
#[derive(Default)]
pub struct FakeProbe {
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeProbe {
    pub fn reachable() -> Self {
        Self::default()
    }

    pub fn unreachable(message: &str) -> Self {
        let probe = Self::default();
        probe.fail_with(Some(message));
        probe
    }

    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().unwrap() = message.map(str::to_string);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessProbe for FakeProbe {
    async fn probe(&self, cluster: &str, _access: &AccessConfig) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(Error::access(cluster, message.clone())),
            None => Ok(()),
        }
    }
}

/// A managed cluster with an optional import condition reason
pub fn managed_cluster(name: &str, import_reason: Option<&str>) -> ManagedCluster {
    let conditions = match import_reason {
        Some(reason) => json!([{
            "type": "ManagedClusterImportSucceeded",
            "status": if reason == "ManagedClusterImported" { "True" } else { "False" },
            "reason": reason,
            "message": "",
            "lastTransitionTime": "2024-01-01T12:00:00Z"
        }]),
        None => json!([]),
    };
    serde_json::from_value(json!({
        "apiVersion": "cluster.open-cluster-management.io/v1",
        "kind": "ManagedCluster",
        "metadata": { "name": name },
        "spec": { "hubAcceptsClient": true },
        "status": { "conditions": conditions }
    }))
    .unwrap()
}

pub fn hosted(mut cluster: ManagedCluster) -> ManagedCluster {
    cluster.annotations_mut().insert(
        "import.open-cluster-management.io/klusterlet-deploy-mode".to_string(),
        "Hosted".to_string(),
    );
    cluster
}

pub fn deleting(mut cluster: ManagedCluster) -> ManagedCluster {
    cluster.metadata.deletion_timestamp = Some(serde_json::from_value(json!("2024-01-02T00:00:00Z")).unwrap());
    cluster.finalizers_mut().push("cluster.open-cluster-management.io/api-resource-cleanup".to_string());
    cluster
}

/// A klusterlet work; `available` of `None` means the condition was never reported
pub fn klusterlet_work(cluster: &str, name: &str, available: Option<bool>) -> ManifestWork {
    let conditions = match available {
        Some(value) => json!([{
            "type": "Available",
            "status": if value { "True" } else { "False" },
            "reason": "",
            "message": "",
            "lastTransitionTime": "2024-01-01T12:00:00Z"
        }]),
        None => json!([]),
    };
    serde_json::from_value(json!({
        "apiVersion": "work.open-cluster-management.io/v1",
        "kind": "ManifestWork",
        "metadata": {
            "name": name,
            "namespace": cluster,
            "labels": { "import.open-cluster-management.io/klusterlet-works": "true" }
        },
        "spec": {},
        "status": { "conditions": conditions }
    }))
    .unwrap()
}

/// The import condition as currently stored on a cluster
pub fn import_condition(hub: &FakeHub, cluster: &str) -> Option<Condition> {
    hub.cluster(cluster)
        .and_then(|c| c.import_condition().cloned())
}

/// An auto-import secret in server+token form
pub fn token_secret(cluster: &str) -> Secret {
    secret_with_data(
        cluster,
        &[("server", "https://api.spoke.example.com:6443"), ("token", "sha256~abc")],
    )
}

pub fn secret_with_data(cluster: &str, data: &[(&str, &str)]) -> Secret {
    let data: BTreeMap<String, ByteString> = data
        .iter()
        .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
        .collect();
    Secret {
        metadata: kube::api::ObjectMeta {
            name: Some("auto-import-secret".to_string()),
            namespace: Some(cluster.to_string()),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

pub fn with_annotation(mut secret: Secret, key: &str, value: &str) -> Secret {
    secret
        .annotations_mut()
        .insert(key.to_string(), value.to_string());
    secret
}

pub fn with_label(mut secret: Secret, key: &str, value: &str) -> Secret {
    secret.labels_mut().insert(key.to_string(), value.to_string());
    secret
}

pub fn cluster_namespace(name: &str) -> Namespace {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": { "open-cluster-management.io/cluster-name": name }
        }
    }))
    .unwrap()
}
