//! Resource kind definitions
//!
//! Centralized enum for every resource kind the controllers observe. The set
//! is fixed: relationships to a managed cluster are by naming convention and
//! are enumerated here rather than discovered at runtime.

use kube::api::{ApiResource, GroupVersionKind};
use std::fmt;
use std::str::FromStr;

/// Enumeration of all watched resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    // Open Cluster Management
    ManagedCluster,
    ManifestWork,
    ManagedClusterAddOn,
    // Core
    Namespace,
    Secret,
    // Provisioning (hive, assisted installer)
    ClusterDeployment,
    InfraEnv,
}

impl ResourceKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ManagedCluster => "ManagedCluster",
            ResourceKind::ManifestWork => "ManifestWork",
            ResourceKind::ManagedClusterAddOn => "ManagedClusterAddOn",
            ResourceKind::Namespace => "Namespace",
            ResourceKind::Secret => "Secret",
            ResourceKind::ClusterDeployment => "ClusterDeployment",
            ResourceKind::InfraEnv => "InfraEnv",
        }
    }

    /// API group ("" for the core group)
    pub fn api_group(&self) -> &'static str {
        match self {
            ResourceKind::ManagedCluster => "cluster.open-cluster-management.io",
            ResourceKind::ManifestWork => "work.open-cluster-management.io",
            ResourceKind::ManagedClusterAddOn => "addon.open-cluster-management.io",
            ResourceKind::Namespace | ResourceKind::Secret => "",
            ResourceKind::ClusterDeployment => "hive.openshift.io",
            ResourceKind::InfraEnv => "agent-install.openshift.io",
        }
    }

    /// API version within the group
    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::ManagedCluster
            | ResourceKind::ManifestWork
            | ResourceKind::Namespace
            | ResourceKind::Secret
            | ResourceKind::ClusterDeployment => "v1",
            ResourceKind::ManagedClusterAddOn => "v1alpha1",
            ResourceKind::InfraEnv => "v1beta1",
        }
    }

    /// Plural resource name used in API paths
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::ManagedCluster => "managedclusters",
            ResourceKind::ManifestWork => "manifestworks",
            ResourceKind::ManagedClusterAddOn => "managedclusteraddons",
            ResourceKind::Namespace => "namespaces",
            ResourceKind::Secret => "secrets",
            ResourceKind::ClusterDeployment => "clusterdeployments",
            ResourceKind::InfraEnv => "infraenvs",
        }
    }

    /// Whether objects of this kind live inside a namespace
    pub fn is_namespaced(&self) -> bool {
        !matches!(self, ResourceKind::ManagedCluster | ResourceKind::Namespace)
    }

    /// API resource descriptor for dynamic (untyped) access
    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(self.api_group(), self.api_version(), self.as_str());
        ApiResource::from_gvk_with_plural(&gvk, self.plural())
    }

    /// Kinds whose presence in a cluster namespace blocks its deletion
    ///
    /// Other controllers still need these records to finish their own cleanup,
    /// so the namespace has to outlive them.
    pub fn namespace_dependents() -> &'static [Self] {
        &[
            ResourceKind::ClusterDeployment,
            ResourceKind::ManagedClusterAddOn,
            ResourceKind::InfraEnv,
        ]
    }

    /// Get all resource kinds
    pub fn all() -> &'static [Self] {
        &[
            ResourceKind::ManagedCluster,
            ResourceKind::ManifestWork,
            ResourceKind::ManagedClusterAddOn,
            ResourceKind::Namespace,
            ResourceKind::Secret,
            ResourceKind::ClusterDeployment,
            ResourceKind::InfraEnv,
        ]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown resource kind: {}", s))
    }
}
