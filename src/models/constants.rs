//! Well-known names, labels and annotations
//!
//! These strings are the only link between a managed cluster and the
//! resources that belong to it (namespace == cluster name plus markers), so
//! every writer on the hub has to agree on them.

/// Fixed name of the auto-import secret inside a cluster namespace
pub const AUTO_IMPORT_SECRET_NAME: &str = "auto-import-secret";

/// Secret data key that overrides the maximum retry count for one secret
pub const AUTO_IMPORT_RETRY_KEY: &str = "autoImportRetry";

/// Annotation holding the number of failed auto-import attempts
pub const ANNOTATION_AUTO_IMPORT_CURRENT_RETRY: &str =
    "managedcluster-import-controller.open-cluster-management.io/current-retry";

/// Annotation that keeps the auto-import secret after a successful import
pub const ANNOTATION_KEEPING_AUTO_IMPORT_SECRET: &str =
    "managedcluster-import-controller.open-cluster-management.io/keeping-auto-import-secret";

/// Label set by backup/restore tooling on a replayed auto-import secret
pub const LABEL_AUTO_IMPORT_RESTORE: &str =
    "cluster.open-cluster-management.io/restore-auto-import-secret";

/// Secret data key for a full kubeconfig
pub const KUBECONFIG_KEY: &str = "kubeconfig";

/// Secret data key for the API server URL of a server+token pair
pub const SERVER_KEY: &str = "server";

/// Secret data key for the bearer token of a server+token pair
pub const TOKEN_KEY: &str = "token";

/// Suffix of the bootstrap secret written for the deployment applier
pub const AUTO_IMPORT_BOOTSTRAP_SECRET_SUFFIX: &str = "auto-import-bootstrap";

/// Label marking the bootstrap secret as owned by the import controllers
pub const CLUSTER_IMPORT_SECRET_LABEL: &str =
    "managedcluster-import-controller.open-cluster-management.io/import-secret";

/// Label on a namespace that belongs to a managed cluster
pub const CLUSTER_NAMESPACE_LABEL: &str = "open-cluster-management.io/cluster-name";

/// Label on the manifest works that deploy the klusterlet
pub const KLUSTERLET_WORKS_LABEL: &str = "import.open-cluster-management.io/klusterlet-works";

/// Annotation selecting where the klusterlet runs
pub const KLUSTERLET_DEPLOY_MODE_ANNOTATION: &str =
    "import.open-cluster-management.io/klusterlet-deploy-mode";

/// Name suffix of the klusterlet manifest work
pub const KLUSTERLET_SUFFIX: &str = "klusterlet";

/// Name suffix of the klusterlet CRDs manifest work
pub const KLUSTERLET_CRDS_SUFFIX: &str = "klusterlet-crds";

/// Manifest work condition reported by the applier once resources exist
pub const WORK_AVAILABLE_CONDITION: &str = "Available";

/// Condition type owned by these controllers on a managed cluster
pub const CONDITION_MANAGED_CLUSTER_IMPORT_SUCCEEDED: &str = "ManagedClusterImportSucceeded";

/// Expected klusterlet works for a cluster in default deploy mode
pub fn expected_klusterlet_works(cluster: &str) -> [String; 2] {
    [
        format!("{}-{}", cluster, KLUSTERLET_CRDS_SUFFIX),
        format!("{}-{}", cluster, KLUSTERLET_SUFFIX),
    ]
}

/// Name of the bootstrap secret for a cluster
pub fn bootstrap_secret_name(cluster: &str) -> String {
    format!("{}-{}", cluster, AUTO_IMPORT_BOOTSTRAP_SECRET_SUFFIX)
}
