//! Caller-provided access to a managed cluster
//!
//! An auto-import secret carries either a full kubeconfig or a server+token
//! pair. Both are normalized to a kubeconfig document, which is what the
//! bootstrap secret hands to the deployment applier and what the probe uses
//! to prove the access works.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use crate::error::Error;
use crate::models::constants::{KUBECONFIG_KEY, SERVER_KEY, TOKEN_KEY};

/// Access material parsed from an auto-import secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessConfig {
    /// A complete kubeconfig document
    Kubeconfig(String),
    /// API server URL plus bearer token
    Token { server: String, token: String },
}

impl AccessConfig {
    /// Parse the secret data; a kubeconfig wins over a server+token pair
    pub fn from_secret(cluster: &str, secret: &Secret) -> Result<Self, Error> {
        let value = |key: &str| -> Result<Option<String>, Error> {
            let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(key)) else {
                return Ok(None);
            };
            let text = String::from_utf8(bytes.0.clone())
                .map_err(|_| Error::invalid_secret(cluster, format!("{} is not UTF-8", key)))?;
            let text = text.trim().to_string();
            Ok((!text.is_empty()).then_some(text))
        };

        if let Some(kubeconfig) = value(KUBECONFIG_KEY)? {
            let parsed = Kubeconfig::from_yaml(&kubeconfig).map_err(|e| {
                Error::invalid_secret(cluster, format!("kubeconfig cannot be parsed: {}", e))
            })?;
            if parsed.clusters.is_empty() {
                return Err(Error::invalid_secret(cluster, "kubeconfig has no clusters"));
            }
            return Ok(AccessConfig::Kubeconfig(kubeconfig));
        }

        match (value(SERVER_KEY)?, value(TOKEN_KEY)?) {
            (Some(server), Some(token)) => {
                if !server.starts_with("https://") && !server.starts_with("http://") {
                    return Err(Error::invalid_secret(
                        cluster,
                        format!("server {} is not an http(s) URL", server),
                    ));
                }
                Ok(AccessConfig::Token { server, token })
            }
            (Some(_), None) => Err(Error::invalid_secret(cluster, "token is missing")),
            (None, Some(_)) => Err(Error::invalid_secret(cluster, "server is missing")),
            (None, None) => Err(Error::invalid_secret(
                cluster,
                "neither kubeconfig nor server and token are set",
            )),
        }
    }

    /// Kubeconfig document for this access
    ///
    /// The token form has no CA bundle to offer, so the generated document
    /// skips TLS verification the same way the bootstrap flow always has.
    /// Output is deterministic so repeated reconciles produce equal bytes.
    pub fn kubeconfig_yaml(&self) -> Result<String, Error> {
        match self {
            AccessConfig::Kubeconfig(raw) => Ok(raw.clone()),
            AccessConfig::Token { server, token } => {
                let doc = serde_json::json!({
                    "apiVersion": "v1",
                    "kind": "Config",
                    "clusters": [{
                        "name": "cluster",
                        "cluster": { "server": server, "insecure-skip-tls-verify": true }
                    }],
                    "users": [{ "name": "user", "user": { "token": token } }],
                    "contexts": [{
                        "name": "default",
                        "context": { "cluster": "cluster", "user": "user" }
                    }],
                    "current-context": "default"
                });
                serde_yaml::to_string(&doc).map_err(|e| Error::serialization(e.to_string()))
            }
        }
    }
}

/// Proves that access to a managed cluster works
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccessProbe: Send + Sync {
    /// Contact the managed cluster with the given access
    ///
    /// Failures are reported as [`Error::Access`] so they count against the
    /// retry budget.
    async fn probe(&self, cluster: &str, access: &AccessConfig) -> Result<(), Error>;
}

/// Probe that asks the managed cluster API server for its version
pub struct KubeAccessProbe {
    timeout: Duration,
}

impl KubeAccessProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl AccessProbe for KubeAccessProbe {
    async fn probe(&self, cluster: &str, access: &AccessConfig) -> Result<(), Error> {
        let yaml = access.kubeconfig_yaml()?;
        let kubeconfig = Kubeconfig::from_yaml(&yaml)
            .map_err(|e| Error::invalid_secret(cluster, e.to_string()))?;

        let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| Error::access(cluster, e.to_string()))?;
        config.connect_timeout = Some(self.timeout);
        config.read_timeout = Some(self.timeout);

        let client = Client::try_from(config).map_err(|e| Error::access(cluster, e.to_string()))?;

        match tokio::time::timeout(self.timeout, client.apiserver_version()).await {
            Ok(Ok(info)) => {
                tracing::debug!(cluster = %cluster, version = %info.git_version, "Managed cluster reachable");
                Ok(())
            }
            Ok(Err(e)) => Err(Error::access(cluster, e.to_string())),
            Err(_) => Err(Error::access(
                cluster,
                format!("no response within {}s", self.timeout.as_secs()),
            )),
        }
    }
}
