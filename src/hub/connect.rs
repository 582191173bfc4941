//! Client construction
//!
//! The hub client uses the default kubeconfig loading strategy:
//! 1. In-cluster config (if running in a pod)
//! 2. KUBECONFIG environment variable
//! 3. ~/.kube/config
//!
//! An explicit kubeconfig path or context overrides the inference. Proxy
//! settings (`HTTPS_PROXY`, `NO_PROXY`) are honored by kube-rs itself.

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use std::time::Duration;

/// Build the hub client
pub async fn create_client(
    kubeconfig: Option<&Path>,
    context: Option<&str>,
    timeout: Duration,
) -> Result<Client> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
            Config::from_custom_kubeconfig(kubeconfig, &options).await?
        }
        None if context.is_some() => Config::from_kubeconfig(&options).await?,
        None => Config::infer().await?,
    };

    // Watches hold reads open, so only the connect phase is bounded here
    config.connect_timeout = Some(timeout);

    tracing::debug!(server = %config.cluster_url, "Connecting to hub");
    let client = Client::try_from(config)?;
    Ok(client)
}
