//! Error types for the import controllers
//!
//! Reconcilers return [`Error`] to the scheduling layer, which requeues with
//! backoff. Not-found responses never reach this type: the hub client maps
//! them to `None` or to success before they can be mistaken for failures.

use thiserror::Error;

/// Errors returned by reconcilers and the hub client
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error (timeouts, conflicts, rejected writes)
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The auto-import secret content cannot be parsed into usable access
    #[error("invalid auto-import secret for {cluster}: {message}")]
    InvalidAutoImportSecret {
        /// Managed cluster (and namespace) owning the secret
        cluster: String,
        /// What is wrong with the content
        message: String,
    },

    /// Caller-provided access was well formed but could not be used
    #[error("cannot access managed cluster {cluster}: {message}")]
    Access {
        /// Managed cluster the access points at
        cluster: String,
        /// Why the attempt failed
        message: String,
    },

    /// An external call exceeded its time bound
    #[error("timed out after {seconds}s: {operation}")]
    Timeout {
        /// The operation that timed out
        operation: String,
        /// The bound that was exceeded
        seconds: u64,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Invalid controller configuration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what is invalid
        message: String,
    },
}

impl Error {
    /// Create an invalid auto-import secret error
    pub fn invalid_secret(cluster: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAutoImportSecret {
            cluster: cluster.into(),
            message: message.into(),
        }
    }

    /// Create an access error
    pub fn access(cluster: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Access {
            cluster: cluster.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the error comes from the credentials rather than the hub.
    ///
    /// Credential failures are charged against the auto-import retry budget;
    /// everything else is handed back to the scheduler untouched.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            Error::InvalidAutoImportSecret { .. } | Error::Access { .. }
        )
    }

    /// Whether this error is a write conflict on a stale resourceVersion
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Kube { source } if is_conflict(source))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(err.to_string())
    }
}

/// Whether a kube error is a 404 from the API server
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// Whether a kube error is a 409 (stale resourceVersion or already exists)
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}
