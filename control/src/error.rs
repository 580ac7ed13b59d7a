use thiserror::Error;

/// Route controller errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    /// Optimistic concurrency failure: the write was based on a stale
    /// resourceVersion
    #[error("conflict writing {key}: {message}")]
    Conflict { key: String, message: String },

    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Route translation error: {0}")]
    Translation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn conflict(key: impl ToString, message: impl Into<String>) -> Self {
        Self::Conflict {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn translation(msg: impl Into<String>) -> Self {
        Self::Translation(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether re-running the whole reconcile can clear the error.
    ///
    /// Configuration and serialization errors need a code or config change.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Serialization(_))
    }
}

/// Map a kube API error for `kind`/`key`, classifying 404 and 409 responses
pub fn map_kube_error(err: kube::Error, kind: &'static str, key: impl ToString) -> Error {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => Error::not_found(kind, key),
        kube::Error::Api(resp) if resp.code == 409 => Error::conflict(key, resp.message),
        other => Error::Kube(other),
    }
}
