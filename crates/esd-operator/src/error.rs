use crate::differ::ConfigError;
use crate::provider::{ErrorClass, ProviderError};
use crate::store::{ResourceId, StoreError};

pub type EsdOperatorResult<T = (), E = EsdOperatorError> = Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum EsdOperatorError {
    /// Throttling, service unavailable or network failures. Retried.
    #[error("Transient provider error: {0}")]
    Transient(ProviderError),

    /// The spec can never converge as written.
    #[error("Invalid domain configuration: {0}")]
    Config(#[from] ConfigError),

    /// Another writer updated the resource first. Retried immediately.
    #[error("Write conflict on {0}")]
    WriteConflict(ResourceId),

    #[error("Unexpected provider error: {0}")]
    Unknown(ProviderError),

    #[error("Store error: {0}")]
    Store(StoreError),

    /// Any error originating from the `kube-rs` crate
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("Invalid Json: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid Kubernetes Yaml: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
}

impl From<ProviderError> for EsdOperatorError {
    fn from(err: ProviderError) -> Self {
        match err.class() {
            ErrorClass::Transient => EsdOperatorError::Transient(err),
            ErrorClass::Config => EsdOperatorError::Config(ConfigError::Rejected(err)),
            ErrorClass::NotFound | ErrorClass::AlreadyExists | ErrorClass::Unknown => {
                EsdOperatorError::Unknown(err)
            }
        }
    }
}

impl From<StoreError> for EsdOperatorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(id) => EsdOperatorError::WriteConflict(id),
            other => EsdOperatorError::Store(other),
        }
    }
}

impl EsdOperatorError {
    /// Short machine-readable reason for logs and status conditions.
    pub fn reason(&self) -> String {
        match self {
            EsdOperatorError::Transient(e) | EsdOperatorError::Unknown(e) => e.code.to_string(),
            EsdOperatorError::Config(e) => e.reason().to_string(),
            EsdOperatorError::WriteConflict(_) => "WriteConflict".to_string(),
            EsdOperatorError::Store(_) => "StoreError".to_string(),
            EsdOperatorError::Kube { .. } => "KubernetesError".to_string(),
            EsdOperatorError::Json { .. } | EsdOperatorError::Yaml { .. } => {
                "SerializationError".to_string()
            }
        }
    }
}
