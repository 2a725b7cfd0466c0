use std::path::PathBuf;

pub type EsdResult<T = (), E = EsdError> = Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum EsdError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] anyhow::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Invalid bootstrap record: {0}")]
    InvalidBootstrap(String),
    #[error("Unable to install tracing subscriber: {0}")]
    Tracing(String),

    #[error("Invalid Json: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid Yaml: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
}
