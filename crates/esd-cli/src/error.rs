use esd_common::error::EsdError;
use esd_common::util::backoff::PollError;
use esd_operator::error::EsdOperatorError;
use thiserror::Error;

pub type EsdCliResult<T = (), E = EsdCliError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum EsdCliError {
    #[error("Unable to initialize config: {0}")]
    InitConfig(String),
    #[error("Unable to run command: {0}")]
    Command(#[from] clap::error::Error),
    #[error("Invalid manifest {path}: {reason}")]
    Manifest { path: String, reason: String },
    #[error("Domain did not converge: {0}")]
    Convergence(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<EsdError> for EsdCliError {
    fn from(error: EsdError) -> Self {
        EsdCliError::Runtime(error.to_string())
    }
}

impl From<EsdOperatorError> for EsdCliError {
    fn from(error: EsdOperatorError) -> Self {
        EsdCliError::Runtime(error.to_string())
    }
}

impl From<anyhow::Error> for EsdCliError {
    fn from(error: anyhow::Error) -> Self {
        EsdCliError::Runtime(error.to_string())
    }
}

impl From<std::io::Error> for EsdCliError {
    fn from(error: std::io::Error) -> Self {
        EsdCliError::Runtime(error.to_string())
    }
}

impl<E: std::fmt::Display> From<PollError<E>> for EsdCliError {
    fn from(error: PollError<E>) -> Self {
        match error {
            PollError::Timeout { .. } => EsdCliError::Convergence(error.to_string()),
            PollError::Failed(e) => EsdCliError::Runtime(e.to_string()),
        }
    }
}
