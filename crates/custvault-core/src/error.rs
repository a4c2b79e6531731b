use custvault_gateway::GatewayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Secrets gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Secrets gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for Error {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable { .. } => Self::GatewayUnavailable(err.to_string()),
            GatewayError::Rejected { .. }
            | GatewayError::Malformed { .. }
            | GatewayError::Configuration(_) => Self::GatewayRejected(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
