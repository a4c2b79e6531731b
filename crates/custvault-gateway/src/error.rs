//! Error types for custvault-gateway

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport failure, timeout or a 5xx from the gateway.
    #[error("gateway unavailable during {operation}: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },

    /// Authentication or policy denial (4xx).
    #[error("gateway rejected {operation} (HTTP {status}): {message}")]
    Rejected {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// A successful response that did not carry the expected payload.
    #[error("malformed gateway response for {operation}: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },

    #[error("gateway configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            message: message.into(),
        }
    }

    pub fn malformed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            operation,
            message: message.into(),
        }
    }

    /// Classify a reqwest failure that happened before a status was read.
    pub(crate) fn from_transport(operation: &'static str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        Self::unavailable(operation, message)
    }

    /// True for failures that may clear up once the gateway recovers.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
