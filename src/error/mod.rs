//! Error types and handlers for registry and listing operations

pub mod handlers;

use thiserror::Error;

/// Failure of a single registry call.
///
/// Every call into the registry either succeeds or fails exactly once with one
/// of these; retrying is left to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The token provider could not mint a bearer token
    #[error("Authentication error: {0}")]
    Auth(String),
    /// Connection failures, timeouts and non-2xx responses
    #[error("Transport error: {0}")]
    Transport(String),
    /// The response body did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),
}

impl RegistryError {
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::Auth(_) => "auth",
            RegistryError::Transport(_) => "transport",
            RegistryError::Decode(_) => "decode",
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Decode(err.to_string())
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Application level errors surfaced by the binary and configuration layer
#[derive(Debug, Error)]
pub enum ListerError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Task error: {0}")]
    Task(String),
}

impl From<url::ParseError> for ListerError {
    fn from(err: url::ParseError) -> Self {
        ListerError::Config(format!("Invalid registry URL: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ListerError>;
