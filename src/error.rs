//! Error taxonomy shared by the connection store, the data-access service and
//! the HTTP handlers.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsoleError>;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// A referenced profile, database, collection or document does not exist.
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    /// The driver call itself failed.
    #[error("{0}")]
    Upstream(#[from] mongodb::error::Error),

    #[error("{operation} timed out after {secs} seconds")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("failed to access connection store {}: {source}", path.display())]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("connection store {} is malformed: {source}", path.display())]
    StoreFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConsoleError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Map this error to an HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidInput(_) => 400,
            Self::Upstream(_) => 500,
            Self::Timeout { .. } => 504,
            Self::StoreIo { .. } | Self::StoreFormat { .. } => 500,
        }
    }
}
