//! Error types for the datastore bootstrap
//!
//! Startup failures fall into two families: configuration that cannot be
//! turned into a connection request, and connection requests the cluster
//! refuses. Both abort startup; nothing here is retried.

use crate::config::ConfigKey;

/// Main error type for datastore operations
#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    #[error("Configuration error [{key}]: {message}")]
    Configuration { key: ConfigKey, message: String },

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Datastore is not running")]
    NotRunning,

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

impl DatastoreError {
    /// Build a configuration error reported against `key`
    pub fn config(key: ConfigKey, message: impl Into<String>) -> Self {
        Self::Configuration {
            key,
            message: message.into(),
        }
    }

    /// The configuration key an error was reported against, if any
    pub fn config_key(&self) -> Option<ConfigKey> {
        match self {
            Self::Configuration { key, .. } => Some(*key),
            _ => None,
        }
    }

    /// Whether this is a configuration error (as opposed to a connectivity one)
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl From<mongodb::error::Error> for DatastoreError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type alias for datastore operations
pub type Result<T> = std::result::Result<T, DatastoreError>;
