//! Error types for the entity model.

use cms_types::OperationCancelled;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// An entity was registered under a URI with the wrong scheme.
    #[error(transparent)]
    Uri(#[from] cms_types::Error),

    #[error("unknown key \"{0}\"")]
    UnknownKey(String),
}

/// Failure of a single data adapter fetch.
///
/// `Cancelled` is a control signal and is kept distinct from real failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("operation was cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

impl AdapterError {
    pub fn failed(message: impl Into<String>) -> Self {
        AdapterError::Failed(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AdapterError::Cancelled)
    }
}

impl From<OperationCancelled> for AdapterError {
    fn from(_: OperationCancelled) -> Self {
        AdapterError::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("data source initialization failed: {0}")]
pub struct DataSourceError(pub String);

/// Errors raised by plugin code through the plugin contract.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin initialization failed: {0}")]
    Init(String),

    #[error("failed to load translations for locale \"{locale}\": {message}")]
    Translations { locale: String, message: String },

    #[error(transparent)]
    Entity(#[from] ModelError),
}
