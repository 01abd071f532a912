//! Error types for the plugin host.

use cms_model::{ModelError, PluginError};
use cms_pages::PageStructureError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PluginHostError>;

#[derive(Debug, Error)]
pub enum PluginHostError {
    #[error("invalid CMS config: {0}")]
    Config(String),

    #[error("CMS config could not be decoded: {0}")]
    ConfigDecode(#[from] serde_json::Error),

    #[error("network error: couldn't run plugin bundle {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: BundleError,
    },

    #[error(
        "timeout: plugin code didn't execute within {timeout_ms}ms, the callback ({callback_id}) was not called"
    )]
    Timeout {
        plugin_uri: String,
        callback_id: String,
        timeout_ms: u64,
    },

    #[error("plugin \"{0}\" must export a single plugin object as its default export")]
    MissingDefaultExport(String),

    #[error("invalid plugin: {0}")]
    InvalidPlugin(String),

    #[error("{kind} \"{uri}\" is invalid: {reason}")]
    InvalidEntity {
        kind: &'static str,
        uri: String,
        reason: String,
    },

    #[error("invalid plugin URI \"{0}\"")]
    InvalidPluginUri(String),

    #[error("module \"{0}\" is not provided by the plugin API")]
    ModuleNotProvided(String),

    #[error("module \"{0}\" is provided by the plugin API with a different type")]
    ModuleTypeMismatch(String),

    #[error("data source \"{uri}\" failed: {reason}")]
    DataSource { uri: String, reason: String },

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    PageStructure(#[from] PageStructureError),

    #[error(transparent)]
    DataLoader(#[from] cms_data::DataLoaderError),
}

/// Failure reported by a [`BundleRunner`](crate::BundleRunner).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BundleError(pub String);

impl BundleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
