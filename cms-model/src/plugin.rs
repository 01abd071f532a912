//! The plugin contract.

use crate::entity_collection::EntityCollection;
use crate::error::PluginError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Translation key → translated string.
pub type TranslationMap = HashMap<String, String>;

/// Manifest shipped next to a plugin bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Semver range of host versions the plugin was built against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cms_version: Option<String>,
}

/// Logger handed to a plugin; every record carries the plugin URI.
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin_uri: Arc<str>,
}

impl PluginLogger {
    pub fn new(plugin_uri: &str) -> Self {
        Self {
            plugin_uri: Arc::from(plugin_uri),
        }
    }

    pub fn plugin_uri(&self) -> &str {
        &self.plugin_uri
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(plugin_uri = %self.plugin_uri, "{message}");
    }

    pub fn info(&self, message: &str) {
        tracing::info!(plugin_uri = %self.plugin_uri, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(plugin_uri = %self.plugin_uri, "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(plugin_uri = %self.plugin_uri, "{message}");
    }
}

/// Everything a plugin receives in [`Plugin::init`].
pub struct PluginInit<'a> {
    pub config: &'a Value,
    /// Registration API; entities added here are validated and merged by the host.
    pub entities: &'a mut EntityCollection,
    pub logger: PluginLogger,
    /// Base URL of the plugin's own assets. `None` for inline plugins.
    pub public_path: Option<&'a str>,
}

#[async_trait]
pub trait TranslationLoader: Send + Sync {
    async fn load_translations(&self, locale: &str) -> Result<TranslationMap, PluginError>;
}

/// What a plugin bundle exports.
pub trait Plugin: Send + Sync {
    fn init(&self, ctx: PluginInit<'_>) -> Result<(), PluginError>;

    /// Locales the plugin ships translations for.
    fn available_locales(&self) -> Option<Vec<String>> {
        None
    }

    /// Required whenever [`available_locales`](Self::available_locales) is declared.
    fn translations(&self) -> Option<&dyn TranslationLoader> {
        None
    }
}
