//! The CMS configuration document.

use crate::error::{PluginHostError, Result};
use cms_model::TranslationMap;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Per-plugin entry of the `plugins` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfigMeta {
    /// Plugin URI, optionally with a `?v=` version query.
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    /// Translation overrides: locale → key → string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translations: Option<HashMap<String, TranslationMap>>,
}

impl PluginConfigMeta {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    /// The configured value, or an empty object.
    pub fn config_or_default(&self) -> Value {
        self.config
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmsConfig {
    /// Where the app is deployed relative to the domain root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    /// Absolute CDN URL or root-relative path plugins are fetched from.
    pub plugins_base_url: String,
    /// Either a list of entries or the legacy `{uri: config}` map, which is
    /// normalized into entries in document order.
    #[serde(deserialize_with = "deserialize_plugins")]
    pub plugins: Vec<PluginConfigMeta>,
    /// Kept raw: validated by the page structure validator.
    #[serde(default = "empty_array")]
    pub pages: Value,
    #[serde(default = "empty_object")]
    pub root_modules: Value,
}

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl CmsConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// A legacy plugin map keeps its key order here too: `serde_json` is
    /// built with `preserve_order`.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn base_path(&self) -> &str {
        self.base_path.as_deref().unwrap_or("/")
    }

    pub fn plugins_base_url(&self) -> &str {
        &self.plugins_base_url
    }

    pub fn plugin_uris(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|meta| meta.uri.as_str())
    }

    pub fn plugin_config_meta(&self, plugin_uri: &str) -> Result<&PluginConfigMeta> {
        self.plugins
            .iter()
            .find(|meta| meta.uri == plugin_uri)
            .ok_or_else(|| PluginHostError::Config(format!("missing plugin config \"{plugin_uri}\"")))
    }

    pub fn pages(&self) -> &Value {
        &self.pages
    }

    pub fn root_modules(&self) -> &Value {
        &self.root_modules
    }
}

fn deserialize_plugins<'de, D>(deserializer: D) -> std::result::Result<Vec<PluginConfigMeta>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PluginsVisitor;

    impl<'de> Visitor<'de> for PluginsVisitor {
        type Value = Vec<PluginConfigMeta>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a list of plugin entries or a map of plugin URI to config")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
            let mut plugins = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(meta) = seq.next_element::<PluginConfigMeta>()? {
                if meta.uri.is_empty() {
                    return Err(de::Error::custom("plugin entry has an empty \"uri\""));
                }
                plugins.push(meta);
            }
            Ok(plugins)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
            let mut plugins = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((uri, config)) = map.next_entry::<String, Value>()? {
                plugins.push(PluginConfigMeta {
                    uri,
                    config: Some(config),
                    translations: None,
                });
            }
            Ok(plugins)
        }
    }

    deserializer.deserialize_any(PluginsVisitor)
}
