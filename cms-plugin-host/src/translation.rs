//! Per-plugin translations.

use crate::config::PluginConfigMeta;
use crate::error::{PluginHostError, Result};
use cms_model::{Plugin, TranslationMap};
use cms_types::{UriScheme, split_query};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info};

/// The strings of one plugin for one locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translation {
    locale: String,
    entries: TranslationMap,
}

impl Translation {
    pub fn new(locale: impl Into<String>, entries: TranslationMap) -> Self {
        Self {
            locale: locale.into(),
            entries,
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn entries(&self) -> &TranslationMap {
        &self.entries
    }

    /// Looks up `key` and substitutes every `{name}` placeholder found in
    /// `params`. An unknown key translates to itself.
    pub fn get(&self, key: &str, params: &[(&str, &str)]) -> String {
        let Some(template) = self.entries.get(key) else {
            return key.to_string();
        };
        params
            .iter()
            .fold(template.clone(), |text, (name, value)| {
                text.replace(&format!("{{{name}}}"), value)
            })
    }

    fn apply(&mut self, overrides: &TranslationMap) {
        self.entries
            .extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

struct Loaded {
    locale: String,
    translations: HashMap<String, Arc<Translation>>,
}

/// Loads and serves the translations of every loaded plugin.
pub struct PluginTranslationStore {
    plugins: Vec<(String, Arc<dyn Plugin>)>,
    /// plugin URI → locale → overrides from the CMS config.
    overrides: HashMap<String, HashMap<String, TranslationMap>>,
    default_locale: String,
    loaded: RwLock<Option<Loaded>>,
}

impl PluginTranslationStore {
    /// `plugins` are keyed by URI without query string.
    pub fn new<I>(plugins: I, metas: &[PluginConfigMeta], default_locale: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (String, Arc<dyn Plugin>)>,
    {
        let overrides = metas
            .iter()
            .filter_map(|meta| {
                let translations = meta.translations.clone()?;
                let (uri, _) = split_query(&meta.uri);
                Some((uri.to_string(), translations))
            })
            .collect();
        Self {
            plugins: plugins.into_iter().collect(),
            overrides,
            default_locale: default_locale.into(),
            loaded: RwLock::new(None),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Locale of the last completed load.
    pub fn locale(&self) -> Option<String> {
        self.read(|loaded| loaded.map(|l| l.locale.clone()))
    }

    pub fn is_loaded(&self) -> bool {
        self.read(|loaded| loaded.is_some())
    }

    fn read<R>(&self, f: impl FnOnce(Option<&Loaded>) -> R) -> R {
        let guard = self.loaded.read().unwrap_or_else(PoisonError::into_inner);
        f(guard.as_ref())
    }

    /// Loads every plugin's translations for `locale` concurrently.
    ///
    /// A plugin that doesn't list `locale` is asked for the default locale;
    /// a plugin without translation support, or whose loader fails, gets an
    /// empty set. Config overrides for `locale` are applied last.
    pub async fn load_translations(&self, locale: &str) {
        let loads = self.plugins.iter().map(|(uri, plugin)| async move {
            let mut translation = self.load_plugin(uri, plugin.as_ref(), locale).await;
            if let Some(overrides) = self.overrides.get(uri).and_then(|by_locale| by_locale.get(locale)) {
                translation.apply(overrides);
            }
            (uri.clone(), Arc::new(translation))
        });
        let translations = join_all(loads).await.into_iter().collect();

        *self.loaded.write().unwrap_or_else(PoisonError::into_inner) = Some(Loaded {
            locale: locale.to_string(),
            translations,
        });
        info!(locale = %locale, plugins = self.plugins.len(), "Loaded plugin translations");
    }

    async fn load_plugin(&self, uri: &str, plugin: &dyn Plugin, locale: &str) -> Translation {
        let (Some(locales), Some(loader)) = (plugin.available_locales(), plugin.translations()) else {
            return Translation::new(locale, TranslationMap::new());
        };
        let target = if locales.iter().any(|l| l == locale) {
            locale
        } else {
            debug!(plugin_uri = %uri, locale = %locale, fallback = %self.default_locale, "Locale not shipped, using default");
            self.default_locale.as_str()
        };
        match loader.load_translations(target).await {
            Ok(entries) => Translation::new(target, entries),
            Err(e) => {
                error!(plugin_uri = %uri, locale = %target, "Failed to load translations: {}", e);
                Translation::new(target, TranslationMap::new())
            }
        }
    }

    /// Translations of `plugin_uri` from the last load; `None` before the
    /// first load or for a plugin that isn't loaded.
    pub fn get_translations(&self, plugin_uri: &str) -> Result<Option<Arc<Translation>>> {
        if !(UriScheme::Plugin.matches(plugin_uri) || UriScheme::InlinePlugin.matches(plugin_uri)) {
            return Err(PluginHostError::InvalidPluginUri(plugin_uri.to_string()));
        }
        let (uri, _) = split_query(plugin_uri);
        Ok(self.read(|loaded| loaded.and_then(|l| l.translations.get(uri).cloned())))
    }
}

impl std::fmt::Debug for PluginTranslationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginTranslationStore")
            .field("plugins", &self.plugins.iter().map(|(uri, _)| uri).collect::<Vec<_>>())
            .field("default_locale", &self.default_locale)
            .field("locale", &self.locale())
            .finish()
    }
}
