#![allow(dead_code)]

use async_trait::async_trait;
use cms_model::{
    AdapterError, ContextType, DataAdapter, DataSource, DataSourceDependency, DataSourceError,
    DependencyData, Plugin, PluginError, PluginInit, TranslationLoader, TranslationMap,
};
use cms_plugin_host::{CmsConfig, HostSettings, PluginExports, StaticBundleRunner};
use cms_types::CancellationToken;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "https://cdn.test/plugins";

pub fn bundle_url(path: &str) -> String {
    format!("{BASE_URL}/{path}/index.js")
}

pub fn settings() -> HostSettings {
    HostSettings {
        host_version: "1.4.0".to_string(),
        plugin_load_timeout_ms: 200,
        ..HostSettings::default()
    }
}

pub fn config(json: Value) -> CmsConfig {
    CmsConfig::from_value(json).unwrap()
}

pub fn runner_with(entries: Vec<(String, &str, PluginExports)>) -> StaticBundleRunner {
    entries
        .into_iter()
        .fold(StaticBundleRunner::new(), |runner, (url, uri, exports)| {
            runner.with_plugin(url, uri, exports)
        })
}

// ── Plugins ─────────────────────────────────────────────────────

type InitFn = dyn Fn(PluginInit<'_>) -> Result<(), PluginError> + Send + Sync;

/// A plugin whose `init` runs a closure and records what it was given.
pub struct TestPlugin {
    init: Box<InitFn>,
    locales: Option<Vec<String>>,
    translations: Option<StaticTranslations>,
    pub seen_config: Mutex<Option<Value>>,
    pub seen_public_path: Mutex<Option<String>>,
}

impl TestPlugin {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn(PluginInit<'_>) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        Self {
            init: Box::new(init),
            locales: None,
            translations: None,
            seen_config: Mutex::new(None),
            seen_public_path: Mutex::new(None),
        }
    }

    pub fn empty() -> Self {
        Self::new(|_| Ok(()))
    }

    pub fn with_translations(mut self, translations: StaticTranslations) -> Self {
        self.locales = Some(translations.0.keys().cloned().collect());
        self.translations = Some(translations);
        self
    }

    /// Declares locales without a translation loader.
    pub fn with_locales_only(mut self, locales: &[&str]) -> Self {
        self.locales = Some(locales.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn exports(self) -> (Arc<Self>, PluginExports) {
        let plugin = Arc::new(self);
        let exports = PluginExports::new(plugin.clone());
        (plugin, exports)
    }
}

impl Plugin for TestPlugin {
    fn init(&self, ctx: PluginInit<'_>) -> Result<(), PluginError> {
        *self.seen_config.lock().unwrap() = Some(ctx.config.clone());
        *self.seen_public_path.lock().unwrap() = ctx.public_path.map(str::to_string);
        (self.init)(ctx)
    }

    fn available_locales(&self) -> Option<Vec<String>> {
        self.locales.clone()
    }

    fn translations(&self) -> Option<&dyn TranslationLoader> {
        self.translations.as_ref().map(|t| t as &dyn TranslationLoader)
    }
}

/// locale → key → string. Unknown locales fail to load.
#[derive(Default)]
pub struct StaticTranslations(pub HashMap<String, TranslationMap>);

impl StaticTranslations {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn locale(mut self, locale: &str, pairs: &[(&str, &str)]) -> Self {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.0.insert(locale.to_string(), map);
        self
    }
}

#[async_trait]
impl TranslationLoader for StaticTranslations {
    async fn load_translations(&self, locale: &str) -> Result<TranslationMap, PluginError> {
        self.0
            .get(locale)
            .cloned()
            .ok_or_else(|| PluginError::Translations {
                locale: locale.to_string(),
                message: "not shipped".to_string(),
            })
    }
}

// ── Adapters and data sources ───────────────────────────────────

/// Returns a fixed value (or nothing) and counts its calls.
pub struct StaticAdapter {
    context_type: ContextType,
    dependencies: Vec<String>,
    value: Option<Value>,
    pub calls: AtomicUsize,
}

impl StaticAdapter {
    pub fn new(value: Value) -> Self {
        Self {
            context_type: ContextType::root(),
            dependencies: Vec::new(),
            value: Some(value),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn no_data() -> Self {
        Self {
            value: None,
            ..Self::new(Value::Null)
        }
    }

    pub fn context_type(mut self, context_type: ContextType) -> Self {
        self.context_type = context_type;
        self
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataAdapter for StaticAdapter {
    fn context_type(&self) -> &ContextType {
        &self.context_type
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    async fn load(
        &self,
        _context: &Value,
        _cancel: &CancellationToken,
        _deps: &DependencyData,
    ) -> Result<Option<Value>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.value.clone())
    }
}

/// Records the dependency data `init` receives.
pub struct RecordingSource {
    dependencies: Vec<DataSourceDependency>,
    pub received: Mutex<Option<DependencyData>>,
}

impl RecordingSource {
    pub fn new(dependencies: Vec<DataSourceDependency>) -> Self {
        Self {
            dependencies,
            received: Mutex::new(None),
        }
    }

    pub fn received(&self) -> Option<DependencyData> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataSource for RecordingSource {
    fn dependencies(&self) -> &[DataSourceDependency] {
        &self.dependencies
    }

    async fn init(&self, deps: &DependencyData) -> Result<(), DataSourceError> {
        *self.received.lock().unwrap() = Some(deps.clone());
        Ok(())
    }
}

/// Routes log output through the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_test_writer()
        .compact()
        .try_init();
}
