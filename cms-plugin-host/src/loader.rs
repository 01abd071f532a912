//! Plugin bundle loading.
//!
//! A bundle is run by a [`BundleRunner`]. Before running it the loader
//! installs a one-shot callback named after the plugin URI; the bundle hands
//! its exports to that callback. The callback must fire within the timeout
//! window that starts once the bundle ran.

use crate::error::{BundleError, PluginHostError, Result};
use crate::runtime::PluginApiRuntime;
use crate::url_builder::{PluginUrlBuilder, callback_id};
use async_trait::async_trait;
use cms_model::{Plugin, PluginManifest};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What a bundle hands to its callback.
#[derive(Clone, Default)]
pub struct PluginExports {
    pub default: Option<Arc<dyn Plugin>>,
    pub manifest: Option<PluginManifest>,
}

impl PluginExports {
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            default: Some(plugin),
            manifest: None,
        }
    }

    pub fn with_manifest(mut self, manifest: PluginManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }
}

impl fmt::Debug for PluginExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginExports")
            .field("default", &self.default.is_some())
            .field("manifest", &self.manifest)
            .finish()
    }
}

/// A successfully loaded bundle.
#[derive(Clone)]
pub struct PluginModule {
    pub plugin: Arc<dyn Plugin>,
    /// `None` for legacy bundles.
    pub manifest: Option<PluginManifest>,
}

/// Named one-shot callbacks; invoking one removes it.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    slots: Arc<Mutex<HashMap<String, oneshot::Sender<PluginExports>>>>,
}

impl CallbackRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<PluginExports>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self, id: &str) -> oneshot::Receiver<PluginExports> {
        let (tx, rx) = oneshot::channel();
        if self.lock().insert(id.to_string(), tx).is_some() {
            warn!(callback_id = %id, "Replacing a pending plugin callback");
        }
        rx
    }

    fn remove(&self, id: &str) {
        self.lock().remove(id);
    }

    /// Delivers `exports` to the callback `id`. False if no such callback is
    /// pending or its loader gave up.
    pub fn invoke(&self, id: &str, exports: PluginExports) -> bool {
        let slot = self.lock().remove(id);
        match slot {
            Some(tx) => tx.send(exports).is_ok(),
            None => false,
        }
    }

    pub fn is_installed(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }
}

/// What a running bundle can reach.
pub struct BundleScope {
    pub runtime: Arc<PluginApiRuntime>,
    pub callbacks: CallbackRegistry,
}

/// Executes the bundle found at a URL.
#[async_trait]
pub trait BundleRunner: Send + Sync {
    /// Resolves once the bundle ran. Exports are delivered through
    /// `scope.callbacks`, possibly later.
    async fn run(&self, url: &str, scope: &BundleScope) -> std::result::Result<(), BundleError>;
}

pub type BundleFn = Arc<dyn Fn(&BundleScope) -> std::result::Result<(), BundleError> + Send + Sync>;

/// Serves bundles linked into the host binary, keyed by bundle URL.
#[derive(Clone, Default)]
pub struct StaticBundleRunner {
    bundles: HashMap<String, BundleFn>,
}

impl StaticBundleRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle<F>(mut self, url: impl Into<String>, bundle: F) -> Self
    where
        F: Fn(&BundleScope) -> std::result::Result<(), BundleError> + Send + Sync + 'static,
    {
        self.bundles.insert(url.into(), Arc::new(bundle));
        self
    }

    /// A well-behaved bundle: invokes the callback for `plugin_uri` with `exports`.
    pub fn with_plugin(self, url: impl Into<String>, plugin_uri: &str, exports: PluginExports) -> Self {
        let id = callback_id(plugin_uri);
        self.with_bundle(url, move |scope| {
            scope.callbacks.invoke(&id, exports.clone());
            Ok(())
        })
    }
}

#[async_trait]
impl BundleRunner for StaticBundleRunner {
    async fn run(&self, url: &str, scope: &BundleScope) -> std::result::Result<(), BundleError> {
        match self.bundles.get(url) {
            Some(bundle) => bundle(scope),
            None => Err(BundleError::new(format!("no bundle at {url}"))),
        }
    }
}

impl fmt::Debug for StaticBundleRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticBundleRunner")
            .field("bundles", &self.bundles.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub struct PluginLoader {
    urls: PluginUrlBuilder,
    runner: Arc<dyn BundleRunner>,
    runtime: Arc<PluginApiRuntime>,
    callbacks: CallbackRegistry,
    timeout: Duration,
}

impl PluginLoader {
    pub fn new(
        urls: PluginUrlBuilder,
        runner: Arc<dyn BundleRunner>,
        runtime: Arc<PluginApiRuntime>,
        timeout: Duration,
    ) -> Self {
        Self {
            urls,
            runner,
            runtime,
            callbacks: CallbackRegistry::default(),
            timeout,
        }
    }

    pub fn urls(&self) -> &PluginUrlBuilder {
        &self.urls
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Loads the bundle of `plugin_uri` (without query string).
    pub async fn load(&self, plugin_uri: &str, version: Option<&str>) -> Result<PluginModule> {
        let id = callback_id(plugin_uri);
        let url = self.urls.bundle_url(plugin_uri, version);
        let exports = self.callbacks.install(&id);

        debug!(plugin_uri = %plugin_uri, url = %url, callback_id = %id, "Running plugin bundle");
        let scope = BundleScope {
            runtime: Arc::clone(&self.runtime),
            callbacks: self.callbacks.clone(),
        };
        if let Err(source) = self.runner.run(&url, &scope).await {
            self.callbacks.remove(&id);
            return Err(PluginHostError::Network { url, source });
        }

        let exports = match tokio::time::timeout(self.timeout, exports).await {
            Ok(Ok(exports)) => exports,
            Ok(Err(_)) | Err(_) => {
                self.callbacks.remove(&id);
                return Err(PluginHostError::Timeout {
                    plugin_uri: plugin_uri.to_string(),
                    callback_id: id,
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        let plugin = exports
            .default
            .ok_or_else(|| PluginHostError::MissingDefaultExport(plugin_uri.to_string()))?;
        Ok(PluginModule {
            plugin,
            manifest: exports.manifest,
        })
    }
}
