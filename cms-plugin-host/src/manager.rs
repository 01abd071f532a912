//! Bootstrap orchestration.
//!
//! Plugins are loaded one at a time, in config order, so that entity
//! ownership is deterministic and a later plugin sees what earlier ones
//! registered. A plugin that fails anywhere in its sequence is logged and
//! left out; the rest proceed.

use crate::config::{CmsConfig, PluginConfigMeta};
use crate::error::{PluginHostError, Result};
use crate::loader::{BundleRunner, PluginLoader};
use crate::runtime::PluginApiRuntime;
use crate::settings::HostSettings;
use crate::translation::PluginTranslationStore;
use crate::url_builder::PluginUrlBuilder;
use crate::validator::PluginValidator;
use cms_data::{DataLoader, collect_data_adapter_types};
use cms_model::{
    AdapterError, DataAdapter, DataSource, DependencyData, EntityCollection, MixedCollection, Plugin,
    PluginError, PluginInit, PluginLogger, PluginManifest,
};
use cms_pages::{ModuleMap, NodeArena, NodeId, PageStructureReader, PageTree};
use cms_types::{CancellationToken, UriScheme, split_query};
use futures::future::{BoxFuture, FutureExt, join_all};
use semver::{Version, VersionReq};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

type InlinePluginFactory =
    Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<Arc<dyn Plugin>, PluginError>> + Send + Sync>;

/// Plugins compiled into the host, registered under `inline-plugin://` URIs.
#[derive(Clone, Default)]
pub struct InlinePlugins {
    factories: HashMap<String, InlinePluginFactory>,
}

impl InlinePlugins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F, Fut>(mut self, uri: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Arc<dyn Plugin>, PluginError>> + Send + 'static,
    {
        self.factories
            .insert(uri.into(), Arc::new(move || factory().boxed()));
        self
    }

    pub fn has(&self, uri: &str) -> bool {
        self.factories.contains_key(uri)
    }

    /// Factories only apply to `inline-plugin://` URIs.
    fn get(&self, uri: &str) -> Option<&InlinePluginFactory> {
        if !UriScheme::InlinePlugin.matches(uri) {
            return None;
        }
        self.factories.get(uri)
    }
}

impl fmt::Debug for InlinePlugins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlinePlugins")
            .field("uris", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Everything the renderer needs once bootstrap finished.
pub struct CmsRendererConfig {
    /// Successfully loaded plugins, keyed by URI without query string.
    pub plugins: MixedCollection<Arc<dyn Plugin>>,
    /// Config entries of every configured plugin, loaded or not.
    pub plugin_config_metas: MixedCollection<PluginConfigMeta>,
    pub pages: PageTree,
    pub data_adapters: MixedCollection<Arc<dyn DataAdapter>>,
    pub root_modules: ModuleMap,
    /// Entity URI → URI of the plugin whose registration won the merge.
    pub entity_owners: HashMap<String, String>,
    settings: HostSettings,
}

impl CmsRendererConfig {
    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    pub fn owner_of(&self, entity_uri: &str) -> Option<&str> {
        self.entity_owners.get(entity_uri).map(String::as_str)
    }

    pub fn translation_store(&self) -> PluginTranslationStore {
        let metas: Vec<PluginConfigMeta> = self.plugin_config_metas.values().cloned().collect();
        PluginTranslationStore::new(
            self.plugins
                .entries()
                .map(|(uri, plugin)| (uri.to_string(), Arc::clone(plugin))),
            &metas,
            self.settings.default_locale.clone(),
        )
    }

    /// Loader for everything rendered in the root module slots.
    pub fn root_data_loader(&self) -> Result<DataLoader> {
        let roots: Vec<NodeId> = self.root_modules.slots().values().flatten().copied().collect();
        self.data_loader(self.root_modules.arena(), roots, false)
    }

    /// Loader for a page's slots. Top-level fetches reset one frame late.
    pub fn page_data_loader(&self, page: NodeId) -> Result<DataLoader> {
        self.data_loader(self.pages.arena(), self.pages.children(page), true)
    }

    /// Loader for the modules inside a context node of `arena`.
    pub fn context_data_loader(&self, arena: &NodeArena, context: NodeId) -> Result<DataLoader> {
        self.data_loader(arena, arena.children(context), false)
    }

    fn data_loader(&self, arena: &NodeArena, children: Vec<NodeId>, reset_on_fetch: bool) -> Result<DataLoader> {
        let mut adapters = self.data_adapters.clone();
        let adapter_types = collect_data_adapter_types(arena, children, &mut adapters);
        Ok(DataLoader::new(
            adapter_types,
            &adapters,
            self.settings.loader_options(reset_on_fetch),
        )?)
    }
}

impl fmt::Debug for CmsRendererConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsRendererConfig")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("pages", &self.pages.pages().len())
            .field("data_adapters", &self.data_adapters.keys().collect::<Vec<_>>())
            .field("root_modules", &self.root_modules.slots().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Outcome of comparing a plugin manifest with the host version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ManifestCheck {
    /// No manifest at all.
    Legacy,
    /// Manifest without `cmsVersion`, or a host version that isn't semver.
    Unchecked,
    InvalidRange(String),
    Incompatible { required: String, actual: String },
    Compatible,
}

pub(crate) fn check_manifest(manifest: Option<&PluginManifest>, host_version: Option<&Version>) -> ManifestCheck {
    let Some(manifest) = manifest else {
        return ManifestCheck::Legacy;
    };
    let Some(range) = manifest.cms_version.as_deref() else {
        return ManifestCheck::Unchecked;
    };
    let Some(required) = parse_range(range) else {
        return ManifestCheck::InvalidRange(range.to_string());
    };
    match host_version {
        None => ManifestCheck::Unchecked,
        Some(actual) if required.iter().any(|req| req.matches(actual)) => ManifestCheck::Compatible,
        Some(actual) => ManifestCheck::Incompatible {
            required: range.to_string(),
            actual: actual.to_string(),
        },
    }
}

/// Parses an npm-style range: `||`-separated alternatives, each a set of
/// comparators joined by commas or whitespace (`>=1.2 <2`).
fn parse_range(range: &str) -> Option<Vec<VersionReq>> {
    range
        .split("||")
        .map(|alternative| {
            let alternative = alternative.trim();
            VersionReq::parse(alternative).ok().or_else(|| {
                let joined = alternative.split_whitespace().collect::<Vec<_>>().join(", ");
                VersionReq::parse(&joined).ok()
            })
        })
        .collect()
}

fn log_manifest_check(plugin_uri: &str, check: &ManifestCheck) {
    match check {
        ManifestCheck::Legacy => warn!(
            plugin_uri = %plugin_uri,
            "Legacy plugin detected: no manifest. Rebuild the plugin with a current plugin tool to remove this warning"
        ),
        ManifestCheck::InvalidRange(range) => error!(
            plugin_uri = %plugin_uri,
            "Invalid plugin manifest: \"{}\" is not a valid semver range", range
        ),
        ManifestCheck::Incompatible { required, actual } => error!(
            plugin_uri = %plugin_uri,
            "Plugin requires a different CMS version (expected = \"{}\"; actual = \"{}\"). Loading it anyway, it may not work correctly",
            required, actual
        ),
        ManifestCheck::Unchecked | ManifestCheck::Compatible => {}
    }
}

/// The `v` query parameter of a plugin URI.
fn plugin_version(uri: &str) -> Result<Option<String>> {
    let parsed = Url::parse(uri).map_err(|_| PluginHostError::InvalidPluginUri(uri.to_string()))?;
    Ok(parsed
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty()))
}

pub struct PluginManager {
    config: CmsConfig,
    settings: HostSettings,
    runner: Arc<dyn BundleRunner>,
    inline_plugins: InlinePlugins,
    validator: PluginValidator,
}

impl PluginManager {
    pub fn new(config: CmsConfig, settings: HostSettings, runner: Arc<dyn BundleRunner>) -> Self {
        Self {
            config,
            settings,
            runner,
            inline_plugins: InlinePlugins::default(),
            validator: PluginValidator::new(),
        }
    }

    pub fn with_inline_plugins(mut self, inline_plugins: InlinePlugins) -> Self {
        self.inline_plugins = inline_plugins;
        self
    }

    pub fn config(&self) -> &CmsConfig {
        &self.config
    }

    // ================================================================
    // Bootstrap
    // ================================================================

    /// Runs the whole load sequence.
    ///
    /// Only an invalid page structure fails the bootstrap; plugin and data
    /// source failures are logged and isolated.
    pub async fn load_plugins(&self) -> Result<CmsRendererConfig> {
        let runtime = Arc::new(PluginApiRuntime::with_defaults(&self.settings));
        let loader = PluginLoader::new(
            PluginUrlBuilder::new(self.config.plugins_base_url()),
            Arc::clone(&self.runner),
            runtime,
            self.settings.plugin_load_timeout(),
        );
        let host_version = match Version::parse(&self.settings.host_version) {
            Ok(version) => Some(version),
            Err(e) => {
                warn!(
                    "Host version \"{}\" is not valid semver: {}. Plugin manifests won't be checked",
                    self.settings.host_version, e
                );
                None
            }
        };

        let mut plugins: MixedCollection<Arc<dyn Plugin>> = MixedCollection::new();
        let mut plugin_config_metas = MixedCollection::new();
        let mut all_entities = EntityCollection::new();
        let mut entity_owners = HashMap::new();

        for meta in &self.config.plugins {
            info!(plugin_uri = %meta.uri, "Loading plugin");
            let (plugin_uri, _) = split_query(&meta.uri);
            plugin_config_metas.add(plugin_uri, meta.clone());

            let loaded = match self.load_plugin(&loader, meta, plugin_uri, host_version.as_ref()).await {
                Ok((plugin, entities)) => all_entities.merge(&entities).map(|()| (plugin, entities)),
                Err(e) => {
                    error!(plugin_uri = %plugin_uri, "Failed loading plugin: {}", e);
                    continue;
                }
            };
            match loaded {
                Ok((plugin, entities)) => {
                    for uri in entities.uris() {
                        entity_owners.insert(uri.to_string(), plugin_uri.to_string());
                    }
                    info!(plugin_uri = %plugin_uri, entities = entities.len(), "Plugin loaded");
                    plugins.add(plugin_uri, plugin);
                }
                Err(e) => error!(plugin_uri = %plugin_uri, "Failed merging plugin entities: {}", e),
            }
        }
        info!(loaded = plugins.len(), configured = self.config.plugins.len(), "Plugins loaded");

        let page_entities = all_entities.page_entities();
        let reader = PageStructureReader::new(&page_entities, &entity_owners);
        let root_modules = reader.read_module_map(self.config.root_modules())?;
        let pages = reader.read(self.config.pages())?;

        info!(count = all_entities.data_sources().len(), "Loading data sources");
        init_data_sources(&all_entities).await;
        info!("Data sources loaded");

        Ok(CmsRendererConfig {
            plugins,
            plugin_config_metas,
            pages,
            data_adapters: all_entities.data_adapters().clone(),
            root_modules,
            entity_owners,
            settings: self.settings.clone(),
        })
    }

    /// Loads, initializes and validates one plugin.
    async fn load_plugin(
        &self,
        loader: &PluginLoader,
        meta: &PluginConfigMeta,
        plugin_uri: &str,
        host_version: Option<&Version>,
    ) -> Result<(Arc<dyn Plugin>, EntityCollection)> {
        let version = plugin_version(&meta.uri)?;
        let config = meta.config_or_default();
        let mut entities = EntityCollection::new();
        let logger = PluginLogger::new(plugin_uri);

        let plugin = match self.inline_plugins.get(plugin_uri) {
            Some(factory) => {
                debug!(plugin_uri = %plugin_uri, "Using inline plugin");
                let plugin = factory().await?;
                plugin.init(PluginInit {
                    config: &config,
                    entities: &mut entities,
                    logger,
                    public_path: None,
                })?;
                plugin
            }
            None => {
                let module = loader.load(plugin_uri, version.as_deref()).await?;
                log_manifest_check(plugin_uri, &check_manifest(module.manifest.as_ref(), host_version));
                let public_path = loader.urls().public_path(plugin_uri, version.as_deref());
                module.plugin.init(PluginInit {
                    config: &config,
                    entities: &mut entities,
                    logger,
                    public_path: Some(&public_path),
                })?;
                module.plugin
            }
        };

        self.validator.validate(plugin_uri, plugin.as_ref(), &entities)?;
        Ok((plugin, entities))
    }
}

// ================================================================
// Data sources
// ================================================================

type RootAdapterResults = HashMap<String, std::result::Result<Option<Value>, AdapterError>>;

fn is_root_adapter(adapter: &dyn DataAdapter) -> bool {
    adapter.context_type().is_root() && adapter.dependencies().is_empty()
}

/// Initializes every data source concurrently. The root adapters they
/// depend on are each loaded once, with an empty context, beforehand.
async fn init_data_sources(entities: &EntityCollection) {
    let adapters = entities.data_adapters();

    let mut needed: Vec<&str> = Vec::new();
    for source in entities.data_sources().values() {
        for dep in source.dependencies() {
            let root = adapters
                .try_get(&dep.reference)
                .is_some_and(|a| is_root_adapter(a.as_ref()));
            if root && !needed.contains(&dep.reference.as_str()) {
                needed.push(&dep.reference);
            }
        }
    }

    let loads = needed.into_iter().filter_map(|uri| {
        let adapter = Arc::clone(adapters.try_get(uri)?);
        Some(async move {
            debug!(adapter = %uri, "Loading root adapter for data sources");
            let result = adapter
                .load(&Value::Object(Map::new()), &CancellationToken::new(), &DependencyData::new())
                .await;
            (uri.to_string(), result)
        })
    });
    let root_data: RootAdapterResults = join_all(loads).await.into_iter().collect();

    let inits = entities.data_sources().entries().map(|(uri, source)| {
        let root_data = &root_data;
        async move {
            let result = match source_dependency_data(uri, source.as_ref(), adapters, root_data) {
                Ok(deps) => source.init(&deps).await.map_err(|e| PluginHostError::DataSource {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                }),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => debug!(data_source = %uri, "Data source initialized"),
                Err(e) => error!(data_source = %uri, "{}", e),
            }
        }
    });
    join_all(inits).await;
}

fn source_dependency_data(
    uri: &str,
    source: &dyn DataSource,
    adapters: &MixedCollection<Arc<dyn DataAdapter>>,
    root_data: &RootAdapterResults,
) -> Result<DependencyData> {
    let fail = |reason: String| PluginHostError::DataSource {
        uri: uri.to_string(),
        reason,
    };
    let mut deps = DependencyData::new();
    for dep in source.dependencies() {
        let value = match adapters.try_get(&dep.reference) {
            None if dep.optional => Value::Null,
            None => {
                return Err(fail(format!(
                    "depends on a non-existing data adapter ({})",
                    dep.reference
                )));
            }
            Some(adapter) if !adapter.context_type().is_root() => {
                return Err(fail(format!(
                    "depends on adapter \"{}\" with a non-root contextType",
                    dep.reference
                )));
            }
            Some(adapter) if !adapter.dependencies().is_empty() => {
                return Err(fail(format!(
                    "adapter dependency \"{}\" must be a simple adapter with no dependencies",
                    dep.reference
                )));
            }
            Some(_) => match root_data.get(&dep.reference) {
                Some(Ok(Some(data))) => data.clone(),
                _ if dep.optional => Value::Null,
                Some(Ok(None)) => {
                    return Err(fail(format!("adapter \"{}\" returned no data", dep.reference)));
                }
                Some(Err(e)) => {
                    return Err(fail(format!("adapter \"{}\" failed: {}", dep.reference, e)));
                }
                None => {
                    return Err(fail(format!("adapter \"{}\" was not loaded", dep.reference)));
                }
            },
        };
        if let Some(alias) = dep.alias.as_ref() {
            deps.insert(alias.clone(), value.clone());
        }
        deps.insert(dep.reference.clone(), value);
    }
    Ok(deps)
}
