//! Entity contracts: what a plugin can register with the host.
//!
//! Data adapters, data sources and watchers carry behavior and are traits.
//! Page, module and context definitions are plain descriptors whose
//! function-valued parts are shared closures; the plugin validator checks
//! that the required parts are present before the host trusts them.

use crate::async_data::AsyncDataMap;
use crate::context_type::ContextType;
use crate::error::{AdapterError, DataSourceError};
use async_trait::async_trait;
use cms_types::{CancellationToken, UriScheme};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Resolved data of an adapter's dependencies, keyed by adapter URI (or alias).
pub type DependencyData = HashMap<String, Value>;

/// Route parameters extracted by the router for a page path.
pub type RouteParams = BTreeMap<String, String>;

/// Invoked by a watcher whenever the watched data changed.
pub type WatchCallback = Arc<dyn Fn() + Send + Sync>;

/// A unit producing data for a given context.
#[async_trait]
pub trait DataAdapter: Send + Sync {
    fn context_type(&self) -> &ContextType;

    /// URIs of the adapters whose data this adapter needs.
    fn dependencies(&self) -> &[String] {
        &[]
    }

    /// Fetches data. `Ok(None)` means "no data" and settles the entry in
    /// the Error state. Implementations should check `cancel` at their
    /// resumption points and return [`AdapterError::Cancelled`].
    async fn load(
        &self,
        context: &Value,
        cancel: &CancellationToken,
        deps: &DependencyData,
    ) -> Result<Option<Value>, AdapterError>;

    /// Live-invalidation watchers for the data just loaded.
    fn create_watchers(&self, context: &Value, data: Option<&Value>) -> Vec<Box<dyn DataWatcher>> {
        let _ = (context, data);
        Vec::new()
    }
}

/// A subscription that fires when the data behind an adapter changed.
pub trait DataWatcher: Send {
    fn watch(&mut self, on_data: WatchCallback);

    /// Stops watching. Must be safe to call more than once.
    fn unwatch(&mut self);
}

/// Reference from a data source to a root adapter it needs during `init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceDependency {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl DataSourceDependency {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            alias: None,
            optional: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A process-wide singleton initialized once after all plugins loaded.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn dependencies(&self) -> &[DataSourceDependency] {
        &[]
    }

    async fn init(&self, deps: &DependencyData) -> Result<(), DataSourceError>;
}

/// Opaque handle to a view component, resolved by the external renderer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentRef(String);

impl ComponentRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of turning route params into a page context.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextOutcome {
    Context(Value),
    /// Navigate elsewhere instead of rendering.
    Redirect(String),
    NotFound,
}

pub type ContextFactory = Arc<dyn Fn(&RouteParams) -> ContextOutcome + Send + Sync>;

/// Builds a child context from the parent context and the loaded adapter data.
/// `None` means the context cannot be created (yet).
pub type ContextCreate = Arc<dyn Fn(&Value, &AsyncDataMap) -> Option<Value> + Send + Sync>;

pub type CanonicalUrlBuilder = Arc<dyn Fn(&RouteParams) -> String + Send + Sync>;

/// How a page path produces its context.
#[derive(Clone)]
pub enum PagePath {
    Factory(ContextFactory),
    /// Declarative: the context is created from adapter data.
    Context(Arc<ContextDef>),
}

impl PagePath {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&RouteParams) -> ContextOutcome + Send + Sync + 'static,
    {
        PagePath::Factory(Arc::new(f))
    }
}

impl fmt::Debug for PagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagePath::Factory(_) => f.write_str("PagePath::Factory(..)"),
            PagePath::Context(def) => f.debug_tuple("PagePath::Context").field(def).finish(),
        }
    }
}

/// How a module or context obtains one of its adapters.
///
/// An `optional` adapter never holds back rendering: it is left out of the
/// page-critical set and of a context's readiness check.
#[derive(Clone)]
pub enum AdapterConfig {
    /// Pointer to a registered `adapter://` entity.
    Ref { uri: String, optional: bool },
    /// Module-local adapter, exposed to the module under `alias`.
    Inline {
        def: Arc<dyn DataAdapter>,
        alias: String,
        optional: bool,
    },
}

impl AdapterConfig {
    pub fn reference(uri: impl Into<String>) -> Self {
        AdapterConfig::Ref {
            uri: uri.into(),
            optional: false,
        }
    }

    pub fn inline(def: Arc<dyn DataAdapter>, alias: impl Into<String>) -> Self {
        AdapterConfig::Inline {
            def,
            alias: alias.into(),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        match &mut self {
            AdapterConfig::Ref { optional, .. } | AdapterConfig::Inline { optional, .. } => {
                *optional = true;
            }
        }
        self
    }

    pub fn is_optional(&self) -> bool {
        match self {
            AdapterConfig::Ref { optional, .. } | AdapterConfig::Inline { optional, .. } => *optional,
        }
    }

    pub fn as_ref_uri(&self) -> Option<&str> {
        match self {
            AdapterConfig::Ref { uri, .. } => Some(uri),
            AdapterConfig::Inline { .. } => None,
        }
    }
}

impl fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterConfig::Ref { uri, optional } => f
                .debug_struct("Ref")
                .field("uri", uri)
                .field("optional", optional)
                .finish(),
            AdapterConfig::Inline { alias, optional, .. } => f
                .debug_struct("Inline")
                .field("alias", alias)
                .field("optional", optional)
                .finish_non_exhaustive(),
        }
    }
}

/// A routable page definition.
#[derive(Clone, Default)]
pub struct PageDef {
    pub context_type: ContextType,
    pub paths: Option<BTreeMap<String, PagePath>>,
    pub page_template: Option<ComponentRef>,
    pub build_canonical_url: Option<CanonicalUrlBuilder>,
}

impl PageDef {
    pub fn new() -> Self {
        Self {
            paths: Some(BTreeMap::new()),
            ..Self::default()
        }
    }

    pub fn path(mut self, path: impl Into<String>, page_path: PagePath) -> Self {
        self.paths
            .get_or_insert_with(BTreeMap::new)
            .insert(path.into(), page_path);
        self
    }

    pub fn template(mut self, template: ComponentRef) -> Self {
        self.page_template = Some(template);
        self
    }

    pub fn canonical_url<F>(mut self, f: F) -> Self
    where
        F: Fn(&RouteParams) -> String + Send + Sync + 'static,
    {
        self.build_canonical_url = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for PageDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageDef")
            .field("context_type", &self.context_type)
            .field("paths", &self.paths)
            .field("page_template", &self.page_template)
            .finish_non_exhaustive()
    }
}

/// A renderable module definition.
#[derive(Debug, Clone, Default)]
pub struct ModuleDef {
    pub context_type: ContextType,
    pub slot_names: Option<Vec<String>>,
    pub data_adapters: Vec<AdapterConfig>,
    pub content_component: Option<ComponentRef>,
    pub help_component: Option<ComponentRef>,
    pub wrapper: Option<ComponentRef>,
}

impl ModuleDef {
    pub fn new(content_component: ComponentRef) -> Self {
        Self {
            content_component: Some(content_component),
            ..Self::default()
        }
    }

    pub fn context_type(mut self, context_type: ContextType) -> Self {
        self.context_type = context_type;
        self
    }

    pub fn adapter(mut self, config: AdapterConfig) -> Self {
        self.data_adapters.push(config);
        self
    }

    pub fn slots<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.slot_names = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// A context definition: derives a child context for its modules.
#[derive(Clone, Default)]
pub struct ContextDef {
    pub context_type: ContextType,
    pub parent_context_type: ContextType,
    pub data_adapters: Vec<AdapterConfig>,
    pub create: Option<ContextCreate>,
}

impl ContextDef {
    pub fn new<F>(create: F) -> Self
    where
        F: Fn(&Value, &AsyncDataMap) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            create: Some(Arc::new(create)),
            ..Self::default()
        }
    }

    pub fn adapter(mut self, config: AdapterConfig) -> Self {
        self.data_adapters.push(config);
        self
    }

    pub fn context_type(mut self, context_type: ContextType) -> Self {
        self.context_type = context_type;
        self
    }

    pub fn parent_context_type(mut self, context_type: ContextType) -> Self {
        self.parent_context_type = context_type;
        self
    }
}

impl fmt::Debug for ContextDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextDef")
            .field("context_type", &self.context_type)
            .field("parent_context_type", &self.parent_context_type)
            .field("data_adapters", &self.data_adapters)
            .field("has_create", &self.create.is_some())
            .finish()
    }
}

/// Any entity a plugin can register.
#[derive(Clone)]
pub enum Entity {
    DataSource(Arc<dyn DataSource>),
    DataAdapter(Arc<dyn DataAdapter>),
    Page(Arc<PageDef>),
    Module(Arc<ModuleDef>),
    Context(Arc<ContextDef>),
}

impl Entity {
    pub fn scheme(&self) -> UriScheme {
        match self {
            Entity::DataSource(_) => UriScheme::Source,
            Entity::DataAdapter(_) => UriScheme::Adapter,
            Entity::Page(_) => UriScheme::Page,
            Entity::Module(_) => UriScheme::Module,
            Entity::Context(_) => UriScheme::Context,
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.scheme().label())
    }
}

/// The subset of entities consulted by page-tree construction.
#[derive(Debug, Clone)]
pub enum PageEntity {
    Page(Arc<PageDef>),
    Module(Arc<ModuleDef>),
    Context(Arc<ContextDef>),
}

impl PageEntity {
    pub fn context_type(&self) -> &ContextType {
        match self {
            PageEntity::Page(def) => &def.context_type,
            PageEntity::Module(def) => &def.context_type,
            PageEntity::Context(def) => &def.context_type,
        }
    }

    pub fn scheme(&self) -> UriScheme {
        match self {
            PageEntity::Page(_) => UriScheme::Page,
            PageEntity::Module(_) => UriScheme::Module,
            PageEntity::Context(_) => UriScheme::Context,
        }
    }
}
