//! Entity model for the CMS plugin host.
//!
//! Defines the contract between plugins and the host:
//! - [`MixedCollection`]: URI-keyed registry with ordered iteration and merge
//! - [`AsyncData`]: tri-state (Loading / Loaded / Error) observable value
//! - [`DataAdapter`], [`DataSource`], [`DataWatcher`]: async data capabilities
//! - [`PageDef`], [`ModuleDef`], [`ContextDef`]: page-tree definitions
//! - [`EntityCollection`]: the registration API handed to each plugin
//! - [`Plugin`]: what a plugin bundle exports
//!
//! Page-tree construction, data loading and plugin loading consume these
//! types from the higher crates.

mod async_data;
mod collection;
mod context_type;
mod entity;
mod entity_collection;
mod error;
mod plugin;

pub use async_data::{AsyncData, AsyncDataMap, LoadStatus, SubscriptionId};
pub use collection::MixedCollection;
pub use context_type::ContextType;
pub use entity::{
    AdapterConfig, CanonicalUrlBuilder, ComponentRef, ContextCreate, ContextDef, ContextFactory,
    ContextOutcome, DataAdapter, DataSource, DataSourceDependency, DataWatcher, DependencyData,
    Entity, ModuleDef, PageDef, PageEntity, PagePath, RouteParams, WatchCallback,
};
pub use entity_collection::EntityCollection;
pub use error::{AdapterError, DataSourceError, ModelError, PluginError};
pub use plugin::{Plugin, PluginInit, PluginLogger, PluginManifest, TranslationLoader, TranslationMap};
