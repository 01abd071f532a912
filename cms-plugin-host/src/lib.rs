//! Plugin host for the CMS.
//!
//! Loads the plugins listed in a [`CmsConfig`], validates what they
//! register, merges their entities, builds the page tree and initializes
//! data sources. The result is a [`CmsRendererConfig`] handed to the
//! renderer.
//!
//! # Architecture
//!
//! - [`PluginManager`]: bootstrap orchestration, one plugin at a time
//! - [`PluginLoader`]: bundle URL, callback handshake and timeout
//! - [`PluginValidator`]: structural checks on everything a plugin registered
//! - [`PluginApiRuntime`]: named modules bundles may `require`
//! - [`PluginTranslationStore`]: per-plugin translations with locale fallback

mod config;
mod error;
mod loader;
mod manager;
mod runtime;
mod settings;
mod translation;
mod url_builder;
mod validator;

pub use config::{CmsConfig, PluginConfigMeta};
pub use error::{BundleError, PluginHostError, Result};
pub use loader::{
    BundleFn, BundleRunner, BundleScope, CallbackRegistry, PluginExports, PluginLoader,
    PluginModule, StaticBundleRunner,
};
pub use manager::{CmsRendererConfig, InlinePlugins, PluginManager};
pub use runtime::{HOST_MODULE, HostInfo, PluginApiRuntime, RUNTIME_MODULE};
pub use settings::HostSettings;
pub use translation::{PluginTranslationStore, Translation};
pub use url_builder::{PluginUrlBuilder, callback_id};
pub use validator::PluginValidator;
