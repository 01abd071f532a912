//! Named modules a plugin bundle may `require` from the host.

use crate::error::{PluginHostError, Result};
use crate::settings::HostSettings;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::runtime::Handle;

pub const HOST_MODULE: &str = "plugin-api/host";
pub const RUNTIME_MODULE: &str = "plugin-api/runtime";

/// Facts about the host exposed under [`HOST_MODULE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub version: String,
    pub default_locale: String,
}

type Module = Arc<dyn Any + Send + Sync>;

/// Synthetic module registry shared by every bundle of one bootstrap.
#[derive(Default)]
pub struct PluginApiRuntime {
    modules: RwLock<HashMap<String, Module>>,
}

impl PluginApiRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the host info and, inside a runtime, its handle.
    pub fn with_defaults(settings: &HostSettings) -> Self {
        let runtime = Self::new();
        runtime.provide(
            HOST_MODULE,
            HostInfo {
                version: settings.host_version.clone(),
                default_locale: settings.default_locale.clone(),
            },
        );
        if let Ok(handle) = Handle::try_current() {
            runtime.provide(RUNTIME_MODULE, handle);
        }
        runtime
    }

    /// Registers (or replaces) the module `name`.
    pub fn provide<T: Any + Send + Sync>(&self, name: impl Into<String>, module: T) {
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(module));
    }

    pub fn has(&self, name: &str) -> bool {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn require<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let module = self
            .modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| PluginHostError::ModuleNotProvided(name.to_string()))?;
        module
            .downcast::<T>()
            .map_err(|_| PluginHostError::ModuleTypeMismatch(name.to_string()))
    }
}

impl fmt::Debug for PluginApiRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = modules.keys().collect();
        names.sort();
        f.debug_struct("PluginApiRuntime")
            .field("modules", &names)
            .finish()
    }
}
