//! Data loading for pages and modules.
//!
//! A [`DataLoader`] owns one [`AsyncData`](cms_model::AsyncData) per adapter
//! in a dependency graph and fetches them in dependency order. Watchers
//! returned by adapters refresh individual entries; refreshes cascade to
//! direct dependents.

mod binding;
mod cache;
mod context;
mod error;
mod loader;
pub mod watcher;

pub use binding::{
    collect_data_adapter_types, collect_page_critical_adapter_types, create_child_context,
    local_adapter_uri, map_module_data,
};
pub use cache::DataLoaderCache;
pub use context::DataContext;
pub use error::{DataLoaderError, Result};
pub use loader::{DEFAULT_RESET_DELAY, DataLoader, DataLoaderOptions};
pub use watcher::{EventWatcher, ObservableWatcher};
