//! Host-side settings read from `cms-host.toml`.

use cms_data::DataLoaderOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Knobs that belong to the host rather than to the CMS config document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Checked against plugin manifests' `cmsVersion` ranges.
    pub host_version: String,
    /// How long a bundle may take to invoke its callback once it ran.
    pub plugin_load_timeout_ms: u64,
    /// Used when a plugin doesn't ship the requested locale.
    pub default_locale: String,
    /// Delay before a top-level fetch visually resets its entry.
    pub reset_delay_ms: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            host_version: env!("CARGO_PKG_VERSION").to_string(),
            plugin_load_timeout_ms: 5000,
            default_locale: "en-US".to_string(),
            reset_delay_ms: 16,
        }
    }
}

impl HostSettings {
    pub const FILE_NAME: &'static str = "cms-host.toml";

    /// Loads `cms-host.toml` from `dir`.
    pub fn load(dir: &Path) -> Self {
        Self::load_from(dir.join(Self::FILE_NAME))
    }

    /// Loads settings from an explicit path.
    /// Falls back to defaults when the file is missing or unreadable.
    pub fn load_from(path: PathBuf) -> Self {
        if !path.exists() {
            info!("No host settings found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(settings) => {
                    info!("Loaded host settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!(
                        "Failed to parse host settings {:?}: {}. Falling back to defaults.",
                        path, e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!(
                    "Failed to read host settings {:?}: {}. Falling back to defaults.",
                    path, e
                );
                Self::default()
            }
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn plugin_load_timeout(&self) -> Duration {
        Duration::from_millis(self.plugin_load_timeout_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    /// Loader options for a page (`reset_on_fetch`) or any other scope.
    pub fn loader_options(&self, reset_on_fetch: bool) -> DataLoaderOptions {
        DataLoaderOptions {
            reset_on_fetch,
            reset_delay: self.reset_delay(),
        }
    }
}
