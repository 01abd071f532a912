//! Entity URI schemes.
//!
//! Every entity a plugin registers is keyed by a scheme-prefixed URI. The
//! scheme decides which registry the entity belongs to.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The scheme prefix of an entity URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UriScheme {
    Source,
    Adapter,
    Page,
    Module,
    Context,
    Plugin,
    InlinePlugin,
    /// Host-internal: inline module adapters, `local-adapter://{moduleId}/{index}`.
    LocalAdapter,
}

impl UriScheme {
    const ALL: [UriScheme; 8] = [
        UriScheme::Source,
        UriScheme::Adapter,
        UriScheme::Page,
        UriScheme::Module,
        UriScheme::Context,
        UriScheme::Plugin,
        UriScheme::InlinePlugin,
        UriScheme::LocalAdapter,
    ];

    /// The literal prefix including `://`.
    pub const fn prefix(self) -> &'static str {
        match self {
            UriScheme::Source => "source://",
            UriScheme::Adapter => "adapter://",
            UriScheme::Page => "page://",
            UriScheme::Module => "module://",
            UriScheme::Context => "context://",
            UriScheme::Plugin => "plugin://",
            UriScheme::InlinePlugin => "inline-plugin://",
            UriScheme::LocalAdapter => "local-adapter://",
        }
    }

    /// Human-readable entity kind, used in error messages.
    pub const fn label(self) -> &'static str {
        match self {
            UriScheme::Source => "data source",
            UriScheme::Adapter => "data adapter",
            UriScheme::Page => "page def",
            UriScheme::Module => "module def",
            UriScheme::Context => "context def",
            UriScheme::Plugin => "plugin",
            UriScheme::InlinePlugin => "inline plugin",
            UriScheme::LocalAdapter => "local adapter",
        }
    }

    /// Detects the scheme of a URI, if it carries a known one.
    pub fn of(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.matches(uri))
    }

    pub fn matches(self, uri: &str) -> bool {
        uri.starts_with(self.prefix())
    }

    /// Fails with [`Error::InvalidUri`] unless `uri` carries this scheme.
    pub fn ensure(self, uri: &str) -> Result<(), Error> {
        if self.matches(uri) {
            Ok(())
        } else {
            Err(Error::InvalidUri {
                expected: self,
                uri: uri.to_string(),
            })
        }
    }

    /// The part of `uri` after the scheme prefix.
    pub fn strip<'a>(self, uri: &'a str) -> Option<&'a str> {
        uri.strip_prefix(self.prefix())
    }
}

impl fmt::Display for UriScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Splits `plugin://a/b?v=1.0.0` into `("plugin://a/b", Some("v=1.0.0"))`.
pub fn split_query(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (uri, None),
    }
}
