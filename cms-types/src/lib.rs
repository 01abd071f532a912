//! Core type definitions for the CMS plugin host.
//!
//! This crate defines the plugin-agnostic primitives shared by every layer:
//! - Entity URI schemes (`source://`, `adapter://`, `page://`, ...)
//! - Module instance identifiers (UUID v4)
//! - Cooperative cancellation tokens threaded through every fetch
//!
//! Rendering concerns and plugin contracts live in higher crates.

mod cancellation;
mod ids;
mod uri;

pub use cancellation::{CancellationToken, OperationCancelled};
pub use ids::ModuleInstanceId;
pub use uri::{UriScheme, split_query};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid {} URI \"{uri}\"", expected.label())]
    InvalidUri { expected: UriScheme, uri: String },

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
