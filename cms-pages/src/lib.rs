//! Page-tree validation and construction.
//!
//! A configuration document describes pages, their slotted modules and the
//! contexts scoping them. [`PageStructureValidator`] checks the raw JSON
//! shape; [`PageStructureReader`] resolves every node against the entities
//! registered by plugins and builds an arena-backed tree where each node
//! knows its owning plugin and its parent.

mod config;
mod error;
mod reader;
mod tree;
mod url_resolver;
mod validator;

pub use config::{PageConfigChildren, PageConfigNode};
pub use error::{PageStructureError, Violation};
pub use reader::PageStructureReader;
pub use tree::{
    ContextNode, ModuleMap, ModuleNode, Node, NodeArena, NodeId, PageNode, PageTree, Slots,
    UiStateContainer,
};
pub use url_resolver::InternalUrlResolver;
pub use validator::PageStructureValidator;
