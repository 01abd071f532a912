//! Arena-backed page tree.
//!
//! Nodes live in a flat `Vec` and refer to each other by [`NodeId`]. The
//! parent link is written once when a node is allocated; children are filled
//! in after they have been read. Trees are immutable once built.

use cms_model::{ContextDef, ModuleDef, PageDef};
use cms_types::ModuleInstanceId;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Slot name → ordered node ids.
pub type Slots = BTreeMap<String, Vec<NodeId>>;

/// Per-page mutable UI state shared between renders of the same page.
#[derive(Clone, Default)]
pub struct UiStateContainer(Arc<Mutex<Map<String, Value>>>);

impl UiStateContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.lock().insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    /// Whether two handles share the same underlying state.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for UiStateContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UiStateContainer").field(&*self.lock()).finish()
    }
}

#[derive(Debug, Clone)]
pub struct PageNode {
    pub uri: String,
    pub plugin_uri: String,
    pub def: Arc<PageDef>,
    pub ui_state: UiStateContainer,
    pub options: Option<Value>,
    pub children: Slots,
}

#[derive(Debug, Clone)]
pub struct ContextNode {
    pub uri: String,
    pub plugin_uri: String,
    pub def: Arc<ContextDef>,
    pub page_critical: bool,
    pub children: Vec<NodeId>,
    parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub uri: String,
    /// Fresh per occurrence: the same def placed twice yields two ids.
    pub id: ModuleInstanceId,
    pub plugin_uri: String,
    pub def: Arc<ModuleDef>,
    pub page_critical: bool,
    pub options: Option<Value>,
    pub children: Option<Slots>,
    parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Page(PageNode),
    Context(ContextNode),
    Module(ModuleNode),
}

impl Node {
    pub fn uri(&self) -> &str {
        match self {
            Node::Page(n) => &n.uri,
            Node::Context(n) => &n.uri,
            Node::Module(n) => &n.uri,
        }
    }

    pub fn plugin_uri(&self) -> &str {
        match self {
            Node::Page(n) => &n.plugin_uri,
            Node::Context(n) => &n.plugin_uri,
            Node::Module(n) => &n.plugin_uri,
        }
    }

    /// Pages are roots and never have a parent.
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Page(_) => None,
            Node::Context(n) => n.parent,
            Node::Module(n) => n.parent,
        }
    }

    pub fn page_critical(&self) -> bool {
        match self {
            Node::Page(_) => false,
            Node::Context(n) => n.page_critical,
            Node::Module(n) => n.page_critical,
        }
    }

    /// Children in document order (slots in key order).
    pub fn child_ids(&self) -> Vec<NodeId> {
        match self {
            Node::Page(n) => n.children.values().flatten().copied().collect(),
            Node::Context(n) => n.children.clone(),
            Node::Module(n) => n
                .children
                .iter()
                .flat_map(|slots| slots.values().flatten().copied())
                .collect(),
        }
    }

    pub fn as_page(&self) -> Option<&PageNode> {
        match self {
            Node::Page(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<&ContextNode> {
        match self {
            Node::Context(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&ModuleNode> {
        match self {
            Node::Module(n) => Some(n),
            _ => None,
        }
    }
}

/// Storage shared by [`PageTree`] and [`ModuleMap`].
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(Node::parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(Node::child_ids).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first, pre-order walk starting at each of `roots`.
    pub fn depth_first<'a>(
        &'a self,
        roots: impl IntoIterator<Item = NodeId>,
    ) -> impl Iterator<Item = (NodeId, &'a Node)> + 'a {
        let mut stack: Vec<NodeId> = roots.into_iter().collect();
        stack.reverse();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let node = self.node(id)?;
            stack.extend(node.child_ids().into_iter().rev());
            Some((id, node))
        })
    }

    pub(crate) fn alloc_page(&mut self, node: PageNode) -> NodeId {
        self.push(Node::Page(node))
    }

    pub(crate) fn alloc_context(
        &mut self,
        uri: String,
        plugin_uri: String,
        def: Arc<ContextDef>,
        page_critical: bool,
        parent: Option<NodeId>,
    ) -> NodeId {
        self.push(Node::Context(ContextNode {
            uri,
            plugin_uri,
            def,
            page_critical,
            children: Vec::new(),
            parent,
        }))
    }

    pub(crate) fn alloc_module(
        &mut self,
        uri: String,
        plugin_uri: String,
        def: Arc<ModuleDef>,
        page_critical: bool,
        options: Option<Value>,
        parent: Option<NodeId>,
    ) -> NodeId {
        self.push(Node::Module(ModuleNode {
            uri,
            id: ModuleInstanceId::new(),
            plugin_uri,
            def,
            page_critical,
            options,
            children: None,
            parent,
        }))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }
}

/// All configured pages.
#[derive(Debug, Clone, Default)]
pub struct PageTree {
    pub(crate) arena: NodeArena,
    pub(crate) pages: Vec<NodeId>,
}

impl PageTree {
    pub fn pages(&self) -> &[NodeId] {
        &self.pages
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.arena.node(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.parent(id)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.arena.children(id)
    }

    /// Number of nodes across all pages.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// First page node whose def URI is `uri`.
    pub fn find_page(&self, uri: &str) -> Option<&PageNode> {
        self.pages
            .iter()
            .filter_map(|id| self.arena.node(*id)?.as_page())
            .find(|page| page.uri == uri)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.arena.depth_first(self.pages.iter().copied())
    }
}

/// Modules rendered outside any page, keyed by slot.
#[derive(Debug, Clone, Default)]
pub struct ModuleMap {
    pub(crate) arena: NodeArena,
    pub(crate) slots: Slots,
}

impl ModuleMap {
    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> &[NodeId] {
        self.slots.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.arena.node(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.parent(id)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.arena.children(id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.arena
            .depth_first(self.slots.values().flatten().copied().collect::<Vec<_>>())
    }
}
