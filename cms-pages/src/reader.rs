use crate::config::{PageConfigChildren, PageConfigNode};
use crate::error::PageStructureError;
use crate::tree::{ModuleMap, Node, NodeArena, NodeId, PageNode, PageTree, Slots, UiStateContainer};
use crate::validator::PageStructureValidator;
use cms_model::{MixedCollection, PageEntity};
use cms_types::UriScheme;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error};

/// Resolves a validated page configuration against the registered entities.
///
/// `owners` attributes every entity URI to the plugin that registered the
/// winning definition.
pub struct PageStructureReader<'a> {
    defs: &'a MixedCollection<PageEntity>,
    owners: &'a HashMap<String, String>,
    validator: PageStructureValidator,
}

impl<'a> PageStructureReader<'a> {
    pub fn new(defs: &'a MixedCollection<PageEntity>, owners: &'a HashMap<String, String>) -> Self {
        Self {
            defs,
            owners,
            validator: PageStructureValidator::new(),
        }
    }

    pub fn read(&self, pages: &Value) -> Result<PageTree, PageStructureError> {
        self.validator.validate(pages)?;
        let nodes: Vec<PageConfigNode> = serde_json::from_value(pages.clone())?;

        let mut arena = NodeArena::default();
        let mut roots = Vec::with_capacity(nodes.len());
        for node in &nodes {
            if let Some(id) = self.read_node(&mut arena, node, None)? {
                roots.push(id);
            }
        }
        debug!(pages = roots.len(), nodes = arena.len(), "Page tree built");
        Ok(PageTree {
            arena,
            pages: roots,
        })
    }

    pub fn read_module_map(&self, root_modules: &Value) -> Result<ModuleMap, PageStructureError> {
        self.validator.validate_module_map(root_modules)?;
        let slots: BTreeMap<String, Vec<PageConfigNode>> =
            serde_json::from_value(root_modules.clone())?;

        let mut arena = NodeArena::default();
        let slots = self.read_slots(&mut arena, &slots, None)?;
        Ok(ModuleMap { arena, slots })
    }

    fn read_node(
        &self,
        arena: &mut NodeArena,
        node: &PageConfigNode,
        parent: Option<NodeId>,
    ) -> Result<Option<NodeId>, PageStructureError> {
        let Some(entity) = self.defs.try_get(&node.def) else {
            error!(def = %node.def, "Couldn't find definition for node, skipping");
            return Ok(None);
        };
        let Some(plugin_uri) = self.owners.get(&node.def).cloned() else {
            error!(def = %node.def, "Definition has no owner plugin, skipping");
            return Ok(None);
        };
        let page_critical = node.page_critical.unwrap_or(false);

        let id = match (UriScheme::of(&node.def), entity) {
            (Some(UriScheme::Page), PageEntity::Page(def)) => {
                let id = arena.alloc_page(PageNode {
                    uri: node.def.clone(),
                    plugin_uri,
                    def: Arc::clone(def),
                    ui_state: UiStateContainer::new(),
                    options: node.options.clone(),
                    children: Slots::new(),
                });
                let children = match &node.children {
                    Some(PageConfigChildren::Slots(slots)) => {
                        self.read_slots(arena, slots, Some(id))?
                    }
                    _ => Slots::new(),
                };
                if let Some(Node::Page(page)) = arena.node_mut(id) {
                    page.children = children;
                }
                id
            }
            (Some(UriScheme::Context), PageEntity::Context(def)) => {
                let id = arena.alloc_context(
                    node.def.clone(),
                    plugin_uri,
                    Arc::clone(def),
                    page_critical,
                    parent,
                );
                let children = match &node.children {
                    Some(PageConfigChildren::List(list)) => self.read_list(arena, list, Some(id))?,
                    _ => Vec::new(),
                };
                if let Some(Node::Context(context)) = arena.node_mut(id) {
                    context.children = children;
                }
                id
            }
            (Some(UriScheme::Module), PageEntity::Module(def)) => {
                let id = arena.alloc_module(
                    node.def.clone(),
                    plugin_uri,
                    Arc::clone(def),
                    page_critical,
                    node.options.clone(),
                    parent,
                );
                let children = match &node.children {
                    Some(PageConfigChildren::Slots(slots)) => {
                        Some(self.read_slots(arena, slots, Some(id))?)
                    }
                    _ => None,
                };
                if let Some(Node::Module(module)) = arena.node_mut(id) {
                    module.children = children;
                }
                id
            }
            _ => return Err(PageStructureError::UnknownNodeType(node.def.clone())),
        };
        Ok(Some(id))
    }

    fn read_slots(
        &self,
        arena: &mut NodeArena,
        slots: &BTreeMap<String, Vec<PageConfigNode>>,
        parent: Option<NodeId>,
    ) -> Result<Slots, PageStructureError> {
        let mut out = Slots::new();
        for (slot, nodes) in slots {
            out.insert(slot.clone(), self.read_list(arena, nodes, parent)?);
        }
        Ok(out)
    }

    fn read_list(
        &self,
        arena: &mut NodeArena,
        nodes: &[PageConfigNode],
        parent: Option<NodeId>,
    ) -> Result<Vec<NodeId>, PageStructureError> {
        let mut ids = Vec::with_capacity(nodes.len());
        for node in nodes {
            if let Some(id) = self.read_node(arena, node, parent)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}
