//! Wiring between the page tree and data loaders.
//!
//! A loader serves one data scope: a page, the root module slots, or the
//! children of a context. Modules nested inside modules share their
//! ancestor's scope; a context starts a new one, but its own adapters are
//! loaded in the enclosing scope since `create` consumes them.

use cms_model::{AdapterConfig, AsyncDataMap, ContextDef, DataAdapter, LoadStatus, MixedCollection};
use cms_pages::{Node, NodeArena, NodeId};
use cms_types::{ModuleInstanceId, UriScheme};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// `local-adapter://{module id}/{index into the module's adapter configs}`.
pub fn local_adapter_uri(module: &ModuleInstanceId, index: usize) -> String {
    format!("{}{module}/{index}", UriScheme::LocalAdapter.prefix())
}

fn parse_local_adapter_uri(uri: &str) -> Option<(&str, usize)> {
    let rest = UriScheme::LocalAdapter.strip(uri)?;
    let (scope, index) = rest.split_once('/')?;
    if scope.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((scope, index.parse().ok()?))
}

/// Adapter URIs needed to render `children` and the modules nested in them.
///
/// Inline module adapters are registered into `adapters` under their
/// [`local_adapter_uri`]. The result is deduplicated, in first-seen order.
pub fn collect_data_adapter_types(
    arena: &NodeArena,
    children: impl IntoIterator<Item = NodeId>,
    adapters: &mut MixedCollection<Arc<dyn DataAdapter>>,
) -> Vec<String> {
    let mut out = Vec::new();
    collect(arena, children, adapters, false, &mut out);
    out
}

/// Like [`collect_data_adapter_types`], restricted to the non-optional
/// adapters of `pageCritical` nodes.
pub fn collect_page_critical_adapter_types(
    arena: &NodeArena,
    children: impl IntoIterator<Item = NodeId>,
    adapters: &mut MixedCollection<Arc<dyn DataAdapter>>,
) -> Vec<String> {
    let mut out = Vec::new();
    collect(arena, children, adapters, true, &mut out);
    out
}

fn collect(
    arena: &NodeArena,
    children: impl IntoIterator<Item = NodeId>,
    adapters: &mut MixedCollection<Arc<dyn DataAdapter>>,
    critical_only: bool,
    out: &mut Vec<String>,
) {
    for id in children {
        let Some(node) = arena.node(id) else {
            continue;
        };
        let include = !critical_only || node.page_critical();
        match node {
            Node::Context(context) => {
                if include {
                    for config in &context.def.data_adapters {
                        if critical_only && config.is_optional() {
                            continue;
                        }
                        if let Some(uri) = config.as_ref_uri() {
                            push_unique(out, uri.to_string());
                        }
                    }
                }
            }
            Node::Module(module) => {
                if include {
                    for (i, config) in module.def.data_adapters.iter().enumerate() {
                        if critical_only && config.is_optional() {
                            continue;
                        }
                        let uri = match config {
                            AdapterConfig::Ref { uri, .. } => uri.clone(),
                            AdapterConfig::Inline { def, .. } => {
                                let uri = local_adapter_uri(&module.id, i);
                                adapters.add(uri.clone(), Arc::clone(def));
                                uri
                            }
                        };
                        push_unique(out, uri);
                    }
                }
                if module.children.is_some() {
                    collect(arena, node.child_ids(), adapters, critical_only, out);
                }
            }
            Node::Page(_) => {}
        }
    }
}

fn push_unique(out: &mut Vec<String>, uri: String) {
    if !out.contains(&uri) {
        out.push(uri);
    }
}

/// The module's view of a loader's data.
///
/// Local adapters show up under their alias, and only for the module that
/// declared them; everything else keeps its adapter URI.
pub fn map_module_data(
    adapter_configs: &[AdapterConfig],
    loader_data: &AsyncDataMap,
    module: &ModuleInstanceId,
) -> AsyncDataMap {
    let scope = module.to_string();
    let mut out = HashMap::with_capacity(loader_data.len());
    for (name, data) in loader_data {
        match parse_local_adapter_uri(name) {
            Some((owner, index)) => {
                if owner != scope {
                    continue;
                }
                if let Some(AdapterConfig::Inline { alias, .. }) = adapter_configs.get(index) {
                    out.insert(alias.clone(), Arc::clone(data));
                }
            }
            None => {
                out.insert(name.clone(), Arc::clone(data));
            }
        }
    }
    out
}

/// Runs the context's `create` once its required adapters are Loaded in the
/// enclosing scope. `None` while they aren't, or when `create` declines.
/// Optional adapters are not waited on.
pub fn create_child_context(
    def: &ContextDef,
    parent_context: &Value,
    parent_data: &AsyncDataMap,
) -> Option<Value> {
    let ready = def
        .data_adapters
        .iter()
        .filter(|config| !config.is_optional())
        .filter_map(AdapterConfig::as_ref_uri)
        .all(|uri| {
            parent_data
                .get(uri)
                .is_some_and(|d| d.status() == LoadStatus::Loaded)
        });
    if !ready {
        return None;
    }
    let create = def.create.as_ref()?;
    create(parent_context, parent_data)
}
