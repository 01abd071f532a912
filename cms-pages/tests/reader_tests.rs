mod common;

use cms_pages::{InternalUrlResolver, Node, PageStructureError, PageStructureReader};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;

// ── Page tree ───────────────────────────────────────────────────

#[test]
fn builds_page_with_module() {
    let (defs, owners) = common::fixture();
    let reader = PageStructureReader::new(&defs, &owners);
    let tree = reader
        .read(&json!([
            { "def": "page://home", "children": { "main": [{ "def": "module://greeting" }] } }
        ]))
        .unwrap();

    assert_eq!(tree.pages().len(), 1);
    let page_id = tree.pages()[0];
    let page = tree.node(page_id).and_then(Node::as_page).unwrap();
    assert_eq!(page.uri, "page://home");
    assert_eq!(page.plugin_uri, common::PLUGIN);

    let module_id = page.children["main"][0];
    let module = tree.node(module_id).and_then(Node::as_module).unwrap();
    assert_eq!(module.uri, "module://greeting");
    assert_eq!(module.plugin_uri, common::PLUGIN);
    assert_eq!(tree.parent(module_id), Some(page_id));
    assert_eq!(tree.parent(page_id), None);
}

#[test]
fn rejects_page_critical_on_page() {
    let (defs, owners) = common::fixture();
    let err = PageStructureReader::new(&defs, &owners)
        .read(&json!([{ "def": "page://home", "pageCritical": true, "children": {} }]))
        .unwrap_err();
    assert!(matches!(err, PageStructureError::Invalid(_)));
    assert_eq!(err.violations()[0].path, "pages[0]");
}

#[test]
fn unresolved_defs_are_dropped() {
    let (defs, owners) = common::fixture();
    let tree = PageStructureReader::new(&defs, &owners)
        .read(&json!([
            { "def": "page://missing", "children": {} },
            { "def": "page://home", "children": { "main": [
                { "def": "module://missing" },
                { "def": "module://greeting" }
            ] } }
        ]))
        .unwrap();

    assert_eq!(tree.pages().len(), 1);
    let page = tree.node(tree.pages()[0]).and_then(Node::as_page).unwrap();
    assert_eq!(page.children["main"].len(), 1);
    assert_eq!(tree.len(), 2);
}

#[test]
fn contexts_scope_their_modules() {
    let (defs, owners) = common::fixture();
    let tree = PageStructureReader::new(&defs, &owners)
        .read(&json!([
            { "def": "page://home", "children": { "main": [
                { "def": "context://user", "pageCritical": true, "children": [
                    { "def": "module://greeting", "options": { "bold": true } }
                ] }
            ] } }
        ]))
        .unwrap();

    let page_id = tree.pages()[0];
    let context_id = tree.children(page_id)[0];
    let context = tree.node(context_id).and_then(Node::as_context).unwrap();
    assert!(context.page_critical);
    assert_eq!(tree.parent(context_id), Some(page_id));

    let module_id = context.children[0];
    let module = tree.node(module_id).and_then(Node::as_module).unwrap();
    assert_eq!(module.options, Some(json!({ "bold": true })));
    assert_eq!(tree.parent(module_id), Some(context_id));
}

#[test]
fn same_module_twice_gets_distinct_ids() {
    let (defs, owners) = common::fixture();
    let tree = PageStructureReader::new(&defs, &owners)
        .read(&json!([
            { "def": "page://home", "children": { "main": [
                { "def": "module://greeting" },
                { "def": "module://greeting" }
            ] } }
        ]))
        .unwrap();

    let ids: Vec<_> = tree
        .iter()
        .filter_map(|(_, node)| node.as_module().map(|m| m.id))
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn pages_get_independent_ui_state() {
    let (defs, owners) = common::fixture();
    let tree = PageStructureReader::new(&defs, &owners)
        .read(&json!([
            { "def": "page://home", "children": {} },
            { "def": "page://home", "children": {} }
        ]))
        .unwrap();

    let first = tree.node(tree.pages()[0]).and_then(Node::as_page).unwrap();
    let second = tree.node(tree.pages()[1]).and_then(Node::as_page).unwrap();
    first.ui_state.set("scroll", json!(120));
    assert!(!first.ui_state.ptr_eq(&second.ui_state));
    assert_eq!(second.ui_state.get("scroll"), None);
}

#[test]
fn depth_first_order() {
    let (defs, owners) = common::fixture();
    let tree = PageStructureReader::new(&defs, &owners)
        .read(&json!([
            { "def": "page://home", "children": { "main": [
                { "def": "module://layout", "children": {
                    "side": [{ "def": "module://greeting" }]
                } },
                { "def": "context://user" }
            ] } },
            { "def": "page://about", "children": {} }
        ]))
        .unwrap();

    let uris: Vec<&str> = tree.iter().map(|(_, node)| node.uri()).collect();
    assert_eq!(
        uris,
        vec![
            "page://home",
            "module://layout",
            "module://greeting",
            "context://user",
            "page://about"
        ]
    );
}

// ── Root modules ────────────────────────────────────────────────

#[test]
fn reads_module_map() {
    let (defs, owners) = common::fixture();
    let map = PageStructureReader::new(&defs, &owners)
        .read_module_map(&json!({
            "header": [{ "def": "module://greeting" }],
            "footer": []
        }))
        .unwrap();

    assert_eq!(map.slot("header").len(), 1);
    assert!(map.slot("footer").is_empty());
    assert!(map.slot("unknown").is_empty());
    assert_eq!(map.parent(map.slot("header")[0]), None);
}

// ── Internal URLs ───────────────────────────────────────────────

#[test]
fn resolves_internal_urls() {
    let (defs, owners) = common::fixture();
    let tree = PageStructureReader::new(&defs, &owners)
        .read(&json!([
            { "def": "page://home", "children": {} },
            { "def": "page://about", "children": {} }
        ]))
        .unwrap();
    let resolver = InternalUrlResolver::new(&tree);

    assert_eq!(resolver.resolve("page://home").unwrap().as_deref(), Some("/home"));
    assert_eq!(
        resolver.resolve("page://home?tab=news#top").unwrap().as_deref(),
        Some("/home/news#top")
    );
    assert_eq!(resolver.resolve("page://about").unwrap(), None);
    assert_eq!(resolver.resolve("page://nowhere").unwrap(), None);
    assert!(matches!(
        resolver.resolve("module://greeting"),
        Err(PageStructureError::NotAPageUri(_))
    ));
}

// ── Properties ──────────────────────────────────────────────────

fn arb_child() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(json!({ "def": "module://greeting" })),
        Just(json!({ "def": "module://missing" })),
        Just(json!({ "def": "context://user" })),
        Just(json!({ "def": "context://missing" })),
    ]
}

fn arb_pages() -> impl Strategy<Value = Vec<serde_json::Value>> {
    let page = (
        prop_oneof![Just("page://home"), Just("page://about"), Just("page://missing")],
        prop::collection::vec(arb_child(), 0..6),
    )
        .prop_map(|(def, children)| json!({ "def": def, "children": { "main": children } }));
    prop::collection::vec(page, 0..5)
}

fn count_nodes(pages: &[serde_json::Value]) -> usize {
    pages
        .iter()
        .map(|p| 1 + p["children"]["main"].as_array().map_or(0, Vec::len))
        .sum()
}

proptest! {
    #[test]
    fn reader_never_invents_nodes(pages in arb_pages()) {
        let (defs, owners) = common::fixture();
        let input = count_nodes(&pages);
        let tree = PageStructureReader::new(&defs, &owners)
            .read(&serde_json::Value::Array(pages))
            .unwrap();
        prop_assert!(tree.len() <= input);
    }

    #[test]
    fn module_ids_are_unique(pages in arb_pages()) {
        let (defs, owners) = common::fixture();
        let tree = PageStructureReader::new(&defs, &owners)
            .read(&serde_json::Value::Array(pages))
            .unwrap();
        let ids: Vec<_> = tree.iter().filter_map(|(_, n)| n.as_module().map(|m| m.id)).collect();
        let unique: HashSet<_> = ids.iter().collect();
        prop_assert_eq!(ids.len(), unique.len());
    }
}
