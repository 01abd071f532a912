mod common;

use cms_data::{
    DataLoader, DataLoaderOptions, EventWatcher, ObservableWatcher, collect_data_adapter_types,
    collect_page_critical_adapter_types, create_child_context, local_adapter_uri, map_module_data,
};
use cms_model::{
    AdapterConfig, AsyncData, AsyncDataMap, ComponentRef, ContextDef, DataAdapter, DataWatcher,
    EntityCollection, MixedCollection, ModuleDef, PageDef,
};
use cms_pages::{Node, PageStructureReader, PageTree};
use common::{TestAdapter, wait_for};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

fn page_tree() -> PageTree {
    let mut entities = EntityCollection::new();
    entities.add_page_def("page://home", PageDef::new()).unwrap();
    entities
        .add_module_def(
            "module://profile",
            ModuleDef::new(ComponentRef::new("Profile"))
                .adapter(AdapterConfig::reference("adapter://user"))
                .adapter(AdapterConfig::inline(
                    Arc::new(TestAdapter::returning("avatar", json!("avatar.png"))),
                    "avatar",
                )),
        )
        .unwrap();
    entities
        .add_module_def(
            "module://feed",
            ModuleDef::new(ComponentRef::new("Feed")).adapter(AdapterConfig::reference("adapter://posts")),
        )
        .unwrap();
    entities
        .add_context_def(
            "context://team",
            ContextDef::new(|parent, data| {
                let team = data.get("adapter://team")?.data()?;
                Some(json!({ "user": parent["user"], "team": team }))
            })
            .adapter(AdapterConfig::reference("adapter://team")),
        )
        .unwrap();

    let owners: HashMap<String, String> = entities
        .page_entities()
        .keys()
        .map(|uri| (uri.to_string(), "plugin://test".to_string()))
        .collect();
    let defs = entities.page_entities();
    PageStructureReader::new(&defs, &owners)
        .read(&json!([
            { "def": "page://home", "children": { "main": [
                { "def": "module://profile", "pageCritical": true, "children": {
                    "extra": [{ "def": "module://profile" }]
                } },
                { "def": "context://team", "children": [{ "def": "module://feed" }] }
            ] } }
        ]))
        .unwrap()
}

fn modules(tree: &PageTree) -> Vec<(cms_types::ModuleInstanceId, Arc<ModuleDef>)> {
    tree.iter()
        .filter_map(|(_, node)| node.as_module().map(|m| (m.id, Arc::clone(&m.def))))
        .collect()
}

// ── Adapter collection ──────────────────────────────────────────

#[test]
fn collects_page_scope_adapters() {
    let tree = page_tree();
    let page = tree.pages()[0];
    let mut adapters: MixedCollection<Arc<dyn DataAdapter>> = MixedCollection::new();

    let types = collect_data_adapter_types(tree.arena(), tree.children(page), &mut adapters);

    let profiles = modules(&tree);
    let outer = local_adapter_uri(&profiles[0].0, 1);
    let inner = local_adapter_uri(&profiles[1].0, 1);
    assert_eq!(
        types,
        vec![
            "adapter://user".to_string(),
            outer.clone(),
            inner.clone(),
            "adapter://team".to_string(),
        ]
    );
    assert!(adapters.has(&outer));
    assert!(adapters.has(&inner));
    assert!(!types.contains(&"adapter://posts".to_string()));
}

#[test]
fn collects_context_scope_separately() {
    let tree = page_tree();
    let page = tree.pages()[0];
    let context = tree
        .children(page)
        .into_iter()
        .find(|id| matches!(tree.node(*id), Some(Node::Context(_))))
        .unwrap();
    let mut adapters: MixedCollection<Arc<dyn DataAdapter>> = MixedCollection::new();

    let types = collect_data_adapter_types(tree.arena(), tree.children(context), &mut adapters);
    assert_eq!(types, vec!["adapter://posts".to_string()]);
}

#[test]
fn page_critical_collection_skips_other_nodes() {
    let tree = page_tree();
    let page = tree.pages()[0];
    let mut adapters: MixedCollection<Arc<dyn DataAdapter>> = MixedCollection::new();

    let types = collect_page_critical_adapter_types(tree.arena(), tree.children(page), &mut adapters);
    let profiles = modules(&tree);
    assert_eq!(
        types,
        vec!["adapter://user".to_string(), local_adapter_uri(&profiles[0].0, 1)]
    );
}

#[test]
fn page_critical_collection_skips_optional_adapters() {
    let mut entities = EntityCollection::new();
    entities.add_page_def("page://home", PageDef::new()).unwrap();
    entities
        .add_module_def(
            "module://profile",
            ModuleDef::new(ComponentRef::new("Profile"))
                .adapter(AdapterConfig::reference("adapter://user"))
                .adapter(AdapterConfig::reference("adapter://badges").optional())
                .adapter(
                    AdapterConfig::inline(
                        Arc::new(TestAdapter::returning("avatar", json!("avatar.png"))),
                        "avatar",
                    )
                    .optional(),
                ),
        )
        .unwrap();
    entities
        .add_context_def(
            "context://team",
            ContextDef::new(|parent, _| Some(parent.clone()))
                .adapter(AdapterConfig::reference("adapter://team"))
                .adapter(AdapterConfig::reference("adapter://stats").optional()),
        )
        .unwrap();
    let owners: HashMap<String, String> = entities
        .page_entities()
        .keys()
        .map(|uri| (uri.to_string(), "plugin://test".to_string()))
        .collect();
    let defs = entities.page_entities();
    let tree = PageStructureReader::new(&defs, &owners)
        .read(&json!([
            { "def": "page://home", "children": { "main": [
                { "def": "module://profile", "pageCritical": true },
                { "def": "context://team", "pageCritical": true, "children": [] }
            ] } }
        ]))
        .unwrap();
    let page = tree.pages()[0];

    let mut critical: MixedCollection<Arc<dyn DataAdapter>> = MixedCollection::new();
    let types = collect_page_critical_adapter_types(tree.arena(), tree.children(page), &mut critical);
    assert_eq!(types, vec!["adapter://user".to_string(), "adapter://team".to_string()]);
    assert!(critical.is_empty());

    let mut all: MixedCollection<Arc<dyn DataAdapter>> = MixedCollection::new();
    let types = collect_data_adapter_types(tree.arena(), tree.children(page), &mut all);
    let profile = modules(&tree)[0].0;
    assert_eq!(
        types,
        vec![
            "adapter://user".to_string(),
            "adapter://badges".to_string(),
            local_adapter_uri(&profile, 2),
            "adapter://team".to_string(),
            "adapter://stats".to_string(),
        ]
    );
}

// ── Module data ─────────────────────────────────────────────────

#[tokio::test]
async fn module_sees_only_its_own_local_adapters() {
    let tree = page_tree();
    let page = tree.pages()[0];
    let mut adapters: MixedCollection<Arc<dyn DataAdapter>> = MixedCollection::new();
    adapters.add("adapter://user", Arc::new(TestAdapter::returning("user", json!("ada"))));
    adapters.add("adapter://team", Arc::new(TestAdapter::returning("team", json!("core"))));

    let types = collect_data_adapter_types(tree.arena(), tree.children(page), &mut adapters);
    let loader = DataLoader::new(types, &adapters, DataLoaderOptions::default()).unwrap();
    loader.load(json!({})).unwrap().await.unwrap();

    let profiles = modules(&tree);
    let (outer_id, outer_def) = &profiles[0];
    let view = map_module_data(&outer_def.data_adapters, loader.get_data(), outer_id);

    let mut keys: Vec<_> = view.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec!["adapter://team", "adapter://user", "avatar"]);
    assert_eq!(view["avatar"].data(), Some(json!("avatar.png")));
}

#[test]
fn child_context_waits_for_its_adapters() {
    let def = ContextDef::new(|parent, data| {
        let team = data.get("adapter://team")?.data()?;
        Some(json!({ "user": parent["user"], "team": team }))
    })
    .adapter(AdapterConfig::reference("adapter://team"));

    let team = Arc::new(AsyncData::new());
    let mut data = AsyncDataMap::new();
    data.insert("adapter://team".to_string(), Arc::clone(&team));
    let parent = json!({ "user": 7 });

    assert_eq!(create_child_context(&def, &parent, &data), None);
    team.update(Some(json!("core")));
    assert_eq!(
        create_child_context(&def, &parent, &data),
        Some(json!({ "user": 7, "team": "core" }))
    );
    assert_eq!(create_child_context(&def, &parent, &AsyncDataMap::new()), None);
}

#[test]
fn child_context_does_not_wait_for_optional_adapters() {
    let def = ContextDef::new(|parent, data| {
        let stats = data.get("adapter://stats").and_then(|d| d.data());
        Some(json!({ "user": parent["user"], "stats": stats }))
    })
    .adapter(AdapterConfig::reference("adapter://team"))
    .adapter(AdapterConfig::reference("adapter://stats").optional());

    let team = Arc::new(AsyncData::new());
    let stats = Arc::new(AsyncData::new());
    let mut data = AsyncDataMap::new();
    data.insert("adapter://team".to_string(), Arc::clone(&team));
    data.insert("adapter://stats".to_string(), Arc::clone(&stats));
    let parent = json!({ "user": 7 });

    assert_eq!(create_child_context(&def, &parent, &data), None);
    team.update(Some(json!("core")));
    assert_eq!(
        create_child_context(&def, &parent, &data),
        Some(json!({ "user": 7, "stats": null }))
    );
}

// ── Watchers ────────────────────────────────────────────────────

fn counting_callback() -> (Arc<AtomicUsize>, cms_model::WatchCallback) {
    let count = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&count);
    (count, Arc::new(move || {
        hits.fetch_add(1, Ordering::SeqCst);
    }))
}

#[tokio::test]
async fn event_watcher_filters_by_predicate() {
    let (tx, _rx) = broadcast::channel::<u32>(16);
    let mut watcher = EventWatcher::new(tx.clone(), |event: &u32| *event % 2 == 0);
    let (count, callback) = counting_callback();

    watcher.watch(callback);
    tokio::task::yield_now().await;
    tx.send(1).unwrap();
    tx.send(2).unwrap();
    tx.send(4).unwrap();
    assert!(wait_for(|| count.load(Ordering::SeqCst) == 2).await);

    watcher.unwatch();
    watcher.unwatch();
    assert!(!watcher.is_watching());
    tx.send(6).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn observable_watcher_ignores_current_value() {
    let (tx, rx) = watch::channel("initial");
    let mut watcher = ObservableWatcher::new(rx);
    let (count, callback) = counting_callback();

    watcher.watch(callback);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);

    tx.send("changed").unwrap();
    assert!(wait_for(|| count.load(Ordering::SeqCst) == 1).await);
    watcher.unwatch();
}

#[tokio::test]
async fn observable_watcher_throttles() {
    let (tx, rx) = watch::channel(0u32);
    let mut watcher = ObservableWatcher::new(rx).throttled(Duration::from_millis(200));
    let (count, callback) = counting_callback();

    watcher.watch(callback);
    tokio::time::sleep(Duration::from_millis(250)).await;
    tx.send(1).unwrap();
    assert!(wait_for(|| count.load(Ordering::SeqCst) == 1).await);
    tx.send(2).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    watcher.unwatch();
}
