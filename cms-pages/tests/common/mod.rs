#![allow(dead_code)]

use cms_model::{ComponentRef, ContextDef, EntityCollection, MixedCollection, ModuleDef, PageDef, PageEntity};
use std::collections::HashMap;

pub const PLUGIN: &str = "plugin://test-plugin";

/// Entities every reader test starts from, all owned by [`PLUGIN`].
pub fn fixture() -> (MixedCollection<PageEntity>, HashMap<String, String>) {
    let mut entities = EntityCollection::new();
    entities
        .add_page_def(
            "page://home",
            PageDef::new()
                .template(ComponentRef::new("HomeTemplate"))
                .canonical_url(|params| match params.get("tab") {
                    Some(tab) => format!("/home/{tab}"),
                    None => "/home".to_string(),
                }),
        )
        .unwrap();
    entities
        .add_page_def("page://about", PageDef::new().template(ComponentRef::new("About")))
        .unwrap();
    entities
        .add_module_def("module://greeting", ModuleDef::new(ComponentRef::new("Greeting")))
        .unwrap();
    entities
        .add_module_def(
            "module://layout",
            ModuleDef::new(ComponentRef::new("Layout")).slots(["side"]),
        )
        .unwrap();
    entities
        .add_context_def("context://user", ContextDef::new(|parent, _| Some(parent.clone())))
        .unwrap();

    let owners = entities
        .page_entities()
        .keys()
        .map(|uri| (uri.to_string(), PLUGIN.to_string()))
        .collect();
    (entities.page_entities(), owners)
}
