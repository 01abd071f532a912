use crate::collection::MixedCollection;
use crate::entity::{ContextDef, DataAdapter, DataSource, Entity, ModuleDef, PageDef, PageEntity};
use crate::error::ModelError;
use cms_types::UriScheme;
use std::fmt;
use std::sync::Arc;

/// All entities registered by one plugin, or the merge of several plugins.
///
/// Every `add_*` validates the URI scheme for its kind. `merge` goes through
/// the same validating path, so a bad URI surfaces even when merged.
#[derive(Clone, Default)]
pub struct EntityCollection {
    all_entities: MixedCollection<Entity>,
    data_sources: MixedCollection<Arc<dyn DataSource>>,
    data_adapters: MixedCollection<Arc<dyn DataAdapter>>,
    page_defs: MixedCollection<Arc<PageDef>>,
    module_defs: MixedCollection<Arc<ModuleDef>>,
    context_defs: MixedCollection<Arc<ContextDef>>,
}

impl EntityCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_data_source(
        &mut self,
        uri: impl Into<String>,
        data_source: Arc<dyn DataSource>,
    ) -> Result<(), ModelError> {
        let uri = uri.into();
        UriScheme::Source.ensure(&uri)?;
        self.all_entities
            .add(uri.clone(), Entity::DataSource(Arc::clone(&data_source)));
        self.data_sources.add(uri, data_source);
        Ok(())
    }

    pub fn add_data_adapter(
        &mut self,
        uri: impl Into<String>,
        data_adapter: Arc<dyn DataAdapter>,
    ) -> Result<(), ModelError> {
        let uri = uri.into();
        UriScheme::Adapter.ensure(&uri)?;
        self.all_entities
            .add(uri.clone(), Entity::DataAdapter(Arc::clone(&data_adapter)));
        self.data_adapters.add(uri, data_adapter);
        Ok(())
    }

    pub fn add_page_def(
        &mut self,
        uri: impl Into<String>,
        page_def: impl Into<Arc<PageDef>>,
    ) -> Result<(), ModelError> {
        let uri = uri.into();
        UriScheme::Page.ensure(&uri)?;
        let page_def = page_def.into();
        self.all_entities
            .add(uri.clone(), Entity::Page(Arc::clone(&page_def)));
        self.page_defs.add(uri, page_def);
        Ok(())
    }

    pub fn add_module_def(
        &mut self,
        uri: impl Into<String>,
        module_def: impl Into<Arc<ModuleDef>>,
    ) -> Result<(), ModelError> {
        let uri = uri.into();
        UriScheme::Module.ensure(&uri)?;
        let module_def = module_def.into();
        self.all_entities
            .add(uri.clone(), Entity::Module(Arc::clone(&module_def)));
        self.module_defs.add(uri, module_def);
        Ok(())
    }

    pub fn add_context_def(
        &mut self,
        uri: impl Into<String>,
        context_def: impl Into<Arc<ContextDef>>,
    ) -> Result<(), ModelError> {
        let uri = uri.into();
        UriScheme::Context.ensure(&uri)?;
        let context_def = context_def.into();
        self.all_entities
            .add(uri.clone(), Entity::Context(Arc::clone(&context_def)));
        self.context_defs.add(uri, context_def);
        Ok(())
    }

    pub fn get(&self, uri: &str) -> Result<&Entity, ModelError> {
        self.all_entities.get(uri)
    }

    pub fn has(&self, uri: &str) -> bool {
        self.all_entities.has(uri)
    }

    /// Every registered URI, in registration order.
    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.all_entities.keys()
    }

    pub fn len(&self) -> usize {
        self.all_entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_entities.is_empty()
    }

    pub fn data_sources(&self) -> &MixedCollection<Arc<dyn DataSource>> {
        &self.data_sources
    }

    pub fn data_adapters(&self) -> &MixedCollection<Arc<dyn DataAdapter>> {
        &self.data_adapters
    }

    pub fn page_defs(&self) -> &MixedCollection<Arc<PageDef>> {
        &self.page_defs
    }

    pub fn module_defs(&self) -> &MixedCollection<Arc<ModuleDef>> {
        &self.module_defs
    }

    pub fn context_defs(&self) -> &MixedCollection<Arc<ContextDef>> {
        &self.context_defs
    }

    /// Page, context and module defs; data sources and adapters excluded.
    pub fn page_entities(&self) -> MixedCollection<PageEntity> {
        let mut entities = MixedCollection::new();
        for (uri, def) in self.page_defs.entries() {
            entities.add(uri, PageEntity::Page(Arc::clone(def)));
        }
        for (uri, def) in self.context_defs.entries() {
            entities.add(uri, PageEntity::Context(Arc::clone(def)));
        }
        for (uri, def) in self.module_defs.entries() {
            entities.add(uri, PageEntity::Module(Arc::clone(def)));
        }
        entities
    }

    /// URIs of the page, context and module defs.
    pub fn page_entity_uris(&self) -> impl Iterator<Item = &str> {
        self.page_defs
            .keys()
            .chain(self.context_defs.keys())
            .chain(self.module_defs.keys())
    }

    /// Re-registers every entity of `other` into `self`; later wins.
    pub fn merge(&mut self, other: &EntityCollection) -> Result<(), ModelError> {
        for (uri, adapter) in other.data_adapters.entries() {
            self.add_data_adapter(uri, Arc::clone(adapter))?;
        }
        for (uri, source) in other.data_sources.entries() {
            self.add_data_source(uri, Arc::clone(source))?;
        }
        for (uri, def) in other.page_defs.entries() {
            self.add_page_def(uri, Arc::clone(def))?;
        }
        for (uri, def) in other.module_defs.entries() {
            self.add_module_def(uri, Arc::clone(def))?;
        }
        for (uri, def) in other.context_defs.entries() {
            self.add_context_def(uri, Arc::clone(def))?;
        }
        Ok(())
    }
}

impl fmt::Debug for EntityCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCollection")
            .field("entities", &self.all_entities.keys().collect::<Vec<_>>())
            .finish()
    }
}
