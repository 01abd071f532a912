//! Structural checks on a plugin and everything it registered.
//!
//! The trait system already guarantees that every entity carries its
//! behavior; what remains are the optional parts a def must still provide
//! and the shape of its descriptors.

use crate::error::{PluginHostError, Result};
use cms_model::{
    AdapterConfig, ContextDef, ContextType, DataAdapter, DataSource, EntityCollection, ModuleDef,
    PageDef, PagePath, Plugin,
};
use cms_types::UriScheme;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default)]
pub struct PluginValidator;

impl PluginValidator {
    pub fn new() -> Self {
        Self
    }

    /// Checks the plugin object, then each of its entities.
    pub fn validate(&self, plugin_uri: &str, plugin: &dyn Plugin, entities: &EntityCollection) -> Result<()> {
        self.validate_plugin(plugin_uri, plugin)?;
        self.validate_entities(entities)
    }

    pub fn validate_plugin(&self, plugin_uri: &str, plugin: &dyn Plugin) -> Result<()> {
        let Some(locales) = plugin.available_locales() else {
            return Ok(());
        };
        if plugin.translations().is_none() {
            return Err(PluginHostError::InvalidPlugin(format!(
                "\"{plugin_uri}\" declares available locales but no translation loader"
            )));
        }
        if let Some(i) = locales.iter().position(|l| l.trim().is_empty()) {
            return Err(PluginHostError::InvalidPlugin(format!(
                "\"{plugin_uri}\" available locale [{i}] is empty"
            )));
        }
        Ok(())
    }

    pub fn validate_entities(&self, entities: &EntityCollection) -> Result<()> {
        for (uri, adapter) in entities.data_adapters().entries() {
            validate_data_adapter(uri, adapter.as_ref())?;
        }
        for (uri, source) in entities.data_sources().entries() {
            validate_data_source(uri, source.as_ref())?;
        }
        for (uri, def) in entities.page_defs().entries() {
            validate_page_def(uri, def)?;
        }
        for (uri, def) in entities.module_defs().entries() {
            validate_module_def(uri, def)?;
        }
        for (uri, def) in entities.context_defs().entries() {
            validate_context_def(uri, def)?;
        }
        Ok(())
    }
}

fn invalid(scheme: UriScheme, uri: &str, reason: impl Into<String>) -> PluginHostError {
    PluginHostError::InvalidEntity {
        kind: scheme.label(),
        uri: uri.to_string(),
        reason: reason.into(),
    }
}

fn check_context_type(scheme: UriScheme, uri: &str, field: &str, context_type: &ContextType) -> Result<()> {
    match context_type.invalid_fields().next() {
        None => Ok(()),
        Some(key) => Err(invalid(
            scheme,
            uri,
            format!("{field}.{key} must be a string or a number"),
        )),
    }
}

fn validate_data_adapter(uri: &str, adapter: &dyn DataAdapter) -> Result<()> {
    check_context_type(UriScheme::Adapter, uri, "contextType", adapter.context_type())?;
    if let Some(i) = adapter
        .dependencies()
        .iter()
        .position(|dep| !UriScheme::Adapter.matches(dep))
    {
        return Err(invalid(
            UriScheme::Adapter,
            uri,
            format!("dependencies[{i}] must be an adapter:// URI"),
        ));
    }
    Ok(())
}

fn validate_data_source(uri: &str, source: &dyn DataSource) -> Result<()> {
    for (i, dep) in source.dependencies().iter().enumerate() {
        if !UriScheme::Adapter.matches(&dep.reference) {
            return Err(invalid(
                UriScheme::Source,
                uri,
                format!("dependencies[{i}].ref must be an adapter:// URI"),
            ));
        }
        if dep.alias.as_deref().is_some_and(str::is_empty) {
            return Err(invalid(
                UriScheme::Source,
                uri,
                format!("dependencies[{i}].alias must not be empty"),
            ));
        }
    }
    Ok(())
}

fn validate_page_def(uri: &str, def: &PageDef) -> Result<()> {
    let Some(paths) = def.paths.as_ref() else {
        return Err(invalid(UriScheme::Page, uri, "paths is missing"));
    };
    for (path, page_path) in paths {
        if let PagePath::Context(context) = page_path {
            check_context_def(UriScheme::Page, uri, &format!("paths[{path}]."), context)?;
        }
    }
    if def.page_template.is_none() {
        return Err(invalid(UriScheme::Page, uri, "getPageTemplate is missing"));
    }
    check_context_type(UriScheme::Page, uri, "contextType", &def.context_type)
}

fn validate_module_def(uri: &str, def: &ModuleDef) -> Result<()> {
    let scheme = UriScheme::Module;
    check_context_type(scheme, uri, "contextType", &def.context_type)?;

    if let Some(slot_names) = def.slot_names.as_ref() {
        let mut seen = HashSet::with_capacity(slot_names.len());
        for (i, name) in slot_names.iter().enumerate() {
            if name.is_empty() {
                return Err(invalid(scheme, uri, format!("slotNames[{i}] must not be empty")));
            }
            if !seen.insert(name.as_str()) {
                return Err(invalid(scheme, uri, format!("slotNames[{i}] \"{name}\" is a duplicate")));
            }
        }
    }

    for (i, config) in def.data_adapters.iter().enumerate() {
        match config {
            AdapterConfig::Ref { uri: reference, .. } => {
                if !UriScheme::Adapter.matches(reference) {
                    return Err(invalid(
                        scheme,
                        uri,
                        format!("dataAdapters[{i}].ref must be an adapter:// URI"),
                    ));
                }
            }
            AdapterConfig::Inline { def, alias, .. } => {
                if alias.is_empty() {
                    return Err(invalid(scheme, uri, format!("dataAdapters[{i}].alias must not be empty")));
                }
                check_context_type(
                    scheme,
                    uri,
                    &format!("dataAdapters[{i}].def.contextType"),
                    def.context_type(),
                )?;
            }
        }
    }

    if def.content_component.is_none() {
        return Err(invalid(scheme, uri, "getContentComponent is missing"));
    }
    Ok(())
}

fn validate_context_def(uri: &str, def: &ContextDef) -> Result<()> {
    check_context_def(UriScheme::Context, uri, "", def)
}

/// Shared by registered context defs and declarative page paths; `prefix`
/// locates the def inside its owner.
fn check_context_def(scheme: UriScheme, uri: &str, prefix: &str, def: &ContextDef) -> Result<()> {
    check_context_type(scheme, uri, &format!("{prefix}contextType"), &def.context_type)?;
    check_context_type(
        scheme,
        uri,
        &format!("{prefix}parentContextType"),
        &def.parent_context_type,
    )?;
    for (i, config) in def.data_adapters.iter().enumerate() {
        match config.as_ref_uri() {
            Some(reference) if UriScheme::Adapter.matches(reference) => {}
            Some(_) => {
                return Err(invalid(
                    scheme,
                    uri,
                    format!("{prefix}dataAdapters[{i}].ref must be an adapter:// URI"),
                ));
            }
            None => {
                return Err(invalid(
                    scheme,
                    uri,
                    format!("{prefix}dataAdapters[{i}] must be a {{ref}} config"),
                ));
            }
        }
    }
    if def.create.is_none() {
        return Err(invalid(scheme, uri, format!("{prefix}create is missing")));
    }
    Ok(())
}
