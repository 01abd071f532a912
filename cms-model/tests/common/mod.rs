#![allow(dead_code)]

use async_trait::async_trait;
use cms_model::{
    AdapterError, ContextType, DataAdapter, DataSource, DataSourceError, DependencyData,
};
use cms_types::CancellationToken;
use serde_json::Value;

pub struct StaticAdapter {
    pub context_type: ContextType,
    pub value: Value,
}

impl StaticAdapter {
    pub fn new(value: Value) -> Self {
        Self {
            context_type: ContextType::root(),
            value,
        }
    }
}

#[async_trait]
impl DataAdapter for StaticAdapter {
    fn context_type(&self) -> &ContextType {
        &self.context_type
    }

    async fn load(
        &self,
        _context: &Value,
        _cancel: &CancellationToken,
        _deps: &DependencyData,
    ) -> Result<Option<Value>, AdapterError> {
        Ok(Some(self.value.clone()))
    }
}

pub struct NoopSource;

#[async_trait]
impl DataSource for NoopSource {
    async fn init(&self, _deps: &DependencyData) -> Result<(), DataSourceError> {
        Ok(())
    }
}
