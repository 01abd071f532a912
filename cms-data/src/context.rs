use crate::loader::DataLoader;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Binds a loader to the lifetime of one rendered scope.
///
/// `mount` loads, `update` reloads only when the context value actually
/// changed, and `unmount` disposes the loader.
pub struct DataContext {
    loader: Arc<DataLoader>,
    context: Option<Value>,
}

impl DataContext {
    pub fn new(loader: Arc<DataLoader>) -> Self {
        Self {
            loader,
            context: None,
        }
    }

    pub fn loader(&self) -> &Arc<DataLoader> {
        &self.loader
    }

    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    pub fn mount(&mut self, context: Value) -> Option<JoinHandle<()>> {
        self.context = Some(context.clone());
        self.loader.load(context)
    }

    pub fn update(&mut self, context: Value) -> Option<JoinHandle<()>> {
        if self.context.as_ref() == Some(&context) {
            return None;
        }
        self.mount(context)
    }

    pub fn unmount(self) {
        self.loader.dispose();
    }
}
