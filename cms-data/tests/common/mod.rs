#![allow(dead_code)]

use async_trait::async_trait;
use cms_data::ObservableWatcher;
use cms_model::{AdapterError, ContextType, DataAdapter, DataWatcher, DependencyData};
use cms_types::CancellationToken;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Shared log of adapter names in the order their `load` ran.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Returns `value`, or the result of `derive` applied to the dependency data.
pub struct TestAdapter {
    name: String,
    context_type: ContextType,
    deps: Vec<String>,
    value: Option<Value>,
    derive: Option<Box<dyn Fn(&DependencyData) -> Value + Send + Sync>>,
    fail: bool,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    log: Option<CallLog>,
}

impl TestAdapter {
    pub fn returning(name: &str, value: Value) -> Self {
        Self {
            name: name.to_string(),
            context_type: ContextType::root(),
            deps: Vec::new(),
            value: Some(value),
            derive: None,
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
            log: None,
        }
    }

    pub fn no_data(name: &str) -> Self {
        Self {
            value: None,
            ..Self::returning(name, Value::Null)
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::returning(name, Value::Null)
        }
    }

    pub fn deriving<F>(name: &str, deps: &[&str], derive: F) -> Self
    where
        F: Fn(&DependencyData) -> Value + Send + Sync + 'static,
    {
        Self {
            deps: deps.iter().map(|d| d.to_string()).collect(),
            derive: Some(Box::new(derive)),
            ..Self::returning(name, Value::Null)
        }
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.deps = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn delayed(mut self, ms: u64) -> Self {
        self.delay = Some(Duration::from_millis(ms));
        self
    }

    pub fn logged(mut self, log: &CallLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataAdapter for TestAdapter {
    fn context_type(&self) -> &ContextType {
        &self.context_type
    }

    fn dependencies(&self) -> &[String] {
        &self.deps
    }

    async fn load(
        &self,
        _context: &Value,
        _cancel: &CancellationToken,
        deps: &DependencyData,
    ) -> Result<Option<Value>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().unwrap().push(self.name.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AdapterError::failed(format!("{} is down", self.name)));
        }
        match &self.derive {
            Some(derive) => Ok(Some(derive(deps))),
            None => Ok(self.value.clone()),
        }
    }
}

/// Echoes `context.v` after `context.delay_ms`.
pub struct EchoAdapter {
    context_type: ContextType,
    honor_cancel: bool,
    pub calls: AtomicUsize,
}

impl EchoAdapter {
    pub fn new(honor_cancel: bool) -> Self {
        Self {
            context_type: ContextType::root(),
            honor_cancel,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DataAdapter for EchoAdapter {
    fn context_type(&self) -> &ContextType {
        &self.context_type
    }

    async fn load(
        &self,
        context: &Value,
        cancel: &CancellationToken,
        _deps: &DependencyData,
    ) -> Result<Option<Value>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = Duration::from_millis(context["delay_ms"].as_u64().unwrap_or(0));
        if self.honor_cancel {
            cancel.run_until_cancelled(tokio::time::sleep(delay)).await?;
        } else {
            tokio::time::sleep(delay).await;
        }
        Ok(Some(context["v"].clone()))
    }
}

/// Reads the current value of a watch channel and watches it for changes.
pub struct ChannelAdapter {
    context_type: ContextType,
    values: watch::Receiver<u64>,
    pub calls: AtomicUsize,
}

impl ChannelAdapter {
    pub fn new(values: watch::Receiver<u64>) -> Self {
        Self {
            context_type: ContextType::root(),
            values,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DataAdapter for ChannelAdapter {
    fn context_type(&self) -> &ContextType {
        &self.context_type
    }

    async fn load(
        &self,
        _context: &Value,
        _cancel: &CancellationToken,
        _deps: &DependencyData,
    ) -> Result<Option<Value>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(json!(*self.values.borrow())))
    }

    fn create_watchers(&self, _context: &Value, _data: Option<&Value>) -> Vec<Box<dyn DataWatcher>> {
        vec![Box::new(ObservableWatcher::new(self.values.clone()))]
    }
}

/// Polls `condition` until it holds or two seconds elapsed.
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Routes log output through the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_test_writer()
        .compact()
        .try_init();
}
