//! Dependency-ordered adapter fetching.
//!
//! Each adapter in the graph owns one `AsyncData`. `load` walks the graph in
//! dependency order; every fetch is spawned on the runtime and carries its
//! own cancellation token plus a generation number, so a newer request for
//! the same adapter always wins over an older one.

use crate::error::{DataLoaderError, Result};
use cms_model::{
    AdapterError, AsyncData, AsyncDataMap, DataAdapter, DataWatcher, DependencyData, LoadStatus,
    MixedCollection, WatchCallback,
};
use cms_types::CancellationToken;
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// One frame at 60 Hz.
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy)]
pub struct DataLoaderOptions {
    /// Put entries back into Loading when a top-level fetch takes longer
    /// than `reset_delay`.
    pub reset_on_fetch: bool,
    pub reset_delay: Duration,
}

impl Default for DataLoaderOptions {
    fn default() -> Self {
        Self {
            reset_on_fetch: false,
            reset_delay: DEFAULT_RESET_DELAY,
        }
    }
}

/// Loads a set of adapters, and everything they depend on, for one context.
pub struct DataLoader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    adapters: HashMap<String, Arc<dyn DataAdapter>>,
    /// Adapter → its dependencies, in discovery order.
    deps: Vec<(String, Vec<String>)>,
    /// Dependencies before dependents.
    order: Vec<String>,
    data: AsyncDataMap,
    options: DataLoaderOptions,
    state: Mutex<LoaderState>,
    /// Serializes "is this fetch still current?" with the write to `AsyncData`.
    commit: Mutex<()>,
}

#[derive(Default)]
struct LoaderState {
    context: Option<Arc<Value>>,
    runtime: Option<Handle>,
    run: Option<CancellationToken>,
    in_flight: HashMap<String, InFlight>,
    generations: HashMap<String, u64>,
    watchers: HashMap<String, Vec<Box<dyn DataWatcher>>>,
    disposed: bool,
}

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

type NodeFuture = Shared<BoxFuture<'static, ()>>;

impl DataLoader {
    /// Builds the dependency graph reachable from `adapter_types`.
    ///
    /// Adapters referenced but missing from `adapters` stay in the graph and
    /// settle as Error when fetched. A dependency cycle is rejected.
    pub fn new<I, S>(
        adapter_types: I,
        adapters: &MixedCollection<Arc<dyn DataAdapter>>,
        options: DataLoaderOptions,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let deps = build_deps_map(adapter_types, adapters);
        let order = topological_order(&deps)?;

        let resolved = deps
            .iter()
            .filter_map(|(uri, _)| {
                adapters
                    .try_get(uri)
                    .map(|adapter| (uri.clone(), Arc::clone(adapter)))
            })
            .collect();
        let data = deps
            .iter()
            .map(|(uri, _)| (uri.clone(), Arc::new(AsyncData::new())))
            .collect();

        Ok(Self {
            inner: Arc::new(LoaderInner {
                adapters: resolved,
                deps,
                order,
                data,
                options,
                state: Mutex::new(LoaderState::default()),
                commit: Mutex::new(()),
            }),
        })
    }

    /// Stores `context` and fetches the whole graph in dependency order.
    ///
    /// Must be called from within a tokio runtime. The returned handle
    /// completes once every fetch of this run settled; dropping it doesn't
    /// stop the run. A later `load` supersedes this one.
    pub fn load(&self, context: Value) -> Option<JoinHandle<()>> {
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                error!("DataLoader::load called outside of a tokio runtime");
                return None;
            }
        };
        let run = {
            let mut state = self.inner.lock_state();
            if state.disposed {
                warn!("DataLoader::load called after dispose");
                return None;
            }
            state.context = Some(Arc::new(context));
            state.runtime = Some(runtime.clone());
            if let Some(previous) = state.run.take() {
                previous.cancel();
            }
            let run = CancellationToken::new();
            state.run = Some(run.clone());
            run
        };
        debug!(adapters = self.inner.order.len(), "Loading data graph");
        let inner = Arc::clone(&self.inner);
        Some(runtime.spawn(async move { inner.run_graph(run).await }))
    }

    /// Cancels in-flight fetches and tears down watchers. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock_state().disposed
    }

    pub fn get_data(&self) -> &AsyncDataMap {
        &self.inner.data
    }

    pub fn data(&self, uri: &str) -> Option<Arc<AsyncData<Value>>> {
        self.inner.data.get(uri).cloned()
    }

    /// Every adapter in the graph, dependencies included, in discovery order.
    pub fn adapter_types(&self) -> impl Iterator<Item = &str> {
        self.inner.deps.iter().map(|(uri, _)| uri.as_str())
    }

    /// True once no entry is Loading.
    pub fn is_settled(&self) -> bool {
        self.inner
            .data
            .values()
            .all(|data| data.status() != LoadStatus::Loading)
    }

    /// Waits until every entry left Loading.
    pub async fn settled(&self) {
        for data in self.inner.data.values() {
            data.settled().await;
        }
    }

    /// Number of active watchers, across all adapters.
    pub fn watcher_count(&self) -> usize {
        self.inner.lock_state().watchers.values().map(Vec::len).sum()
    }
}

impl fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLoader")
            .field("order", &self.inner.order)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl LoaderInner {
    fn lock_state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_context(&self) -> Option<Arc<Value>> {
        self.lock_state().context.clone()
    }

    fn dependencies_of(&self, uri: &str) -> &[String] {
        self.deps
            .iter()
            .find(|(u, _)| u == uri)
            .map(|(_, deps)| deps.as_slice())
            .unwrap_or(&[])
    }

    async fn run_graph(self: Arc<Self>, run: CancellationToken) {
        let mut nodes: HashMap<&str, NodeFuture> = HashMap::with_capacity(self.order.len());
        for uri in &self.order {
            let deps: Vec<NodeFuture> = self
                .dependencies_of(uri)
                .iter()
                .filter_map(|dep| nodes.get(dep.as_str()).cloned())
                .collect();
            let inner = Arc::clone(&self);
            let run = run.clone();
            let uri_owned = uri.clone();
            let node = async move {
                join_all(deps).await;
                if run.is_cancelled() {
                    return;
                }
                inner.destroy_watchers(&uri_owned);
                let Some(context) = inner.current_context() else {
                    return;
                };
                if let Some(task) = inner.update_data(&uri_owned, context, false) {
                    if let Err(e) = task.await {
                        error!(adapter = %uri_owned, error = %e, "Fetch task failed");
                    }
                }
            }
            .boxed()
            .shared();
            nodes.insert(uri.as_str(), node);
        }
        join_all(nodes.into_values()).await;
    }

    /// Supersedes any in-flight fetch for `uri` and spawns a new one.
    fn update_data(
        self: &Arc<Self>,
        uri: &str,
        context: Arc<Value>,
        is_watcher_refresh: bool,
    ) -> Option<JoinHandle<()>> {
        let (runtime, generation, cancel) = {
            let mut state = self.lock_state();
            if state.disposed {
                return None;
            }
            let runtime = state.runtime.clone()?;
            if let Some(previous) = state.in_flight.remove(uri) {
                debug!(adapter = %uri, generation = previous.generation, "Superseding fetch");
                previous.cancel.cancel();
            }
            let generation = state.generations.entry(uri.to_string()).or_insert(0);
            *generation += 1;
            let generation = *generation;
            let cancel = CancellationToken::new();
            state.in_flight.insert(
                uri.to_string(),
                InFlight {
                    generation,
                    cancel: cancel.clone(),
                },
            );
            (runtime, generation, cancel)
        };

        let inner = Arc::clone(self);
        let uri = uri.to_string();
        Some(runtime.spawn(async move {
            inner
                .fetch_data(uri, context, is_watcher_refresh, cancel, generation)
                .await
        }))
    }

    async fn fetch_data(
        self: Arc<Self>,
        uri: String,
        context: Arc<Value>,
        is_watcher_refresh: bool,
        cancel: CancellationToken,
        generation: u64,
    ) {
        let Some(async_data) = self.data.get(&uri).cloned() else {
            return;
        };

        let reset = (self.options.reset_on_fetch && !is_watcher_refresh).then(|| {
            let async_data = Arc::clone(&async_data);
            let cancel = cancel.clone();
            let delay = self.options.reset_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if !cancel.is_cancelled() {
                    async_data.reset();
                }
            })
        });

        let outcome = self.fetch(&uri, &context, &cancel).await;
        if let Some(reset) = reset {
            reset.abort();
        }

        let data = match outcome {
            Ok(data) => data,
            Err(AdapterError::Cancelled) => {
                debug!(adapter = %uri, generation, "Fetch cancelled");
                return;
            }
            Err(e) => {
                error!(adapter = %uri, context = %context, error = %e, "Couldn't fetch data from adapter");
                None
            }
        };

        {
            let _commit = self.commit.lock().unwrap_or_else(PoisonError::into_inner);
            if cancel.is_cancelled() || !self.finish(&uri, generation) {
                debug!(adapter = %uri, generation, "Discarding superseded result");
                return;
            }
            async_data.update(data.clone());
        }

        self.setup_watchers(&uri, &context, data.as_ref());

        if is_watcher_refresh {
            self.refresh_dependents(&uri, &context);
        }
    }

    /// Drops the in-flight record if it still belongs to `generation`.
    fn finish(&self, uri: &str, generation: u64) -> bool {
        let mut state = self.lock_state();
        if state.disposed {
            return false;
        }
        match state.in_flight.get(uri) {
            Some(current) if current.generation == generation => {
                state.in_flight.remove(uri);
                true
            }
            _ => false,
        }
    }

    async fn fetch(
        &self,
        uri: &str,
        context: &Value,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<Value>, AdapterError> {
        let Some(adapter) = self.adapters.get(uri) else {
            return Err(AdapterError::failed(format!(
                "data adapter \"{uri}\" is not exposed by any plugin"
            )));
        };
        let Some(deps) = self.dependency_data(adapter.as_ref())? else {
            debug!(adapter = %uri, "A dependency has no data, skipping load");
            return Ok(None);
        };
        cancel.check()?;
        adapter.load(context, cancel, &deps).await
    }

    /// `Ok(None)` when a dependency settled without data.
    fn dependency_data(
        &self,
        adapter: &dyn DataAdapter,
    ) -> std::result::Result<Option<DependencyData>, AdapterError> {
        let mut deps = DependencyData::new();
        for dep in adapter.dependencies() {
            let Some(data) = self.data.get(dep) else {
                return Ok(None);
            };
            match data.status() {
                LoadStatus::Loading => {
                    return Err(AdapterError::failed(format!(
                        "adapter dependency \"{dep}\" should have been loaded by now"
                    )));
                }
                LoadStatus::Error => return Ok(None),
                LoadStatus::Loaded => match data.data() {
                    Some(value) => {
                        deps.insert(dep.clone(), value);
                    }
                    None => return Ok(None),
                },
            }
        }
        Ok(Some(deps))
    }

    fn setup_watchers(self: &Arc<Self>, uri: &str, context: &Value, data: Option<&Value>) {
        self.destroy_watchers(uri);
        let Some(adapter) = self.adapters.get(uri) else {
            return;
        };
        let mut watchers = adapter.create_watchers(context, data);
        if watchers.is_empty() {
            return;
        }
        let callback = self.refresh_callback(uri);
        for watcher in &mut watchers {
            watcher.watch(Arc::clone(&callback));
        }
        self.install_watchers(uri, watchers);
    }

    /// Two fetches of one adapter may both pass `destroy_watchers` before
    /// either installs, so whatever set is replaced here gets unwatched.
    fn install_watchers(&self, uri: &str, mut watchers: Vec<Box<dyn DataWatcher>>) {
        let mut state = self.lock_state();
        if state.disposed {
            drop(state);
            for watcher in &mut watchers {
                watcher.unwatch();
            }
            return;
        }
        debug!(adapter = %uri, count = watchers.len(), "Watchers installed");
        let replaced = state.watchers.insert(uri.to_string(), watchers);
        drop(state);
        for mut watcher in replaced.into_iter().flatten() {
            watcher.unwatch();
        }
    }

    fn destroy_watchers(&self, uri: &str) {
        let watchers = self.lock_state().watchers.remove(uri);
        for mut watcher in watchers.into_iter().flatten() {
            watcher.unwatch();
        }
    }

    fn refresh_callback(self: &Arc<Self>, uri: &str) -> WatchCallback {
        let inner = Arc::downgrade(self);
        let uri = uri.to_string();
        Arc::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.refresh(&uri);
            }
        })
    }

    fn refresh(self: &Arc<Self>, uri: &str) {
        let Some(context) = self.current_context() else {
            return;
        };
        debug!(adapter = %uri, "Watcher refresh");
        drop(self.update_data(uri, context, true));
    }

    /// Only direct dependents; they cascade further once they settle.
    fn refresh_dependents(self: &Arc<Self>, uri: &str, context: &Arc<Value>) {
        for (dependent, deps) in &self.deps {
            if deps.iter().any(|d| d == uri) {
                drop(self.update_data(dependent, Arc::clone(context), true));
            }
        }
    }

    fn dispose(&self) {
        let (run, in_flight, watchers) = {
            let mut state = self.lock_state();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (
                state.run.take(),
                std::mem::take(&mut state.in_flight),
                std::mem::take(&mut state.watchers),
            )
        };
        if let Some(run) = run {
            run.cancel();
        }
        for fetch in in_flight.into_values() {
            fetch.cancel.cancel();
        }
        for mut watcher in watchers.into_values().flatten() {
            watcher.unwatch();
        }
        debug!("DataLoader disposed");
    }
}

/// Breadth-first walk from the requested adapters through their dependencies.
fn build_deps_map<I, S>(
    adapter_types: I,
    adapters: &MixedCollection<Arc<dyn DataAdapter>>,
) -> Vec<(String, Vec<String>)>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut queue: VecDeque<String> = adapter_types.into_iter().map(Into::into).collect();
    let mut seen = HashSet::new();
    let mut deps = Vec::new();
    while let Some(uri) = queue.pop_front() {
        if !seen.insert(uri.clone()) {
            continue;
        }
        let dependencies = match adapters.try_get(&uri) {
            Some(adapter) => adapter.dependencies().to_vec(),
            None => {
                warn!(adapter = %uri, "Data adapter is not exposed by any plugin");
                Vec::new()
            }
        };
        queue.extend(dependencies.iter().cloned());
        deps.push((uri, dependencies));
    }
    deps
}

/// Kahn's algorithm, stable with respect to discovery order.
fn topological_order(deps: &[(String, Vec<String>)]) -> Result<Vec<String>> {
    let mut remaining: Vec<(&str, HashSet<&str>)> = deps
        .iter()
        .map(|(uri, d)| (uri.as_str(), d.iter().map(String::as_str).collect()))
        .collect();
    let mut order = Vec::with_capacity(deps.len());
    loop {
        let ready: Vec<&str> = remaining
            .iter()
            .filter(|(_, pending)| pending.is_empty())
            .map(|(uri, _)| *uri)
            .collect();
        if ready.is_empty() {
            break;
        }
        remaining.retain(|(_, pending)| !pending.is_empty());
        for (_, pending) in &mut remaining {
            for uri in &ready {
                pending.remove(uri);
            }
        }
        order.extend(ready.into_iter().map(str::to_string));
    }
    if remaining.is_empty() {
        Ok(order)
    } else {
        Err(DataLoaderError::DependencyCycle(
            remaining.into_iter().map(|(uri, _)| uri.to_string()).collect(),
        ))
    }
}
