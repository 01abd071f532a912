//! Tri-state observable value holding the result of one adapter fetch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Load state of an [`AsyncData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Loaded,
    Error,
}

/// Handle returned by [`AsyncData::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(LoadStatus, Option<&T>) + Send + Sync>;

struct Inner<T> {
    data: Option<T>,
    status: LoadStatus,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
    next_id: u64,
}

/// A value that is Loading, Loaded (with data) or Error (without data).
///
/// The only transitions are [`update`](Self::update) and
/// [`reset`](Self::reset). Listeners run synchronously after each
/// transition, outside the internal lock.
pub struct AsyncData<T> {
    inner: Mutex<Inner<T>>,
    status_tx: watch::Sender<LoadStatus>,
}

/// Adapter URI → shared async data, as exposed by a data loader.
pub type AsyncDataMap = HashMap<String, Arc<AsyncData<serde_json::Value>>>;

impl<T: Clone> AsyncData<T> {
    /// Creates an entry in the Loading state.
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(LoadStatus::Loading);
        Self {
            inner: Mutex::new(Inner {
                data: None,
                status: LoadStatus::Loading,
                listeners: Vec::new(),
                next_id: 0,
            }),
            status_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loaded if `data` is `Some`, Error otherwise.
    pub fn update(&self, data: Option<T>) {
        let status = if data.is_some() {
            LoadStatus::Loaded
        } else {
            LoadStatus::Error
        };
        self.transition(status, data);
    }

    /// Back to Loading, dropping any data.
    pub fn reset(&self) {
        self.transition(LoadStatus::Loading, None);
    }

    fn transition(&self, status: LoadStatus, data: Option<T>) {
        let listeners: Vec<Listener<T>> = {
            let mut inner = self.lock();
            inner.status = status;
            inner.data = data.clone();
            inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        self.status_tx.send_replace(status);
        for listener in listeners {
            listener(status, data.as_ref());
        }
    }

    pub fn status(&self) -> LoadStatus {
        self.lock().status
    }

    pub fn is_loading(&self) -> bool {
        self.status() == LoadStatus::Loading
    }

    pub fn is_loaded(&self) -> bool {
        self.status() == LoadStatus::Loaded
    }

    pub fn is_error(&self) -> bool {
        self.status() == LoadStatus::Error
    }

    /// The current value; `Some` only while Loaded.
    pub fn data(&self) -> Option<T> {
        self.lock().data.clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(LoadStatus, Option<&T>) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(sid, _)| *sid != id);
        inner.listeners.len() != before
    }

    /// A receiver that is marked changed on every transition.
    pub fn watch(&self) -> watch::Receiver<LoadStatus> {
        self.status_tx.subscribe()
    }

    /// Waits until the value leaves Loading and returns the settled status.
    pub async fn settled(&self) -> LoadStatus {
        let mut rx = self.watch();
        loop {
            let status = *rx.borrow_and_update();
            if status != LoadStatus::Loading {
                return status;
            }
            if rx.changed().await.is_err() {
                return self.status();
            }
        }
    }
}

impl<T: Clone> Default for AsyncData<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for AsyncData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("AsyncData")
            .field("status", &inner.status)
            .field("data", &inner.data)
            .finish()
    }
}
