use super::spawn_listener;
use cms_model::{DataWatcher, WatchCallback};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Fires on every broadcast event accepted by `predicate`.
pub struct EventWatcher<T> {
    events: broadcast::Sender<T>,
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    task: Option<JoinHandle<()>>,
}

impl<T> EventWatcher<T>
where
    T: Clone + Send + 'static,
{
    pub fn new<P>(events: broadcast::Sender<T>, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            events,
            predicate: Arc::new(predicate),
            task: None,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl<T> DataWatcher for EventWatcher<T>
where
    T: Clone + Send + 'static,
{
    fn watch(&mut self, on_data: WatchCallback) {
        self.unwatch();
        let mut rx = self.events.subscribe();
        let predicate = Arc::clone(&self.predicate);
        self.task = spawn_listener("event", async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if predicate(&event) {
                            on_data();
                        }
                    }
                    // Missed events might have matched.
                    Err(RecvError::Lagged(_)) => on_data(),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    fn unwatch(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T> Drop for EventWatcher<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
