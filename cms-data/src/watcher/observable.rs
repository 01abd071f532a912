use super::spawn_listener;
use cms_model::{DataWatcher, WatchCallback};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Fires whenever a `watch` channel's value changes.
///
/// The value current at [`watch`](DataWatcher::watch) time doesn't fire.
/// With a throttle window, changes arriving within the window after the
/// last firing are dropped.
pub struct ObservableWatcher<T> {
    values: watch::Receiver<T>,
    throttle: Option<Duration>,
    task: Option<JoinHandle<()>>,
}

impl<T> ObservableWatcher<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(values: watch::Receiver<T>) -> Self {
        Self {
            values,
            throttle: None,
            task: None,
        }
    }

    pub fn throttled(mut self, window: Duration) -> Self {
        self.throttle = (!window.is_zero()).then_some(window);
        self
    }

    pub fn is_watching(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl<T> DataWatcher for ObservableWatcher<T>
where
    T: Send + Sync + 'static,
{
    fn watch(&mut self, on_data: WatchCallback) {
        self.unwatch();
        let mut rx = self.values.clone();
        rx.mark_unchanged();
        let throttle = self.throttle;
        self.task = spawn_listener("observable", async move {
            let mut last_fired = Instant::now();
            while rx.changed().await.is_ok() {
                if let Some(window) = throttle {
                    let now = Instant::now();
                    if now.duration_since(last_fired) < window {
                        continue;
                    }
                    last_fired = now;
                }
                on_data();
            }
        });
    }

    fn unwatch(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T> Drop for ObservableWatcher<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
