//! Ready-made [`DataWatcher`](cms_model::DataWatcher) implementations.

mod event;
mod observable;

pub use event::EventWatcher;
pub use observable::ObservableWatcher;

use std::future::Future;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

fn spawn_listener<F>(kind: &str, task: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle.spawn(task)),
        Err(_) => {
            warn!(watcher = kind, "No tokio runtime, watcher stays inactive");
            None
        }
    }
}
