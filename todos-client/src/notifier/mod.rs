//! Remote change detection.
//!
//! Two strategies feed the dispatcher's [`EventBus`](crate::EventBus):
//! - **stream**: follow the store's change stream, one event per committed
//!   batch;
//! - **poll**: periodically fingerprint every list's watch counters and
//!   emit when another client's counter moved.
//!
//! Both run as a background task owned by a [`WatchHandle`].

mod poll;
mod stream;

pub use poll::{spawn_poll_loop, PollingWatcher};
pub use stream::spawn_stream_watch;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Owner of a background watch task.
///
/// Dropping the handle aborts the task; [`WatchHandle::shutdown`] stops it
/// cleanly and waits for it.
#[derive(Debug)]
pub struct WatchHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub(crate) fn new(stop: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            stop: Some(stop),
            task: Some(task),
        }
    }

    /// True once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
