//! Change-stream detection.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::oneshot;
use todos_types::{ChangeEvent, Notification};

use super::WatchHandle;
use crate::error::DispatchError;
use crate::events::EventBus;
use crate::store::KvStore;

/// Follow the store's change stream under `prefix` from now on.
///
/// Each committed batch containing a synced change publishes one remote
/// change. Batches made only by this device are skipped; the dispatcher
/// already announced them. A stream error is published as
/// [`Notification::WatchError`] and ends the watch.
pub async fn spawn_stream_watch<S>(
    store: Arc<S>,
    bus: Arc<EventBus>,
    prefix: String,
) -> Result<WatchHandle, DispatchError>
where
    S: KvStore + ?Sized + 'static,
{
    let from = store.resume_marker().await?;
    let mut changes = store.watch(&prefix, from).await?;

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        tracing::info!(prefix = %prefix, "Stream watch started");
        loop {
            let next = tokio::select! {
                _ = &mut stop_rx => break,
                next = changes.next() => next,
            };
            match next {
                Some(Ok(batch)) if batch.from_sync() => {
                    tracing::debug!(
                        changes = batch.changes.len(),
                        marker = batch.resume_marker.0,
                        "Synced batch observed"
                    );
                    bus.publish(&Notification::Change(ChangeEvent::remote()));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Watch stream failed");
                    bus.publish(&Notification::WatchError(e.to_string()));
                    break;
                }
                None => break,
            }
        }
        tracing::info!("Stream watch stopped");
    });
    Ok(WatchHandle::new(stop_tx, task))
}
