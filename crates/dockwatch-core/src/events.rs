//! Container lifecycle event subscription.

use crate::runtime::{RuntimeApi, RuntimeEvent};
use crate::EntityId;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub id: EntityId,
    pub action: String,
}

impl LifecycleEvent {
    /// Keeps container events only. Actions such as `exec_start: sh -c ...`
    /// are cut at the colon.
    pub fn from_runtime(event: &RuntimeEvent) -> Option<Self> {
        if !event.kind.is_empty() && event.kind != "container" {
            return None;
        }
        let id = event.entity_id()?;
        let action = event.action.split(':').next().unwrap_or("").trim();
        if action.is_empty() {
            return None;
        }
        Some(Self {
            id: EntityId::new(id),
            action: action.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Connected,
    Lifecycle(LifecycleEvent),
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct SubscriberSettings {
    pub capacity: usize,
    pub reconnect: bool,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            reconnect: true,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
        }
    }
}

pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    let next = current + current;
    if next > max {
        max
    } else {
        next
    }
}

/// Starts the subscription task. The receiver closes when the task exits:
/// on cancellation, or on the first transport failure when reconnecting is off.
pub fn spawn_subscriber(
    runtime: Arc<dyn RuntimeApi>,
    settings: SubscriberSettings,
    cancel: CancellationToken,
) -> (mpsc::Receiver<FeedEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(settings.capacity.max(1));
    let handle = tokio::spawn(subscriber_loop(runtime, settings, tx, cancel));
    (rx, handle)
}

async fn subscriber_loop(
    runtime: Arc<dyn RuntimeApi>,
    settings: SubscriberSettings,
    tx: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
) {
    let mut backoff = settings.initial_backoff;

    loop {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            opened = runtime.events() => opened,
        };

        match opened {
            Ok(mut feed) => {
                info!(event = "events_connected");
                if tx.send(FeedEvent::Connected).await.is_err() {
                    return;
                }
                backoff = settings.initial_backoff;

                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        next = feed.next() => next,
                    };
                    match next {
                        Some(Ok(event)) => {
                            let Some(lifecycle) = LifecycleEvent::from_runtime(&event) else {
                                continue;
                            };
                            debug!(event = "lifecycle_event", id = %lifecycle.id, action = %lifecycle.action);
                            if tx.send(FeedEvent::Lifecycle(lifecycle)).await.is_err() {
                                return;
                            }
                        }
                        Some(Err(err)) => {
                            warn!(event = "events_stream_error", error = %err);
                            break;
                        }
                        None => {
                            debug!(event = "events_stream_ended");
                            break;
                        }
                    }
                }

                if !settings.reconnect {
                    return;
                }
                if tx.send(FeedEvent::Disconnected).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                warn!(event = "events_connect_error", error = %err);
                if !settings.reconnect {
                    return;
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = next_backoff(backoff, settings.max_backoff);
    }
}
