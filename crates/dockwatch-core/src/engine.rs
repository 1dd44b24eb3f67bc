//! Reconciliation of the runtime's container set against the table rows.
//!
//! Detail fetches fan out concurrently; every row mutation goes through the
//! shared row index lock, and table writes leave as [`TableUpdate`]s on a
//! single channel so the UI applies them in one place.

use crate::events::FeedEvent;
use crate::rows::SharedRowIndex;
use crate::snapshot::SnapshotFetcher;
use crate::runtime::RuntimeError;
use crate::{EntityId, EntityRecord};
use futures_util::{stream, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_DETAIL_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum TableUpdate {
    Upsert { row: usize, record: EntityRecord },
    Remove { row: usize, id: EntityId },
    PollFailed { message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub listed: usize,
    pub added: usize,
    pub refreshed: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Repoll,
    Remove,
    Ignore,
}

pub fn classify_action(action: &str) -> EventAction {
    match action {
        "start" | "stop" | "die" | "pause" | "unpause" => EventAction::Repoll,
        "destroy" => EventAction::Remove,
        _ => EventAction::Ignore,
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub include_all: bool,
    pub poll_interval: Duration,
    pub detail_concurrency: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            include_all: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            detail_concurrency: DEFAULT_DETAIL_CONCURRENCY,
        }
    }
}

pub struct ReconcileEngine {
    fetcher: SnapshotFetcher,
    rows: SharedRowIndex,
    updates: mpsc::UnboundedSender<TableUpdate>,
    settings: EngineSettings,
}

impl ReconcileEngine {
    pub fn new(
        fetcher: SnapshotFetcher,
        rows: SharedRowIndex,
        updates: mpsc::UnboundedSender<TableUpdate>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            fetcher,
            rows,
            updates,
            settings,
        }
    }

    pub fn rows(&self) -> &SharedRowIndex {
        &self.rows
    }

    /// One full pass: list, prune identities no longer listed, then refresh
    /// every listed identity.
    pub async fn reconcile(&self) -> Result<ReconcileReport, RuntimeError> {
        let listed = self.fetcher.list(self.settings.include_all).await?;
        let keep = listed.iter().cloned().collect::<HashSet<_>>();
        let mut report = ReconcileReport {
            listed: listed.len(),
            ..ReconcileReport::default()
        };

        let assigned = self.rows.with(|index| {
            for (row, id) in index.retain_only(&keep) {
                report.removed += 1;
                let _ = self.updates.send(TableUpdate::Remove { row, id });
            }
            listed
                .iter()
                .map(|id| {
                    let (row, added) = index.assign(id);
                    if added {
                        report.added += 1;
                    }
                    (id.clone(), row)
                })
                .collect::<Vec<_>>()
        });

        let fetcher = &self.fetcher;
        let mut details = stream::iter(assigned.into_iter().map(|(id, row)| async move {
            let result = fetcher.detail(&id).await;
            (id, row, result)
        }))
        .buffer_unordered(self.settings.detail_concurrency.max(1));

        while let Some((id, row, result)) = details.next().await {
            match result {
                Ok(mut record) => {
                    record.id = id.clone();
                    let applied = self.rows.with(|index| {
                        if index.row_of(&id) != Some(row) {
                            return false;
                        }
                        self.updates
                            .send(TableUpdate::Upsert { row, record })
                            .is_ok()
                    });
                    if applied {
                        report.refreshed += 1;
                    }
                }
                Err(err) if err.is_not_found() => {
                    debug!(event = "entity_vanished", id = %id);
                    if self.remove_identity(&id) {
                        report.removed += 1;
                    }
                }
                Err(err) => {
                    warn!(event = "detail_fetch_failed", id = %id, error = %err);
                    report.failed += 1;
                }
            }
        }

        debug!(
            event = "reconcile_pass",
            listed = report.listed,
            added = report.added,
            refreshed = report.refreshed,
            removed = report.removed,
            failed = report.failed
        );
        Ok(report)
    }

    /// Drops a tracked identity and its row. Returns false if it was not tracked.
    pub fn remove_identity(&self, id: &EntityId) -> bool {
        self.rows.with(|index| match index.remove(id) {
            Some(row) => {
                let _ = self.updates.send(TableUpdate::Remove {
                    row,
                    id: id.clone(),
                });
                true
            }
            None => false,
        })
    }

    /// Applies one feed event. Returns true when it calls for a full pass.
    pub fn handle_event(&self, event: &FeedEvent) -> bool {
        match event {
            FeedEvent::Connected => true,
            FeedEvent::Disconnected => false,
            FeedEvent::Lifecycle(lifecycle) => match classify_action(&lifecycle.action) {
                EventAction::Repoll => true,
                EventAction::Remove => {
                    self.remove_identity(&lifecycle.id);
                    false
                }
                EventAction::Ignore => false,
            },
        }
    }

    /// Polls on the interval and on relevant events until cancelled.
    /// The first pass runs immediately.
    pub async fn run(self, mut feed: mpsc::Receiver<FeedEvent>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut feed_open = true;

        loop {
            let repoll = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = feed.recv(), if feed_open => match event {
                    Some(event) => self.handle_event(&event),
                    None => {
                        debug!(event = "event_feed_closed");
                        feed_open = false;
                        false
                    }
                },
                _ = ticker.tick() => true,
            };
            if !repoll {
                continue;
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.reconcile() => outcome,
            };
            if let Err(err) = outcome {
                warn!(event = "reconcile_failed", error = %err);
                let _ = self.updates.send(TableUpdate::PollFailed {
                    message: err.to_string(),
                });
            }
        }
        debug!(event = "engine_stopped");
    }
}
