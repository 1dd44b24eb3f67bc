//! The dashboard's shared handles: runtime client, row index and UI toggles.

use crate::config::Config;
use crate::engine::{ReconcileEngine, TableUpdate};
use crate::events::spawn_subscriber;
use crate::rows::SharedRowIndex;
use crate::runtime::RuntimeApi;
use crate::snapshot::SnapshotFetcher;
use crate::stream::{LogStreamController, LogUpdate, StreamSession};
use crate::EntityId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone)]
pub struct UiToggles {
    pub scroll_to_end: Arc<AtomicBool>,
    pub show_all: bool,
}

/// A running poll loop plus its event subscription. Dropping it cancels both.
pub struct EngineHandle {
    include_all: bool,
    cancel: CancellationToken,
    engine: JoinHandle<()>,
    subscriber: JoinHandle<()>,
}

impl EngineHandle {
    pub fn include_all(&self) -> bool {
        self.include_all
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.engine.is_finished() && self.subscriber.is_finished()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct DashboardState {
    runtime: Arc<dyn RuntimeApi>,
    config: Config,
    rows: SharedRowIndex,
    toggles: UiToggles,
}

impl DashboardState {
    pub fn new(runtime: Arc<dyn RuntimeApi>, config: Config) -> Self {
        let toggles = UiToggles {
            scroll_to_end: Arc::new(AtomicBool::new(config.scroll_on_new_entry)),
            show_all: config.show_all,
        };
        Self {
            runtime,
            config,
            rows: SharedRowIndex::new(),
            toggles,
        }
    }

    pub fn runtime(&self) -> Arc<dyn RuntimeApi> {
        self.runtime.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rows(&self) -> &SharedRowIndex {
        &self.rows
    }

    pub fn show_all(&self) -> bool {
        self.toggles.show_all
    }

    pub fn set_show_all(&mut self, show_all: bool) {
        self.toggles.show_all = show_all;
    }

    pub fn scroll_to_end(&self) -> bool {
        self.toggles.scroll_to_end.load(Ordering::Relaxed)
    }

    pub fn set_scroll_to_end(&self, enabled: bool) {
        self.toggles.scroll_to_end.store(enabled, Ordering::Relaxed);
    }

    /// Starts a poll loop with a fresh row index. Updates from any earlier
    /// engine go to their own channel and never reach the new receiver.
    pub fn start_engine(&mut self) -> (EngineHandle, mpsc::UnboundedReceiver<TableUpdate>) {
        let include_all = self.toggles.show_all;
        self.rows = SharedRowIndex::new();
        let cancel = CancellationToken::new();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let (feed_rx, subscriber) = spawn_subscriber(
            self.runtime.clone(),
            self.config.subscriber_settings(),
            cancel.clone(),
        );
        let engine = ReconcileEngine::new(
            SnapshotFetcher::new(self.runtime.clone()),
            self.rows.clone(),
            updates_tx,
            self.config.engine_settings(include_all),
        );
        let engine = tokio::spawn(engine.run(feed_rx, cancel.clone()));
        info!(event = "engine_started", include_all);

        (
            EngineHandle {
                include_all,
                cancel,
                engine,
                subscriber,
            },
            updates_rx,
        )
    }

    pub fn stream_controller(&self) -> LogStreamController {
        LogStreamController::new(
            self.runtime.clone(),
            self.config.stream_settings(),
            self.toggles.scroll_to_end.clone(),
        )
    }

    pub fn open_stream(&self, id: EntityId) -> (StreamSession, mpsc::UnboundedReceiver<LogUpdate>) {
        self.stream_controller().open(id)
    }
}
