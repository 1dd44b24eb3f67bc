//! Log stream sessions: backlog first, then a live tail from "now".

use crate::backlog::{decode_backlog, render_backlog, BacklogError, DEFAULT_CHUNK_BYTES, DEFAULT_MAX_LINES};
use crate::frame::{FrameError, FrameReader};
use crate::highlight::{Highlighter, RenderedText};
use crate::runtime::{LogsOptions, RuntimeApi, RuntimeError};
use crate::EntityId;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_TAIL: &str = "1000";

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub tail: String,
    pub chunk_bytes: usize,
    pub max_lines: usize,
    pub highlighter: Highlighter,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            tail: DEFAULT_TAIL.to_string(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            max_lines: DEFAULT_MAX_LINES,
            highlighter: Highlighter::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogUpdate {
    Backlog(RenderedText),
    Append {
        rendered: RenderedText,
        scroll_to_end: bool,
    },
    Ended,
    Failed(String),
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("log stream cancelled")]
    Cancelled,
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("backlog worker failed: {0}")]
    Backlog(String),
}

impl From<BacklogError> for StreamError {
    fn from(err: BacklogError) -> Self {
        match err {
            BacklogError::Cancelled => StreamError::Cancelled,
            BacklogError::Worker(message) => StreamError::Backlog(message),
        }
    }
}

/// A running stream. Dropping it cancels the session.
pub struct StreamSession {
    entity: EntityId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamSession {
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Clone)]
pub struct LogStreamController {
    runtime: Arc<dyn RuntimeApi>,
    settings: StreamSettings,
    scroll_to_end: Arc<AtomicBool>,
}

impl LogStreamController {
    pub fn new(runtime: Arc<dyn RuntimeApi>, settings: StreamSettings, scroll_to_end: Arc<AtomicBool>) -> Self {
        Self {
            runtime,
            settings,
            scroll_to_end,
        }
    }

    pub fn open(&self, entity: EntityId) -> (StreamSession, mpsc::UnboundedReceiver<LogUpdate>) {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(
            self.runtime.clone(),
            self.settings.clone(),
            self.scroll_to_end.clone(),
            entity.clone(),
            tx,
            cancel.clone(),
        ));
        (
            StreamSession {
                entity,
                cancel,
                task,
            },
            rx,
        )
    }
}

async fn run_session(
    runtime: Arc<dyn RuntimeApi>,
    settings: StreamSettings,
    scroll_to_end: Arc<AtomicBool>,
    entity: EntityId,
    tx: mpsc::UnboundedSender<LogUpdate>,
    cancel: CancellationToken,
) {
    debug!(event = "log_stream_open", id = %entity);
    match stream_logs(runtime.as_ref(), &settings, &scroll_to_end, &entity, &tx, &cancel).await {
        Ok(()) => {
            debug!(event = "log_stream_ended", id = %entity);
            let _ = tx.send(LogUpdate::Ended);
        }
        Err(StreamError::Cancelled) => debug!(event = "log_stream_cancelled", id = %entity),
        Err(err) => {
            warn!(event = "log_stream_failed", id = %entity, error = %err);
            let _ = tx.send(LogUpdate::Failed(err.to_string()));
        }
    }
}

async fn stream_logs(
    runtime: &dyn RuntimeApi,
    settings: &StreamSettings,
    scroll_to_end: &AtomicBool,
    entity: &EntityId,
    tx: &mpsc::UnboundedSender<LogUpdate>,
    cancel: &CancellationToken,
) -> Result<(), StreamError> {
    let fetch_backlog = async {
        let mut reader = runtime
            .logs(entity.as_str(), LogsOptions::backlog(settings.tail.clone()))
            .await?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await.map_err(FrameError::from)?;
        Ok::<_, StreamError>(bytes)
    };
    let bytes = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(StreamError::Cancelled),
        fetched = fetch_backlog => fetched?,
    };
    let since = Utc::now().timestamp();

    let text = decode_backlog(&bytes)?;
    let rendered = render_backlog(
        &text,
        settings.chunk_bytes,
        settings.max_lines,
        &settings.highlighter,
        cancel,
    )
    .await?;
    if tx.send(LogUpdate::Backlog(rendered)).is_err() {
        return Err(StreamError::Cancelled);
    }

    let reader = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(StreamError::Cancelled),
        opened = runtime.logs(entity.as_str(), LogsOptions::follow_since(since)) => opened?,
    };
    let mut frames = FrameReader::new(reader);
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            next = frames.next_frame() => next?,
        };
        let Some(frame) = next else {
            return Ok(());
        };
        let rendered = settings.highlighter.render(&frame.text());
        let update = LogUpdate::Append {
            rendered,
            scroll_to_end: scroll_to_end.load(Ordering::Relaxed),
        };
        if tx.send(update).is_err() {
            return Err(StreamError::Cancelled);
        }
    }
}
