#![allow(dead_code)]

use async_trait::async_trait;
use dockwatch_core::frame::{encode_frame, LogFrame, StreamTag};
use dockwatch_core::runtime::{
    ContainerSummary, EventActor, EventFeed, LogReader, LogsOptions, RuntimeApi, RuntimeError,
    RuntimeEvent, StatsSnapshot,
};
use futures_util::{stream, StreamExt};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub memory_bytes: u64,
}

impl FakeContainer {
    pub fn new(id: &str, name: &str, state: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            image: format!("{name}:latest"),
            state: state.to_string(),
            memory_bytes: 1_048_576,
        }
    }
}

#[derive(Default)]
pub struct FakeState {
    pub containers: Vec<FakeContainer>,
    pub backlog: HashMap<String, Vec<u8>>,
    pub live: HashMap<String, Vec<u8>>,
    pub keep_live_open: bool,
    pub live_writers: Vec<DuplexStream>,
    pub vanish_on_inspect: HashSet<String>,
    pub failing_details: HashSet<String>,
    pub list_error: Option<RuntimeError>,
    pub list_calls: usize,
    pub log_requests: Vec<(String, LogsOptions)>,
    pub commands: Vec<(String, String)>,
    pub event_senders: Vec<mpsc::UnboundedSender<Result<RuntimeEvent, RuntimeError>>>,
    pub events_opened: usize,
    pub detail_delay: Option<Duration>,
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new(containers: Vec<FakeContainer>) -> Arc<Self> {
        let runtime = Self::default();
        runtime.state().containers = containers;
        Arc::new(runtime)
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_backlog(&self, id: &str, frames: &[(StreamTag, &str)]) {
        self.state().backlog.insert(id.to_string(), wire(frames));
    }

    pub fn set_live(&self, id: &str, frames: &[(StreamTag, &str)]) {
        self.state().live.insert(id.to_string(), wire(frames));
    }

    pub fn remove(&self, id: &str) {
        self.state().containers.retain(|container| container.id != id);
    }

    pub fn set_state(&self, id: &str, state: &str) {
        for container in self.state().containers.iter_mut() {
            if container.id == id {
                container.state = state.to_string();
            }
        }
    }

    /// Pushes an event to every open subscription.
    pub fn emit(&self, action: &str, id: &str) {
        let event = RuntimeEvent {
            kind: "container".to_string(),
            action: action.to_string(),
            actor: EventActor {
                id: id.to_string(),
                attributes: HashMap::new(),
            },
            id: Some(id.to_string()),
            time: 0,
        };
        self.state()
            .event_senders
            .retain(|sender| sender.send(Ok(event.clone())).is_ok());
    }

    /// Breaks every open subscription with a transport error.
    pub fn break_events(&self) {
        let senders = std::mem::take(&mut self.state().event_senders);
        for sender in senders {
            let _ = sender.send(Err(RuntimeError::Transport("connection reset".to_string())));
        }
    }

    fn find(&self, id: &str) -> Result<FakeContainer, RuntimeError> {
        self.state()
            .containers
            .iter()
            .find(|container| container.id == id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(format!("No such container: {id}")))
    }

    fn command(&self, id: &str, name: &str) -> Result<(), RuntimeError> {
        self.find(id)?;
        self.state().commands.push((id.to_string(), name.to_string()));
        Ok(())
    }
}

pub fn wire(frames: &[(StreamTag, &str)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (tag, text) in frames {
        let frame = LogFrame::new(*tag, text.as_bytes().to_vec());
        bytes.extend(encode_frame(&frame).expect("encode frame"));
    }
    bytes
}

#[async_trait]
impl RuntimeApi for FakeRuntime {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let mut state = self.state();
        state.list_calls += 1;
        if let Some(err) = state.list_error.clone() {
            return Err(err);
        }
        Ok(state
            .containers
            .iter()
            .filter(|container| all || container.state == "running")
            .map(|container| ContainerSummary {
                id: container.id.clone(),
                names: vec![format!("/{}", container.name)],
                image: container.image.clone(),
                state: container.state.clone(),
                status: String::new(),
            })
            .collect())
    }

    async fn inspect_container_raw(&self, id: &str) -> Result<Value, RuntimeError> {
        let delay = self.state().detail_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        {
            let state = self.state();
            if state.vanish_on_inspect.contains(id) {
                return Err(RuntimeError::NotFound(format!("No such container: {id}")));
            }
            if state.failing_details.contains(id) {
                return Err(RuntimeError::Transport("inspect timed out".to_string()));
            }
        }
        let container = self.find(id)?;
        Ok(json!({
            "Id": container.id,
            "Name": format!("/{}", container.name),
            "State": {
                "Status": container.state,
                "Running": container.state == "running",
                "Paused": container.state == "paused",
                "StartedAt": "2024-01-01T00:00:00Z"
            },
            "Config": {"Image": container.image, "Env": ["PATH=/usr/bin", "MODE=test"]}
        }))
    }

    async fn stats_once(&self, id: &str) -> Result<StatsSnapshot, RuntimeError> {
        let container = self.find(id)?;
        serde_json::from_value(json!({
            "cpu_stats": {"cpu_usage": {"total_usage": 2_000}, "system_cpu_usage": 20_000, "online_cpus": 1},
            "precpu_stats": {"cpu_usage": {"total_usage": 1_000}, "system_cpu_usage": 10_000},
            "memory_stats": {"usage": container.memory_bytes}
        }))
        .map_err(|err| RuntimeError::Decode(err.to_string()))
    }

    async fn logs(&self, id: &str, options: LogsOptions) -> Result<LogReader, RuntimeError> {
        self.find(id)?;
        self.state()
            .log_requests
            .push((id.to_string(), options.clone()));
        if !options.follow {
            let bytes = self.state().backlog.get(id).cloned().unwrap_or_default();
            return Ok(Box::new(Cursor::new(bytes)));
        }
        let (bytes, keep_open) = {
            let state = self.state();
            (state.live.get(id).cloned().unwrap_or_default(), state.keep_live_open)
        };
        let (mut writer, reader) = tokio::io::duplex(1 << 16);
        writer
            .write_all(&bytes)
            .await
            .map_err(|err| RuntimeError::Transport(err.to_string()))?;
        if keep_open {
            self.state().live_writers.push(writer);
        }
        Ok(Box::new(reader))
    }

    async fn events(&self) -> Result<EventFeed, RuntimeError> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.state();
            state.events_opened += 1;
            state.event_senders.push(tx);
        }
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.command(id, "start")
    }

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError> {
        let container = self.find(id)?;
        if container.state != "running" {
            return Err(RuntimeError::Api {
                status: 304,
                message: "container already stopped".to_string(),
            });
        }
        self.command(id, "stop")
    }

    async fn pause_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.command(id, "pause")
    }

    async fn unpause_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.command(id, "unpause")
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.command(id, "remove")
    }

    async fn server_version(&self) -> Result<String, RuntimeError> {
        Ok("27.0.1".to_string())
    }

    async fn image_count(&self) -> Result<usize, RuntimeError> {
        Ok(3)
    }
}

/// Polls `check` until it holds or a second passes.
pub async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
