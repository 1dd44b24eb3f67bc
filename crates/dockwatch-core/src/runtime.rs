//! The container runtime as seen by the dashboard: an opaque capability that
//! lists, inspects, samples, tails and commands containers.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tokio::io::AsyncRead;

pub type LogReader = Box<dyn AsyncRead + Send + Unpin>;
pub type EventFeed = BoxStream<'static, Result<RuntimeEvent, RuntimeError>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("cannot connect to runtime at {path}: {message}")]
    Connect { path: String, message: String },
    #[error("runtime transport error: {0}")]
    Transport(String),
    #[error("no such container: {0}")]
    NotFound(String),
    #[error("runtime returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("failed to decode runtime response: {0}")]
    Decode(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspect {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: InspectState,
    #[serde(default)]
    pub config: InspectConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub started_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectConfig {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub env: Option<Vec<String>>,
}

/// One-shot resource sample. Counters are cumulative; `precpu_stats` holds
/// the previous sample taken by the runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsSnapshot {
    #[serde(default)]
    pub cpu_stats: CpuStats,
    #[serde(default)]
    pub precpu_stats: CpuStats,
    #[serde(default)]
    pub memory_stats: MemoryStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuStats {
    #[serde(default)]
    pub cpu_usage: CpuUsage,
    #[serde(default)]
    pub system_cpu_usage: Option<u64>,
    #[serde(default)]
    pub online_cpus: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuUsage {
    #[serde(default)]
    pub total_usage: u64,
    #[serde(default)]
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub usage: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RuntimeEvent {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "Action", default)]
    pub action: String,
    #[serde(rename = "Actor", default)]
    pub actor: EventActor,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub time: i64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EventActor {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Attributes", default)]
    pub attributes: HashMap<String, String>,
}

impl RuntimeEvent {
    pub fn entity_id(&self) -> Option<&str> {
        if !self.actor.id.is_empty() {
            return Some(&self.actor.id);
        }
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogsOptions {
    pub follow: bool,
    /// Unix seconds; only entries at or after this instant.
    pub since: Option<i64>,
    /// Line count or `"all"`.
    pub tail: Option<String>,
}

impl LogsOptions {
    pub fn backlog(tail: impl Into<String>) -> Self {
        Self {
            follow: false,
            since: None,
            tail: Some(tail.into()),
        }
    }

    pub fn follow_since(since: i64) -> Self {
        Self {
            follow: true,
            since: Some(since),
            tail: None,
        }
    }
}

#[async_trait]
pub trait RuntimeApi: Send + Sync {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, RuntimeError>;

    async fn inspect_container_raw(&self, id: &str) -> Result<Value, RuntimeError>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspect, RuntimeError> {
        let raw = self.inspect_container_raw(id).await?;
        serde_json::from_value(raw).map_err(|err| RuntimeError::Decode(err.to_string()))
    }

    async fn stats_once(&self, id: &str) -> Result<StatsSnapshot, RuntimeError>;

    /// Opens a multiplexed log body. Dropping the reader releases the stream.
    async fn logs(&self, id: &str, options: LogsOptions) -> Result<LogReader, RuntimeError>;

    /// Subscribes to container lifecycle events.
    async fn events(&self) -> Result<EventFeed, RuntimeError>;

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn pause_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn unpause_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn server_version(&self) -> Result<String, RuntimeError>;

    async fn image_count(&self) -> Result<usize, RuntimeError>;
}
