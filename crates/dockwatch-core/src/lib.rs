pub mod backlog;
pub mod commands;
pub mod config;
pub mod docker;
pub mod engine;
pub mod event_lines;
pub mod events;
pub mod focus;
pub mod frame;
pub mod highlight;
pub mod logbuf;
pub mod rows;
pub mod runtime;
pub mod snapshot;
pub mod state;
pub mod stream;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const SHORT_ID_LEN: usize = 12;

/// Runtime-assigned container identity. Stable for the lifetime of the container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        self.0.get(..SHORT_ID_LEN).unwrap_or(&self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    #[default]
    Unknown,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Created => "created",
            LifecycleState::Running => "running",
            LifecycleState::Paused => "paused",
            LifecycleState::Restarting => "restarting",
            LifecycleState::Removing => "removing",
            LifecycleState::Exited => "exited",
            LifecycleState::Dead => "dead",
            LifecycleState::Unknown => "unknown",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, LifecycleState::Running)
    }

    /// Parses a runtime status string, mapping anything unrecognised to `Unknown`.
    pub fn parse_lossy(input: &str) -> Self {
        input.parse().unwrap_or(LifecycleState::Unknown)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "created" => Ok(LifecycleState::Created),
            "running" => Ok(LifecycleState::Running),
            "paused" => Ok(LifecycleState::Paused),
            "restarting" => Ok(LifecycleState::Restarting),
            "removing" => Ok(LifecycleState::Removing),
            "exited" => Ok(LifecycleState::Exited),
            "dead" => Ok(LifecycleState::Dead),
            other => Err(format!("Unknown lifecycle state: {other}")),
        }
    }
}

/// One table row worth of data, rebuilt on every refresh from inspect + stats.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: EntityId,
    pub name: String,
    pub image: String,
    pub state: LifecycleState,
    pub uptime: Duration,
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

impl EntityRecord {
    pub fn uptime_label(&self) -> String {
        format_uptime(self.uptime)
    }

    pub fn cpu_label(&self) -> String {
        format!("{:.2}%", self.cpu_percent)
    }

    pub fn memory_label(&self) -> String {
        format!("{:.2} MB", self.memory_mb)
    }
}

/// Formats whole-second durations as `1h2m3s`, `4m0s`, `12s`.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
