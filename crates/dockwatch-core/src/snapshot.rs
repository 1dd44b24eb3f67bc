//! Builds table records from an inspect call plus a one-shot stats sample.

use crate::runtime::{ContainerInspect, CpuStats, RuntimeApi, RuntimeError, StatsSnapshot};
use crate::{EntityId, EntityRecord, LifecycleState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const BYTES_PER_MB: f64 = 1_048_576.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuSample {
    pub total: u64,
    pub system: u64,
}

impl From<&CpuStats> for CpuSample {
    fn from(stats: &CpuStats) -> Self {
        Self {
            total: stats.cpu_usage.total_usage,
            system: stats.system_cpu_usage.unwrap_or(0),
        }
    }
}

/// `(Δcpu / Δsystem) × cores × 100`, or 0 when either delta is not positive.
pub fn cpu_percent(current: CpuSample, previous: CpuSample, cores: u32) -> f64 {
    let cpu_delta = i128::from(current.total) - i128::from(previous.total);
    let system_delta = i128::from(current.system) - i128::from(previous.system);
    if cpu_delta <= 0 || system_delta <= 0 {
        return 0.0;
    }
    (cpu_delta as f64 / system_delta as f64) * f64::from(cores) * 100.0
}

fn core_count(stats: &CpuStats) -> u32 {
    let per_cpu = stats
        .cpu_usage
        .percpu_usage
        .as_ref()
        .map(Vec::len)
        .unwrap_or(0);
    if per_cpu > 0 {
        return u32::try_from(per_cpu).unwrap_or(u32::MAX);
    }
    stats.online_cpus.filter(|cores| *cores > 0).unwrap_or(1)
}

pub fn memory_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Whole-second uptime; zero unless the entity is running.
pub fn uptime(state: LifecycleState, started_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    let Some(started_at) = started_at.filter(|_| state.is_running()) else {
        return Duration::ZERO;
    };
    let millis = (now - started_at).num_milliseconds();
    if millis <= 0 {
        return Duration::ZERO;
    }
    Duration::from_secs(((millis + 500) / 1000) as u64)
}

fn parse_started_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

pub fn record_from(inspect: &ContainerInspect, stats: &StatsSnapshot, now: DateTime<Utc>) -> EntityRecord {
    let state = if inspect.state.paused {
        LifecycleState::Paused
    } else {
        LifecycleState::parse_lossy(&inspect.state.status)
    };
    let current = CpuSample::from(&stats.cpu_stats);
    let previous = CpuSample::from(&stats.precpu_stats);
    EntityRecord {
        id: EntityId::new(inspect.id.clone()),
        name: inspect.name.trim_start_matches('/').to_string(),
        image: inspect.config.image.clone(),
        state,
        uptime: uptime(state, parse_started_at(&inspect.state.started_at), now),
        cpu_percent: cpu_percent(current, previous, core_count(&stats.cpu_stats)),
        memory_mb: memory_mb(stats.memory_stats.usage.unwrap_or(0)),
    }
}

#[derive(Clone)]
pub struct SnapshotFetcher {
    runtime: Arc<dyn RuntimeApi>,
}

impl SnapshotFetcher {
    pub fn new(runtime: Arc<dyn RuntimeApi>) -> Self {
        Self { runtime }
    }

    pub async fn list(&self, include_all: bool) -> Result<Vec<EntityId>, RuntimeError> {
        let summaries = self.runtime.list_containers(include_all).await?;
        Ok(summaries
            .into_iter()
            .map(|summary| EntityId::new(summary.id))
            .collect())
    }

    /// Inspect and stats run concurrently. A vanished entity surfaces as `NotFound`.
    pub async fn detail(&self, id: &EntityId) -> Result<EntityRecord, RuntimeError> {
        let (inspect, stats) = tokio::try_join!(
            self.runtime.inspect_container(id.as_str()),
            self.runtime.stats_once(id.as_str())
        )?;
        let mut record = record_from(&inspect, &stats, Utc::now());
        if record.id.as_str().is_empty() {
            record.id = id.clone();
        }
        Ok(record)
    }
}
