//! User configuration read from TOML. Every field has a default and a broken
//! file never stops the dashboard from starting.

use crate::backlog::{DEFAULT_CHUNK_BYTES, DEFAULT_MAX_LINES};
use crate::docker::DEFAULT_SOCKET_PATH;
use crate::engine::{EngineSettings, DEFAULT_DETAIL_CONCURRENCY};
use crate::events::{SubscriberSettings, DEFAULT_QUEUE_CAPACITY};
use crate::highlight::{Highlighter, DEFAULT_GRAMMAR, DEFAULT_THEME};
use crate::stream::{StreamSettings, DEFAULT_TAIL};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub header: String,
    pub selected: String,
    pub fg: String,
    pub hint: String,
    pub footer_text: String,
    pub footer_bg: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            header: "#8ec07c".to_string(),
            selected: "#83a598".to_string(),
            fg: "white".to_string(),
            hint: "#fabd2f".to_string(),
            footer_text: "black".to_string(),
            footer_bg: "#83a598".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub socket_path: PathBuf,
    pub show_all: bool,
    pub poll_interval_secs: u64,
    pub initial_log_lines: String,
    pub max_log_lines: usize,
    pub backlog_chunk_bytes: usize,
    pub detail_concurrency: usize,
    pub event_queue_capacity: usize,
    pub events_reconnect: bool,
    pub log_grammar: String,
    pub log_theme: String,
    pub scroll_on_new_entry: bool,
    pub theme: ThemeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            show_all: true,
            poll_interval_secs: 5,
            initial_log_lines: DEFAULT_TAIL.to_string(),
            max_log_lines: DEFAULT_MAX_LINES,
            backlog_chunk_bytes: DEFAULT_CHUNK_BYTES,
            detail_concurrency: DEFAULT_DETAIL_CONCURRENCY,
            event_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            events_reconnect: true,
            log_grammar: DEFAULT_GRAMMAR.to_string(),
            log_theme: DEFAULT_THEME.to_string(),
            scroll_on_new_entry: true,
            theme: ThemeConfig::default(),
        }
    }
}

impl Config {
    /// Loads from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match Self::try_load_from(path) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(err) => {
                warn!(event = "config_load_failed", error = %err);
                Self::default()
            }
        }
    }

    /// `Ok(None)` when the file does not exist.
    pub fn try_load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Tail argument for the backlog request: a line count or `all`.
    pub fn tail(&self) -> String {
        let tail = self.initial_log_lines.trim();
        if tail.eq_ignore_ascii_case("all") {
            return "all".to_string();
        }
        if !tail.is_empty() && tail.chars().all(|ch| ch.is_ascii_digit()) {
            return tail.to_string();
        }
        warn!(event = "config_invalid_tail", value = %self.initial_log_lines);
        DEFAULT_TAIL.to_string()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn highlighter(&self) -> Highlighter {
        Highlighter::new(self.log_grammar.clone(), self.log_theme.clone())
    }

    pub fn json_highlighter(&self) -> Highlighter {
        Highlighter::json(self.log_theme.clone())
    }

    pub fn engine_settings(&self, include_all: bool) -> EngineSettings {
        EngineSettings {
            include_all,
            poll_interval: self.poll_interval(),
            detail_concurrency: self.detail_concurrency.max(1),
        }
    }

    pub fn subscriber_settings(&self) -> SubscriberSettings {
        SubscriberSettings {
            capacity: self.event_queue_capacity.max(1),
            reconnect: self.events_reconnect,
            ..SubscriberSettings::default()
        }
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            tail: self.tail(),
            chunk_bytes: self.backlog_chunk_bytes.max(1),
            max_lines: self.max_log_lines.max(1),
            highlighter: self.highlighter(),
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = env::var("DOCKWATCH_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    config_dir().join("dockwatch/config.toml")
}

pub fn state_dir() -> PathBuf {
    if let Ok(path) = env::var("XDG_STATE_HOME") {
        return PathBuf::from(path).join("dockwatch");
    }
    home_dir().join(".local/state/dockwatch")
}

fn config_dir() -> PathBuf {
    if let Ok(path) = env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(path);
    }
    home_dir().join(".config")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

pub fn default_socket_path() -> PathBuf {
    socket_from_docker_host(env::var("DOCKER_HOST").ok().as_deref())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
}

fn socket_from_docker_host(host: Option<&str>) -> Option<PathBuf> {
    host?
        .strip_prefix("unix://")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        assert!(Config::try_load_from(&path).expect("load").is_none());
        let config = Config::load_from(&path);
        assert!(config.show_all);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.tail(), "1000");
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "show_all = false\ninitial_log_lines = \"all\"\n[theme]\nheader = \"red\""
        )
        .expect("write");
        let config = Config::load_from(file.path());
        assert!(!config.show_all);
        assert_eq!(config.tail(), "all");
        assert_eq!(config.theme.header, "red");
        assert_eq!(config.theme.fg, ThemeConfig::default().fg);
        assert_eq!(config.max_log_lines, DEFAULT_MAX_LINES);
    }

    #[test]
    fn broken_file_degrades_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "show_all = [not toml").expect("write");
        assert!(matches!(
            Config::try_load_from(file.path()),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(Config::load_from(file.path()).show_all, Config::default().show_all);
    }

    #[test]
    fn invalid_tail_falls_back() {
        let config = Config {
            initial_log_lines: "lots".to_string(),
            ..Config::default()
        };
        assert_eq!(config.tail(), DEFAULT_TAIL);
        assert_eq!(config.stream_settings().tail, DEFAULT_TAIL);
    }

    #[test]
    fn docker_host_unix_socket_is_used() {
        assert_eq!(
            socket_from_docker_host(Some("unix:///run/user/1000/docker.sock")),
            Some(PathBuf::from("/run/user/1000/docker.sock"))
        );
        assert_eq!(socket_from_docker_host(Some("tcp://10.0.0.1:2375")), None);
        assert_eq!(socket_from_docker_host(None), None);
    }
}
