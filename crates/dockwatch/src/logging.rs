use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "dockwatch.log";

/// Keeps the log file open for the life of the process.
pub struct LogGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl LogGuard {
    pub fn is_file_backed(&self) -> bool {
        self.file.is_some()
    }
}

struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
    stdout: bool,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.stdout {
            let _ = io::stdout().write_all(buf);
        }
        if let Some(file) = &self.file {
            let mut file = match file.lock() {
                Ok(file) => file,
                Err(poisoned) => poisoned.into_inner(),
            };
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.stdout {
            let _ = io::stdout().flush();
        }
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

pub fn resolve_level(debug: bool, env_level: Option<String>) -> String {
    if debug {
        return "debug".to_string();
    }
    env_level
        .map(|level| level.trim().to_string())
        .filter(|level| !level.is_empty())
        .unwrap_or_else(|| "info".to_string())
}

pub fn parse_bool_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|value| value.trim().to_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// The terminal belongs to the dashboard, so logs go to a file under the
/// state directory unless `DOCKWATCH_LOG_STDOUT` is set.
pub fn init_logging(debug: bool, state_dir: &Path) -> Option<LogGuard> {
    let level = resolve_level(debug, std::env::var("DOCKWATCH_LOG_LEVEL").ok());
    let filter = if debug {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    let stdout = parse_bool_flag(std::env::var("DOCKWATCH_LOG_STDOUT").ok().as_deref());
    let guard = match open_log_file(state_dir) {
        Ok(file) => LogGuard {
            file: Some(Arc::new(Mutex::new(file))),
        },
        Err(_) => LogGuard { file: None },
    };

    let file = guard.file.clone();
    let make_writer = BoxMakeWriter::new(move || LogWriter {
        file: file.clone(),
        stdout,
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(make_writer)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(guard)
}

fn open_log_file(state_dir: &Path) -> io::Result<File> {
    std::fs::create_dir_all(state_dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(state_dir.join(LOG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_wins_over_env_level() {
        assert_eq!(resolve_level(true, Some("warn".to_string())), "debug");
        assert_eq!(resolve_level(false, Some(" warn ".to_string())), "warn");
        assert_eq!(resolve_level(false, Some(String::new())), "info");
        assert_eq!(resolve_level(false, None), "info");
    }

    #[test]
    fn log_file_lands_in_nested_state_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state_dir = dir.path().join("state").join("dockwatch");
        let file = open_log_file(&state_dir).expect("open log file");
        let guard = LogGuard {
            file: Some(Arc::new(Mutex::new(file))),
        };
        assert!(guard.is_file_backed());
        assert!(state_dir.join(LOG_FILE_NAME).exists());
        assert!(!LogGuard { file: None }.is_file_backed());
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        for value in ["1", "true", "YES", "on"] {
            assert!(parse_bool_flag(Some(value)), "{value}");
        }
        assert!(!parse_bool_flag(Some("0")));
        assert!(!parse_bool_flag(None));
    }
}
