mod app;
mod input;
mod logging;
mod table;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::EventStream,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dockwatch_core::config::{self, Config};
use dockwatch_core::docker::DockerClient;
use dockwatch_core::state::DashboardState;
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info};

const UI_TICK: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "dockwatch")]
#[command(about = "Live terminal dashboard for the local Docker engine", long_about = None)]
struct Args {
    /// Show every container, not only running ones.
    #[arg(long, conflicts_with = "running")]
    all: bool,
    /// Show running containers only.
    #[arg(long)]
    running: bool,
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Engine socket; defaults to DOCKER_HOST or /var/run/docker.sock.
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,
    /// Backlog lines to load when opening logs (a number or `all`).
    #[arg(long, value_name = "N")]
    tail: Option<String>,
    /// Seconds between full refreshes.
    #[arg(long, value_name = "SECS")]
    poll: Option<u64>,
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if self.all {
            config.show_all = true;
        }
        if self.running {
            config.show_all = false;
        }
        if let Some(socket) = &self.socket {
            config.socket_path = socket.clone();
        }
        if let Some(tail) = &self.tail {
            config.initial_log_lines = tail.clone();
        }
        if let Some(poll) = self.poll {
            config.poll_interval_secs = poll;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_guard = logging::init_logging(args.debug, &config::state_dir());

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    args.apply(&mut config);
    let file_logging = log_guard.as_ref().is_some_and(logging::LogGuard::is_file_backed);
    info!(
        event = "startup",
        socket = %config.socket_path.display(),
        show_all = config.show_all,
        file_logging
    );

    let client = DockerClient::new(&config.socket_path);
    client
        .ping()
        .await
        .with_context(|| format!("cannot reach the engine at {}", config.socket_path.display()))?;

    let mut app = app::App::new(DashboardState::new(Arc::new(client), config));
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app).await;
    app.shutdown();
    restore_terminal(&mut terminal)?;

    if let Err(err) = &result {
        error!(event = "dashboard_failed", error = %err);
        eprintln!("dockwatch: {err}");
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Pending forever when there is no receiver, so a closed-off view never wakes the loop.
async fn recv_opt<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut app::App,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut ui_ticker = tokio::time::interval(UI_TICK);
    let mut header_ticker = tokio::time::interval(app.state.config().poll_interval());
    header_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    app.enter_browse();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(frame, app))?;
        tokio::select! {
            _ = ui_ticker.tick() => {
                app.tick(Instant::now());
            }
            _ = header_ticker.tick() => {
                app.refresh_header();
            }
            update = recv_opt(&mut app.updates) => match update {
                Some(update) => app.apply_table_update(update),
                None => app.updates = None,
            },
            update = recv_opt(&mut app.logs) => match update {
                Some(update) => app.apply_log_update(update),
                None => app.logs = None,
            },
            Some(job) = app.jobs_rx.recv() => {
                app.apply_job(job);
            }
            maybe_event = events.next() => match maybe_event {
                Some(Ok(event)) => {
                    if input::handle_input(event, app) {
                        break;
                    }
                }
                Some(Err(err)) => return Err(err.into()),
                None => break,
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let args = Args::parse_from([
            "dockwatch",
            "--running",
            "--socket",
            "/tmp/engine.sock",
            "--tail",
            "all",
            "--poll",
            "2",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);
        assert!(!config.show_all);
        assert_eq!(config.socket_path, PathBuf::from("/tmp/engine.sock"));
        assert_eq!(config.tail(), "all");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn all_and_running_conflict() {
        assert!(Args::try_parse_from(["dockwatch", "--all", "--running"]).is_err());
        let args = Args::parse_from(["dockwatch"]);
        let mut config = Config {
            show_all: false,
            ..Config::default()
        };
        args.apply(&mut config);
        assert!(!config.show_all);
    }
}
