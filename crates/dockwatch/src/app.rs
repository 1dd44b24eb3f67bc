use crate::table::TableModel;
use crate::theme::Theme;
use dockwatch_core::commands::{execute, CommandOutcome, LifecycleCommand};
use dockwatch_core::engine::TableUpdate;
use dockwatch_core::focus::{Focus, ViewState};
use dockwatch_core::highlight::Highlighter;
use dockwatch_core::logbuf::{LogBuffer, NavDirection};
use dockwatch_core::runtime::RuntimeApi;
use dockwatch_core::state::DashboardState;
use dockwatch_core::stream::LogUpdate;
use dockwatch_core::EntityId;
use ratatui::text::Line;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const SUCCESS_TTL: Duration = Duration::from_secs(3);
const WARNING_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub expires_at: Instant,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>, now: Instant) -> Self {
        let ttl = match level {
            NoticeLevel::Warning => WARNING_TTL,
            NoticeLevel::Success | NoticeLevel::Info => SUCCESS_TTL,
        };
        Self {
            level,
            text: text.into(),
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderInfo {
    pub version: Option<String>,
    pub containers: Option<usize>,
    pub images: Option<usize>,
}

impl HeaderInfo {
    pub async fn fetch(runtime: &dyn RuntimeApi) -> Self {
        let (version, containers, images) = tokio::join!(
            runtime.server_version(),
            runtime.list_containers(true),
            runtime.image_count()
        );
        Self {
            version: version.ok(),
            containers: containers.ok().map(|list| list.len()),
            images: images.ok(),
        }
    }

    pub fn version_label(&self) -> String {
        self.version.clone().unwrap_or_else(|| "?".to_string())
    }

    pub fn containers_label(&self) -> String {
        count_label(self.containers)
    }

    pub fn images_label(&self) -> String {
        count_label(self.images)
    }
}

fn count_label(count: Option<usize>) -> String {
    count.map_or_else(|| "?".to_string(), |count| count.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailKind {
    Attributes,
    Environment,
}

impl DetailKind {
    pub fn title(&self) -> &'static str {
        match self {
            DetailKind::Attributes => "Attributes",
            DetailKind::Environment => "Environment",
        }
    }

    /// Picks the part of an inspect document this view shows.
    pub fn select(&self, document: Value) -> Value {
        match self {
            DetailKind::Attributes => document,
            DetailKind::Environment => document
                .pointer("/Config/Env")
                .cloned()
                .filter(|env| !env.is_null())
                .unwrap_or_else(|| Value::Array(Vec::new())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    None,
    Help,
    Detail {
        kind: DetailKind,
        id: EntityId,
        lines: Vec<Line<'static>>,
        scroll: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Idle,
    Loading,
    Live,
    Ended,
    Detached,
    Failed(String),
}

/// Results of background work, delivered back into the event loop.
#[derive(Debug)]
pub enum Job {
    Command(CommandOutcome),
    Detail {
        kind: DetailKind,
        id: EntityId,
        result: Result<Vec<Line<'static>>, String>,
    },
    Header(HeaderInfo),
}

pub struct App {
    pub state: DashboardState,
    pub focus: Focus,
    pub theme: Theme,
    pub table: TableModel,
    pub updates: Option<mpsc::UnboundedReceiver<TableUpdate>>,
    pub logs: Option<mpsc::UnboundedReceiver<LogUpdate>>,
    pub buffer: LogBuffer,
    pub log_scroll: usize,
    pub log_view_height: usize,
    pub search_input: String,
    pub stream_status: StreamStatus,
    pub overlay: Overlay,
    pub notice: Option<Notice>,
    pub header: HeaderInfo,
    pub jobs_rx: mpsc::UnboundedReceiver<Job>,
    jobs_tx: mpsc::UnboundedSender<Job>,
    pub should_quit: bool,
}

impl App {
    pub fn new(state: DashboardState) -> Self {
        let config = state.config();
        let theme = Theme::from_config(&config.theme);
        let buffer = LogBuffer::new(config.max_log_lines, config.highlighter());
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        Self {
            state,
            focus: Focus::new(),
            theme,
            table: TableModel::new(),
            updates: None,
            logs: None,
            buffer,
            log_scroll: 0,
            log_view_height: 1,
            search_input: String::new(),
            stream_status: StreamStatus::Idle,
            overlay: Overlay::None,
            notice: None,
            header: HeaderInfo::default(),
            jobs_rx,
            jobs_tx,
            should_quit: false,
        }
    }

    pub fn view(&self) -> &ViewState {
        self.focus.state()
    }

    pub fn is_searching(&self) -> bool {
        matches!(self.view(), ViewState::Searching(_))
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notice = Some(Notice::new(level, text, Instant::now()));
    }

    pub fn tick(&mut self, now: Instant) {
        if self.notice.as_ref().is_some_and(|notice| notice.is_expired(now)) {
            self.notice = None;
        }
    }

    /// Starts a fresh poll loop. Any earlier loop is cancelled and its
    /// receiver dropped, so its late updates are discarded.
    pub fn enter_browse(&mut self) {
        let updates = self.focus.browse(|| self.state.start_engine());
        self.updates = Some(updates);
        self.logs = None;
        self.table.clear();
        self.buffer.clear();
        self.search_input.clear();
        self.stream_status = StreamStatus::Idle;
        self.overlay = Overlay::None;
    }

    pub fn set_filter(&mut self, show_all: bool) {
        if self.state.show_all() == show_all && matches!(self.view(), ViewState::Browsing) {
            return;
        }
        self.state.set_show_all(show_all);
        self.enter_browse();
        let label = if show_all {
            "Showing all containers"
        } else {
            "Showing running containers"
        };
        self.notify(NoticeLevel::Info, label);
    }

    pub fn open_selected_logs(&mut self) {
        if let Some(id) = self.table.selected().cloned() {
            self.enter_view(id);
        }
    }

    pub fn enter_view(&mut self, id: EntityId) {
        self.buffer.clear();
        self.log_scroll = 0;
        self.search_input.clear();
        self.overlay = Overlay::None;
        self.stream_status = StreamStatus::Loading;
        let logs = self.focus.view(|| self.state.open_stream(id));
        self.logs = Some(logs);
        self.updates = None;
    }

    pub fn apply_table_update(&mut self, update: TableUpdate) {
        if let TableUpdate::PollFailed { message } = &update {
            self.notify(NoticeLevel::Warning, format!("Refresh failed: {message}"));
        }
        self.table.apply(update);
    }

    pub fn apply_log_update(&mut self, update: LogUpdate) {
        match update {
            LogUpdate::Backlog(rendered) => {
                self.buffer.replace(rendered);
                if !self.search_input.is_empty() {
                    self.buffer.search(&self.search_input);
                }
                self.stream_status = StreamStatus::Live;
                if self.state.scroll_to_end() {
                    self.scroll_logs_to_end();
                }
            }
            LogUpdate::Append {
                rendered,
                scroll_to_end,
            } => {
                self.buffer.append_rendered(rendered);
                if scroll_to_end && !self.is_searching() {
                    self.scroll_logs_to_end();
                } else {
                    self.clamp_log_scroll();
                }
            }
            LogUpdate::Ended => {
                self.stream_status = StreamStatus::Ended;
                self.notify(NoticeLevel::Info, "Log stream ended");
            }
            LogUpdate::Failed(message) => {
                self.notify(NoticeLevel::Warning, format!("Log stream failed: {message}"));
                self.stream_status = StreamStatus::Failed(message);
            }
        }
    }

    pub fn apply_job(&mut self, job: Job) {
        match job {
            Job::Command(outcome) => {
                let level = if outcome.is_success() {
                    NoticeLevel::Success
                } else {
                    NoticeLevel::Warning
                };
                self.notify(level, outcome.summary());
            }
            Job::Detail { kind, id, result } => {
                let Overlay::Detail {
                    kind: open_kind,
                    id: open_id,
                    lines,
                    scroll,
                } = &mut self.overlay
                else {
                    debug!(event = "detail_discarded", id = %id);
                    return;
                };
                if *open_kind != kind || *open_id != id {
                    return;
                }
                match result {
                    Ok(rendered) => {
                        *lines = rendered;
                        *scroll = 0;
                    }
                    Err(message) => {
                        *lines = vec![Line::from(message.clone())];
                        self.notify(NoticeLevel::Warning, message);
                    }
                }
            }
            Job::Header(info) => self.header = info,
        }
    }

    pub fn run_command(&mut self, command: LifecycleCommand) {
        let Some(id) = self.table.selected().cloned() else {
            self.notify(NoticeLevel::Info, "No container selected");
            return;
        };
        let runtime = self.state.runtime();
        let jobs = self.jobs_tx.clone();
        tokio::spawn(async move {
            let outcome = execute(runtime.as_ref(), command, &id).await;
            let _ = jobs.send(Job::Command(outcome));
        });
    }

    pub fn refresh_header(&self) {
        let runtime = self.state.runtime();
        let jobs = self.jobs_tx.clone();
        tokio::spawn(async move {
            let info = HeaderInfo::fetch(runtime.as_ref()).await;
            let _ = jobs.send(Job::Header(info));
        });
    }

    /// Stops the log stream and shows part of the inspect document instead.
    pub fn show_detail(&mut self, kind: DetailKind) {
        let Some(id) = self.focus.detach_stream() else {
            return;
        };
        self.logs = None;
        self.stream_status = StreamStatus::Detached;
        self.overlay = Overlay::Detail {
            kind,
            id: id.clone(),
            lines: vec![Line::from("Loading...")],
            scroll: 0,
        };

        let runtime = self.state.runtime();
        let highlighter = self.state.config().json_highlighter();
        let jobs = self.jobs_tx.clone();
        tokio::spawn(async move {
            let result = load_detail(runtime, highlighter, kind, &id).await;
            let _ = jobs.send(Job::Detail { kind, id, result });
        });
    }

    /// Leaves the detail overlay and resumes streaming the same entity.
    pub fn close_detail(&mut self) {
        if let Overlay::Detail { id, .. } = &self.overlay {
            let id = id.clone();
            self.enter_view(id);
        } else {
            self.overlay = Overlay::None;
        }
    }

    pub fn toggle_follow(&mut self) {
        let enabled = !self.state.scroll_to_end();
        self.state.set_scroll_to_end(enabled);
        if enabled {
            self.scroll_logs_to_end();
            self.notify(NoticeLevel::Info, "Following new log lines");
        } else {
            self.notify(NoticeLevel::Info, "Stopped following new log lines");
        }
    }

    pub fn begin_search(&mut self) {
        if self.focus.begin_search() {
            self.search_input.clear();
            self.buffer.clear_search();
        }
    }

    pub fn push_search_char(&mut self, ch: char) {
        self.search_input.push(ch);
        self.refresh_search();
    }

    pub fn pop_search_char(&mut self) {
        self.search_input.pop();
        self.refresh_search();
    }

    /// Leaves input mode; matches stay highlighted until cleared.
    pub fn finish_search_input(&mut self) {
        self.focus.end_search();
        if self.search_input.is_empty() {
            self.buffer.clear_search();
        }
    }

    pub fn clear_search(&mut self) {
        self.search_input.clear();
        self.buffer.clear_search();
        self.focus.end_search();
    }

    pub fn navigate_matches(&mut self, direction: NavDirection) {
        let line = self.buffer.navigate(direction).map(|found| found.line);
        if let Some(line) = line {
            self.reveal_log_line(line);
        }
    }

    fn refresh_search(&mut self) {
        let line = self
            .buffer
            .search(&self.search_input)
            .last()
            .map(|found| found.line);
        match line {
            Some(line) => self.reveal_log_line(line),
            None if !self.search_input.is_empty() => {
                debug!(event = "search_no_match", keyword = %self.search_input);
            }
            None => {}
        }
    }

    pub fn max_log_scroll(&self) -> usize {
        self.buffer.len().saturating_sub(self.log_view_height.max(1))
    }

    pub fn scroll_logs(&mut self, delta: isize) {
        self.log_scroll = self
            .log_scroll
            .saturating_add_signed(delta)
            .min(self.max_log_scroll());
    }

    pub fn scroll_logs_to_end(&mut self) {
        self.log_scroll = self.max_log_scroll();
    }

    pub fn clamp_log_scroll(&mut self) {
        self.log_scroll = self.log_scroll.min(self.max_log_scroll());
    }

    pub fn reveal_log_line(&mut self, line: usize) {
        let height = self.log_view_height.max(1);
        if line < self.log_scroll {
            self.log_scroll = line;
        } else if line >= self.log_scroll + height {
            self.log_scroll = line + 1 - height;
        }
        self.clamp_log_scroll();
    }

    pub fn scroll_detail(&mut self, delta: isize) {
        if let Overlay::Detail { lines, scroll, .. } = &mut self.overlay {
            let max = lines.len().saturating_sub(1);
            *scroll = scroll.saturating_add_signed(delta).min(max);
        }
    }

    pub fn page_size(&self) -> isize {
        self.log_view_height.max(2) as isize - 1
    }

    pub fn shutdown(&mut self) {
        self.focus.stop_all();
        self.updates = None;
        self.logs = None;
    }
}

async fn load_detail(
    runtime: Arc<dyn RuntimeApi>,
    highlighter: Highlighter,
    kind: DetailKind,
    id: &EntityId,
) -> Result<Vec<Line<'static>>, String> {
    let document = runtime
        .inspect_container_raw(id.as_str())
        .await
        .map_err(|err| {
            warn!(event = "inspect_failed", id = %id, error = %err);
            format!("Failed to inspect container {}: {err}", id.short())
        })?;
    let pretty = serde_json::to_string_pretty(&kind.select(document))
        .map_err(|err| format!("Failed to format {}: {err}", kind.title()))?;
    tokio::task::spawn_blocking(move || highlighter.render(&pretty).styled)
        .await
        .map_err(|err| format!("Failed to render {}: {err}", kind.title()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn warnings_outlive_success_notices() {
        let now = Instant::now();
        let success = Notice::new(NoticeLevel::Success, "ok", now);
        let warning = Notice::new(NoticeLevel::Warning, "bad", now);
        assert!(!success.is_expired(now + Duration::from_secs(2)));
        assert!(success.is_expired(now + Duration::from_secs(3)));
        assert!(!warning.is_expired(now + Duration::from_secs(4)));
        assert!(warning.is_expired(now + Duration::from_secs(5)));
    }

    #[test]
    fn header_labels_show_question_mark_on_failure() {
        let info = HeaderInfo {
            version: Some("24.0.7".to_string()),
            containers: None,
            images: Some(12),
        };
        assert_eq!(info.version_label(), "24.0.7");
        assert_eq!(info.containers_label(), "?");
        assert_eq!(info.images_label(), "12");
        assert_eq!(HeaderInfo::default().version_label(), "?");
    }

    #[test]
    fn environment_view_reads_config_env() {
        let document = json!({
            "Id": "abc",
            "Config": {"Image": "nginx", "Env": ["PATH=/usr/bin", "MODE=prod"]}
        });
        assert_eq!(
            DetailKind::Environment.select(document.clone()),
            json!(["PATH=/usr/bin", "MODE=prod"])
        );
        assert_eq!(DetailKind::Attributes.select(document.clone()), document);
        assert_eq!(
            DetailKind::Environment.select(json!({"Config": {"Env": null}})),
            json!([])
        );
    }
}
