use crate::app::{App, NoticeLevel, Overlay, StreamStatus};
use crate::table::HEADERS;
use crate::theme::{self, icons, BORDER_STYLE, FOCUSED_MATCH_STYLE, MUTED_STYLE};
use dockwatch_core::focus::ViewState;
use dockwatch_core::logbuf::MATCH_STYLE;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use ratatui::Frame;

const HELP_ENTRIES: [(&str, &str); 16] = [
    ("1", "running containers"),
    ("2", "all containers"),
    ("j/k", "move / scroll"),
    ("enter", "open logs"),
    ("s t p u", "start stop pause unpause"),
    ("D", "remove container"),
    ("/", "search logs"),
    ("enter", "older match while searching"),
    ("shift+enter", "newer match while searching"),
    ("n/N", "older / newer match"),
    ("f", "follow new log lines"),
    ("a", "attributes"),
    ("e", "environment"),
    ("g/G", "top / bottom"),
    ("esc", "back"),
    ("q", "quit"),
];

pub fn render(frame: &mut Frame, app: &mut App) {
    let screen = frame.size();
    let searching = app.is_searching();
    let constraints = if searching {
        vec![
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ]
    } else {
        vec![
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ]
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(screen);

    render_header(frame, app, chunks[0]);
    match app.view().clone() {
        ViewState::Browsing => render_table(frame, app, chunks[1]),
        ViewState::Viewing(id) | ViewState::Searching(id) => {
            render_logs(frame, app, chunks[1], id.short())
        }
    }
    if searching {
        render_search_bar(frame, app, chunks[2]);
    }
    render_footer(frame, app, chunks[chunks.len() - 1]);

    match &app.overlay {
        Overlay::None => {}
        Overlay::Help => render_help(frame, app, screen),
        Overlay::Detail {
            kind,
            id,
            lines,
            scroll,
        } => {
            let area = centered(screen, 90, 85);
            frame.render_widget(Clear, area);
            let title = format!(" {} {} ", kind.title(), id.short());
            let widget = Paragraph::new(lines.clone())
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(BORDER_STYLE)
                        .title(Span::styled(title, app.theme.header_style())),
                )
                .scroll((clamp_u16(*scroll), 0));
            frame.render_widget(widget, area);
        }
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let filter = if app.state.show_all() { "all" } else { "running" };
    let line = Line::from(vec![
        Span::styled(" dockwatch ", app.theme.header_style()),
        Span::styled("engine ", MUTED_STYLE),
        Span::styled(app.header.version_label(), app.theme.text_style()),
        Span::styled("  containers ", MUTED_STYLE),
        Span::styled(app.header.containers_label(), app.theme.text_style()),
        Span::styled("  images ", MUTED_STYLE),
        Span::styled(app.header.images_label(), app.theme.text_style()),
        Span::styled("  showing ", MUTED_STYLE),
        Span::styled(filter, app.theme.hint_style()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(HEADERS.iter().map(|title| Cell::from(*title))).style(app.theme.header_style());
    let rows: Vec<Row> = app
        .table
        .records()
        .enumerate()
        .map(|(index, record)| {
            Row::new(vec![
                Cell::from(record.id.short().to_string()),
                Cell::from(record.name.clone()),
                Cell::from(record.image.clone()),
                Cell::from(record.uptime_label()),
                Cell::from(Span::styled(
                    record.state.as_str(),
                    Style::new().fg(theme::state_color(record.state)),
                )),
                Cell::from(record.cpu_label()),
                Cell::from(record.memory_label()),
            ])
            .style(theme::zebra_row_style(index).fg(app.theme.fg))
        })
        .collect();

    let title = match app.table.last_error() {
        Some(error) => format!(" Containers ({}) refresh failed: {error} ", app.table.len()),
        None => format!(" Containers ({}) ", app.table.len()),
    };
    let widths = [
        Constraint::Length(14),
        Constraint::Percentage(22),
        Constraint::Percentage(26),
        Constraint::Length(10),
        Constraint::Length(11),
        Constraint::Length(8),
        Constraint::Length(11),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(BORDER_STYLE)
                .title(title),
        )
        .highlight_style(app.theme.selected_style());

    let mut state = TableState::default();
    state.select(app.table.selected_position());
    frame.render_stateful_widget(table, area, &mut state);

    if app.table.is_empty() {
        let inner = Rect {
            x: area.x + 2,
            y: area.y + 2,
            width: area.width.saturating_sub(4),
            height: 1.min(area.height.saturating_sub(3)),
        };
        frame.render_widget(Paragraph::new(Span::styled("No containers", MUTED_STYLE)), inner);
    }
}

fn render_logs(frame: &mut Frame, app: &mut App, area: Rect, short_id: &str) {
    app.log_view_height = area.height.saturating_sub(2).max(1) as usize;
    app.clamp_log_scroll();

    let mut lines = app.buffer.render_window(app.log_scroll, app.log_view_height);
    if let Some(found) = app.buffer.focused() {
        if let Some(offset) = found.line.checked_sub(app.log_scroll) {
            if let Some(line) = lines.get_mut(offset) {
                *line = focus_line(&found.rendered);
            }
        }
    }

    let follow = if app.state.scroll_to_end() {
        icons::FOLLOW
    } else {
        icons::PAUSED
    };
    let status = match &app.stream_status {
        StreamStatus::Idle | StreamStatus::Live => String::new(),
        StreamStatus::Loading => " loading".to_string(),
        StreamStatus::Ended => " ended".to_string(),
        StreamStatus::Detached => " detached".to_string(),
        StreamStatus::Failed(message) => format!(" failed: {message}"),
    };
    let title = format!(" Logs {short_id} {follow}{status} ");
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(BORDER_STYLE)
            .title(Span::styled(title, app.theme.header_style())),
    );
    frame.render_widget(widget, area);
}

/// The focused match gets a stronger mark than the other matches.
fn focus_line(line: &Line<'static>) -> Line<'static> {
    let spans = line
        .spans
        .iter()
        .map(|span| {
            if span.style == MATCH_STYLE {
                Span::styled(span.content.clone(), FOCUSED_MATCH_STYLE)
            } else {
                span.clone()
            }
        })
        .collect::<Vec<_>>();
    Line::from(spans)
}

fn render_search_bar(frame: &mut Frame, app: &App, area: Rect) {
    let position = match app.buffer.focus_position() {
        Some((current, total)) => format!("  {current}/{total}"),
        None if app.search_input.is_empty() => String::new(),
        None => "  no matches".to_string(),
    };
    let line = Line::from(vec![
        Span::styled("/", app.theme.hint_style()),
        Span::styled(app.search_input.clone(), app.theme.text_style()),
        Span::styled("_", Style::new().add_modifier(Modifier::SLOW_BLINK)),
        Span::styled(position, MUTED_STYLE),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let line = match &app.notice {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Success => Color::Rgb(184, 187, 38),
                NoticeLevel::Info => app.theme.footer_text,
                NoticeLevel::Warning => Color::Rgb(204, 36, 29),
            };
            Line::from(Span::styled(
                format!(" {}", notice.text),
                Style::new().fg(color).add_modifier(Modifier::BOLD),
            ))
        }
        None => Line::from(format!(" {}", footer_hint(app))),
    };
    frame.render_widget(Paragraph::new(line).style(app.theme.footer_style()), area);
}

fn footer_hint(app: &App) -> &'static str {
    match app.view() {
        ViewState::Browsing => "? help  q quit  1 running  2 all  enter logs",
        ViewState::Viewing(_) => "? help  esc back  / search  f follow  a attributes  e environment",
        ViewState::Searching(_) => "enter older  shift+enter newer  esc done",
    }
}

fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let area = centered(area, 50, 70);
    frame.render_widget(Clear, area);
    let lines: Vec<Line> = HELP_ENTRIES
        .iter()
        .map(|(key, description)| {
            Line::from(vec![
                Span::styled(format!("{key:>12}  "), app.theme.hint_style()),
                Span::styled(*description, app.theme.text_style()),
            ])
        })
        .collect();
    let widget = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(BORDER_STYLE)
            .title(Span::styled(" Help ", app.theme.header_style())),
    );
    frame.render_widget(widget, area);
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn clamp_u16(value: usize) -> u16 {
    value.min(u16::MAX as usize) as u16
}
