use crate::app::{App, DetailKind, Overlay};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use dockwatch_core::commands::LifecycleCommand;
use dockwatch_core::focus::ViewState;
use dockwatch_core::logbuf::NavDirection;

/// Applies one terminal event. Returns true when the app should exit.
pub fn handle_input(event: Event, app: &mut App) -> bool {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(key, app),
        _ => false,
    }
}

pub fn handle_key(key: KeyEvent, app: &mut App) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return true;
    }

    match &app.overlay {
        Overlay::Help => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.overlay = Overlay::None;
            }
            return false;
        }
        Overlay::Detail { .. } => {
            handle_detail_key(key, app);
            return false;
        }
        Overlay::None => {}
    }

    match app.view().clone() {
        ViewState::Browsing => handle_browse_key(key, app),
        ViewState::Viewing(_) => {
            handle_viewing_key(key, app);
            false
        }
        ViewState::Searching(_) => {
            handle_search_key(key, app);
            false
        }
    }
}

fn handle_browse_key(key: KeyEvent, app: &mut App) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.should_quit = true;
            return true;
        }
        KeyCode::Char('?') => app.overlay = Overlay::Help,
        KeyCode::Char('j') | KeyCode::Down => app.table.move_selection(1),
        KeyCode::Char('k') | KeyCode::Up => app.table.move_selection(-1),
        KeyCode::Char('g') | KeyCode::Home => app.table.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.table.select_last(),
        KeyCode::Enter | KeyCode::Char('l') => app.open_selected_logs(),
        KeyCode::Char('1') => app.set_filter(false),
        KeyCode::Char('2') => app.set_filter(true),
        KeyCode::Char('s') => app.run_command(LifecycleCommand::Start),
        KeyCode::Char('t') => app.run_command(LifecycleCommand::Stop),
        KeyCode::Char('p') => app.run_command(LifecycleCommand::Pause),
        KeyCode::Char('u') => app.run_command(LifecycleCommand::Unpause),
        KeyCode::Char('D') => app.run_command(LifecycleCommand::Remove),
        _ => {}
    }
    false
}

fn handle_viewing_key(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Esc => {
            if app.buffer.keyword().is_some() {
                app.clear_search();
            } else {
                app.enter_browse();
                app.refresh_header();
            }
        }
        KeyCode::Char('?') => app.overlay = Overlay::Help,
        KeyCode::Char('/') | KeyCode::Enter => app.begin_search(),
        KeyCode::Char('n') => app.navigate_matches(NavDirection::Older),
        KeyCode::Char('N') => app.navigate_matches(NavDirection::Newer),
        KeyCode::Char('a') => app.show_detail(DetailKind::Attributes),
        KeyCode::Char('e') => app.show_detail(DetailKind::Environment),
        KeyCode::Char('f') => app.toggle_follow(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_logs(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_logs(-1),
        KeyCode::PageDown => app.scroll_logs(app.page_size()),
        KeyCode::PageUp => app.scroll_logs(-app.page_size()),
        KeyCode::Char('g') | KeyCode::Home => app.log_scroll = 0,
        KeyCode::Char('G') | KeyCode::End => app.scroll_logs_to_end(),
        _ => {}
    }
}

fn handle_search_key(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Esc => app.finish_search_input(),
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
            app.navigate_matches(NavDirection::Newer)
        }
        KeyCode::Enter | KeyCode::Down | KeyCode::Tab => app.navigate_matches(NavDirection::Older),
        KeyCode::Up | KeyCode::BackTab => app.navigate_matches(NavDirection::Newer),
        KeyCode::Backspace => app.pop_search_char(),
        KeyCode::Char(ch) => app.push_search_char(ch),
        _ => {}
    }
}

fn handle_detail_key(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.close_detail(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_detail(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_detail(-1),
        KeyCode::PageDown => app.scroll_detail(app.page_size()),
        KeyCode::PageUp => app.scroll_detail(-app.page_size()),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_detail(isize::MIN),
        _ => {}
    }
}
