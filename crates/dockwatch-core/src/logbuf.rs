//! Bounded, line-addressed log buffer with keyword search.

use crate::highlight::{Highlighter, RenderedText};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::ops::Range;

pub const MATCH_STYLE: Style = Style::new()
    .fg(Color::Rgb(255, 165, 0))
    .bg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const DIM_STYLE: Style = Style::new().fg(Color::DarkGray).add_modifier(Modifier::DIM);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDirection {
    Older,
    Newer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub line: usize,
    pub region: String,
    pub rendered: Line<'static>,
    pub ranges: Vec<Range<usize>>,
}

impl SearchMatch {
    fn build(line: usize, text: &str, ranges: Vec<Range<usize>>) -> Self {
        Self {
            line,
            region: format!("match{line}"),
            rendered: mark_ranges(text, &ranges),
            ranges,
        }
    }
}

#[derive(Debug, Clone)]
struct SearchState {
    keyword: String,
    needle: String,
    matches: Vec<SearchMatch>,
    focus: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct LogBuffer {
    text: RenderedText,
    max_lines: usize,
    highlighter: Highlighter,
    search: Option<SearchState>,
}

impl LogBuffer {
    pub fn new(max_lines: usize, highlighter: Highlighter) -> Self {
        Self {
            text: RenderedText::empty(),
            max_lines: max_lines.max(1),
            highlighter,
            search: None,
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.text.plain
    }

    pub fn keyword(&self) -> Option<&str> {
        self.search.as_ref().map(|search| search.keyword.as_str())
    }

    pub fn clear(&mut self) {
        self.text = RenderedText::empty();
        if let Some(search) = self.search.as_mut() {
            search.matches.clear();
            search.focus = None;
        }
    }

    /// Colours and appends raw text.
    pub fn append(&mut self, text: &str) {
        let rendered = self.highlighter.render(text);
        self.append_rendered(rendered);
    }

    /// Appends text that was already coloured elsewhere. An active search
    /// picks up matching new lines without moving its focus.
    pub fn append_rendered(&mut self, rendered: RenderedText) {
        let first_changed = self.text.extend(rendered);
        let dropped = self.text.keep_last(self.max_lines);
        if dropped > 0 {
            self.rebuild_search(dropped);
            return;
        }
        let Some(search) = self.search.as_mut() else {
            return;
        };
        let focused_line = search
            .focus
            .and_then(|index| search.matches.get(index))
            .map(|found| found.line);
        search.matches.retain(|found| found.line < first_changed);
        for (line, text) in self.text.plain.iter().enumerate().skip(first_changed) {
            let ranges = find_matches(text, &search.needle);
            if !ranges.is_empty() {
                search.matches.push(SearchMatch::build(line, text, ranges));
            }
        }
        search.focus = restore_focus(&search.matches, focused_line);
    }

    /// Replaces the whole buffer, e.g. with a freshly rendered backlog.
    pub fn replace(&mut self, rendered: RenderedText) {
        self.text = rendered;
        self.text.keep_last(self.max_lines);
        if let Some(search) = self.search.take() {
            self.search(&search.keyword);
        }
    }

    /// Case-insensitive search per line. Focus starts on the newest match.
    /// An empty keyword clears the search.
    pub fn search(&mut self, keyword: &str) -> &[SearchMatch] {
        if keyword.is_empty() {
            self.clear_search();
            return &[];
        }
        let needle = fold_case(keyword);
        let matches = self.scan(&needle);
        let focus = matches.len().checked_sub(1);
        let search = self.search.insert(SearchState {
            keyword: keyword.to_string(),
            needle,
            matches,
            focus,
        });
        &search.matches
    }

    pub fn clear_search(&mut self) {
        self.search = None;
    }

    pub fn matches(&self) -> &[SearchMatch] {
        self.search
            .as_ref()
            .map(|search| search.matches.as_slice())
            .unwrap_or(&[])
    }

    pub fn focused(&self) -> Option<&SearchMatch> {
        let search = self.search.as_ref()?;
        search.matches.get(search.focus?)
    }

    /// 1-based position of the focused match and the match count.
    pub fn focus_position(&self) -> Option<(usize, usize)> {
        let search = self.search.as_ref()?;
        Some((search.focus? + 1, search.matches.len()))
    }

    /// Moves focus one match older or newer, wrapping at either end.
    pub fn navigate(&mut self, direction: NavDirection) -> Option<&SearchMatch> {
        let search = self.search.as_mut()?;
        let count = search.matches.len();
        let current = search.focus?;
        let next = match direction {
            NavDirection::Older => (current + count - 1) % count,
            NavDirection::Newer => (current + 1) % count,
        };
        search.focus = Some(next);
        search.matches.get(next)
    }

    /// Display form of one line: coloured normally, marked or dimmed while searching.
    pub fn display_line(&self, index: usize) -> Option<Line<'static>> {
        let plain = self.text.plain.get(index)?;
        let Some(search) = self.search.as_ref() else {
            return self.text.styled.get(index).cloned();
        };
        match search
            .matches
            .binary_search_by_key(&index, |found| found.line)
        {
            Ok(position) => Some(search.matches[position].rendered.clone()),
            Err(_) => Some(Line::from(Span::styled(plain.clone(), DIM_STYLE))),
        }
    }

    pub fn render_window(&self, start: usize, height: usize) -> Vec<Line<'static>> {
        let end = start.saturating_add(height).min(self.len());
        (start.min(end)..end)
            .filter_map(|index| self.display_line(index))
            .collect()
    }

    pub fn render(&self) -> Vec<Line<'static>> {
        self.render_window(0, self.len())
    }

    fn scan(&self, needle: &str) -> Vec<SearchMatch> {
        self.text
            .plain
            .iter()
            .enumerate()
            .filter_map(|(line, text)| {
                let ranges = find_matches(text, needle);
                (!ranges.is_empty()).then(|| SearchMatch::build(line, text, ranges))
            })
            .collect()
    }

    fn rebuild_search(&mut self, dropped: usize) {
        let Some(search) = self.search.take() else {
            return;
        };
        let focused_line = search
            .focus
            .and_then(|index| search.matches.get(index))
            .and_then(|found| found.line.checked_sub(dropped));
        let matches = self.scan(&search.needle);
        let focus = restore_focus(&matches, focused_line);
        self.search = Some(SearchState {
            matches,
            focus,
            ..search
        });
    }
}

fn restore_focus(matches: &[SearchMatch], focused_line: Option<usize>) -> Option<usize> {
    if matches.is_empty() {
        return None;
    }
    focused_line
        .and_then(|line| matches.iter().position(|found| found.line == line))
        .or(Some(matches.len() - 1))
}

/// Lower-cases one character at a time, the way [`find_matches`] folds lines.
/// Whole-string lowering would turn a final capital sigma into `ς`.
pub fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Byte ranges in `text` that match `needle` (already folded with
/// [`fold_case`]), ignoring case.
pub fn find_matches(text: &str, needle: &str) -> Vec<Range<usize>> {
    if needle.is_empty() {
        return Vec::new();
    }
    let mut lowered = String::with_capacity(text.len());
    let mut origin: Vec<(usize, usize)> = Vec::with_capacity(text.len());
    for (start, ch) in text.char_indices() {
        let end = start + ch.len_utf8();
        for lower in ch.to_lowercase() {
            lowered.push(lower);
            origin.extend(std::iter::repeat((start, end)).take(lower.len_utf8()));
        }
    }

    let mut ranges: Vec<Range<usize>> = Vec::new();
    for (position, found) in lowered.match_indices(needle) {
        let start = origin[position].0;
        let end = origin[position + found.len() - 1].1;
        match ranges.last_mut() {
            Some(last) if start < last.end => last.end = last.end.max(end),
            _ => ranges.push(start..end),
        }
    }
    ranges
}

fn mark_ranges(text: &str, ranges: &[Range<usize>]) -> Line<'static> {
    let mut spans = Vec::with_capacity(ranges.len() * 2 + 1);
    let mut cursor = 0;
    for range in ranges {
        if range.start > cursor {
            spans.push(Span::raw(text[cursor..range.start].to_string()));
        }
        spans.push(Span::styled(text[range.clone()].to_string(), MATCH_STYLE));
        cursor = range.end;
    }
    if cursor < text.len() {
        spans.push(Span::raw(text[cursor..].to_string()));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(text: &str) -> LogBuffer {
        let mut buffer = LogBuffer::new(100, Highlighter::plain());
        buffer.append(text);
        buffer
    }

    #[test]
    fn search_is_case_insensitive_and_starts_at_newest() {
        let mut logs = buffer("Error one\nok\nerror two\nERROR three\n");
        let lines = logs
            .search("error")
            .iter()
            .map(|found| found.line)
            .collect::<Vec<_>>();
        assert_eq!(lines, vec![0, 2, 3]);
        let focused = logs.focused().expect("focus");
        assert_eq!(focused.line, 3);
        assert_eq!(focused.region, "match3");
        assert_eq!(logs.focus_position(), Some((3, 3)));
    }

    #[test]
    fn navigation_wraps_both_ways() {
        let mut logs = buffer("a\nb\na\na\n");
        logs.search("a");
        assert_eq!(logs.navigate(NavDirection::Older).map(|m| m.line), Some(2));
        assert_eq!(logs.navigate(NavDirection::Older).map(|m| m.line), Some(0));
        assert_eq!(logs.navigate(NavDirection::Older).map(|m| m.line), Some(3));
        assert_eq!(logs.navigate(NavDirection::Newer).map(|m| m.line), Some(0));
    }

    #[test]
    fn matched_substring_is_marked_and_other_lines_dimmed() {
        let mut logs = buffer("hello\nworld\n");
        logs.search("ELL");
        let rendered = logs.render();
        let spans = &rendered[0].spans;
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].content, "h");
        assert_eq!(spans[1].content, "ell");
        assert_eq!(spans[1].style, MATCH_STYLE);
        assert_eq!(spans[2].content, "o");
        assert_ne!(spans[0].style, MATCH_STYLE);
        assert_eq!(rendered[1].spans[0].style, DIM_STYLE);
    }

    #[test]
    fn empty_keyword_restores_plain_rendering() {
        let mut logs = buffer("alpha\nbeta\n");
        let before = logs.render();
        logs.search("alp");
        assert_ne!(logs.render(), before);
        assert!(logs.search("").is_empty());
        assert_eq!(logs.render(), before);
        logs.search("");
        assert_eq!(logs.render(), before);
        assert!(logs.keyword().is_none());
    }

    #[test]
    fn unicode_case_folding_maps_back_to_line_bytes() {
        let ranges = find_matches("Straße ÄRGER", "ärger");
        assert_eq!(ranges.len(), 1);
        assert_eq!(&"Straße ÄRGER"[ranges[0].clone()], "ÄRGER");
        assert!(find_matches("abc", "").is_empty());
        assert_eq!(find_matches("aaaa", "aa"), vec![0..2, 2..4]);
    }

    #[test]
    fn final_sigma_keyword_finds_its_word() {
        assert_eq!(find_matches("ΟΔΟΣ", &fold_case("ΟΔΟΣ")), vec![0..8]);
        let mut logs = buffer("route ΟΔΟΣ closed\nother\n");
        assert_eq!(logs.search("ΟΔΟΣ").len(), 1);
        assert_eq!(logs.search("οδοσ").len(), 1);
    }

    #[test]
    fn live_appends_join_search_without_moving_focus() {
        let mut logs = buffer("warn a\n");
        logs.search("warn");
        logs.append("info\nwarn b\n");
        assert_eq!(logs.matches().len(), 2);
        assert_eq!(logs.focused().map(|m| m.line), Some(0));

        logs.append("par");
        logs.append("tial warn\n");
        assert_eq!(logs.matches().len(), 3);
        assert_eq!(logs.lines()[3], "partial warn");
    }

    #[test]
    fn trimming_rebuilds_search() {
        let mut logs = LogBuffer::new(3, Highlighter::plain());
        logs.append("x1\ny\nx2\n");
        logs.search("x");
        logs.navigate(NavDirection::Newer);
        assert_eq!(logs.focused().map(|m| m.line), Some(0));

        logs.append("x3\n");
        assert_eq!(logs.lines(), ["y", "x2", "x3"]);
        let lines = logs.matches().iter().map(|m| m.line).collect::<Vec<_>>();
        assert_eq!(lines, vec![1, 2]);
        assert_eq!(logs.focused().map(|m| m.line), Some(2));
    }
}
