//! Syntax colouring for log text and inspect documents.
//!
//! Colouring is best effort: any failure falls back to the raw text.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SyntectStyle, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_GRAMMAR: &str = "sh";
pub const DEFAULT_THEME: &str = "base16-mocha.dark";

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme_set() -> &'static ThemeSet {
    THEME_SET.get_or_init(ThemeSet::load_defaults)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HighlightError {
    #[error("unknown grammar: {0}")]
    UnknownGrammar(String),
    #[error("unknown theme: {0}")]
    UnknownTheme(String),
    #[error("colorizer failed: {0}")]
    Colorizer(String),
}

/// Log lines are coloured independently, so the same line gets the same
/// colours whether it arrives in a backlog chunk or as a live frame.
/// Documents keep one parse state across lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighter {
    grammar: Option<String>,
    theme: String,
    per_line: bool,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(DEFAULT_GRAMMAR, DEFAULT_THEME)
    }
}

impl Highlighter {
    pub fn new(grammar: impl Into<String>, theme: impl Into<String>) -> Self {
        Self {
            grammar: Some(grammar.into()),
            theme: theme.into(),
            per_line: true,
        }
    }

    /// A highlighter that never colours.
    pub fn plain() -> Self {
        Self {
            grammar: None,
            theme: DEFAULT_THEME.to_string(),
            per_line: true,
        }
    }

    pub fn json(theme: impl Into<String>) -> Self {
        Self {
            per_line: false,
            ..Self::new("json", theme)
        }
    }

    pub fn is_plain(&self) -> bool {
        self.grammar.is_none()
    }

    /// Colours `text`, degrading to unstyled lines on any failure.
    pub fn render(&self, text: &str) -> RenderedText {
        match self.try_render(text) {
            Ok(rendered) => rendered,
            Err(err) => {
                debug!(event = "highlight_fallback", error = %err);
                RenderedText::plain(text)
            }
        }
    }

    pub fn try_render(&self, text: &str) -> Result<RenderedText, HighlightError> {
        let Some(grammar) = self.grammar.as_deref() else {
            return Ok(RenderedText::plain(text));
        };
        let syntaxes = syntax_set();
        let syntax = syntaxes
            .find_syntax_by_token(grammar)
            .ok_or_else(|| HighlightError::UnknownGrammar(grammar.to_string()))?;
        let theme = theme_set()
            .themes
            .get(&self.theme)
            .ok_or_else(|| HighlightError::UnknownTheme(self.theme.clone()))?;

        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut rendered = RenderedText::empty();
        for raw in LinesWithEndings::from(text) {
            if self.per_line {
                highlighter = HighlightLines::new(syntax, theme);
            }
            let ranges = highlighter
                .highlight_line(raw, syntaxes)
                .map_err(|err| HighlightError::Colorizer(err.to_string()))?;
            let spans = ranges
                .into_iter()
                .filter_map(|(style, piece)| {
                    let piece = strip_line_end(piece);
                    (!piece.is_empty()).then(|| Span::styled(piece.to_string(), convert_style(style)))
                })
                .collect::<Vec<_>>();
            rendered.plain.push(strip_line_end(raw).to_string());
            rendered.styled.push(Line::from(spans));
        }
        rendered.ends_with_newline = text.is_empty() || text.ends_with('\n');
        Ok(rendered)
    }
}

fn strip_line_end(piece: &str) -> &str {
    piece.trim_end_matches(['\n', '\r'])
}

fn convert_style(style: SyntectStyle) -> Style {
    let fg = style.foreground;
    let mut converted = Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b));
    if style.font_style.contains(FontStyle::BOLD) {
        converted = converted.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        converted = converted.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        converted = converted.add_modifier(Modifier::UNDERLINED);
    }
    converted
}

/// Text split into display lines, with a plain and a styled copy of each.
///
/// `ends_with_newline` is false when the last line is still open and the
/// next extension continues it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedText {
    pub plain: Vec<String>,
    pub styled: Vec<Line<'static>>,
    pub ends_with_newline: bool,
}

impl Default for RenderedText {
    fn default() -> Self {
        Self::empty()
    }
}

impl RenderedText {
    pub fn empty() -> Self {
        Self {
            plain: Vec::new(),
            styled: Vec::new(),
            ends_with_newline: true,
        }
    }

    pub fn plain(text: &str) -> Self {
        let mut rendered = Self::empty();
        for raw in LinesWithEndings::from(text) {
            let line = strip_line_end(raw).to_string();
            rendered.styled.push(Line::from(line.clone()));
            rendered.plain.push(line);
        }
        rendered.ends_with_newline = text.is_empty() || text.ends_with('\n');
        rendered
    }

    pub fn len(&self) -> usize {
        self.plain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_empty()
    }

    /// Appends `other`, joining its first line onto an open last line.
    /// Returns the index of the first line that changed.
    pub fn extend(&mut self, other: RenderedText) -> usize {
        let RenderedText {
            plain,
            styled,
            ends_with_newline,
        } = other;
        if plain.is_empty() {
            return self.plain.len();
        }
        let mut plain = plain.into_iter();
        let mut styled = styled.into_iter();
        let first_changed;
        if !self.ends_with_newline && !self.plain.is_empty() {
            first_changed = self.plain.len() - 1;
            if let (Some(head), Some(last)) = (plain.next(), self.plain.last_mut()) {
                last.push_str(&head);
            }
            if let (Some(head), Some(last)) = (styled.next(), self.styled.last_mut()) {
                last.spans.extend(head.spans);
            }
        } else {
            first_changed = self.plain.len();
        }
        self.plain.extend(plain);
        self.styled.extend(styled);
        self.ends_with_newline = ends_with_newline;
        first_changed
    }

    /// Drops lines from the front so at most `max` remain. Returns how many were dropped.
    pub fn keep_last(&mut self, max: usize) -> usize {
        let excess = self.plain.len().saturating_sub(max);
        if excess > 0 {
            self.plain.drain(..excess);
            self.styled.drain(..excess);
        }
        excess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn shell_grammar_colours_without_changing_text() {
        let highlighter = Highlighter::default();
        let rendered = highlighter
            .try_render("echo \"hello\"\nexport PATH=/bin\n")
            .expect("sh grammar and default theme are bundled");
        assert_eq!(rendered.plain, vec!["echo \"hello\"", "export PATH=/bin"]);
        assert!(rendered.ends_with_newline);
        for (plain, styled) in rendered.plain.iter().zip(&rendered.styled) {
            assert_eq!(&span_text(styled), plain);
        }
        assert!(rendered.styled[0]
            .spans
            .iter()
            .all(|span| matches!(span.style.fg, Some(Color::Rgb(..)))));
    }

    #[test]
    fn open_quote_does_not_leak_into_next_line() {
        let highlighter = Highlighter::default();
        let text = "echo \"start 1\nstill inside quote\nend\"\n";
        let whole = highlighter.try_render(text).expect("render");
        for (index, line) in LinesWithEndings::from(text).enumerate() {
            let alone = highlighter.try_render(line).expect("render line");
            assert_eq!(alone.styled[0], whole.styled[index], "line {index}");
        }
    }

    #[test]
    fn unknown_grammar_degrades_to_plain_text() {
        let highlighter = Highlighter::new("no-such-language", DEFAULT_THEME);
        assert!(matches!(
            highlighter.try_render("x"),
            Err(HighlightError::UnknownGrammar(_))
        ));
        let rendered = highlighter.render("a\nb");
        assert_eq!(rendered, RenderedText::plain("a\nb"));
        assert!(!rendered.ends_with_newline);

        let bad_theme = Highlighter::new(DEFAULT_GRAMMAR, "no-such-theme");
        assert!(matches!(
            bad_theme.try_render("x"),
            Err(HighlightError::UnknownTheme(_))
        ));
    }

    #[test]
    fn extend_joins_open_line() {
        let mut text = RenderedText::plain("one\ntw");
        let first = text.extend(RenderedText::plain("o\nthree\n"));
        assert_eq!(first, 1);
        assert_eq!(text.plain, vec!["one", "two", "three"]);
        assert_eq!(span_text(&text.styled[1]), "two");
        assert!(text.ends_with_newline);

        let first = text.extend(RenderedText::plain("four"));
        assert_eq!(first, 3);
        assert!(!text.ends_with_newline);
    }

    #[test]
    fn keep_last_trims_front() {
        let mut text = RenderedText::plain("1\n2\n3\n4\n");
        assert_eq!(text.keep_last(2), 2);
        assert_eq!(text.plain, vec!["3", "4"]);
        assert_eq!(text.keep_last(5), 0);
    }
}
