use dockwatch_core::config::ThemeConfig;
use dockwatch_core::LifecycleState;
use ratatui::style::{Color, Modifier, Style};

pub const BORDER_STYLE: Style = Style::new().fg(Color::Rgb(102, 92, 84));
pub const MUTED_STYLE: Style = Style::new().fg(Color::Rgb(146, 131, 116));
pub const FOCUSED_MATCH_STYLE: Style = Style::new()
    .bg(Color::Rgb(250, 189, 47))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);

pub mod icons {
    pub const FOLLOW: &str = ">>";
    pub const PAUSED: &str = "||";
}

/// Parses a colour name or `#rrggbb`.
pub fn parse_color(input: &str) -> Option<Color> {
    let value = input.trim();
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        return Some(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?));
    }
    let color = match value.to_lowercase().as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "gray" | "grey" => Color::Gray,
        "darkgray" | "darkgrey" => Color::DarkGray,
        "white" => Color::White,
        "reset" | "default" => Color::Reset,
        _ => return None,
    };
    Some(color)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Theme {
    pub header: Color,
    pub selected: Color,
    pub fg: Color,
    pub hint: Color,
    pub footer_text: Color,
    pub footer_bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_config(&ThemeConfig::default())
    }
}

impl Theme {
    /// Unknown colour values fall back to the built-in palette one by one.
    pub fn from_config(config: &ThemeConfig) -> Self {
        let pick = |value: &str, fallback: Color| parse_color(value).unwrap_or(fallback);
        Self {
            header: pick(&config.header, Color::Rgb(142, 192, 124)),
            selected: pick(&config.selected, Color::Rgb(131, 165, 152)),
            fg: pick(&config.fg, Color::White),
            hint: pick(&config.hint, Color::Rgb(250, 189, 47)),
            footer_text: pick(&config.footer_text, Color::Black),
            footer_bg: pick(&config.footer_bg, Color::Rgb(131, 165, 152)),
        }
    }

    pub fn header_style(&self) -> Style {
        Style::new().fg(self.header).add_modifier(Modifier::BOLD)
    }

    pub fn selected_style(&self) -> Style {
        Style::new()
            .bg(self.selected)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text_style(&self) -> Style {
        Style::new().fg(self.fg)
    }

    pub fn hint_style(&self) -> Style {
        Style::new().fg(self.hint).add_modifier(Modifier::BOLD)
    }

    pub fn footer_style(&self) -> Style {
        Style::new().fg(self.footer_text).bg(self.footer_bg)
    }
}

pub fn zebra_row_style(index: usize) -> Style {
    let bg = if index % 2 == 0 {
        Color::Rgb(18, 20, 26)
    } else {
        Color::Rgb(24, 27, 34)
    };
    Style::new().bg(bg)
}

pub fn state_color(state: LifecycleState) -> Color {
    match state {
        LifecycleState::Running => Color::Rgb(184, 187, 38),
        LifecycleState::Paused => Color::Rgb(250, 189, 47),
        LifecycleState::Restarting => Color::Rgb(131, 165, 152),
        LifecycleState::Dead => Color::Rgb(214, 93, 14),
        LifecycleState::Exited => Color::Rgb(254, 128, 25),
        _ => Color::Rgb(146, 131, 116),
    }
}
