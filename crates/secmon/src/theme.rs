use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const PAUSED_STYLE: Style = Style::new()
    .fg(Color::Rgb(250, 189, 47))
    .add_modifier(Modifier::BOLD);
pub const HINT_STYLE: Style = Style::new().fg(Color::Rgb(146, 131, 116));
pub const BORDER_STYLE: Style = Style::new().fg(Color::Rgb(80, 73, 69));
pub const TITLE_STYLE: Style = Style::new()
    .fg(Color::Rgb(131, 165, 152))
    .add_modifier(Modifier::BOLD);
pub const TEXT_STYLE: Style = Style::new().fg(Color::Rgb(235, 219, 178));
pub const SUCCESS_STYLE: Style = Style::new().fg(Color::Rgb(184, 187, 38));
pub const FAILURE_STYLE: Style = Style::new().fg(Color::Rgb(251, 73, 52));
pub const EMPTY_STYLE: Style = Style::new()
    .fg(Color::Rgb(146, 131, 116))
    .add_modifier(Modifier::ITALIC);

/// Colour a tailed log line by its source prefix.
pub fn log_line_style(line: &str) -> Style {
    if line.starts_with("[tui]") {
        PAUSED_STYLE
    } else if line.contains("success=false") || line.contains("Traceback") {
        FAILURE_STYLE
    } else {
        TEXT_STYLE
    }
}

pub fn status_style(state: &str) -> Style {
    match state.to_ascii_lowercase().as_str() {
        "connected" => SUCCESS_STYLE,
        "n/a" | "disconnected" => FAILURE_STYLE,
        _ => HINT_STYLE,
    }
}
