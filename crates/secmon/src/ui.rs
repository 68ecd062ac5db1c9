use crate::input::KEY_HINTS;
use crate::theme;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};
use secmon_core::config::{TOP_INSTANCES, TOP_REGIONS};
use secmon_core::format::{self, FAILURE_ONLY_GLYPH, SUCCESS_ONLY_GLYPH};
use secmon_core::DashboardView;

const NO_DATA: &str = "(no data)";

pub fn render(f: &mut Frame, view: &DashboardView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(5)])
        .split(f.size());
    render_header(f, view, rows[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(rows[1]);
    render_logs(f, view, body[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(4)])
        .split(body[1]);
    render_stats(f, view, side[0]);
    render_timeline(f, view, side[1]);
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(theme::BORDER_STYLE)
        .title(Span::styled(title, theme::TITLE_STYLE))
}

fn render_header(f: &mut Frame, view: &DashboardView, area: Rect) {
    let header = format::header_line(view);
    let style = if view.live.paused {
        theme::PAUSED_STYLE
    } else {
        theme::HEADER_STYLE
    };
    let mut status = header_spans(header, &view.status.region, &view.status.state, style);
    if view.dropped_lines > 0 {
        status.push(Span::styled(
            format!("  dropped={}", view.dropped_lines),
            theme::FAILURE_STYLE,
        ));
    }
    if view.untimed_records > 0 {
        status.push(Span::styled(
            format!("  untimed={}", view.untimed_records),
            theme::PAUSED_STYLE,
        ));
    }
    let lines = vec![
        Line::from(status),
        Line::from(Span::styled(KEY_HINTS, theme::HINT_STYLE)),
    ];
    f.render_widget(Paragraph::new(lines), area);
}

/// Split the header so the connection state carries its own colour.
fn header_spans(header: String, region: &str, state: &str, style: Style) -> Vec<Span<'static>> {
    let prefix = format!("pia={region}:");
    let split = header
        .strip_prefix(prefix.as_str())
        .and_then(|rest| rest.strip_prefix(state))
        .map(str::to_string);
    match split {
        Some(rest) => vec![
            Span::styled(prefix, style),
            Span::styled(state.to_string(), theme::status_style(state)),
            Span::styled(rest, style),
        ],
        None => vec![Span::styled(header, style)],
    }
}

fn render_logs(f: &mut Frame, view: &DashboardView, area: Rect) {
    let block = panel("Logs");
    let inner = block.inner(area);
    f.render_widget(block, area);

    if view.logs.is_empty() {
        f.render_widget(Paragraph::new(Span::styled(NO_DATA, theme::EMPTY_STYLE)), inner);
        return;
    }
    let visible = usize::from(inner.height);
    let items: Vec<ListItem> = view.logs[view.logs.len().saturating_sub(visible)..]
        .iter()
        .map(|line| ListItem::new(Span::styled(line.as_str(), theme::log_line_style(line))))
        .collect();
    f.render_widget(List::new(items), inner);
}

fn render_stats(f: &mut Frame, view: &DashboardView, area: Rect) {
    let block = panel("Stats");
    let inner = block.inner(area);
    f.render_widget(block, area);

    if view.counters.total() == 0 {
        f.render_widget(Paragraph::new(Span::styled(NO_DATA, theme::EMPTY_STYLE)), inner);
        return;
    }
    let text = format!(
        "{}\n{}",
        format::stats_block(view, TOP_REGIONS),
        format::instances_block(&view.counters, TOP_INSTANCES)
    );
    let lines: Vec<Line> = text
        .lines()
        .map(|line| Line::from(Span::styled(line.to_string(), theme::TEXT_STYLE)))
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}

fn render_timeline(f: &mut Frame, view: &DashboardView, area: Rect) {
    let title = format!("Timeline ({}s buckets)", view.live.bucket_secs);
    let block = panel(&title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if view.timeline.is_empty() {
        f.render_widget(Paragraph::new(Span::styled(NO_DATA, theme::EMPTY_STYLE)), inner);
        return;
    }
    let rows = format::timeline_rows(&view.timeline, usize::from(inner.width));
    let density: Vec<Span> = rows
        .density
        .chars()
        .map(|glyph| {
            let style = match glyph {
                SUCCESS_ONLY_GLYPH => theme::SUCCESS_STYLE,
                FAILURE_ONLY_GLYPH => theme::FAILURE_STYLE,
                _ => theme::TEXT_STYLE,
            };
            Span::styled(glyph.to_string(), style)
        })
        .collect();
    let lines = vec![
        Line::from(density),
        Line::from(Span::styled(rows.failures, theme::FAILURE_STYLE)),
    ];
    f.render_widget(Paragraph::new(lines), inner);
}
