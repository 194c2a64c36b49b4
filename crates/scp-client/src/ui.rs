//! Terminal layout: scrollback, input line, status bar.
//!
//! Replaces `familycom/src/ui/`'s three-panel layout (peer list + messages
//! + input) with a single scrollback pane, since an SCP v1.0 session has at
//! most one chat partner at a time — there is nothing to list. Grounded on
//! the same `ratatui` primitives `familycom/src/ui/layout.rs`,
//! `messages.rs`, and `input.rs` use.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::ClientApp;

/// Renders the complete TUI to the given frame.
pub fn render(frame: &mut Frame, app: &ClientApp) {
    let area = frame.area();

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // scrollback
            Constraint::Length(3), // input
            Constraint::Length(1), // status bar
        ])
        .split(area);

    render_scrollback(frame, app, vertical[0]);
    render_input(frame, app, vertical[1]);
    render_status_bar(frame, app, vertical[2]);
}

fn render_scrollback(frame: &mut Frame, app: &ClientApp, area: Rect) {
    let block = Block::default()
        .title(" scp-client ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let lines: Vec<Line> = app.scrollback.iter().map(|l| Line::from(l.as_str())).collect();

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, app: &ClientApp, area: Rect) {
    let block = Block::default()
        .title(" message / command (Enter to send) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let text = format!("{}{}", app.prompt(), app.input);
    let input_widget = Paragraph::new(text).style(Style::default().fg(Color::White)).block(block);
    frame.render_widget(input_widget, area);

    let cursor_x = area.x + 1 + visual_cursor_offset(&app.prompt(), &app.input, app.input_cursor) as u16;
    let cursor_y = area.y + 1;
    frame.set_cursor_position((cursor_x, cursor_y));
}

fn render_status_bar(frame: &mut Frame, app: &ClientApp, area: Rect) {
    let status_text = Line::from(vec![
        Span::styled(" SCP v1.0 ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw("| "),
        Span::styled(&app.status, Style::default().fg(Color::Green)),
    ]);
    let status_bar = Paragraph::new(status_text).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(status_bar, area);
}

/// Visual column offset of the cursor, counting the prompt's characters
/// plus however much of `input` precedes `byte_cursor`.
fn visual_cursor_offset(prompt: &str, input: &str, byte_cursor: usize) -> usize {
    prompt.chars().count() + input[..byte_cursor].chars().count()
}
