use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::tui::app::{App, Role};

const SPINNER_FRAMES: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

/// Draw the UI
pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Conversation
            Constraint::Length(3), // Input field
            Constraint::Length(1), // Key hints
        ])
        .split(f.area());

    render_messages(f, app, chunks[0]);
    render_input(f, app, chunks[1]);
    render_hints(f, chunks[2]);
}

fn render_messages(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        format!("sitechat: {}", app.site),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ));

    let mut lines: Vec<Line> = Vec::new();
    for (i, message) in app.messages.iter().enumerate() {
        let (label, color) = match message.role {
            Role::User => ("You", Color::Green),
            Role::Assistant if message.failed => ("Assistant", Color::Red),
            Role::Assistant => ("Assistant", Color::Blue),
            Role::System => ("sitechat", Color::Yellow),
        };
        lines.push(Line::from(Span::styled(
            format!("{label}: "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));

        if message.failed {
            let error_style = Style::default().fg(Color::Red);
            lines.extend(message.text.lines.iter().cloned().map(|line| line.patch_style(error_style)));
        } else {
            lines.extend(message.text.lines.iter().cloned());
        }

        if i + 1 < app.messages.len() {
            lines.push(Line::styled(
                "─".repeat(area.width.saturating_sub(2) as usize),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }

    if app.is_loading {
        lines.push(Line::styled(
            format!("{} Searching and thinking...", SPINNER_FRAMES[app.spinner_frame]),
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ));
    }

    let total_height = lines.len();
    let messages = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll_position.min(u16::MAX as usize) as u16, 0));

    let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
        .begin_symbol(Some("↑"))
        .end_symbol(Some("↓"));
    let mut scrollbar_state = ScrollbarState::default()
        .content_length(total_height)
        .position(app.scroll_position);

    f.render_widget(messages, area);
    f.render_stateful_widget(
        scrollbar,
        area.inner(Margin {
            vertical: 1,
            horizontal: 0,
        }),
        &mut scrollbar_state,
    );
}

fn render_input(f: &mut Frame, app: &App, area: Rect) {
    let title = if app.is_loading { "Question (waiting for answer)" } else { "Question" };
    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        title,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ));
    let inner_area = block.inner(area);

    // Keep the cursor in view on long questions
    let before_cursor = &app.input[..app.cursor_byte_index()];
    let cursor_x = before_cursor.width() as u16;
    let offset = cursor_x.saturating_sub(inner_area.width.saturating_sub(1));

    let input = Paragraph::new(app.input.as_str())
        .block(block)
        .scroll((0, offset));
    f.render_widget(input, area);

    f.set_cursor_position((inner_area.x + cursor_x - offset, inner_area.y));
}

fn render_hints(f: &mut Frame, area: Rect) {
    let key = Style::default().fg(Color::Cyan);
    let hint = Style::default().fg(Color::DarkGray);
    let line = Line::from(vec![
        Span::styled(" Enter", key),
        Span::styled(" ask  ", hint),
        Span::styled("Ctrl+L", key),
        Span::styled(" new conversation  ", hint),
        Span::styled("Esc", key),
        Span::styled(" quit", hint),
    ]);
    f.render_widget(Paragraph::new(line), area);
}
