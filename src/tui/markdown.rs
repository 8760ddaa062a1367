use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};

/// Converts markdown text to ratatui Text for rendering in the terminal UI
pub fn markdown_to_ratatui_text(markdown: &str) -> Text<'static> {
    let mut renderer = Renderer::default();
    for event in Parser::new_ext(markdown, Options::all()) {
        renderer.event(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    style: Style,
    /// Open lists, with the next number for ordered ones
    lists: Vec<Option<u64>>,
    in_code_block: bool,
}

impl Renderer {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Text(text) if self.in_code_block => {
                // Code blocks keep their own line breaks
                for (i, line) in text.split('\n').enumerate() {
                    if i > 0 {
                        self.flush();
                    }
                    if !line.is_empty() {
                        self.current.push(Span::styled(line.to_string(), self.style));
                    }
                }
            }
            Event::Text(text) => self.current.push(Span::styled(text.to_string(), self.style)),
            Event::Code(code) => self
                .current
                .push(Span::styled(code.to_string(), Style::default().fg(Color::Green))),
            Event::SoftBreak => self.current.push(Span::raw(" ")),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::styled("─".repeat(40), Style::default().fg(Color::DarkGray)));
            }
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                let color = match level {
                    HeadingLevel::H1 => Color::Rgb(255, 99, 71),
                    HeadingLevel::H2 => Color::Rgb(70, 130, 180),
                    _ => Color::Cyan,
                };
                self.style = Style::default().fg(color).add_modifier(Modifier::BOLD);
            }
            Tag::Paragraph => self.flush(),
            Tag::Strong => self.style = self.style.add_modifier(Modifier::BOLD),
            Tag::Emphasis => self.style = self.style.add_modifier(Modifier::ITALIC),
            Tag::BlockQuote(_) => {
                self.flush();
                self.style = Style::default().fg(Color::Yellow);
                self.current.push(Span::raw("│ "));
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                self.in_code_block = true;
                self.style = Style::default().fg(Color::Green);
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.lines.push(Line::styled(
                            format!("[{lang}]"),
                            Style::default().fg(Color::Blue).add_modifier(Modifier::ITALIC),
                        ));
                    }
                }
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{number}.");
                        *number += 1;
                        marker
                    }
                    _ => "•".to_string(),
                };
                self.current.push(Span::raw(format!("{indent}{marker} ")));
            }
            Tag::Link { .. } => {
                self.style = Style::default()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::UNDERLINED);
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) | TagEnd::Paragraph => {
                self.style = Style::default();
                self.flush();
                // No gap between the lines of a tight list
                if self.lists.is_empty() {
                    self.lines.push(Line::default());
                }
            }
            TagEnd::Strong => self.style = self.style.remove_modifier(Modifier::BOLD),
            TagEnd::Emphasis => self.style = self.style.remove_modifier(Modifier::ITALIC),
            TagEnd::BlockQuote(_) | TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.style = Style::default();
                self.flush();
                self.lines.push(Line::default());
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.lines.push(Line::default());
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Link => self.style = Style::default(),
            _ => {}
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
    }

    fn finish(mut self) -> Text<'static> {
        self.flush();
        while self.lines.last().is_some_and(|line| line.spans.is_empty()) {
            self.lines.pop();
        }
        Text::from(self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &Text<'_>) -> Vec<String> {
        text.lines
            .iter()
            .map(|line| line.spans.iter().map(|span| span.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_paragraphs_are_separated() {
        let text = markdown_to_ratatui_text("First line\ncontinued.\n\nSecond.");
        assert_eq!(plain(&text), vec!["First line continued.", "", "Second."]);
    }

    #[test]
    fn test_lists() {
        let text = markdown_to_ratatui_text("- alpha\n- beta\n\n1. one\n2. two");
        assert_eq!(
            plain(&text),
            vec!["• alpha", "• beta", "", "1. one", "2. two"]
        );
    }

    #[test]
    fn test_code_block_keeps_lines() {
        let text = markdown_to_ratatui_text("```sh\nmake\nmake install\n```");
        assert_eq!(plain(&text), vec!["[sh]", "make", "make install"]);
    }

    #[test]
    fn test_emphasis_is_styled() {
        let text = markdown_to_ratatui_text("**Sources**");
        assert!(text.lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }
}
