use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEventKind};
use ratatui::text::Text;
use sitechat::chatbot::{AnswerKind, ConversationTurn};
use tokio::sync::mpsc;

use crate::tui::error::{Error, Result};
use crate::tui::event::{AppEvent, Event, EventHandler};
use crate::tui::markdown::markdown_to_ratatui_text;

/// Who a chat line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    /// Help text and notices from the interface itself
    System,
}

/// A message as displayed in the conversation pane
pub struct ChatMessage {
    pub role: Role,
    pub text: Text<'static>,
    /// The answer could not be produced
    pub failed: bool,
}

/// Application state
pub struct App {
    /// Site the conversation is about
    pub site: String,
    /// Messages shown in the conversation pane
    pub messages: Vec<ChatMessage>,
    /// Current input text
    pub input: String,
    /// Cursor position in the input field, in characters
    pub cursor_position: usize,
    pub should_quit: bool,
    /// Waiting for the chatbot
    pub is_loading: bool,
    /// Counter for spinner animation frames
    pub spinner_frame: usize,
    /// Current scroll position, in lines
    pub scroll_position: usize,
    event_handler: EventHandler,
}

impl App {
    pub fn new(site: &str) -> Self {
        Self {
            site: site.to_string(),
            messages: Vec::new(),
            input: String::new(),
            cursor_position: 0,
            should_quit: false,
            is_loading: false,
            spinner_frame: 0,
            scroll_position: 0,
            event_handler: EventHandler::new(),
        }
    }

    /// Wait for the next event and apply it to the application state
    pub async fn next_event(&mut self) -> Option<Event> {
        let event = self.event_handler.next().await?;
        let handled = match &event {
            Event::Terminal(term_event) => self.handle_terminal_event(term_event),
            Event::Tick => {
                self.tick_spinner();
                Ok(())
            }
            Event::App(app_event) => {
                self.handle_app_event(app_event);
                Ok(())
            }
        };
        if let Err(e) = handled {
            tracing::error!("Error handling event: {}", e);
        }
        Some(event)
    }

    pub fn event_sender(&self) -> mpsc::UnboundedSender<Event> {
        self.event_handler.sender()
    }

    fn send(&self, event: AppEvent) -> Result<()> {
        self.event_handler
            .sender()
            .send(Event::App(event))
            .map_err(|e| Error::Event(e.to_string()))
    }

    fn handle_terminal_event(&mut self, event: &crossterm::event::Event) -> Result<()> {
        match event {
            crossterm::event::Event::Key(key) => self.handle_key_event(*key)?,
            crossterm::event::Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::ScrollUp => self.scroll_by(-5),
                MouseEventKind::ScrollDown => self.scroll_by(5),
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    fn handle_app_event(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Submit(question) => {
                self.push_message(Role::User, question, false);
                self.is_loading = true;
                self.reset_input();
            }
            AppEvent::Answer(turn) => {
                self.is_loading = false;
                self.add_turn(turn);
            }
            AppEvent::ChatError(error) => {
                self.is_loading = false;
                self.push_message(Role::Assistant, &format!("Error: {error}"), true);
            }
            AppEvent::Clear => {
                self.messages.clear();
                self.scroll_position = 0;
                self.add_system_message("*New conversation.*");
            }
            AppEvent::Quit => {
                self.should_quit = true;
            }
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.send(AppEvent::Quit)?,
            KeyCode::Char('c') if ctrl => self.send(AppEvent::Quit)?,
            KeyCode::Char('l') if ctrl => {
                if !self.is_loading {
                    self.send(AppEvent::Clear)?;
                }
            }
            KeyCode::Enter => {
                let question = self.input.trim().to_string();
                // One question at a time
                if !question.is_empty() && !self.is_loading {
                    self.send(AppEvent::Submit(question))?;
                }
            }
            KeyCode::Char(c) => self.insert_char(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete_char(),
            KeyCode::Left => self.move_cursor_left(),
            KeyCode::Right => self.move_cursor_right(),
            KeyCode::Home => self.cursor_position = 0,
            KeyCode::End => self.cursor_position = self.input.chars().count(),
            KeyCode::Up => self.scroll_by(-1),
            KeyCode::Down => self.scroll_by(1),
            _ => {}
        }
        Ok(())
    }

    /// Show a notice from the interface
    pub fn add_system_message(&mut self, markdown: &str) {
        self.push_message(Role::System, markdown, false);
    }

    /// Show the answer of a finished turn
    pub fn add_turn(&mut self, turn: &ConversationTurn) {
        self.push_message(
            Role::Assistant,
            &turn_markdown(turn),
            turn.kind == AnswerKind::Failed,
        );
    }

    fn push_message(&mut self, role: Role, markdown: &str, failed: bool) {
        self.messages.push(ChatMessage {
            role,
            text: markdown_to_ratatui_text(markdown),
            failed,
        });
        // Follow the conversation
        self.scroll_position = self.content_height().saturating_sub(1);
    }

    /// Lines needed by all messages, before wrapping
    pub fn content_height(&self) -> usize {
        self.messages
            .iter()
            .map(|message| message.text.height() + 2) // role line and separator
            .sum()
    }

    pub fn reset_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    /// Byte offset of the cursor in `input`
    pub fn cursor_byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            self.cursor_position += 1;
        }
    }

    pub fn insert_char(&mut self, c: char) {
        let index = self.cursor_byte_index();
        self.input.insert(index, c);
        self.cursor_position += 1;
    }

    pub fn delete_char(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            let index = self.cursor_byte_index();
            self.input.remove(index);
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let index = self.cursor_byte_index();
            self.input.remove(index);
        }
    }

    /// Scroll by a number of lines (positive = down, negative = up)
    pub fn scroll_by(&mut self, delta: i32) {
        let max_pos = self.content_height().saturating_sub(1);
        self.scroll_position = if delta < 0 {
            self.scroll_position.saturating_sub(delta.unsigned_abs() as usize)
        } else {
            self.scroll_position.saturating_add(delta as usize).min(max_pos)
        };
    }

    pub fn tick_spinner(&mut self) {
        if self.is_loading {
            self.spinner_frame = (self.spinner_frame + 1) % 8;
        }
    }
}

/// Markdown shown for a turn: the answer, then the pages it came from
pub fn turn_markdown(turn: &ConversationTurn) -> String {
    match turn.kind {
        AnswerKind::Failed => format!("Error: {}", turn.answer),
        AnswerKind::NoContext => format!("*{}*", turn.answer),
        AnswerKind::Grounded => {
            let sources = turn.sources();
            if sources.is_empty() {
                return turn.answer.clone();
            }
            let list: Vec<String> = sources.iter().map(|url| format!("- {url}")).collect();
            format!("{}\n\n**Sources**\n\n{}", turn.answer, list.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use sitechat::processor::PassageRecord;

    fn turn(kind: AnswerKind, answer: &str, urls: &[&str]) -> ConversationTurn {
        ConversationTurn {
            question: "What do you do?".to_string(),
            retrieved_passages: urls
                .iter()
                .enumerate()
                .map(|(i, url)| PassageRecord {
                    source_url: url.to_string(),
                    text: "text".to_string(),
                    chunk_index: i as u32,
                    processed_at: DateTime::from_timestamp(0, 0).unwrap(),
                    title: None,
                    description: None,
                })
                .collect(),
            answer: answer.to_string(),
            kind,
        }
    }

    #[test]
    fn test_grounded_turn_lists_sources_once() {
        let markdown = turn_markdown(&turn(
            AnswerKind::Grounded,
            "We design tools.",
            &["https://ex.com/about", "https://ex.com/about", "https://ex.com/"],
        ));
        assert_eq!(
            markdown,
            "We design tools.\n\n**Sources**\n\n- https://ex.com/about\n- https://ex.com/"
        );
    }

    #[test]
    fn test_failed_turn_is_marked() {
        let markdown = turn_markdown(&turn(AnswerKind::Failed, "quota exceeded", &["https://ex.com/"]));
        assert_eq!(markdown, "Error: quota exceeded");
    }

    #[test]
    fn test_no_context_turn_has_no_sources() {
        let markdown = turn_markdown(&turn(AnswerKind::NoContext, "Nothing found.", &[]));
        assert_eq!(markdown, "*Nothing found.*");
    }
}
