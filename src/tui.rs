//! # Terminal User Interface Module
//!
//! The chat front end of sitechat. The chatbot runs on its own task and
//! receives questions over a channel, so the interface keeps redrawing (and
//! the spinner keeps turning) while retrieval and the LLM call are in flight.
//!
//! ## Key Components
//!
//! - `app`: Application state and key handling
//! - `error`: Error types specific to the TUI
//! - `event`: Terminal ticks, key presses and chatbot replies as one event stream
//! - `logging`: File logging, so log lines never end up on the terminal
//! - `markdown`: Markdown rendering for answers
//! - `ui`: Layout and drawing
//!
//! ## Keys
//!
//! - `Enter` sends the question
//! - `Ctrl+L` clears the conversation (screen and history sent to the model)
//! - `Up`/`Down` or the mouse wheel scroll the conversation
//! - `Esc` or `Ctrl+C` quit

pub mod app;
pub mod error;
pub mod event;
pub mod logging;
pub mod markdown;
pub mod ui;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use rig::completion::CompletionModel;
use rig::embeddings::EmbeddingModel;
use sitechat::chatbot::Chatbot;
use std::io;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::tui::app::App;
use crate::tui::error::Result;
use crate::tui::event::{AppEvent, Event};
use crate::tui::ui::draw;

/// Requests from the interface to the chatbot task
#[derive(Debug)]
enum ChatCommand {
    Ask(String),
    Clear,
}

/// Run the TUI application until the user quits
pub async fn run<C, E>(chatbot: Chatbot<C, E>) -> Result<()>
where
    C: CompletionModel + Clone + Send + Sync + 'static,
    E: EmbeddingModel + Send + Sync + 'static,
{
    let site = chatbot.config().site.clone();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&site);
    app.add_system_message(&format!(
        "# Ask about {site}\n\n\
         * Type a question and press Enter.\n\
         * Press Ctrl+L to start a new conversation.\n\
         * Use the mouse wheel or the arrow keys to scroll.\n\
         * Press Esc or Ctrl+C to exit."
    ));

    let (chat_tx, chat_rx) = mpsc::unbounded_channel::<ChatCommand>();
    tokio::spawn(chatbot_task(chatbot, chat_rx, app.event_sender()));

    terminal.clear()?;

    let result = event_loop(&mut terminal, &mut app, &chat_tx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    chat_tx: &mpsc::UnboundedSender<ChatCommand>,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|f| draw(f, app))?;

        let Some(event) = app.next_event().await else {
            break;
        };

        // The app has already updated its own state; forward what the chatbot needs
        match event {
            Event::App(AppEvent::Submit(question)) => {
                let _ = chat_tx.send(ChatCommand::Ask(question));
            }
            Event::App(AppEvent::Clear) => {
                let _ = chat_tx.send(ChatCommand::Clear);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Owns the chatbot and answers questions one at a time
async fn chatbot_task<C, E>(
    mut chatbot: Chatbot<C, E>,
    mut commands: mpsc::UnboundedReceiver<ChatCommand>,
    events: mpsc::UnboundedSender<Event>,
) where
    C: CompletionModel + Clone + Send + Sync + 'static,
    E: EmbeddingModel + Send + Sync + 'static,
{
    while let Some(command) = commands.recv().await {
        match command {
            ChatCommand::Ask(question) => {
                let event = match chatbot.ask(&question).await {
                    Ok(turn) => {
                        info!("Answered with {:?} from {} passages", turn.kind, turn.retrieved_passages.len());
                        AppEvent::Answer(turn)
                    }
                    Err(e) => {
                        error!("Chat request failed: {}", e);
                        AppEvent::ChatError(e.to_string())
                    }
                };
                if events.send(Event::App(event)).is_err() {
                    break;
                }
            }
            ChatCommand::Clear => {
                chatbot.clear_history();
                info!("Conversation cleared");
            }
        }
    }
}
