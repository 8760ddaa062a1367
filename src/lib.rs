//! # sitechat - Question answering over a company website
//!
//! A small pipeline in three stages:
//!
//! 1. **Crawl**: fetch the pages of a website and store them untouched as
//!    `RawPage`s in an object store
//! 2. **Process**: strip the HTML down to text, drop boilerplate, split the
//!    text into passages and store them in a libsql document store
//! 3. **Chat**: retrieve passages relevant to a question and let an LLM
//!    answer from them
//!
//! Stages only share data through the stores, so each can be re-run on its
//! own: re-crawl, then re-process, and the chatbot sees the new passages.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sitechat::config::Settings;
//! use sitechat::index::Database;
//! use sitechat::model::GeminiClient;
//! use sitechat::processor::{Processor, ProcessorConfig, Selection};
//! use sitechat::storage::FsObjectStore;
//! use sitechat::chatbot::{Chatbot, ChatbotConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     let store = FsObjectStore::from_config(&settings.object_store);
//!     let db = Database::connect(&settings.document_store).await?;
//!
//!     let processor = Processor::new(store, db.clone(), ProcessorConfig::default());
//!     processor.run("acme", &Selection::Incremental).await?;
//!
//!     let client = GeminiClient::from_config(&settings.llm)?;
//!     let mut bot = Chatbot::new(db, client, ChatbotConfig::new("acme"));
//!     let turn = bot.ask("What does Acme sell?").await?;
//!     println!("{}", turn.answer);
//!     Ok(())
//! }
//! ```

pub mod chatbot;
pub mod config;
pub mod crawler;
mod error;
pub mod index;
pub mod model;
pub mod processor;
pub mod search;
pub mod storage;

pub use error::Error;

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::chatbot::{AnswerKind, Chatbot, ChatbotConfig, ConversationTurn};
    pub use crate::config::Settings;
    pub use crate::crawler::{CrawlerConfig, RawPage, crawl_site};
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::index::Database;
    pub use crate::processor::{PassageRecord, ProcessReport, Processor, ProcessorConfig, Selection};
    pub use crate::search::{RetrievalMode, SearchOptions};
    pub use crate::storage::{FsObjectStore, ObjectStore};
}
