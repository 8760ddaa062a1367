//! # Chatbot Module
//!
//! Answers questions about one company from the passages of its website.
//! Each question retrieves a handful of passages, wraps them together with the
//! question in a prompt and sends it, with the recent conversation, to the LLM.
//!
//! ## Answer Policy
//!
//! - Passages found: the model answers from them (`AnswerKind::Grounded`)
//! - No passages found: the model is not called and the turn says that no
//!   company-specific context was found (`AnswerKind::NoContext`)
//! - Model call failed: the turn carries the error (`AnswerKind::Failed`),
//!   the conversation history is left as it was and the next question works
//!   normally

mod error;

pub use error::ChatError;

use rig::agent::{Agent, AgentBuilder};
use rig::completion::{Chat, CompletionModel};
use rig::embeddings::EmbeddingModel;
use rig::message::Message;
use tracing::{debug, info, instrument, warn};

use crate::index::Database;
use crate::model::Client;
use crate::processor::PassageRecord;
use crate::search::{SearchOptions, SearchSystem, prepare_rag_context};

/// Answer given when retrieval finds nothing for a question
pub const NO_CONTEXT_ANSWER: &str = "No company-specific context found for this question. \
     I can only answer from the company's website, and nothing there matches what you asked. \
     Try rephrasing the question or asking about something the website covers.";

/// How an answer came about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// Generated by the model from retrieved passages
    Grounded,

    /// Retrieval found nothing; fixed answer, no model call
    NoContext,

    /// The model call failed; the answer is the error message
    Failed,
}

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    /// The question as asked
    pub question: String,

    /// Passages given to the model, most relevant first
    pub retrieved_passages: Vec<PassageRecord>,

    /// The answer, or the error message for a failed turn
    pub answer: String,

    /// How the answer came about
    pub kind: AnswerKind,
}

impl ConversationTurn {
    /// Distinct source URLs of the retrieved passages, in retrieval order
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for passage in &self.retrieved_passages {
            if !sources.contains(&passage.source_url.as_str()) {
                sources.push(&passage.source_url);
            }
        }
        sources
    }
}

/// Configuration for the chatbot
#[derive(Debug, Clone, PartialEq)]
pub struct ChatbotConfig {
    /// Site (collection) the chatbot answers about
    pub site: String,

    /// How passages are retrieved
    pub search: SearchOptions,

    /// Sampling temperature
    pub temperature: f64,

    /// Question/answer exchanges sent along with each question
    pub history_turns: usize,
}

impl ChatbotConfig {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            search: SearchOptions::default(),
            temperature: 0.2,
            history_turns: 10,
        }
    }
}

/// System instruction for a company's QA assistant
pub fn preamble(site: &str) -> String {
    format!(
        "You are a powerful information giving QA system. Your goal is to provide accurate and \
         helpful information about the company {site}. Answer user inquiries based on the context \
         provided and avoid making up answers. The context comes from the data collected from the \
         {site} website. If you don't know the answer, simply state that you don't have enough \
         context to answer it."
    )
}

/// The user message carrying retrieved context and the question
pub fn build_prompt(context: &str, question: &str) -> String {
    format!("Context:\n###\n{context}\n###\nQuestion:\n###\n{question}\n###")
}

/// Retrieval-augmented chatbot for one site
pub struct Chatbot<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    search: SearchSystem<C, E>,
    agent: Agent<C>,
    config: ChatbotConfig,
    history: Vec<Message>,
}

impl<C, E> Chatbot<C, E>
where
    C: CompletionModel + Clone,
    E: EmbeddingModel,
{
    /// Create a chatbot over `db` using the models of `client`
    pub fn new(db: Database, client: Client<C, E>, config: ChatbotConfig) -> Self {
        let agent = AgentBuilder::new(client.completion().clone())
            .preamble(&preamble(&config.site))
            .temperature(config.temperature)
            .build();

        Self {
            search: SearchSystem::new(db, client),
            agent,
            config,
            history: Vec::new(),
        }
    }

    /// Answer a question
    ///
    /// Returns `Err` only when retrieval itself fails. Model failures produce
    /// a turn with `AnswerKind::Failed`.
    #[instrument(skip(self), fields(site = %self.config.site))]
    pub async fn ask(&mut self, question: &str) -> Result<ConversationTurn, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let results = self
            .search
            .search(&self.config.site, question, &self.config.search)
            .await?;
        debug!("Retrieved {} passages", results.len());

        if results.is_empty() {
            info!("No context found, answering without the model");
            return Ok(ConversationTurn {
                question: question.to_string(),
                retrieved_passages: Vec::new(),
                answer: NO_CONTEXT_ANSWER.to_string(),
                kind: AnswerKind::NoContext,
            });
        }

        let prompt = build_prompt(&prepare_rag_context(&results), question);
        let retrieved_passages: Vec<PassageRecord> =
            results.into_iter().map(|result| result.passage).collect();

        match self.agent.chat(prompt.as_str(), self.history.clone()).await {
            Ok(answer) => {
                self.remember(question, &answer);
                Ok(ConversationTurn {
                    question: question.to_string(),
                    retrieved_passages,
                    answer,
                    kind: AnswerKind::Grounded,
                })
            }
            Err(e) => {
                warn!("LLM call failed: {}", e);
                Ok(ConversationTurn {
                    question: question.to_string(),
                    retrieved_passages,
                    answer: e.to_string(),
                    kind: AnswerKind::Failed,
                })
            }
        }
    }

    /// Forget the conversation so far
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Number of exchanges currently remembered
    pub fn history_len(&self) -> usize {
        self.history.len() / 2
    }

    /// The chatbot configuration
    pub fn config(&self) -> &ChatbotConfig {
        &self.config
    }

    fn remember(&mut self, question: &str, answer: &str) {
        self.history.push(Message::user(question));
        self.history.push(Message::assistant(answer));

        let keep = self.config.history_turns * 2;
        if self.history.len() > keep {
            let excess = self.history.len() - keep;
            self.history.drain(..excess);
        }
    }
}
