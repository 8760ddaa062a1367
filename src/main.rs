//! # sitechat CLI
//!
//! Runs the three pipeline stages as subcommands:
//!
//! - `crawl`: fetch a website into the object store
//! - `process`: turn stored pages into passages in the document store,
//!   optionally embedding them for vector retrieval
//! - `chat`: interactive question answering in the terminal
//!
//! Store locations and the LLM key come from the environment (see
//! `sitechat::config`). Every subcommand accepts `--debug` for verbose logs.

mod telemetry;
mod tui;

use std::path::Path;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sitechat::chatbot::{Chatbot, ChatbotConfig};
use sitechat::config::{DocumentStoreConfig, Settings};
use sitechat::crawler::{CrawlerConfig, crawl_site};
use sitechat::index::{Database, EmbedProgress};
use sitechat::model::GeminiClient;
use sitechat::processor::{ChunkOptions, Processor, ProcessorConfig, Selection};
use sitechat::search::{RetrievalMode, SearchOptions};
use sitechat::storage::FsObjectStore;
use tokio::sync::mpsc;
use tracing::{info, instrument};

#[derive(Parser)]
#[command(author, version, about = "Answer questions about a company from its website", long_about = None)]
struct Cli {
    /// Verbose logging (ignored when RUST_LOG is set)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl a website into the object store
    Crawl(CrawlArgs),

    /// Turn crawled pages into passages
    Process(ProcessArgs),

    /// Ask questions about a processed site
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Site identifier, the namespace for its pages and passages
    site: String,

    /// Where the crawl starts
    start_url: String,

    /// Maximum link depth from the start page
    #[arg(short, long)]
    depth: Option<u32>,

    /// Delay between requests in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Maximum number of pages to fetch
    #[arg(short = 'p', long)]
    max_pages: Option<u32>,
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Site identifier used when crawling
    site: String,

    /// Drop the site's passages and process every stored page
    #[arg(long, conflicts_with = "url")]
    full_load: bool,

    /// Only process these page URLs (repeatable)
    #[arg(long)]
    url: Vec<String>,

    /// Maximum passage length in characters
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters shared by consecutive passages
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Embed passages that have no embedding yet
    #[arg(long)]
    embed: bool,

    /// Concurrent embedding requests
    #[arg(short, long, default_value = "5")]
    concurrency: usize,
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// Site identifier used when processing
    site: String,

    /// Retrieval method
    #[arg(short, long, default_value = "keyword", value_parser = ["keyword", "vector"])]
    retrieval: String,

    /// Passages retrieved per question
    #[arg(short, long, default_value = "6")]
    limit: usize,

    /// LLM model, overrides SITECHAT_MODEL
    #[arg(short, long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    // The chat interface owns the terminal and logs to a file instead
    let _otel = match &cli.command {
        Commands::Chat(_) => {
            tui::logging::setup_logging(&settings.object_store.root, cli.debug)?;
            None
        }
        _ => Some(telemetry::init_tracing_subscriber(cli.debug)?),
    };

    match cli.command {
        Commands::Crawl(args) => crawl_command(args, &settings).await,
        Commands::Process(args) => process_command(args, &settings).await,
        Commands::Chat(args) => chat_command(args, settings).await,
    }
}

/// Open the document store, creating the directory of a local database file
async fn open_database(config: &DocumentStoreConfig) -> anyhow::Result<Database> {
    if !config.is_remote() {
        if let Some(parent) = Path::new(&config.url).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }
    Database::connect(config)
        .await
        .with_context(|| format!("Failed to open document store {}", config.url))
}

#[instrument(skip(settings))]
async fn crawl_command(args: CrawlArgs, settings: &Settings) -> anyhow::Result<()> {
    let defaults = CrawlerConfig::default();
    let config = CrawlerConfig::builder()
        .max_depth(args.depth.unwrap_or(defaults.max_depth))
        .max_pages(args.max_pages.unwrap_or(defaults.max_pages))
        .delay_ms(args.delay_ms.unwrap_or(defaults.delay_ms))
        .build();

    let store = FsObjectStore::from_config(&settings.object_store);
    println!("Crawling {} into {}...", args.start_url, store.bucket_dir().display());

    let report = crawl_site(&args.site, &args.start_url, &config, &store).await?;

    println!(
        "Stored {} pages for {} ({} skipped)",
        report.stored, args.site, report.skipped
    );
    Ok(())
}

#[instrument(skip(settings))]
async fn process_command(args: ProcessArgs, settings: &Settings) -> anyhow::Result<()> {
    let defaults = ChunkOptions::default();
    let config = ProcessorConfig::builder()
        .chunk_size(args.chunk_size.unwrap_or(defaults.chunk_size))
        .chunk_overlap(args.chunk_overlap.unwrap_or(defaults.chunk_overlap))
        .build();

    let selection = if args.full_load {
        Selection::Full
    } else if !args.url.is_empty() {
        Selection::Urls(args.url.clone())
    } else {
        Selection::Incremental
    };

    let store = FsObjectStore::from_config(&settings.object_store);
    let db = open_database(&settings.document_store).await?;
    let processor = Processor::new(store, db.clone(), config);

    let report = processor.run(&args.site, &selection).await?;
    println!(
        "Processed {} of {} pages: {} passages written, {} skipped, {} failed",
        report.pages_processed,
        report.pages_seen,
        report.passages_written,
        report.pages_skipped,
        report.pages_failed
    );

    if args.embed {
        embed_command(&db, &args.site, args.concurrency, settings).await?;
    }
    Ok(())
}

async fn embed_command(
    db: &Database,
    site: &str,
    concurrency: usize,
    settings: &Settings,
) -> anyhow::Result<()> {
    let client = GeminiClient::from_config(&settings.llm)?;

    let total = db.passages_missing_embeddings(site).await?.len();
    if total == 0 {
        println!("All passages already have embeddings");
        return Ok(());
    }
    info!("Embedding {} passages with concurrency {}", total, concurrency);

    let (progress_sender, mut progress_receiver) = mpsc::channel::<EmbedProgress>(100);

    let progress_bar = ProgressBar::new(total as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")?
            .progress_chars("##-"),
    );
    progress_bar.set_message("Embedding passages...");

    let progress_handle = tokio::spawn({
        let progress_bar = progress_bar.clone();
        async move {
            while let Some(progress) = progress_receiver.recv().await {
                progress_bar.inc(1);
                progress_bar.set_message(format!(
                    "Embedded passage {} from {}",
                    progress.passage_id, progress.source_url
                ));
            }
            progress_bar.finish_with_message("Embedding completed");
        }
    });

    let start_time = std::time::Instant::now();
    let embedded = db
        .embed_passages(&client, site, concurrency, Some(progress_sender))
        .await?;

    // Ends once every sender is dropped
    let _ = progress_handle.await;

    println!(
        "Embedded {} of {} passages in {:.2?}",
        embedded,
        total,
        start_time.elapsed()
    );
    Ok(())
}

async fn chat_command(args: ChatArgs, mut settings: Settings) -> anyhow::Result<()> {
    if let Some(model) = args.model {
        settings.llm.model = model;
    }
    let client = GeminiClient::from_config(&settings.llm)?;
    let db = open_database(&settings.document_store).await?;

    let passages = db.count_passages(&args.site).await?;
    if passages == 0 {
        anyhow::bail!(
            "No passages for {}; run `sitechat process {}` first",
            args.site,
            args.site
        );
    }
    info!("Chatting about {} over {} passages", args.site, passages);

    let mut config = ChatbotConfig::new(&args.site);
    config.search = SearchOptions {
        limit: args.limit,
        mode: args.retrieval.parse::<RetrievalMode>()?,
    };

    let chatbot = Chatbot::new(db, client, config);
    tui::run(chatbot).await?;
    Ok(())
}
