use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::telemetry::env_filter;

/// Name of the chat log inside the log directory
pub const LOG_FILE: &str = "chat.log";

/// Route all tracing output to `{log_dir}/chat.log`
///
/// The chat interface owns the terminal, so nothing may be written to stderr
/// while it runs.
pub fn setup_logging(log_dir: &Path, debug: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::NEVER, log_dir, LOG_FILE);

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter(debug))
        .with(file_layer)
        .try_init()?;

    Ok(())
}
