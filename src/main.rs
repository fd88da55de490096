//! Query Chat terminal client.
//!
//! Entry point: loads configuration, sets up logging and runs either a
//! one-shot query (`--query`) or the interactive loop on stdin.

#![allow(clippy::missing_fields_in_debug)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use query_chat::ChatApp;
use query_chat::chat::UiStatus;
use query_chat::config::{AppConfig, Cli, LogFormat};
use query_chat::terminal::TerminalView;
use query_chat::transport::HttpTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli).context("Failed to load configuration")?;

    init_tracing(config.logging.format);

    info!(
        name: "config.loaded",
        base_url = %config.endpoint.base_url,
        query_path = %config.endpoint.query_path,
        "Configuration loaded"
    );

    let transport = HttpTransport::with_connect_timeout(
        &config.endpoint.base_url,
        &config.endpoint.query_path,
        config.connect_timeout(),
    )
    .context("Invalid endpoint configuration")?;

    let view = TerminalView::stdio()
        .with_cursor(config.ui.cursor.clone())
        .with_user_echo(cli.query.is_some())
        .with_prompt(cli.query.is_none());
    let mut app =
        ChatApp::new(view, transport).with_error_status_duration(config.error_status_duration());

    match cli.query {
        Some(query) => {
            app.ask(&query).await?;
            if matches!(app.client().status(), UiStatus::Error { .. }) {
                anyhow::bail!("Query stream failed");
            }
        }
        None => app.run(BufReader::new(tokio::io::stdin())).await?,
    }

    Ok(())
}

/// Initialize tracing (M-LOG-STRUCTURED). Logs go to stderr so they never
/// interleave with the transcript on stdout.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}
