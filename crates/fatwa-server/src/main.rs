//! fatwa-server: four-school fatwa answers over HTTP.
//!
//! Usage:
//!   fatwa-server serve [--bind ADDR]
//!   fatwa-server ask "ما حكم صلاة الجماعة؟"
//!   fatwa-server --config fatwa.yaml -vv serve

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use fatwa_runtime::FatwaRequestHandler;
use fatwa_server::{build_handler, router, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fatwa-server")]
#[command(about = "Answer Islamic jurisprudence questions from the four Sunni schools")]
#[command(version)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the /api/ask-fatwa endpoint
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Ask one question and print the answer as JSON
    Ask {
        /// The question, in any language
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };

    let handler = Arc::new(build_handler(&config).context("Failed to build backend provider")?);

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            serve(&config, handler).await
        }
        Command::Ask { question } => ask(&handler, &question).await,
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(config: &ServerConfig, handler: Arc<FatwaRequestHandler>) -> Result<()> {
    let addr = config.bind_addr()?;
    let app = router(handler, &config.cors);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn ask(handler: &FatwaRequestHandler, question: &str) -> Result<()> {
    match handler.handle(question).await {
        Ok(fatwa) => {
            println!("{}", serde_json::to_string_pretty(&fatwa)?);
            Ok(())
        }
        Err(e) => {
            if let Some(raw) = e.raw_reply() {
                tracing::debug!(raw, "Rejected backend reply");
            }
            anyhow::bail!("{} ({}): {}", e.public_message(), e.kind(), e)
        }
    }
}
