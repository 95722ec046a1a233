use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kb_exporter::config::Config;

mod commands;

use commands::{export, ExportParams};

#[derive(Parser)]
#[command(
    name = "kb-exporter",
    version,
    about = "Build a standardized JSON document from a knowledge base website",
    long_about = "Build a standardized JSON document from a knowledge base website.\n\n\
        Supported services: crisp, helpscout, helpkit, gitbook, next (intercom), notion, clickconnector."
)]
struct Cli {
    /// URL of the knowledge base to export
    #[arg(short, long)]
    url: String,

    /// Name of the service hosting the knowledge base
    #[arg(short, long)]
    service: String,

    /// JSON file to write (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only export this language (all available by default)
    #[arg(short, long)]
    language: Option<String>,

    /// Indent the written JSON
    #[arg(long)]
    pretty: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long)]
    log_format: Option<String>,

    /// TOML configuration file (environment variables otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cache fetched pages in this directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Some(directory) = cli.cache_dir {
        config.cache.enabled = true;
        config.cache.directory = directory;
    }
    config.validate().context("Invalid configuration")?;

    setup_tracing(&config.logging.format, &config.logging.level, cli.verbose);

    tracing::info!(
        url = %cli.url,
        service = %cli.service,
        language = ?cli.language,
        output = ?cli.output,
        "Starting export command"
    );

    export(
        config,
        ExportParams {
            url: cli.url,
            service: cli.service,
            output: cli.output,
            language: cli.language,
            pretty: cli.pretty,
        },
    )
    .await?;

    tracing::info!("Export completed successfully");
    Ok(())
}

/// Logs go to stderr, stdout carries the document
fn setup_tracing(format: &str, level: &str, verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("kb_exporter=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new(format!("kb_exporter={level},warn"))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}
