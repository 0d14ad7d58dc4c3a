//! Secretary console - main entry point.

use anyhow::Context;
use secretary_console::commands::Commands;
use secretary_console::config::{Config, LogFormat};
use secretary_console::context::Console;
use secretary_console::error::AppResult;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(&config.console.log_level, config.console.log_format);

    info!("Starting secretary console...");

    let console = Arc::new(Console::connect(&config).await?);

    if console.client.health_check().await {
        info!("Admin API healthy at {}", config.api.base_url);
    } else {
        warn!("Admin API not reachable at {} - commands will fail until it is", config.api.base_url);
    }
    if !console.client.has_token() {
        warn!("No admin token, run 'login <user> <password>' first");
    }

    let commands = Commands::new(console.clone());
    info!("Registered {} command handlers", commands.len());

    // One-shot mode
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        if let Some(output) = commands.dispatch(&join_args(&args)).await {
            println!("{}", output);
        }
        return Ok(());
    }

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

    loop {
        tokio::select! {
            line = lines.next() => {
                let line = match line {
                    Some(Ok(line)) => line,
                    Some(Err(e)) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                    None => break,
                };

                let line = line.trim();
                if matches!(line, "quit" | "exit") {
                    break;
                }

                // Ctrl-C cancels the running command; dropping it stops its pollers and streams.
                tokio::select! {
                    output = commands.dispatch(line) => {
                        if let Some(output) = output {
                            println!("{}", output);
                        }
                    }
                    _ = signal::ctrl_c() => {
                        warn!("Command interrupted");
                    }
                }
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Shutting down...");
    Ok(())
}

/// Rebuild a command line, quoting arguments the shell kept together.
fn join_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.contains(char::is_whitespace) {
                format!("\"{}\"", arg)
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    // Command output owns stdout.
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
