//! cartobridge - map SDK bridge host
//!
//! Drives headless map instances over a JSON-lines channel: one request
//! envelope per line on stdin, replies and events one per line on stdout.
//! Logs go to stderr or to the configured log file.

use anyhow::{Context, Result};
use cartobridge_controller::{event_channel, MapHost, ReplyEnvelope};
use cartobridge_core::config::{LogFormat, LoggingConfig};
use cartobridge_core::error::CODE_REPLY_DROPPED;
use cartobridge_core::{AppConfig, Response};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Map SDK bridge: plugin dispatch, style overlays and lifecycle events
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve map commands as JSON lines on stdin/stdout
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "CARTOBRIDGE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/cartobridge.yaml")]
        config: PathBuf,
    },

    /// Print the default configuration as YAML
    GenConfig,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run { config } => {
            let config = load_config(config.as_deref())?;
            init_logging(&config.logging)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(run(config))
        }
        Command::CheckConfig { config } => {
            let loaded = load_config(Some(&config))?;
            println!("Configuration OK: {}", config.display());
            print!("{}", loaded.to_yaml()?);
            Ok(())
        }
        Command::GenConfig => {
            print!("{}", AppConfig::default().to_yaml()?);
            Ok(())
        }
    }
}

/// Loads and validates the configuration; without a path the defaults apply.
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_config_builder(path)
            .with_context(|| format!("Failed to load config file: {:?}", path))?,
        None => AppConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(logging.filter_directives()).context("Invalid log filter")?,
    };

    // stdout carries the channel, so logs never go there.
    let writer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(logging.file.is_none())
        .with_file(logging.file_line)
        .with_line_number(logging.file_line);

    let installed = match (logging.format, logging.timestamps) {
        (LogFormat::Json, true) => builder.json().try_init(),
        (LogFormat::Json, false) => builder.json().without_time().try_init(),
        (LogFormat::Text, true) => builder.try_init(),
        (LogFormat::Text, false) => builder.without_time().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}

async fn run(config: AppConfig) -> Result<()> {
    info!(
        plugins = ?config.plugins.enabled,
        style = %config.map.default_style,
        "Starting cartobridge host"
    );

    let (events_tx, mut events_rx) = event_channel();
    let host = Arc::new(MapHost::headless(config, events_tx));
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    // Sole writer of stdout.
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    });

    let event_out = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => {
                    if event_out.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(method = %event.method, error = %e, "Failed to encode event"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("Input closed, shutting down");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match host.dispatch_line(&line) {
                    Ok((id, pending)) => {
                        let out = out_tx.clone();
                        tokio::spawn(async move {
                            let response = pending.await.unwrap_or_else(|_| Response::Error {
                                code: CODE_REPLY_DROPPED.to_string(),
                                message: "reply channel closed".to_string(),
                                details: None,
                            });
                            send_reply(&out, &ReplyEnvelope::new(id, response));
                        });
                    }
                    Err(reply) => {
                        debug!("Rejected malformed request line");
                        send_reply(&out_tx, &reply);
                    }
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal, stopping host...");
                break;
            }
        }
    }

    let disposed = host.dispose_all();
    info!(disposed, "Maps disposed");
    drop(host);
    drop(out_tx);

    forwarder.await.context("Event forwarder failed")?;
    writer.await.context("Output writer failed")??;
    Ok(())
}

fn send_reply(out: &mpsc::UnboundedSender<String>, reply: &ReplyEnvelope) {
    match serde_json::to_string(reply) {
        Ok(line) => {
            if out.send(line).is_err() {
                debug!("Output closed, reply dropped");
            }
        }
        Err(e) => warn!(error = %e, "Failed to encode reply"),
    }
}
