//! Frostty - chat bridge for a locally running coding agent
//!
//! Polls Telegram for messages, relays them to the agent's HTTP API and
//! sends the agent's replies back.

use anyhow::Result;
use clap::{Parser, Subcommand};
use frostty::{
    agent::{AgentLauncher, CommandSpawner, HttpAgentClient},
    bridge::BridgeController,
    channels::{ChannelAdapter, ChannelEvent, TelegramAdapter, TelegramSettings},
    config::{ConfigOverrides, FrosttyConfig, ResolvedConfig},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "frostty")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Chat bridge for a locally running coding agent")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FROSTTY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Telegram bot token
    #[arg(long, env = "FROSTTY_BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,

    /// Agent executable
    #[arg(long, env = "FROSTTY_AGENT_BIN")]
    agent_bin: Option<PathBuf>,

    /// Default workspace directory
    #[arg(long, env = "FROSTTY_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Port the agent serves on
    #[arg(long, env = "FROSTTY_AGENT_PORT")]
    agent_port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (default)
    Run,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let (plain, json) = if cli.log_json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("frostty={}", log_level).into()),
        )
        .with(plain)
        .with(json)
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => match FrosttyConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        },
        None => FrosttyConfig::default(),
    };
    config.apply_overrides(ConfigOverrides {
        bot_token: cli.bot_token,
        executable: cli.agent_bin,
        workspace: cli.workspace,
        port: cli.agent_port,
    });

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let resolved = match config.resolve() {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::error!("{}", e);
                    std::process::exit(1);
                }
            };
            run_bridge(resolved).await?;
        }
        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

async fn run_bridge(config: ResolvedConfig) -> Result<()> {
    tracing::info!(
        workspace = %config.workspace.display(),
        agent = %config.executable.display(),
        port = config.port,
        "Starting Frostty"
    );

    let api = Arc::new(HttpAgentClient::new(config.port)?);
    let launcher = Arc::new(AgentLauncher::new(
        Arc::new(CommandSpawner::new(&config.executable)),
        api.clone(),
        config.port,
    ));
    let controller = Arc::new(BridgeController::new(
        launcher.clone(),
        api,
        &config.workspace,
    ));

    if config.autostart {
        let controller = controller.clone();
        tokio::spawn(async move {
            let reply = controller.wake().await;
            tracing::info!("Autostart: {}", reply);
        });
    }

    let adapter: Arc<dyn ChannelAdapter> = Arc::new(TelegramAdapter::new(TelegramSettings {
        bot_token: config.bot_token,
        allowed_users: config.allowed_users,
        poll_timeout_secs: config.poll_timeout_secs,
    })?);

    let (event_tx, event_rx) = mpsc::channel(256);
    if let Err(e) = adapter.start(event_tx).await {
        launcher.stop().await;
        return Err(e.into());
    }

    let processor = tokio::spawn(process_events(event_rx, controller, adapter.clone()));

    tracing::info!("Frostty is running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    shutdown_signal().await;

    tracing::info!("Shutting down...");
    adapter.stop().await?;
    processor.abort();
    launcher.stop().await;

    Ok(())
}

/// Dispatch channel events; each chat message is handled in its own task.
async fn process_events(
    mut rx: mpsc::Receiver<ChannelEvent>,
    controller: Arc<BridgeController>,
    adapter: Arc<dyn ChannelAdapter>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            ChannelEvent::Message(message) => {
                let controller = controller.clone();
                let adapter = adapter.clone();
                tokio::spawn(async move {
                    controller.handle(&message, adapter.as_ref()).await;
                });
            }
            ChannelEvent::Connected { channel } => {
                tracing::info!("Channel {} connected", channel);
            }
            ChannelEvent::Disconnected { channel, reason } => {
                tracing::warn!("Channel {} disconnected: {}", channel, reason);
            }
            ChannelEvent::Error { channel, error } => {
                tracing::error!("Channel {} error: {}", channel, error);
            }
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn show_config(config: &FrosttyConfig) -> Result<()> {
    let toml = toml::to_string_pretty(&config.redacted())?;
    println!("{}", toml);
    Ok(())
}
