//! Tracker Assistant daemon
//!
//! CLI for running the chat bot and for inspecting the tracking backend and the
//! saved credentials.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracker_assistant_rs::config::Config;
use tracker_assistant_rs::credentials::{CredentialCache, JsonCredentialCache};
use tracker_assistant_rs::dispatcher::Dispatcher;
use tracker_assistant_rs::engine::ConversationEngine;
use tracker_assistant_rs::formatter;
use tracker_assistant_rs::phone::chat_id_for;
use tracker_assistant_rs::tracking::{TraccarClient, TrackingApi};
use tracker_assistant_rs::transport::{parse_console_line, ConsoleTransport, Outbound, Transport};

/// Tracker Assistant - Traccar chat bot
#[derive(Parser)]
#[command(name = "tracker-assistant-rs")]
#[command(about = "Run the Traccar chat assistant and inspect its state")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot on the console transport (`<user>: <text>` per line)
    Run,

    /// Log in and print the device listing
    Devices {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Ask the backend to email a password reset link
    ResetPassword {
        email: String,
    },

    /// Send one text message to a phone number through the console transport
    Send {
        /// Phone number or chat id
        phone: String,

        text: String,
    },

    /// Inspect saved logins
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },
}

#[derive(Subcommand)]
enum CredentialsAction {
    /// List users with a saved login
    List,

    /// Forget a user's saved login
    Forget {
        /// Chat id or phone number
        user: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run => cmd_run(&backend_config()?).await,
        Commands::Devices { username, password } => {
            cmd_devices(&backend_config()?, &username, &password).await
        }
        Commands::ResetPassword { email } => cmd_reset_password(&backend_config()?, &email).await,
        Commands::Send { phone, text } => cmd_send(&phone, &text).await,
        Commands::Credentials { action } => {
            let config = Config::local_from_env().context("loading configuration")?;
            match action {
                CredentialsAction::List => cmd_credentials_list(&config).await,
                CredentialsAction::Forget { user } => cmd_credentials_forget(&config, &user).await,
            }
        }
    }
}

/// Config for commands that talk to the tracking backend
fn backend_config() -> anyhow::Result<Config> {
    Config::from_env().context("loading configuration")
}

// ============================================================================
// CLI Commands
// ============================================================================

async fn cmd_run(config: &Config) -> anyhow::Result<()> {
    info!("Tracker assistant starting against {}", config.tracking_url);

    let tracking = Arc::new(TraccarClient::new(config)?);
    let transport = Arc::new(ConsoleTransport::new());
    let credentials = Arc::new(JsonCredentialCache::new(config));
    info!("Credentials file: {}", credentials.path().display());

    let engine = Arc::new(ConversationEngine::new(
        config,
        tracking,
        transport,
        credentials,
    ));
    let dispatcher = Dispatcher::new(engine, config.worker_idle());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("reading stdin")? {
                    Some(line) => match parse_console_line(&line) {
                        Ok(Some(message)) => dispatcher.submit(message),
                        Ok(None) => {}
                        Err(e) => warn!("Skipping input line: {}", e),
                    },
                    None => {
                        info!("Input closed; waiting for Ctrl-C to stop");
                        tokio::signal::ctrl_c().await?;
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Tracker assistant stopped ({} active conversations)", dispatcher.active_workers());
    Ok(())
}

async fn cmd_devices(config: &Config, username: &str, password: &str) -> anyhow::Result<()> {
    let client = TraccarClient::new(config)?;
    let login = client
        .login(username, password)
        .await
        .context("login failed")?;
    println!("Logged in as {}", login.display_name);

    let devices = client
        .list_devices(username, password, &login.cookie)
        .await
        .context("listing devices failed")?;
    if devices.is_empty() {
        println!("No devices");
        return Ok(());
    }

    for batch in formatter::device_batches(&devices, config.batch_size) {
        println!("{}\n", batch);
    }
    Ok(())
}

async fn cmd_reset_password(config: &Config, email: &str) -> anyhow::Result<()> {
    let client = TraccarClient::new(config)?;
    if client.request_password_reset(email).await {
        println!("Reset requested for {}", email);
        Ok(())
    } else {
        error!("Backend refused the reset request");
        anyhow::bail!("password reset request failed")
    }
}

async fn cmd_send(phone: &str, text: &str) -> anyhow::Result<()> {
    let chat_id = chat_id_for(phone)?;
    let transport = ConsoleTransport::new();
    transport
        .send(&chat_id, Outbound::Text(text.to_string()))
        .await
        .with_context(|| format!("sending to {}", chat_id))?;
    info!("Sent message to {}", chat_id);
    Ok(())
}

async fn cmd_credentials_list(config: &Config) -> anyhow::Result<()> {
    let cache = JsonCredentialCache::new(config);
    let users = cache.users().await?;
    if users.is_empty() {
        println!("No saved credentials");
    }
    for user in users {
        if let Some(saved) = cache.get(&user).await? {
            println!("{}  {}", user, saved.username);
        }
    }
    Ok(())
}

async fn cmd_credentials_forget(config: &Config, user: &str) -> anyhow::Result<()> {
    let cache = JsonCredentialCache::new(config);
    let chat_id = chat_id_for(user)?;
    match cache.remove(&chat_id).await? {
        Some(saved) => println!("Forgot {} ({})", chat_id, saved.username),
        None => println!("No saved credentials for {}", chat_id),
    }
    Ok(())
}
