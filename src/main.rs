//! engagement-bot: polls the chat transport and feeds the conversation engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use engagement_bot::{
    Config, ConversationEngine, Dispatcher, EngineSettings, Ledger, SubmissionPolicy,
    TelegramTransport,
};

/// Pause before polling again after a transport error
const POLL_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "engagement-bot")]
#[command(about = "Tracks cohort video submissions, points and commitment")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "engagement-bot.toml")]
    config: PathBuf,

    /// SQLite database path (overrides config file)
    #[arg(long, env = "ENGAGEMENT_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Bot API token (overrides config file)
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Administrator identity (overrides config file)
    #[arg(long, env = "ADMIN_ID")]
    admin_id: Option<i64>,

    /// Distribution group chat id (overrides config file)
    #[arg(long, env = "GROUP_ID", allow_hyphen_values = true)]
    group_id: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("engagement_bot=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting engagement-bot");
    info!("Config file: {}", cli.config.display());

    let mut config = Config::load(&cli.config)?;

    if let Some(db_path) = cli.db_path {
        config.storage.db_path = db_path;
    }
    if let Some(token) = cli.token {
        config.bot.token = token;
    }
    if let Some(admin_id) = cli.admin_id {
        config.bot.admin_id = admin_id;
    }
    if let Some(group_id) = cli.group_id {
        config.bot.group_id = group_id;
    }
    config.validate()?;

    info!("Database: {}", config.storage.db_path.display());
    info!(admin_id = config.bot.admin_id, group_id = config.bot.group_id, "Bot identities");

    let ledger = Arc::new(Ledger::open(&config.storage.db_path)?);
    let transport = Arc::new(TelegramTransport::new(&config.bot.token, &config.transport)?);

    let settings = EngineSettings::new(config.bot.admin_id, config.bot.group_id)
        .with_broadcast_delay(config.broadcast.delay());
    let engine = Arc::new(ConversationEngine::new(
        ledger,
        transport.clone(),
        SubmissionPolicy::new(config.policy.clone()),
        settings,
    ));
    let dispatcher = Dispatcher::new(engine);

    info!("Polling for updates");
    let mut offset = 0i64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            polled = transport.poll_updates(offset) => {
                match polled {
                    Ok((events, next_offset)) => {
                        offset = next_offset;
                        for event in events {
                            dispatcher.dispatch(event);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Polling failed, backing off");
                        tokio::time::sleep(POLL_BACKOFF).await;
                    }
                }
            }
        }
    }

    info!("Draining event queues");
    dispatcher.drain().await;
    info!("engagement-bot stopped");
    Ok(())
}
