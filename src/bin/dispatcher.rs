use anyhow::Result;
use clap::Parser;
use outbox_dispatcher::config::Config;
use outbox_dispatcher::database::Database;
use outbox_dispatcher::dispatcher::Dispatcher;
use outbox_dispatcher::publisher::LoggingPublisher;
use outbox_dispatcher::repository::PostgresOutboxRepository;
use outbox_dispatcher::retry::FastrandJitter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dispatcher")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Claims, publishes, and retries durable outbox messages")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load_from_file(&cli.config)?;
    info!(config_file = %cli.config, "configuration loaded");

    let database = Database::connect(&config.database).await?;
    database.migrate().await?;

    let repository = Arc::new(PostgresOutboxRepository::new(database.pool().clone()));
    let publisher = Arc::new(LoggingPublisher);
    let dispatcher = Dispatcher::new(repository, publisher, FastrandJitter, &config)?;

    let cancellation_token = CancellationToken::new();
    let shutdown_token = cancellation_token.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        shutdown_token.cancel();
    });

    dispatcher.run(cancellation_token).await;

    Ok(())
}
