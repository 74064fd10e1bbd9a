//! recent-messages - Twitch chat history service
//!
//! Keeps a bounded log of recent chat lines for every channel someone asks
//! about, and serves them over HTTP so chat clients can show history on join.

mod bot;
mod config;
mod container;
mod db;
mod error;
mod feed;
mod http;
mod lifecycle;
mod metrics;
mod service;
mod store;

use crate::bot::InteractiveBot;
use crate::config::{Config, StorageBackend};
use crate::db::{ChannelRegistry, Database, SqliteRegistry};
use crate::feed::forward::run_forwarder;
use crate::feed::{FeedConnection, FeedSettings, TmiClient};
use crate::lifecycle::{ChannelLifecycle, IntervalTicker};
use crate::service::RecentMessages;
use crate::store::MessageStore;
use crate::store::memory::MemoryStore;
use crate::store::redb::RedbStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        listen = %config.server.listen,
        irc = %config.irc.host,
        backend = ?config.storage.backend,
        "Starting recent-messages"
    );

    metrics::init();

    // Channel registry
    let db = Database::new(&config.database.path).await?;
    let registry: Arc<dyn ChannelRegistry> =
        Arc::new(SqliteRegistry::new(db, config.channels.expiry()));

    // Message log
    let store: Arc<dyn MessageStore> = match config.storage.backend {
        StorageBackend::Redb => Arc::new(RedbStore::open(
            &config.storage.path,
            config.storage.buffer_size,
        )?),
        StorageBackend::Memory => {
            warn!("Using the in-memory message store, logs are lost on restart");
            Arc::new(MemoryStore::new(config.storage.buffer_size)?)
        }
    };
    info!(
        buffer_size = config.storage.buffer_size,
        "Message store ready"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Chat feed
    let (client, inbound) = TmiClient::spawn(
        FeedSettings {
            host: config.irc.host.clone(),
            port: config.irc.port,
            username: config.irc.username.clone(),
            password: config.irc.password.clone(),
            join_timeout: config.irc.join_timeout(),
            track_metrics: true,
        },
        shutdown_tx.subscribe(),
    );
    let feed: Arc<dyn FeedConnection> = Arc::new(client);

    {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            run_forwarder(inbound, store).await;
        });
    }

    // Channel lifecycle
    let lifecycle = Arc::new(ChannelLifecycle::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        Arc::clone(&feed),
        config.channels.vacuum_strategy,
    ));
    lifecycle.join_initial().await?;

    {
        let lifecycle = Arc::clone(&lifecycle);
        let ticker = IntervalTicker::new(config.channels.vacuum_interval());
        tokio::spawn(async move {
            lifecycle.run_vacuum_loop(ticker).await;
        });
    }

    if let Some(max_age) = config.storage.message_expiry() {
        let lifecycle = Arc::clone(&lifecycle);
        let ticker = IntervalTicker::new(config.storage.expiry_interval());
        tokio::spawn(async move {
            lifecycle.run_expiry_loop(ticker, max_age).await;
        });
    }

    let service = RecentMessages::new(store, registry, feed);

    // Interactive bot
    if config.bot.enabled {
        info!(username = %config.bot.username, "Starting interactive bot");
        let (chat, inbound) = TmiClient::spawn(
            FeedSettings {
                host: config.irc.host.clone(),
                port: config.irc.port,
                username: config.bot.username.clone(),
                password: config.bot.password.clone(),
                join_timeout: config.irc.join_timeout(),
                track_metrics: false,
            },
            shutdown_tx.subscribe(),
        );
        let bot = InteractiveBot::new(service.clone(), &config.bot.username);
        tokio::spawn(bot.run(inbound, Arc::new(chat)));
    } else {
        info!("Interactive bot not enabled, it will not be started");
    }

    // HTTP API
    let app = http::router(service, config.server.metrics_enabled);
    let server = tokio::spawn(http::run_http_server(
        config.server.listen,
        app,
        shutdown_tx.subscribe(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(());
    if let Err(e) = server.await {
        warn!(error = %e, "HTTP server task failed");
    }

    Ok(())
}
