use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod commands;
mod config;
mod models;
mod services;
mod utils;
#[cfg(test)]
mod test_support;

use api::market::MarketDataClient;
use config::BotConfig;
use models::Term;
use services::chart_service::CandlestickRenderer;
use services::dispatch_service::{ChannelDestination, DestinationRegistry, Dispatcher};
use services::fetch_service::YieldFetcher;
use services::scheduler_service::Scheduler;
use services::snapshot_service::QuoteSelectors;

/// Pipeline pieces shared by the scheduler and the `$yield` commands
pub struct DigestState {
    pub fetcher: Arc<YieldFetcher>,
    pub dispatcher: Dispatcher,
    pub config: BotConfig,
    pub shutdown: CancellationToken,
    scheduler_started: AtomicBool,
}

struct DigestContext;

impl TypeMapKey for DigestContext {
    type Value = Arc<DigestState>;
}

struct Handler {
    state: Arc<DigestState>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        commands::handle_message(&ctx, &msg).await;
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        // Ready fires again on reconnect; only one scheduler may run
        if self.state.scheduler_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let registry = self.state.dispatcher.registry();
        for (term, channel_id) in &self.state.config.channels {
            let destination = ChannelDestination::new(ctx.http.clone(), ChannelId::new(*channel_id));
            registry.set(*term, Arc::new(destination));
            info!("   {} → channel {}", term, channel_id);
        }
        if self.state.config.channels.is_empty() {
            warn!("No YIELD_CHANNEL_* set; use `$yield channel <term>` to route digests");
        }

        let scheduler = Scheduler::new(
            self.state.config.fire_times.clone(),
            self.state.config.timezone,
            Term::ALL.to_vec(),
            self.state.fetcher.clone(),
            self.state.dispatcher.clone(),
        );
        tokio::spawn(scheduler.run(self.state.shutdown.clone()));
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("yield_digest=debug".parse().unwrap())
            .add_directive("serenity=warn".parse().unwrap()))
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("📈 Starting yield digest bot v{}...", env!("CARGO_PKG_VERSION"));

    let config = match BotConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    info!(
        "Schedule: {} in {}",
        config.fire_times.iter().map(|t| t.format("%H:%M").to_string()).collect::<Vec<_>>().join(", "),
        config.timezone
    );

    let client = match MarketDataClient::new(config.sources.clone()) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };

    let renderer = Arc::new(CandlestickRenderer::new(config.chart_width, config.chart_height));
    let fetcher = Arc::new(YieldFetcher::new(
        client,
        QuoteSelectors::default(),
        renderer,
        config.fetch_settings(),
    ));
    let dispatcher = Dispatcher::new(Arc::new(DestinationRegistry::new()));
    let shutdown = CancellationToken::new();

    let state = Arc::new(DigestState {
        fetcher,
        dispatcher,
        config: config.clone(),
        shutdown: shutdown.clone(),
        scheduler_started: AtomicBool::new(false),
    });

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(Handler { state: state.clone() })
        .await
    {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create client: {}", e);
            return;
        }
    };

    {
        let mut data = client.data.write().await;
        data.insert::<DigestContext>(state);
    }

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown requested");
        shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    if let Err(e) = client.start().await {
        error!("Client error: {}", e);
    }
}
