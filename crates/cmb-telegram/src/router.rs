use std::sync::Arc;

use anyhow::Context;
use teloxide::{
    dispatching::Dispatcher, dptree, prelude::*, types::AllowedUpdate,
    update_listeners::Polling,
};
use tokio_util::sync::CancellationToken;

use cmb_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use cmb_core::{
    config::Config,
    market::MarketData,
    messaging::port::MessagingPort,
    news::{NewsFeed, NewsPoller, WatermarkStore},
    registry::RegistryStore,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub registry: Arc<RegistryStore>,
    pub market: Option<Arc<dyn MarketData>>,
    pub bot_username: String,
}

/// Adapters built by the binary and handed to the Telegram runtime.
pub struct Services {
    pub registry: Arc<RegistryStore>,
    pub market: Option<Arc<dyn MarketData>>,
    pub news_feed: Option<Arc<dyn NewsFeed>>,
    pub watermark: Arc<dyn WatermarkStore>,
}

/// Only the update kinds we route. `chat_member` must be requested explicitly.
pub(crate) fn allowed_updates() -> Vec<AllowedUpdate> {
    vec![
        AllowedUpdate::Message,
        AllowedUpdate::ChatMember,
        AllowedUpdate::MyChatMember,
    ]
}

pub async fn run_polling(cfg: Arc<Config>, services: Services) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot.get_me().await.context("telegram getMe failed")?;
    let bot_username = me.username().to_string();
    tracing::info!(bot = %bot_username, "cmb started");

    // Throttle outbound calls (news bursts); the adapter still retries once on 429.
    let raw = TelegramMessenger::new(bot.clone(), cfg.telegram_message_limit);
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        Arc::new(raw.clone()),
        ThrottleConfig::default(),
    ));

    let cancel = CancellationToken::new();
    let news_task = match (services.news_feed, cfg.news_chat.as_deref()) {
        (Some(feed), Some(target)) => match raw.resolve_chat(target).await {
            Ok(chat_id) => {
                let poller = NewsPoller::new(
                    feed,
                    services.watermark.clone(),
                    messenger.clone(),
                    chat_id,
                );
                let every = cfg.news_poll_interval;
                let cancel = cancel.clone();
                Some(tokio::spawn(async move { poller.run(every, cancel).await }))
            }
            Err(e) => {
                tracing::error!(
                    chat = target,
                    error = %e,
                    "cannot resolve news chat; news disabled"
                );
                None
            }
        },
        _ => {
            tracing::info!("news forwarding not configured");
            None
        }
    };

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        messenger,
        registry: services.registry,
        market: services.market,
        bot_username,
    });

    let handler = dptree::entry()
        .branch(Update::filter_my_chat_member().endpoint(handlers::handle_my_chat_member))
        .branch(Update::filter_chat_member().endpoint(handlers::handle_chat_member))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    let listener = Polling::builder(bot.clone())
        .allowed_updates(allowed_updates())
        .build();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("update listener error"),
        )
        .await;

    cancel.cancel();
    if let Some(task) = news_task {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "news poller task ended abnormally");
        }
    }
    tracing::info!("cmb stopped");
    Ok(())
}
