use std::sync::Arc;

use cmb_coinmarketcap::CoinMarketCapClient;
use cmb_core::{
    config::Config,
    market::MarketData,
    news::{NewsFeed, WatermarkStore},
    registry::RegistryStore,
    secrets::SecretsStore,
};
use cmb_cryptocompare::{CryptoCompareClient, CryptoCompareConfig};
use cmb_telegram::router::Services;

#[tokio::main]
async fn main() -> Result<(), cmb_core::Error> {
    cmb_core::logging::init("cmb")?;

    let cfg = Arc::new(Config::load()?);

    let registry = Arc::new(match &cfg.chat_registry_file {
        Some(path) => RegistryStore::open(path)?,
        None => RegistryStore::in_memory(),
    });

    let market: Option<Arc<dyn MarketData>> = match &cfg.coinmarketcap_key {
        Some(key) => Some(Arc::new(CoinMarketCapClient::new(
            cfg.market_api_url.clone(),
            key,
            cfg.http_timeout,
        )?)),
        None => {
            tracing::warn!("COINMARKETCAP_KEY not set; price quotes disabled");
            None
        }
    };

    let news_feed: Option<Arc<dyn NewsFeed>> = match (&cfg.cryptocompare_key, cfg.news_enabled()) {
        (Some(key), true) => Some(Arc::new(CryptoCompareClient::new(CryptoCompareConfig {
            url: cfg.news_api_url.clone(),
            api_key: key.clone(),
            feeds: cfg.feed_sources.clone(),
            lang: cfg.news_lang.clone(),
            timeout: cfg.http_timeout,
        })?)),
        _ => None,
    };

    let watermark: Arc<dyn WatermarkStore> = Arc::new(SecretsStore::new(cfg.secrets_file.clone()));

    let services = Services {
        registry,
        market,
        news_feed,
        watermark,
    };

    cmb_telegram::router::run_polling(cfg, services)
        .await
        .map_err(|e| cmb_core::Error::External(format!("telegram bot failed: {e:#}")))?;

    Ok(())
}
