use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ChatId, errors::Error, secrets::SecretsFile, Result};

/// Typed configuration.
///
/// Runtime knobs come from the environment (optionally seeded from `.env`);
/// credentials and chat targets come from the secrets file.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_message_limit: usize,
    pub dev_chat_id: Option<ChatId>,

    // Persistence
    pub secrets_file: PathBuf,
    pub chat_registry_file: Option<PathBuf>,

    // Market data (CoinMarketCap)
    pub coinmarketcap_key: Option<String>,
    pub market_api_url: String,

    // News (CryptoCompare)
    pub cryptocompare_key: Option<String>,
    pub feed_sources: Option<String>,
    /// Numeric chat id or `@channel`.
    pub news_chat: Option<String>,
    pub news_api_url: String,
    pub news_lang: String,
    pub news_poll_interval: Duration,

    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let secrets_file =
            PathBuf::from(env_str("SECRETS_FILE").unwrap_or_else(|| "secrets.json".to_string()));
        let secrets = SecretsFile::read(&secrets_file)?;

        Self::from_sources(env_str, secrets_file, &secrets)
    }

    /// Build from an env lookup and an already-parsed secrets file.
    pub fn from_sources(
        lookup: impl Fn(&str) -> Option<String>,
        secrets_file: PathBuf,
        file: &SecretsFile,
    ) -> Result<Self> {
        let s = &file.secrets;
        let env = |k: &str| lookup(k).and_then(non_empty);

        let telegram_bot_token = env("TELEGRAM_BOT_TOKEN")
            .or_else(|| s.bot_api_token.clone().and_then(non_empty))
            .ok_or_else(|| {
                Error::Config(
                    "BOT_API_TOKEN (secrets file) or TELEGRAM_BOT_TOKEN is required".to_string(),
                )
            })?;

        let coinmarketcap_key =
            env("COINMARKETCAP_KEY").or_else(|| s.coinmarketcap_key.clone().and_then(non_empty));
        let cryptocompare_key =
            env("CRYPTOCOMPARE_API").or_else(|| s.cryptocompare_key.clone().and_then(non_empty));
        let feed_sources = s.feed_sources.clone().and_then(non_empty);
        let news_chat = s.chat_handle.clone().and_then(non_empty);
        let dev_chat_id = s.dev_user.map(ChatId);

        let chat_registry_file = env("CHAT_REGISTRY_FILE").map(PathBuf::from);

        let news_poll_interval = Duration::from_secs(
            parse_u64(env("NEWS_POLL_INTERVAL_SECS"))
                .unwrap_or(60)
                .max(1),
        );
        let news_api_url = env("NEWS_API_URL")
            .unwrap_or_else(|| "https://min-api.cryptocompare.com/data/v2/news/".to_string());
        let news_lang = env("NEWS_LANG").unwrap_or_else(|| "EN".to_string());
        let market_api_url = env("MARKET_API_URL")
            .unwrap_or_else(|| "https://pro-api.coinmarketcap.com".to_string());
        let http_timeout =
            Duration::from_millis(parse_u64(env("HTTP_TIMEOUT_MS")).unwrap_or(10_000));
        let telegram_message_limit = parse_usize(env("TELEGRAM_MESSAGE_LIMIT"))
            .unwrap_or(4096)
            .clamp(200, 4096);

        Ok(Self {
            telegram_bot_token,
            telegram_message_limit,
            dev_chat_id,
            secrets_file,
            chat_registry_file,
            coinmarketcap_key,
            market_api_url,
            cryptocompare_key,
            feed_sources,
            news_chat,
            news_api_url,
            news_lang,
            news_poll_interval,
            http_timeout,
        })
    }

    /// News forwarding needs both an API key and a target chat.
    pub fn news_enabled(&self) -> bool {
        self.cryptocompare_key.is_some() && self.news_chat.is_some()
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_usize(v: Option<String>) -> Option<usize> {
    v.and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
