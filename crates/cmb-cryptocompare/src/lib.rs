//! CryptoCompare adapter (news feed).
//!
//! Implements the `NewsFeed` port over `GET /data/v2/news/`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use cmb_core::{
    errors::Error,
    news::{NewsFeed, NewsItem},
    Result,
};

#[derive(Clone, Debug)]
pub struct CryptoCompareConfig {
    pub url: String,
    pub api_key: String,
    /// Comma separated feed keys (e.g. `coindesk,cointelegraph`). `None` = all feeds.
    pub feeds: Option<String>,
    pub lang: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct CryptoCompareClient {
    cfg: CryptoCompareConfig,
    http: reqwest::Client,
}

impl CryptoCompareClient {
    pub fn new(cfg: CryptoCompareConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent("cmb/0.1")
            .build()
            .map_err(|e| Error::External(format!("cryptocompare client build: {e}")))?;
        Ok(Self { cfg, http })
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("lang", self.cfg.lang.clone()),
            ("api_key", self.cfg.api_key.clone()),
        ];
        if let Some(feeds) = &self.cfg.feeds {
            q.push(("feeds", feeds.clone()));
        }
        q
    }
}

#[async_trait]
impl NewsFeed for CryptoCompareClient {
    async fn latest(&self) -> Result<Vec<NewsItem>> {
        let resp = self
            .http
            .get(&self.cfg.url)
            .query(&self.query())
            .send()
            .await
            .map_err(|e| Error::External(format!("cryptocompare request error: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("cryptocompare read error: {e}")))?;

        if !status.is_success() {
            return Err(Error::External(format!(
                "cryptocompare news failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let items = parse_news(&body)?;
        tracing::debug!(items = items.len(), "fetched news feed");
        Ok(items)
    }
}

#[derive(Deserialize)]
struct NewsResponse {
    #[serde(rename = "Data", default)]
    data: serde_json::Value,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "Response", default)]
    response: Option<String>,
}

#[derive(Deserialize)]
struct RawArticle {
    id: serde_json::Value,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    url: String,
}

/// Parse a `/data/v2/news/` payload into items, preserving feed order (newest first).
///
/// Error payloads (`"Response": "Error"`, non-array `Data`) and articles without a
/// numeric id fail the whole batch.
pub fn parse_news(body: &str) -> Result<Vec<NewsItem>> {
    let resp: NewsResponse = serde_json::from_str(body)?;

    if resp.response.as_deref() == Some("Error") {
        return Err(Error::External(format!(
            "cryptocompare error: {}",
            resp.message.unwrap_or_default()
        )));
    }
    if !resp.data.is_array() {
        return Err(Error::External(format!(
            "cryptocompare returned no article list: {}",
            resp.message.unwrap_or_default()
        )));
    }

    let raw: Vec<RawArticle> = serde_json::from_value(resp.data)?;
    raw.into_iter()
        .map(|a| {
            let id = article_id(&a.id).ok_or_else(|| {
                Error::External(format!("cryptocompare article has non-numeric id: {}", a.id))
            })?;
            Ok(NewsItem {
                id,
                title: a.title,
                body: a.body,
                url: a.url,
            })
        })
        .collect()
}

fn article_id(v: &serde_json::Value) -> Option<i64> {
    match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
