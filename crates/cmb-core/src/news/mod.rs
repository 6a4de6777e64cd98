//! News forwarding: watermark dedup + the periodic poller.

use async_trait::async_trait;

use crate::Result;

pub mod poller;
pub mod tracker;

pub use poller::{NewsPoller, PollOutcome};
pub use tracker::{poll_new_items, PollPlan};

/// One article as delivered by the upstream feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewsItem {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub url: String,
}

/// Upstream news source.
///
/// Implementations return the latest items newest first. Any transport or
/// payload problem is an error; an empty feed is `Ok(vec![])`.
#[async_trait]
pub trait NewsFeed: Send + Sync {
    async fn latest(&self) -> Result<Vec<NewsItem>>;
}

/// Persisted "last delivered news id".
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn load_watermark(&self) -> Result<i64>;
    async fn save_watermark(&self, last_seen_id: i64) -> Result<()>;
}
