//! Periodic news forwarding.
//!
//! One cycle: load watermark, fetch, select unseen, persist the new watermark,
//! then deliver. The watermark is written before anything is sent, so a crash
//! mid-delivery loses the rest of that batch instead of re-sending it later.

use std::{sync::Arc, time::Duration};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::ChatId,
    formatting::news_html,
    messaging::port::MessagingPort,
    news::{tracker::poll_new_items, NewsFeed, WatermarkStore},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing newer than the watermark.
    Unchanged { watermark: i64 },
    /// Watermark advanced; `dropped` items were lost to a send failure.
    Delivered {
        watermark: i64,
        delivered: usize,
        dropped: usize,
    },
}

pub struct NewsPoller {
    feed: Arc<dyn NewsFeed>,
    watermark: Arc<dyn WatermarkStore>,
    messenger: Arc<dyn MessagingPort>,
    chat_id: ChatId,
    message_limit: usize,
}

impl NewsPoller {
    pub fn new(
        feed: Arc<dyn NewsFeed>,
        watermark: Arc<dyn WatermarkStore>,
        messenger: Arc<dyn MessagingPort>,
        chat_id: ChatId,
    ) -> Self {
        let message_limit = messenger.capabilities().max_message_len;
        Self {
            feed,
            watermark,
            messenger,
            chat_id,
            message_limit,
        }
    }

    /// Run one poll cycle.
    ///
    /// Fetch and watermark errors abort the cycle before anything is sent.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let last_seen = self.watermark.load_watermark().await?;
        let feed = self.feed.latest().await?;

        let plan = poll_new_items(&feed, last_seen);
        if plan.is_empty() {
            return Ok(PollOutcome::Unchanged {
                watermark: last_seen,
            });
        }

        self.watermark.save_watermark(plan.new_watermark).await?;
        tracing::info!(
            from = last_seen,
            to = plan.new_watermark,
            items = plan.unseen.len(),
            "news watermark advanced"
        );

        let total = plan.unseen.len();
        let mut delivered = 0usize;
        for item in plan.unseen.iter() {
            let html = news_html(item, self.message_limit);
            if let Err(e) = self.messenger.send_html(self.chat_id, &html).await {
                tracing::warn!(
                    news_id = item.id,
                    chat_id = %self.chat_id,
                    error = %e,
                    dropped = total - delivered,
                    "news delivery failed; rest of batch dropped"
                );
                break;
            }
            delivered += 1;
        }

        Ok(PollOutcome::Delivered {
            watermark: plan.new_watermark,
            delivered,
            dropped: total - delivered,
        })
    }

    /// Poll every `every` until `cancel` fires. The first cycle runs immediately.
    ///
    /// Cycles never overlap: a slow cycle delays the next tick.
    pub async fn run(&self, every: Duration, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            chat_id = %self.chat_id,
            every_secs = every.as_secs(),
            "news poller started"
        );
        loop {
            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = tick.tick() => {
                match self.poll_once().await {
                  Ok(PollOutcome::Unchanged { .. }) => {
                    tracing::debug!("no new news");
                  }
                  Ok(PollOutcome::Delivered { delivered, .. }) => {
                    tracing::debug!(delivered, "news cycle done");
                  }
                  Err(e) => {
                    tracing::warn!(error = %e, "news poll failed");
                  }
                }
              }
            }
        }
        tracing::info!("news poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        domain::{MessageId, MessageRef},
        errors::Error,
        messaging::types::{MessagingCapabilities, Photo},
        news::NewsItem,
    };

    type Journal = Arc<Mutex<Vec<String>>>;

    struct FakeFeed {
        items: Mutex<Result<Vec<NewsItem>>>,
    }

    impl FakeFeed {
        fn ok(ids: &[i64]) -> Self {
            let items = ids
                .iter()
                .map(|id| NewsItem {
                    id: *id,
                    title: format!("title {id}"),
                    body: format!("body {id}"),
                    url: format!("https://news.example/{id}"),
                })
                .collect();
            Self {
                items: Mutex::new(Ok(items)),
            }
        }

        fn failing() -> Self {
            Self {
                items: Mutex::new(Err(Error::External("http 503".to_string()))),
            }
        }
    }

    #[async_trait]
    impl NewsFeed for FakeFeed {
        async fn latest(&self) -> Result<Vec<NewsItem>> {
            match &*self.items.lock().unwrap() {
                Ok(items) => Ok(items.clone()),
                Err(e) => Err(Error::External(e.to_string())),
            }
        }
    }

    struct FakeWatermark {
        value: Mutex<i64>,
        journal: Journal,
        fail_save: bool,
    }

    #[async_trait]
    impl WatermarkStore for FakeWatermark {
        async fn load_watermark(&self) -> Result<i64> {
            Ok(*self.value.lock().unwrap())
        }

        async fn save_watermark(&self, last_seen_id: i64) -> Result<()> {
            if self.fail_save {
                return Err(Error::External("disk full".to_string()));
            }
            *self.value.lock().unwrap() = last_seen_id;
            self.journal.lock().unwrap().push(format!("save:{last_seen_id}"));
            Ok(())
        }
    }

    struct FakeMessenger {
        journal: Journal,
        fail_after: Option<usize>,
        sent: Mutex<usize>,
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_photos: true,
                max_message_len: 4096,
                max_caption_len: 1024,
            }
        }

        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            self.send_html(chat_id, text).await
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_after.is_some_and(|n| *sent >= n) {
                return Err(Error::External("telegram error: 429".to_string()));
            }
            *sent += 1;
            let title = html
                .lines()
                .next()
                .unwrap_or_default()
                .trim_start_matches("<b>title ")
                .trim_end_matches("</b>")
                .to_string();
            self.journal.lock().unwrap().push(format!("send:{title}"));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(*sent as i32),
            })
        }

        async fn send_photo_html(
            &self,
            chat_id: ChatId,
            _photo: Photo,
            caption_html: &str,
        ) -> Result<MessageRef> {
            self.send_html(chat_id, caption_html).await
        }
    }

    struct Harness {
        journal: Journal,
        watermark: Arc<FakeWatermark>,
        poller: NewsPoller,
    }

    fn harness(
        feed: FakeFeed,
        last_seen: i64,
        fail_save: bool,
        fail_after: Option<usize>,
    ) -> Harness {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let watermark = Arc::new(FakeWatermark {
            value: Mutex::new(last_seen),
            journal: journal.clone(),
            fail_save,
        });
        let messenger = Arc::new(FakeMessenger {
            journal: journal.clone(),
            fail_after,
            sent: Mutex::new(0),
        });
        let poller = NewsPoller::new(Arc::new(feed), watermark.clone(), messenger, ChatId(-1001));
        Harness {
            journal,
            watermark,
            poller,
        }
    }

    fn journal(h: &Harness) -> Vec<String> {
        h.journal.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn persists_watermark_before_delivering_oldest_first() {
        let h = harness(FakeFeed::ok(&[105, 104, 103]), 103, false, None);
        let out = h.poller.poll_once().await.unwrap();
        assert_eq!(
            out,
            PollOutcome::Delivered {
                watermark: 105,
                delivered: 2,
                dropped: 0
            }
        );
        assert_eq!(journal(&h), vec!["save:105", "send:104", "send:105"]);
    }

    #[tokio::test]
    async fn stale_feed_sends_nothing_and_keeps_watermark() {
        let h = harness(FakeFeed::ok(&[50]), 80, false, None);
        let out = h.poller.poll_once().await.unwrap();
        assert_eq!(out, PollOutcome::Unchanged { watermark: 80 });
        assert!(journal(&h).is_empty());
        assert_eq!(*h.watermark.value.lock().unwrap(), 80);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_state_untouched() {
        let h = harness(FakeFeed::failing(), 10, false, None);
        assert!(h.poller.poll_once().await.is_err());
        assert!(journal(&h).is_empty());
        assert_eq!(*h.watermark.value.lock().unwrap(), 10);
    }

    #[tokio::test]
    async fn failed_watermark_save_blocks_delivery() {
        let h = harness(FakeFeed::ok(&[3, 2]), 1, true, None);
        assert!(h.poller.poll_once().await.is_err());
        assert!(journal(&h).is_empty());
    }

    #[tokio::test]
    async fn send_failure_drops_rest_of_batch_without_rewinding() {
        let h = harness(FakeFeed::ok(&[4, 3, 2, 1]), 0, false, Some(1));
        let out = h.poller.poll_once().await.unwrap();
        assert_eq!(
            out,
            PollOutcome::Delivered {
                watermark: 4,
                delivered: 1,
                dropped: 3
            }
        );
        assert_eq!(journal(&h), vec!["save:4", "send:1"]);

        // Next cycle with the same feed delivers nothing again.
        let again = h.poller.poll_once().await.unwrap();
        assert_eq!(again, PollOutcome::Unchanged { watermark: 4 });
    }

    #[tokio::test]
    async fn run_polls_until_cancelled() {
        let h = harness(FakeFeed::ok(&[2, 1]), 0, false, None);
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });
        h.poller.run(Duration::from_millis(10), cancel).await;
        assert_eq!(journal(&h), vec!["save:2", "send:1", "send:2"]);
    }
}
