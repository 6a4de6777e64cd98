use crate::news::NewsItem;

/// What a poll cycle should deliver and persist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPlan {
    /// Unseen items, oldest first.
    pub unseen: Vec<NewsItem>,
    pub new_watermark: i64,
}

impl PollPlan {
    pub fn is_empty(&self) -> bool {
        self.unseen.is_empty()
    }
}

/// Select the items of a newest-first `feed` that are newer than `last_seen_id`.
///
/// Only the leading run of items above the watermark counts; the feed is
/// expected to be sorted by id, descending. The new watermark is the id of the
/// first (newest) item, or `last_seen_id` when nothing is new.
pub fn poll_new_items(feed: &[NewsItem], last_seen_id: i64) -> PollPlan {
    let Some(newest) = feed.first() else {
        return PollPlan {
            unseen: Vec::new(),
            new_watermark: last_seen_id,
        };
    };
    if newest.id <= last_seen_id {
        return PollPlan {
            unseen: Vec::new(),
            new_watermark: last_seen_id,
        };
    }

    let fresh = feed
        .iter()
        .take_while(|item| item.id > last_seen_id)
        .count();
    let unseen = feed[..fresh].iter().rev().cloned().collect();

    PollPlan {
        unseen,
        new_watermark: newest.id,
    }
}
