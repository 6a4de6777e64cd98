//! Telegram adapter (teloxide).
//!
//! This crate implements the `cmb-core` MessagingPort over Telegram Bot API and
//! routes incoming updates to the membership, registry and price handlers.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode, Recipient},
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use cmb_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{MessagingCapabilities, Photo},
    },
    Result,
};

/// Telegram caps photo captions well below regular messages.
const MAX_CAPTION_LEN: usize = 1024;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    max_message_len: usize,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, max_message_len: usize) -> Self {
        Self {
            bot,
            max_message_len,
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::debug!(wait_secs = d.as_secs(), "telegram asked us to back off");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }

    /// Resolve a chat target as configured: a numeric id or an `@username`.
    pub async fn resolve_chat(&self, target: &str) -> Result<ChatId> {
        let target = target.trim();
        if let Ok(id) = target.parse::<i64>() {
            return Ok(ChatId(id));
        }
        let username = if target.starts_with('@') {
            target.to_string()
        } else {
            format!("@{target}")
        };
        let chat = self
            .with_retry(|| {
                self.bot
                    .get_chat(Recipient::ChannelUsername(username.clone()))
            })
            .await?;
        Ok(ChatId(chat.id.0))
    }
}

fn message_ref(chat_id: ChatId, msg: &Message) -> MessageRef {
    MessageRef {
        chat_id,
        message_id: MessageId(msg.id.0),
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_photos: true,
            max_message_len: self.max_message_len,
            max_caption_len: MAX_CAPTION_LEN,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
            })
            .await?;
        Ok(message_ref(chat_id, &msg))
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;
        Ok(message_ref(chat_id, &msg))
    }

    async fn send_photo_html(
        &self,
        chat_id: ChatId,
        photo: Photo,
        caption_html: &str,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let file =
                    InputFile::memory(photo.bytes.clone()).file_name(photo.file_name.clone());
                self.bot
                    .send_photo(Self::tg_chat(chat_id), file)
                    .caption(caption_html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;
        Ok(message_ref(chat_id, &msg))
    }
}
