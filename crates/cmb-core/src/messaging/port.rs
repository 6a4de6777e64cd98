use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{MessagingCapabilities, Photo},
    Result,
};

/// Outbound messaging port.
///
/// Greetings, news delivery, quotes and error reports all go through here, so
/// the core never touches the Telegram client directly.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    /// Plain text, no markup parsing.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    async fn send_photo_html(
        &self,
        chat_id: ChatId,
        photo: Photo,
        caption_html: &str,
    ) -> Result<MessageRef>;
}
