use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cmb_core::{
    config::Config,
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    market::MarketData,
    messaging::{
        port::MessagingPort,
        types::{MessagingCapabilities, Photo},
    },
    registry::RegistryStore,
    secrets::SecretsFile,
    Result,
};

use crate::router::AppState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Sent {
    pub chat_id: ChatId,
    /// `text`, `html` or `photo` (body is the file name for photos).
    pub kind: &'static str,
    pub body: String,
}

#[derive(Default)]
pub(crate) struct RecordingMessenger {
    pub sent: Mutex<Vec<Sent>>,
    pub fail_photos: bool,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, chat_id: ChatId, kind: &'static str, body: &str) -> Result<MessageRef> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(Sent {
            chat_id,
            kind,
            body: body.to_string(),
        });
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(sent.len() as i32),
        })
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_photos: true,
            max_message_len: 4096,
            max_caption_len: 1024,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.record(chat_id, "text", text)
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.record(chat_id, "html", html)
    }

    async fn send_photo_html(
        &self,
        chat_id: ChatId,
        photo: Photo,
        _caption_html: &str,
    ) -> Result<MessageRef> {
        if self.fail_photos {
            return Err(Error::External("telegram error: bad photo".to_string()));
        }
        self.record(chat_id, "photo", &photo.file_name)
    }
}

/// State for handler tests. `secrets_json` is the body of the `secrets` object.
pub(crate) fn app_state(
    secrets_json: &str,
    messenger: Arc<RecordingMessenger>,
    market: Option<Arc<dyn MarketData>>,
) -> Arc<AppState> {
    let secrets = SecretsFile::parse(&format!(r#"{{"secrets": {secrets_json}}}"#)).unwrap();
    let cfg = Config::from_sources(|_| None, "secrets.json".into(), &secrets).unwrap();
    Arc::new(AppState {
        cfg: Arc::new(cfg),
        messenger,
        registry: Arc::new(RegistryStore::in_memory()),
        market,
        bot_username: "cmb_bot".to_string(),
    })
}
