//! `secrets.json` store.
//!
//! Holds API keys, chat targets and the news watermark (`last_news_id`).
//! Unknown keys survive a load/save cycle so operators can keep notes in the file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;

use crate::{news::WatermarkStore, utils::write_atomic, Error, Result};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SecretsFile {
    #[serde(default)]
    pub secrets: Secrets,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Secrets {
    #[serde(
        rename = "BOT_API_TOKEN",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bot_api_token: Option<String>,

    #[serde(
        rename = "COINMARKETCAP_KEY",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub coinmarketcap_key: Option<String>,

    #[serde(
        rename = "CRYPTOCOMPARE_API",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cryptocompare_key: Option<String>,

    /// Comma separated CryptoCompare feed keys, passed through verbatim.
    #[serde(
        rename = "FEED_SOURCES",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub feed_sources: Option<String>,

    #[serde(
        rename = "DEV_USER",
        default,
        deserialize_with = "lenient_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub dev_user: Option<i64>,

    /// Numeric chat id or `@channel` username.
    #[serde(
        rename = "CHAT_HANDLE",
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub chat_handle: Option<String>,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub last_news_id: i64,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SecretsFile {
    pub fn parse(txt: &str) -> Result<Self> {
        Ok(serde_json::from_str(txt)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let txt = std::fs::read_to_string(path).map_err(|e| Error::Persistence {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&txt).map_err(|e| Error::Persistence {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut txt = serde_json::to_string_pretty(self)?;
        txt.push('\n');
        write_atomic(path, txt.as_bytes())
    }
}

/// File-backed secrets store. Read-modify-write cycles are serialized.
pub struct SecretsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SecretsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn load(&self) -> Result<SecretsFile> {
        SecretsFile::read(&self.path)
    }

    /// Re-read the file, apply `f`, write it back.
    pub async fn update(&self, f: impl FnOnce(&mut Secrets)) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load()?;
        f(&mut file.secrets);
        file.write(&self.path)
    }
}

#[async_trait]
impl WatermarkStore for SecretsStore {
    async fn load_watermark(&self) -> Result<i64> {
        Ok(self.load()?.secrets.last_news_id)
    }

    async fn save_watermark(&self, last_seen_id: i64) -> Result<()> {
        self.update(|s| s.last_news_id = last_seen_id).await
    }
}

fn value_to_i64(v: &serde_json::Value) -> Option<i64> {
    match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    if v.is_null() {
        return Ok(0);
    }
    value_to_i64(&v).ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {v}")))
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    if v.is_null() {
        return Ok(None);
    }
    value_to_i64(&v)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {v}")))
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    match v {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or integer, got {other}"
        ))),
    }
}
