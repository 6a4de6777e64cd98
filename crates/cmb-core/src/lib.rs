//! Core domain + application logic for the crypto market bot.
//!
//! This crate is framework-agnostic. Telegram, CoinMarketCap and CryptoCompare
//! live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod market;
pub mod membership;
pub mod messaging;
pub mod news;
pub mod registry;
pub mod secrets;
pub mod utils;

pub use errors::{Error, Result};
