//! Price quotes: `price <SYMBOL>` command, quote model and formatting.

use async_trait::async_trait;

pub mod command;
pub mod format;

pub use command::{CommandError, PriceCommand};
pub use format::{format_quote_html, round_value};

/// Latest OHLCV candle for a symbol, quoted in `currency`.
#[derive(Clone, Debug, PartialEq)]
pub struct OhlcvQuote {
    pub symbol: String,
    pub name: String,
    pub currency: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// RFC3339, UTC.
    pub time_open: String,
    /// RFC3339, UTC.
    pub last_updated: String,
}

/// Everything a quote reply needs. Only the candle is mandatory.
#[derive(Clone, Debug, PartialEq)]
pub struct QuoteReport {
    pub quote: OhlcvQuote,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub percent_change_24h: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// The API rejected the symbol (HTTP 400).
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    /// The API answered but has no usable data for the symbol.
    #[error("data not available for {0}")]
    Unavailable(String),

    #[error("market data request failed: {0}")]
    Http(String),
}

impl MarketError {
    /// Short reply for the user, if this failure is the user's business.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            MarketError::InvalidSymbol(_) => Some("Please enter a valid symbol."),
            MarketError::Unavailable(_) => Some("Data not available for this one"),
            MarketError::Http(_) => None,
        }
    }
}

/// Market-data port.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn quote(&self, symbol: &str) -> std::result::Result<QuoteReport, MarketError>;

    /// Download an image (the coin logo). `None` when it cannot be fetched.
    async fn fetch_image(&self, url: &str) -> Option<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_symbol_problems_reach_the_user() {
        assert_eq!(
            MarketError::InvalidSymbol("XYZ".into()).user_message(),
            Some("Please enter a valid symbol.")
        );
        assert_eq!(
            MarketError::Unavailable("XYZ".into()).user_message(),
            Some("Data not available for this one")
        );
        assert_eq!(
            MarketError::Http("ohlcv 500 Internal Server Error".into()).user_message(),
            None
        );
    }
}
