//! CoinMarketCap adapter (price quotes).
//!
//! A quote combines three Pro API calls:
//! - `ohlcv/latest`: the candle (required)
//! - `info`: website + logo (optional)
//! - `quotes/latest`: 24h change (optional)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    StatusCode,
};
use serde_json::Value;

use cmb_core::{
    errors::Error,
    market::{MarketData, MarketError, OhlcvQuote, QuoteReport},
    Result,
};

const OHLCV_PATH: &str = "/v1/cryptocurrency/ohlcv/latest";
const INFO_PATH: &str = "/v1/cryptocurrency/info";
const QUOTES_PATH: &str = "/v1/cryptocurrency/quotes/latest";

#[derive(Clone, Debug)]
pub struct CoinMarketCapClient {
    base_url: String,
    http: reqwest::Client,
}

impl CoinMarketCapClient {
    pub fn new(base_url: impl Into<String>, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| Error::Config(format!("invalid COINMARKETCAP_KEY: {e}")))?;
        headers.insert("X-CMC_PRO_API_KEY", key);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("cmb/0.1")
            .default_headers(headers)
            .build()
            .map_err(|e| Error::External(format!("coinmarketcap client build: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get(
        &self,
        path: &str,
        symbol: &str,
    ) -> std::result::Result<(StatusCode, String), MarketError> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| MarketError::Http(format!("{path}: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| MarketError::Http(format!("{path}: {e}")))?;
        Ok((status, body))
    }

    /// Optional endpoints: any failure just means "no extra data".
    async fn get_optional(&self, path: &str, symbol: &str) -> Option<String> {
        match self.get(path, symbol).await {
            Ok((status, body)) if status.is_success() => Some(body),
            Ok((status, _)) => {
                tracing::debug!(path, %status, symbol, "optional market call failed");
                None
            }
            Err(e) => {
                tracing::debug!(path, symbol, error = %e, "optional market call failed");
                None
            }
        }
    }
}

#[async_trait]
impl MarketData for CoinMarketCapClient {
    async fn quote(&self, symbol: &str) -> std::result::Result<QuoteReport, MarketError> {
        let (ohlcv, info, quotes) = tokio::join!(
            self.get(OHLCV_PATH, symbol),
            self.get_optional(INFO_PATH, symbol),
            self.get_optional(QUOTES_PATH, symbol),
        );

        let (status, body) = ohlcv?;
        ohlcv_status(status, &body, symbol)?;

        let quote = parse_ohlcv(&body, symbol)?;
        let (website, logo_url) = info
            .as_deref()
            .map(|b| parse_info(b, symbol))
            .unwrap_or_default();
        let percent_change_24h = quotes
            .as_deref()
            .and_then(|b| parse_change_24h(b, symbol, &quote.currency));

        Ok(QuoteReport {
            quote,
            website,
            logo_url,
            percent_change_24h,
        })
    }

    async fn fetch_image(&self, url: &str) -> Option<Vec<u8>> {
        let resp = self.http.get(url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let bytes = resp.bytes().await.ok()?;
        if bytes.is_empty() {
            return None;
        }
        Some(bytes.to_vec())
    }
}

/// CoinMarketCap answers 400 for unknown symbols; anything else non-2xx is an outage.
fn ohlcv_status(
    status: StatusCode,
    body: &str,
    symbol: &str,
) -> std::result::Result<(), MarketError> {
    if status == StatusCode::BAD_REQUEST {
        return Err(MarketError::InvalidSymbol(symbol.to_string()));
    }
    if !status.is_success() {
        return Err(MarketError::Http(format!(
            "ohlcv {status}: {}",
            body.chars().take(200).collect::<String>()
        )));
    }
    Ok(())
}

/// `data[symbol]` of a successful payload, or `None` if the API reported an error.
fn symbol_data(body: &str, symbol: &str) -> Option<Value> {
    let v: Value = serde_json::from_str(body).ok()?;
    if !v["status"]["error_message"].is_null() {
        return None;
    }
    let data = v.get("data")?.get(symbol)?;
    // Some endpoints return a list per symbol when tickers collide; take the first.
    match data {
        Value::Array(xs) => xs.first().cloned(),
        other => Some(other.clone()),
    }
}

pub fn parse_ohlcv(body: &str, symbol: &str) -> std::result::Result<OhlcvQuote, MarketError> {
    let unavailable = || MarketError::Unavailable(symbol.to_string());
    let data = symbol_data(body, symbol).ok_or_else(unavailable)?;

    let quotes = data
        .get("quote")
        .and_then(Value::as_object)
        .ok_or_else(unavailable)?;
    let (currency, q) = quotes.iter().next().ok_or_else(unavailable)?;

    let num = |k: &str| q.get(k).and_then(Value::as_f64).ok_or_else(unavailable);
    let text = |v: &Value, k: &str| v.get(k).and_then(Value::as_str).map(str::to_string);

    Ok(OhlcvQuote {
        symbol: text(&data, "symbol").unwrap_or_else(|| symbol.to_string()),
        name: text(&data, "name").unwrap_or_default(),
        currency: currency.clone(),
        open: num("open")?,
        high: num("high")?,
        low: num("low")?,
        close: num("close")?,
        volume: num("volume")?,
        time_open: text(&data, "time_open").unwrap_or_default(),
        last_updated: text(q, "last_updated").unwrap_or_default(),
    })
}

pub fn parse_info(body: &str, symbol: &str) -> (Option<String>, Option<String>) {
    let Some(data) = symbol_data(body, symbol) else {
        return (None, None);
    };
    let website = data["urls"]["website"]
        .as_array()
        .and_then(|xs| xs.first())
        .and_then(Value::as_str)
        .map(str::to_string);
    let logo = data["logo"].as_str().map(str::to_string);
    (website, logo)
}

pub fn parse_change_24h(body: &str, symbol: &str, currency: &str) -> Option<f64> {
    symbol_data(body, symbol)?["quote"][currency]["percent_change_24h"].as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OHLCV: &str = r#"{
      "status": {"error_code": 0, "error_message": null},
      "data": {"BTC": {
        "id": 1, "name": "Bitcoin", "symbol": "BTC",
        "time_open": "2021-09-01T00:00:00.000Z",
        "quote": {"USD": {
          "open": 47100.5, "high": 48900.1, "low": 46600.0, "close": 48800.25,
          "volume": 49000000000.0, "last_updated": "2021-09-01T12:34:00.000Z"
        }}
      }}
    }"#;

    #[test]
    fn parses_ohlcv_candle() {
        let q = parse_ohlcv(OHLCV, "BTC").unwrap();
        assert_eq!(q.name, "Bitcoin");
        assert_eq!(q.currency, "USD");
        assert_eq!(q.close, 48800.25);
        assert_eq!(q.time_open, "2021-09-01T00:00:00.000Z");
        assert_eq!(q.last_updated, "2021-09-01T12:34:00.000Z");
    }

    #[test]
    fn error_message_means_unavailable() {
        let body = r#"{"status": {"error_message": "No items found."}, "data": {}}"#;
        assert!(matches!(
            parse_ohlcv(body, "XYZ"),
            Err(MarketError::Unavailable(_))
        ));
    }

    #[test]
    fn missing_quote_fields_mean_unavailable() {
        let body = r#"{"status": {"error_message": null},
          "data": {"BTC": {"quote": {"USD": {"open": 1.0}}}}}"#;
        assert!(matches!(
            parse_ohlcv(body, "BTC"),
            Err(MarketError::Unavailable(_))
        ));
    }

    #[test]
    fn bad_request_means_invalid_symbol() {
        let body = r#"{"status": {"error_code": 400, "error_message": "Invalid value"}}"#;
        assert!(matches!(
            ohlcv_status(StatusCode::BAD_REQUEST, body, "NOPE"),
            Err(MarketError::InvalidSymbol(s)) if s == "NOPE"
        ));
    }

    #[test]
    fn other_failures_are_outages() {
        let body = "x".repeat(500);
        match ohlcv_status(StatusCode::INTERNAL_SERVER_ERROR, &body, "BTC") {
            Err(MarketError::Http(msg)) => {
                assert!(msg.starts_with("ohlcv 500 Internal Server Error: xxx"));
                assert!(msg.len() < 250);
            }
            other => panic!("expected outage, got {other:?}"),
        }
        assert!(matches!(
            ohlcv_status(StatusCode::UNAUTHORIZED, "", "BTC"),
            Err(MarketError::Http(_))
        ));
        assert!(ohlcv_status(StatusCode::OK, OHLCV, "BTC").is_ok());
    }

    #[test]
    fn parses_info_and_change() {
        let info = r#"{"status": {"error_message": null}, "data": {"BTC": [{
          "logo": "https://s2.coinmarketcap.com/static/img/coins/64x64/1.png",
          "urls": {"website": ["https://bitcoin.org/"]}
        }]}}"#;
        let (site, logo) = parse_info(info, "BTC");
        assert_eq!(site.as_deref(), Some("https://bitcoin.org/"));
        assert!(logo.unwrap().ends_with("1.png"));

        let quotes = r#"{"status": {"error_message": null}, "data": {"BTC": {
          "quote": {"USD": {"price": 48800.0, "percent_change_24h": -2.5}}
        }}}"#;
        assert_eq!(parse_change_24h(quotes, "BTC", "USD"), Some(-2.5));
        assert_eq!(parse_change_24h(quotes, "BTC", "EUR"), None);
    }

    #[test]
    fn info_errors_degrade_to_none() {
        assert_eq!(parse_info("not json", "BTC"), (None, None));
    }

    #[test]
    fn rejects_non_ascii_api_key() {
        let client =
            CoinMarketCapClient::new("http://localhost", "bad\nkey", Duration::from_secs(1));
        assert!(client.is_err());
    }
}
