use chrono::{DateTime, Utc};

use crate::{formatting::escape_html, market::QuoteReport};

/// Render a price with precision scaled to its magnitude.
///
/// Large prices get 2 decimals, sub-cent prices get 8.
pub fn round_value(v: f64) -> String {
    let whole = v.trunc();
    if whole >= 100.0 {
        return format!("{v:.2}");
    }
    if whole >= 10.0 {
        return format!("{v:.3}");
    }
    if whole >= 1.0 {
        return format!("{v:.4}");
    }
    if v >= 0.01 {
        return format!("{v:.5}");
    }
    format!("{v:.8}")
}

/// `2021-09-01T12:34:56.000Z` -> `2021-09-01 12:34` (UTC).
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M").to_string();
    }
    // Unknown shape: drop seconds and the date/time separator, keep the rest.
    let trimmed = raw.rfind(':').map(|i| &raw[..i]).unwrap_or(raw);
    trimmed.replacen('T', " ", 1)
}

fn format_change(change: Option<f64>) -> String {
    match change {
        Some(c) if c > 0.0 => format!("<b>+{c:.2}</b>"),
        Some(c) => format!("<i>{c:.2}</i>"),
        None => "<i>n/a</i>".to_string(),
    }
}

/// Telegram HTML for a quote reply (also used as a photo caption).
pub fn format_quote_html(report: &QuoteReport) -> String {
    let q = &report.quote;
    let cur = escape_html(&q.currency);
    let website = report
        .website
        .as_deref()
        .map(escape_html)
        .unwrap_or_else(|| "n/a".to_string());

    let mut out = String::new();
    out.push_str(&format!(
        "<code>Symbol: {} </code>{}%",
        escape_html(&q.symbol),
        format_change(report.percent_change_24h)
    ));
    out.push_str(&format!(
        "<code>\nPrice: {} {cur}\nName: {}\n</code>",
        round_value(q.close),
        escape_html(&q.name)
    ));
    out.push_str(&format!("website: {website}"));
    out.push_str(&format!(
        "<code>\nTime Open: {} UTC\nLast updated: {} UTC\n",
        escape_html(&format_timestamp(&q.time_open)),
        escape_html(&format_timestamp(&q.last_updated)),
    ));
    out.push_str(&format!(
        "open: {} {cur}\nlow: {} {cur}\nhigh: {} {cur}\nclose: {} {cur}\nvolume: {} {cur}</code>",
        round_value(q.open),
        round_value(q.low),
        round_value(q.high),
        round_value(q.close),
        round_value(q.volume),
    ));
    out
}
