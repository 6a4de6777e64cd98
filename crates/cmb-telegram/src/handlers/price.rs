use std::sync::Arc;

use cmb_core::{
    domain::ChatId,
    market::{command::USAGE_HINT, format_quote_html, MarketData, PriceCommand, QuoteReport},
    messaging::{port::MessagingPort, types::Photo},
};

use crate::router::AppState;

const NOT_CONFIGURED: &str = "Price quotes are not configured.";

pub async fn handle_price(
    chat_id: ChatId,
    text: &str,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    let cmd = match PriceCommand::parse(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            tracing::debug!(chat_id = chat_id.0, error = %e, "rejected price command");
            state.messenger.send_text(chat_id, USAGE_HINT).await?;
            return Ok(());
        }
    };

    let Some(market) = state.market.as_deref() else {
        state.messenger.send_text(chat_id, NOT_CONFIGURED).await?;
        return Ok(());
    };

    match market.quote(&cmd.symbol).await {
        Ok(report) => send_quote(state.messenger.as_ref(), market, chat_id, &report).await,
        Err(e) => match e.user_message() {
            Some(reply) => {
                tracing::info!(symbol = %cmd.symbol, error = %e, "quote unavailable");
                state.messenger.send_text(chat_id, reply).await?;
                Ok(())
            }
            None => Err(e.into()),
        },
    }
}

/// Reply with the logo as a photo when one is available and the text fits a
/// caption; otherwise (or if the upload fails) as a plain HTML message.
async fn send_quote(
    messenger: &dyn MessagingPort,
    market: &dyn MarketData,
    chat_id: ChatId,
    report: &QuoteReport,
) -> anyhow::Result<()> {
    let html = format_quote_html(report);
    let caps = messenger.capabilities();

    let fits_caption = html.chars().count() <= caps.max_caption_len;
    if caps.supports_photos && fits_caption {
        if let Some(url) = report.logo_url.as_deref() {
            if let Some(bytes) = market.fetch_image(url).await {
                let photo = Photo::new(bytes, logo_file_name(&report.quote.symbol));
                match messenger.send_photo_html(chat_id, photo, &html).await {
                    Ok(_) => return Ok(()),
                    Err(e) => tracing::warn!(
                        chat_id = chat_id.0,
                        error = %e,
                        "logo upload failed; sending text"
                    ),
                }
            }
        }
    }

    messenger.send_html(chat_id, &html).await?;
    Ok(())
}

fn logo_file_name(symbol: &str) -> String {
    format!("{}.png", symbol.to_lowercase())
}
