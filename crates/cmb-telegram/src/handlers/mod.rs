//! Telegram update handlers.
//!
//! Each endpoint converts the teloxide update into core types and delegates.
//! Failures never reach the dispatcher: they are logged and reported to the
//! developer chat (when one is configured), then the update is dropped.

use std::sync::Arc;

use serde::Serialize;
use teloxide::{
    prelude::*,
    types::{ChatMemberUpdated, Message},
};

use cmb_core::{domain::ChatId, formatting::error_report_html, market::PriceCommand};

use crate::router::AppState;

mod commands;
mod membership;
mod price;
#[cfg(test)]
mod test_support;

pub async fn handle_my_chat_member(
    upd: ChatMemberUpdated,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    if let Err(e) = membership::track_chats(&upd, state.clone()).await {
        report_error(&state, &upd, &e).await;
    }
    Ok(())
}

pub async fn handle_chat_member(
    upd: ChatMemberUpdated,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    if let Err(e) = membership::greet_chat_members(&upd, state.clone()).await {
        report_error(&state, &upd, &e).await;
    }
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = ChatId(msg.chat.id.0);

    let res = if text.starts_with('/') {
        commands::handle_command(chat_id, text, state.clone()).await
    } else if PriceCommand::is_addressed(text) {
        price::handle_price(chat_id, text, state.clone()).await
    } else {
        Ok(())
    };

    if let Err(e) = res {
        report_error(&state, &msg, &e).await;
    }
    Ok(())
}

/// Log a handler failure and forward it to the developer chat.
async fn report_error<U: Serialize>(state: &AppState, update: &U, err: &anyhow::Error) {
    let dump = serde_json::to_string_pretty(update)
        .unwrap_or_else(|e| format!("<unserializable update: {e}>"));
    tracing::error!(
        error = %format!("{err:#}"),
        update = %dump,
        "exception while handling an update"
    );

    let Some(dev_chat) = state.cfg.dev_chat_id else {
        return;
    };

    let limit = state.messenger.capabilities().max_message_len;
    let html = error_report_html(&dump, &format!("{err:?}"), limit);

    if let Err(e) = state.messenger.send_html(dev_chat, &html).await {
        tracing::warn!(chat_id = dev_chat.0, error = %e, "failed to report error to dev chat");
    }
}
