use std::sync::Arc;

use cmb_core::{domain::ChatId, messaging::port::MessagingPort};

use crate::router::AppState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ParsedCommand {
    pub name: String,
    /// `bot` in `/cmd@bot`.
    pub addressee: Option<String>,
}

impl ParsedCommand {
    /// Unaddressed commands are for every bot in the chat.
    pub fn is_for(&self, bot_username: &str) -> bool {
        self.addressee
            .as_deref()
            .map_or(true, |name| name.eq_ignore_ascii_case(bot_username))
    }
}

pub(crate) fn parse_command(text: &str) -> ParsedCommand {
    // Telegram may send `/cmd@botname arg1 ...`
    let first = text.split_whitespace().next().unwrap_or("");

    let mut head = first.trim_start_matches('/').splitn(2, '@');
    let name = head.next().unwrap_or("").to_lowercase();
    let addressee = head.next().map(str::to_string);

    ParsedCommand { name, addressee }
}

/// Split plain text into chunks of at most `limit` chars, preferring to break
/// after a space.
pub(crate) fn split_text_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut out = Vec::new();
    let mut rest: Vec<char> = text.chars().collect();

    while rest.len() > limit {
        let cut = rest[..limit]
            .iter()
            .rposition(|c| *c == ' ')
            .filter(|i| *i > 0)
            .map(|i| i + 1)
            .unwrap_or(limit);
        out.push(rest[..cut].iter().collect::<String>().trim_end().to_string());
        rest.drain(..cut);
    }
    if !rest.is_empty() || out.is_empty() {
        out.push(rest.into_iter().collect());
    }
    out
}

const HELP_TEXT: &str = "<b>Crypto market bot</b>\n\n\
<b>Commands:</b>\n\
/start - Show this help message\n\
/show_chats - List the chats this bot is in\n\
<code>price SYMBOL</code> - Latest quote, e.g. <code>price BTC</code>\n\n\
Add me to a group to greet new members.";

async fn send_text_split(
    messenger: &dyn MessagingPort,
    chat_id: ChatId,
    text: &str,
) -> anyhow::Result<()> {
    let limit = messenger.capabilities().max_message_len;
    for chunk in split_text_chunks(text, limit) {
        messenger.send_text(chat_id, &chunk).await?;
    }
    Ok(())
}

pub async fn handle_command(
    chat_id: ChatId,
    text: &str,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    let cmd = parse_command(text);
    if !cmd.is_for(&state.bot_username) {
        tracing::debug!(
            chat_id = chat_id.0,
            command = %cmd.name,
            addressee = cmd.addressee.as_deref().unwrap_or_default(),
            "command for another bot ignored"
        );
        return Ok(());
    }

    match cmd.name.as_str() {
        "start" | "help" => {
            state.messenger.send_html(chat_id, HELP_TEXT).await?;
        }
        "show_chats" => {
            let summary = state
                .registry
                .snapshot()
                .await
                .summary(&state.bot_username);
            send_text_split(state.messenger.as_ref(), chat_id, &summary).await?;
        }
        other => {
            tracing::debug!(chat_id = chat_id.0, command = other, "unknown command ignored");
        }
    }
    Ok(())
}
