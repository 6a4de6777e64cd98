use std::sync::Arc;

use teloxide::types::{Chat, ChatMemberKind, ChatMemberUpdated, User};

use cmb_core::{
    domain::{Actor, ChatId, UserId},
    formatting::greeting_html,
    membership::{self, ChatKind, Direction, MemberStatus, MembershipChange},
};

use crate::router::AppState;

/// Map a teloxide member kind to our status plus the restricted presence flag.
pub(crate) fn member_status(kind: &ChatMemberKind) -> (MemberStatus, Option<bool>) {
    match kind {
        ChatMemberKind::Owner(_) => (MemberStatus::Creator, None),
        ChatMemberKind::Administrator(_) => (MemberStatus::Administrator, None),
        ChatMemberKind::Member => (MemberStatus::Member, None),
        ChatMemberKind::Restricted(r) => (MemberStatus::Restricted, Some(r.is_member)),
        ChatMemberKind::Left => (MemberStatus::Left, None),
        ChatMemberKind::Banned(_) => (MemberStatus::Banned, None),
    }
}

pub(crate) fn membership_change(old: &ChatMemberKind, new: &ChatMemberKind) -> MembershipChange {
    let (old_status, old_is_member) = member_status(old);
    let (new_status, new_is_member) = member_status(new);
    MembershipChange::new(old_status, new_status).with_flags(old_is_member, new_is_member)
}

pub(crate) fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_group() || chat.is_supergroup() {
        ChatKind::Group
    } else {
        ChatKind::Channel
    }
}

pub(crate) fn actor(user: &User) -> Actor {
    Actor {
        id: UserId(user.id.0 as i64),
        full_name: user.full_name(),
    }
}

/// The bot itself was added to / removed from a chat.
pub async fn track_chats(upd: &ChatMemberUpdated, state: Arc<AppState>) -> anyhow::Result<()> {
    let change = membership_change(&upd.old_chat_member.kind, &upd.new_chat_member.kind);
    let Some(event) = membership::route(
        &change,
        chat_kind(&upd.chat),
        ChatId(upd.chat.id.0),
        &upd.from.full_name(),
        upd.chat.title(),
    ) else {
        tracing::debug!(
            chat_id = upd.chat.id.0,
            old = change.old_status.as_str(),
            new = change.new_status.as_str(),
            "bot membership update ignored"
        );
        return Ok(());
    };

    tracing::info!(chat_id = event.chat_id.0, "{}", event.describe());
    state.registry.apply(event.registry_change()).await;
    Ok(())
}

/// Someone else joined or left a chat the bot administers.
pub async fn greet_chat_members(
    upd: &ChatMemberUpdated,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    let change = membership_change(&upd.old_chat_member.kind, &upd.new_chat_member.kind);
    let Some(direction) = membership::classify(&change).and_then(|t| t.direction()) else {
        return Ok(());
    };

    let member = actor(&upd.new_chat_member.user);
    let cause = actor(&upd.from);
    match direction {
        Direction::Joined => {
            let chat_id = ChatId(upd.chat.id.0);
            state
                .messenger
                .send_html(chat_id, &greeting_html(&member, &cause))
                .await?;
            tracing::info!(chat_id = chat_id.0, member = %member.full_name, "greeted new member");
        }
        Direction::Left => {
            tracing::debug!(
                chat_id = upd.chat.id.0,
                member = %member.full_name,
                "member left"
            );
        }
    }
    Ok(())
}
