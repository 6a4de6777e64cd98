//! Membership state-diff engine.
//!
//! Telegram reports membership changes as a before/after pair of chat-member
//! snapshots. This module reduces such a pair to "joined", "left" or nothing,
//! and decides what that means for the chat registry.

use crate::{
    domain::ChatId,
    registry::{Category, RegistryChange},
};

/// Closed set of chat-member statuses.
///
/// `Restricted` does not carry its presence flag here: status equality is what
/// decides whether anything changed, the flag only matters afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberStatus::Creator => "creator",
            MemberStatus::Administrator => "administrator",
            MemberStatus::Member => "member",
            MemberStatus::Restricted => "restricted",
            MemberStatus::Left => "left",
            MemberStatus::Banned => "kicked",
        }
    }
}

/// Before/after snapshot of one user's relationship to one chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MembershipChange {
    pub old_status: MemberStatus,
    pub new_status: MemberStatus,
    pub old_is_member: Option<bool>,
    pub new_is_member: Option<bool>,
}

impl MembershipChange {
    pub fn new(old_status: MemberStatus, new_status: MemberStatus) -> Self {
        Self {
            old_status,
            new_status,
            old_is_member: None,
            new_is_member: None,
        }
    }

    pub fn with_flags(mut self, old_is_member: Option<bool>, new_is_member: Option<bool>) -> Self {
        self.old_is_member = old_is_member;
        self.new_is_member = new_is_member;
        self
    }

    /// The same change seen backwards (new becomes old).
    pub fn inverse(self) -> Self {
        Self {
            old_status: self.new_status,
            new_status: self.old_status,
            old_is_member: self.new_is_member,
            new_is_member: self.old_is_member,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub was_member: bool,
    pub is_member: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Joined,
    Left,
}

impl Transition {
    pub fn direction(self) -> Option<Direction> {
        match (self.was_member, self.is_member) {
            (false, true) => Some(Direction::Joined),
            (true, false) => Some(Direction::Left),
            _ => None,
        }
    }
}

pub fn is_member_equivalent(status: MemberStatus, is_member: Option<bool>) -> bool {
    match status {
        MemberStatus::Creator | MemberStatus::Administrator | MemberStatus::Member => true,
        MemberStatus::Restricted => is_member == Some(true),
        MemberStatus::Left | MemberStatus::Banned => false,
    }
}

/// Classify a membership change.
///
/// Returns `None` when the status did not change. A flag-only change of a
/// restricted member (`restricted/true -> restricted/false`) is also `None`.
pub fn classify(change: &MembershipChange) -> Option<Transition> {
    if change.old_status == change.new_status {
        return None;
    }

    Some(Transition {
        was_member: is_member_equivalent(change.old_status, change.old_is_member),
        is_member: is_member_equivalent(change.new_status, change.new_is_member),
    })
}

/// Classification of a chat for registry purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChatKind {
    Private,
    /// Groups and supergroups.
    Group,
    /// Channels and anything Telegram adds later.
    Channel,
}

impl ChatKind {
    pub fn category(self) -> Category {
        match self {
            ChatKind::Private => Category::User,
            ChatKind::Group => Category::Group,
            ChatKind::Channel => Category::Channel,
        }
    }
}

/// The bot's own membership changed in some chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembershipEvent {
    pub chat_kind: ChatKind,
    pub chat_id: ChatId,
    pub direction: Direction,
    pub actor_name: String,
    pub chat_title: Option<String>,
}

impl MembershipEvent {
    /// Registry mutation implied by this event.
    pub fn registry_change(&self) -> RegistryChange {
        let category = self.chat_kind.category();
        match self.direction {
            Direction::Joined => RegistryChange::Add(category, self.chat_id),
            Direction::Left => RegistryChange::Discard(category, self.chat_id),
        }
    }

    /// Human-readable log line.
    pub fn describe(&self) -> String {
        let actor = &self.actor_name;
        let title = self.chat_title.as_deref().unwrap_or("");
        match (self.chat_kind, self.direction) {
            (ChatKind::Private, Direction::Joined) => format!("{actor} started the bot"),
            (ChatKind::Private, Direction::Left) => format!("{actor} blocked the bot"),
            (ChatKind::Group, Direction::Joined) => {
                format!("{actor} added the bot to the group {title}")
            }
            (ChatKind::Group, Direction::Left) => {
                format!("{actor} removed the bot from the group {title}")
            }
            (ChatKind::Channel, Direction::Joined) => {
                format!("{actor} added the bot to the channel {title}")
            }
            (ChatKind::Channel, Direction::Left) => {
                format!("{actor} removed the bot from the channel {title}")
            }
        }
    }
}

/// Route a bot membership change to a registry event.
///
/// `None` means nothing to record: no status change, or a change that neither
/// joined nor left (e.g. member -> administrator).
pub fn route(
    change: &MembershipChange,
    chat_kind: ChatKind,
    chat_id: ChatId,
    actor_name: &str,
    chat_title: Option<&str>,
) -> Option<MembershipEvent> {
    let direction = classify(change)?.direction()?;
    Some(MembershipEvent {
        chat_kind,
        chat_id,
        direction,
        actor_name: actor_name.to_string(),
        chat_title: chat_title.map(str::to_string),
    })
}
