//! Registry of chats the bot participates in.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{domain::ChatId, utils::write_atomic, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Private chats (the chat id is the user id).
    User,
    /// Groups and supergroups.
    Group,
    Channel,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::User, Category::Group, Category::Channel];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryChange {
    Add(Category, ChatId),
    Discard(Category, ChatId),
}

/// Three disjoint sets of chat ids, one per category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRegistry {
    #[serde(default)]
    user_ids: BTreeSet<ChatId>,
    #[serde(default)]
    group_ids: BTreeSet<ChatId>,
    #[serde(default)]
    channel_ids: BTreeSet<ChatId>,
}

impl ChatRegistry {
    fn set(&self, category: Category) -> &BTreeSet<ChatId> {
        match category {
            Category::User => &self.user_ids,
            Category::Group => &self.group_ids,
            Category::Channel => &self.channel_ids,
        }
    }

    fn set_mut(&mut self, category: Category) -> &mut BTreeSet<ChatId> {
        match category {
            Category::User => &mut self.user_ids,
            Category::Group => &mut self.group_ids,
            Category::Channel => &mut self.channel_ids,
        }
    }

    /// Add `id` to `category`, removing it from any other category.
    ///
    /// Returns true if the registry changed.
    pub fn add(&mut self, category: Category, id: ChatId) -> bool {
        let mut changed = false;
        for other in Category::ALL {
            if other != category {
                changed |= self.set_mut(other).remove(&id);
            }
        }
        changed |= self.set_mut(category).insert(id);
        changed
    }

    /// Returns true if `id` was present.
    pub fn discard(&mut self, category: Category, id: ChatId) -> bool {
        self.set_mut(category).remove(&id)
    }

    pub fn apply(&mut self, change: RegistryChange) -> bool {
        match change {
            RegistryChange::Add(category, id) => self.add(category, id),
            RegistryChange::Discard(category, id) => self.discard(category, id),
        }
    }

    pub fn contains(&self, category: Category, id: ChatId) -> bool {
        self.set(category).contains(&id)
    }

    /// Sorted snapshot of one category.
    pub fn list(&self, category: Category) -> Vec<ChatId> {
        self.set(category).iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.set(*c).is_empty())
    }

    /// Operator-facing summary for `/show_chats`.
    pub fn summary(&self, bot_username: &str) -> String {
        let join = |category: Category| {
            self.set(category)
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "@{bot_username} is currently in a conversation with the user IDs {}. \
Moreover it is a member of the groups with IDs {} and administrator in the channels with IDs {}.",
            join(Category::User),
            join(Category::Group),
            join(Category::Channel),
        )
    }

    /// Load from a JSON file. A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        let txt = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let mut reg: ChatRegistry = serde_json::from_str(&txt).map_err(|e| Error::Persistence {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        reg.normalize();
        Ok(reg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let txt = serde_json::to_string_pretty(self)?;
        write_atomic(path, txt.as_bytes())
    }

    /// Restore disjointness after loading a hand-edited file (first category wins).
    fn normalize(&mut self) {
        let users = self.user_ids.clone();
        self.group_ids.retain(|id| !users.contains(id));
        let groups = self.group_ids.clone();
        self.channel_ids
            .retain(|id| !users.contains(id) && !groups.contains(id));
    }
}

/// The process-wide registry: serialized mutation plus optional persistence.
pub struct RegistryStore {
    inner: Mutex<ChatRegistry>,
    path: Option<PathBuf>,
}

impl RegistryStore {
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(ChatRegistry::default()),
            path: None,
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let reg = ChatRegistry::load(&path)?;
        Ok(Self {
            inner: Mutex::new(reg),
            path: Some(path),
        })
    }

    /// Apply a change and persist it (if backed by a file).
    ///
    /// A failed save is logged; the in-memory change stands.
    pub async fn apply(&self, change: RegistryChange) -> bool {
        let mut reg = self.inner.lock().await;
        let changed = reg.apply(change);
        if changed {
            if let Some(path) = &self.path {
                if let Err(e) = reg.save(path) {
                    tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "failed to save chat registry"
                    );
                }
            }
        }
        changed
    }

    pub async fn snapshot(&self) -> ChatRegistry {
        self.inner.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        PathBuf::from(format!("/tmp/{prefix}-{}-{ts}.json", std::process::id()))
    }

    #[test]
    fn duplicate_add_is_noop() {
        let mut reg = ChatRegistry::default();
        assert!(reg.add(Category::User, ChatId(1)));
        assert!(!reg.add(Category::User, ChatId(1)));
        assert_eq!(reg.list(Category::User), vec![ChatId(1)]);
    }

    #[test]
    fn add_keeps_categories_disjoint() {
        let mut reg = ChatRegistry::default();
        reg.add(Category::Group, ChatId(-5));
        reg.add(Category::Channel, ChatId(-5));
        assert!(!reg.contains(Category::Group, ChatId(-5)));
        assert!(reg.contains(Category::Channel, ChatId(-5)));
    }

    #[test]
    fn discard_missing_id_is_noop() {
        let mut reg = ChatRegistry::default();
        assert!(!reg.discard(Category::Channel, ChatId(3)));
        assert!(reg.is_empty());
    }

    #[test]
    fn summary_lists_each_category_sorted() {
        let mut reg = ChatRegistry::default();
        reg.add(Category::User, ChatId(20));
        reg.add(Category::User, ChatId(10));
        reg.add(Category::Group, ChatId(-100));
        let s = reg.summary("cmb_bot");
        assert_eq!(
            s,
            "@cmb_bot is currently in a conversation with the user IDs 10, 20. \
Moreover it is a member of the groups with IDs -100 and administrator in the channels with IDs ."
        );
    }

    #[test]
    fn load_missing_file_is_empty() {
        let reg = ChatRegistry::load(&tmp("cmb-reg-missing")).unwrap();
        assert!(reg.is_empty());
    }

    #[test]
    fn load_normalizes_overlapping_categories() {
        let path = tmp("cmb-reg-overlap");
        std::fs::write(
            &path,
            r#"{"user_ids":[1],"group_ids":[1,-2],"channel_ids":[-2,-3]}"#,
        )
        .unwrap();
        let reg = ChatRegistry::load(&path).unwrap();
        assert_eq!(reg.list(Category::User), vec![ChatId(1)]);
        assert_eq!(reg.list(Category::Group), vec![ChatId(-2)]);
        assert_eq!(reg.list(Category::Channel), vec![ChatId(-3)]);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn store_persists_changes() {
        let path = tmp("cmb-reg-store");
        let store = RegistryStore::open(&path).unwrap();
        assert!(store.apply(RegistryChange::Add(Category::Group, ChatId(-42))).await);
        assert!(!store.apply(RegistryChange::Add(Category::Group, ChatId(-42))).await);

        let reopened = RegistryStore::open(&path).unwrap();
        let snap = reopened.snapshot().await;
        assert!(snap.contains(Category::Group, ChatId(-42)));

        store
            .apply(RegistryChange::Discard(Category::Group, ChatId(-42)))
            .await;
        assert!(ChatRegistry::load(&path).unwrap().is_empty());
        let _ = std::fs::remove_file(&path);
    }
}
