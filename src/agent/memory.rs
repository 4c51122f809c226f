// TubeForge Conversation Memory
// Copyright (c) 2026 Xing_The_Creator | TubeForge
//
// Long-term memory for the assistant:
// 1. Every conversation turn (message, reply, detected intent)
// 2. Weighted memories retrieved by keyword overlap with the current message
// 3. Per-user preferences (tone, default niche, ...)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use tracing::info;

use crate::store::{JsonStore, StoreError};

const MAX_CONVERSATIONS: usize = 200;
const MAX_MEMORIES: usize = 100;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConversationRecord {
    pub message: String,
    pub response: String,
    pub intent: String,
    #[serde(default)]
    pub parameters: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MemoryEntry {
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
    pub importance: f32,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserMemory {
    #[serde(default)]
    pub conversations: Vec<ConversationRecord>,
    #[serde(default)]
    pub memories: Vec<MemoryEntry>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MemoryBook {
    #[serde(default)]
    pub users: HashMap<String, UserMemory>,
}

pub struct MemoryBank {
    store: JsonStore<MemoryBook>,
}

impl MemoryBank {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self {
            store: JsonStore::open(path)?,
        })
    }

    pub async fn store_conversation(&self, user_id: &str, record: ConversationRecord) -> Result<(), StoreError> {
        self.store
            .update(|book| {
                let user = book.users.entry(user_id.to_string()).or_default();
                user.conversations.push(record);
                if user.conversations.len() > MAX_CONVERSATIONS {
                    let excess = user.conversations.len() - MAX_CONVERSATIONS;
                    user.conversations.drain(..excess);
                }
                Ok(())
            })
            .await
    }

    /// The most recent `limit` turns, oldest first.
    pub async fn conversation_history(&self, user_id: &str, limit: usize) -> Vec<ConversationRecord> {
        self.store
            .read(|book| {
                book.users
                    .get(user_id)
                    .map(|u| {
                        let skip = u.conversations.len().saturating_sub(limit);
                        u.conversations[skip..].to_vec()
                    })
                    .unwrap_or_default()
            })
            .await
    }

    pub async fn store_memory(&self, user_id: &str, entry: MemoryEntry) -> Result<(), StoreError> {
        self.store
            .update(|book| {
                let user = book.users.entry(user_id.to_string()).or_default();
                user.memories.push(entry);
                if user.memories.len() > MAX_MEMORIES {
                    evict_weakest(&mut user.memories);
                }
                Ok(())
            })
            .await
    }

    pub async fn retrieve_memories(&self, user_id: &str, query: &str, limit: usize) -> Vec<MemoryEntry> {
        self.store
            .read(|book| {
                book.users
                    .get(user_id)
                    .map(|u| rank_memories(&u.memories, query, limit))
                    .unwrap_or_default()
            })
            .await
    }

    pub async fn preferences(&self, user_id: &str) -> BTreeMap<String, String> {
        self.store
            .read(|book| {
                book.users
                    .get(user_id)
                    .map(|u| u.preferences.clone())
                    .unwrap_or_default()
            })
            .await
    }

    pub async fn set_preference(&self, user_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.store
            .update(|book| {
                book.users
                    .entry(user_id.to_string())
                    .or_default()
                    .preferences
                    .insert(key.to_string(), value.to_string());
                Ok(())
            })
            .await
    }

    /// Forget the conversation log. Memories and preferences are kept.
    pub async fn clear_conversations(&self, user_id: &str) -> Result<(), StoreError> {
        self.store
            .update(|book| {
                if let Some(user) = book.users.get_mut(user_id) {
                    user.conversations.clear();
                }
                Ok::<_, StoreError>(())
            })
            .await?;
        info!("[MEMORY] Cleared conversation log for {}", user_id);
        Ok(())
    }

    pub async fn ensure_user(&self, user_id: &str) -> Result<(), StoreError> {
        self.store
            .update(|book| {
                book.users.entry(user_id.to_string()).or_default();
                Ok(())
            })
            .await
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Rank by `importance * (1 + keyword overlap)`, newest first on ties.
pub fn rank_memories(memories: &[MemoryEntry], query: &str, limit: usize) -> Vec<MemoryEntry> {
    let query_words = keywords(query);
    let mut scored: Vec<(f32, &MemoryEntry)> = memories
        .iter()
        .map(|m| {
            let overlap = keywords(&m.content).intersection(&query_words).count() as f32;
            (m.importance * (1.0 + overlap), m)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.created_at.cmp(&a.1.created_at))
    });
    scored.into_iter().take(limit).map(|(_, m)| m.clone()).collect()
}

fn evict_weakest(memories: &mut Vec<MemoryEntry>) {
    let weakest = memories
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.importance
                .partial_cmp(&b.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.created_at.cmp(&b.created_at))
        })
        .map(|(i, _)| i);
    if let Some(i) = weakest {
        memories.remove(i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn memory(content: &str, importance: f32, age_mins: i64) -> MemoryEntry {
        MemoryEntry {
            kind: "conversation".into(),
            content: content.into(),
            metadata: Value::Null,
            importance,
            created_at: Utc::now() - Duration::minutes(age_mins),
        }
    }

    #[test]
    fn test_rank_prefers_overlap_then_importance() {
        let memories = vec![
            memory("User asked about sourdough baking", 0.6, 10),
            memory("User wants a video about rust programming", 0.6, 5),
            memory("Unrelated high importance note", 0.8, 1),
        ];
        let ranked = rank_memories(&memories, "make another rust programming video", 2);
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].content.contains("rust programming"));
        assert!(ranked[1].content.contains("Unrelated"));
    }

    #[test]
    fn test_evicts_least_important_oldest() {
        let mut memories = vec![memory("a", 0.6, 30), memory("b", 0.6, 5), memory("c", 0.8, 60)];
        evict_weakest(&mut memories);
        let left: Vec<_> = memories.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(left, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_chronological() {
        let dir = TempDir::new().unwrap();
        let bank = MemoryBank::open(dir.path().join("memory.json")).unwrap();
        for i in 0..(MAX_CONVERSATIONS + 5) {
            bank.store_conversation(
                "u1",
                ConversationRecord {
                    message: format!("m{}", i),
                    response: "ok".into(),
                    intent: "general_chat".into(),
                    parameters: Value::Null,
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        }
        let last = bank.conversation_history("u1", 3).await;
        let messages: Vec<_> = last.iter().map(|r| r.message.clone()).collect();
        assert_eq!(messages, vec!["m202", "m203", "m204"]);

        bank.clear_conversations("u1").await.unwrap();
        assert!(bank.conversation_history("u1", 10).await.is_empty());
    }
}
