//! 记忆层：短期对话窗口、会话轮次、持久化（SQLite / 内存）

pub mod conversation;
pub mod persistence;
pub mod sqlite;

use std::sync::Arc;

pub use conversation::{ConversationMemory, Message, Role, Speaker, Turn};
pub use persistence::{ConversationStore, MemoryConversationStore, UnavailableConversationStore};
pub use sqlite::SqliteConversationStore;

use crate::config::{StoreBackend, StoreSection};

/// 按 [store] 段创建持久化存储
pub fn create_store_from_config(cfg: &StoreSection) -> anyhow::Result<Arc<dyn ConversationStore>> {
    Ok(match cfg.backend {
        StoreBackend::Sqlite => Arc::new(SqliteConversationStore::open(&cfg.sqlite_path)?),
        StoreBackend::Memory => Arc::new(MemoryConversationStore::new()),
    })
}
