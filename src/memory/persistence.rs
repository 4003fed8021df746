//! 对话持久化
//!
//! 每轮对话（客人消息 + Agent 回复）追加写入持久化存储，用于历史查询与重启后恢复。
//! 写入只追加，读出按写入顺序返回。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::memory::Turn;

/// 持久化存储接口
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// 追加若干轮；一次调用内要么全部写入，要么都不写
    async fn append(&self, session_id: &str, turns: &[Turn]) -> anyhow::Result<()>;

    /// 按写入顺序读出会话的全部记录；未知会话返回空
    async fn load(&self, session_id: &str) -> anyhow::Result<Vec<Turn>>;

    async fn clear(&self, session_id: &str) -> anyhow::Result<()>;

    /// 后端名（用于日志）
    fn name(&self) -> &'static str;
}

/// 进程内存储（backend = "memory"，以及测试）
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    sessions: RwLock<HashMap<String, Vec<Turn>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn append(&self, session_id: &str, turns: &[Turn]) -> anyhow::Result<()> {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .extend_from_slice(turns);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> anyhow::Result<Vec<Turn>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> anyhow::Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// 写入总是失败的存储（模拟磁盘故障）
#[derive(Debug, Default)]
pub struct UnavailableConversationStore;

#[async_trait]
impl ConversationStore for UnavailableConversationStore {
    async fn append(&self, _session_id: &str, _turns: &[Turn]) -> anyhow::Result<()> {
        anyhow::bail!("conversation store unavailable")
    }

    async fn load(&self, _session_id: &str) -> anyhow::Result<Vec<Turn>> {
        anyhow::bail!("conversation store unavailable")
    }

    async fn clear(&self, _session_id: &str) -> anyhow::Result<()> {
        anyhow::bail!("conversation store unavailable")
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}
