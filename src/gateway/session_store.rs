//! 会话存储抽象层
//!
//! 每个会话放在独立的 `SessionSlot` 中：slot 内的异步互斥锁在整轮对话期间持有，
//! 同一会话的并发请求因此依次执行；不同会话互不影响。
//! 空闲回收跳过正被持锁的会话，推迟到下一次清扫。

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::session::{Session, SessionId, SessionSummary};

/// 单个会话的容器
#[derive(Debug)]
pub struct SessionSlot {
    session: Mutex<Session>,
    /// 最后访问时间（毫秒时间戳）；不持会话锁即可读取
    last_access_ms: AtomicI64,
    /// 最近一次提交后的摘要，供列表接口无锁读取
    summary: StdRwLock<SessionSummary>,
}

impl SessionSlot {
    fn new(session: Session, now: DateTime<Utc>) -> Self {
        let summary = SessionSummary::of(&session, now);
        Self {
            session: Mutex::new(session),
            last_access_ms: AtomicI64::new(now.timestamp_millis()),
            summary: StdRwLock::new(summary),
        }
    }

    /// 获取会话锁；持有期间同一会话的其它轮次等待
    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().await
    }

    /// 整体替换会话（一轮成功完成后调用）
    pub fn commit(&self, guard: &mut MutexGuard<'_, Session>, updated: Session) {
        **guard = updated;
        let now = Utc::now();
        self.touch_at(now);
        if let Ok(mut summary) = self.summary.write() {
            *summary = SessionSummary::of(guard, now);
        }
    }

    pub fn touch_at(&self, now: DateTime<Utc>) {
        self.last_access_ms
            .store(now.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        let ms = self.last_access_ms.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
    }

    pub fn summary(&self) -> Option<SessionSummary> {
        let mut summary = self.summary.read().ok()?.clone();
        summary.last_access = self.last_access();
        Some(summary)
    }

    /// 当前是否有轮次在执行
    pub fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }
}

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 获取或创建会话，并刷新访问时间；返回 (slot, 是否新建)
    async fn get_or_create(&self, session_id: &str) -> (Arc<SessionSlot>, bool);

    async fn get(&self, session_id: &str) -> Option<Arc<SessionSlot>>;

    /// 刷新访问时间；会话不存在返回 false
    async fn touch(&self, session_id: &str) -> bool;

    /// 删除会话；不存在返回 false
    async fn delete(&self, session_id: &str) -> bool;

    /// 活跃会话（按最后访问时间倒序）
    async fn list_active(&self) -> Vec<SessionSummary>;

    /// 清理过期会话，返回清理数量
    async fn cleanup_expired(&self) -> usize;

    async fn active_count(&self) -> usize;
}

/// 内存会话存储
pub struct MemorySessionStore {
    slots: RwLock<HashMap<SessionId, Arc<SessionSlot>>>,
    idle_timeout: Duration,
}

impl MemorySessionStore {
    pub fn new(idle_timeout_secs: u64) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// 以给定时间为基准回收空闲会话；正在执行轮次的会话跳过
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let timeout = chrono::Duration::from_std(self.idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        let mut slots = self.slots.write().await;

        let expired: Vec<SessionId> = slots
            .iter()
            .filter(|(_, slot)| now.signed_duration_since(slot.last_access()) > timeout)
            .filter(|(id, slot)| {
                let busy = slot.is_busy();
                if busy {
                    tracing::debug!(session_id = %id, "Session idle but busy, deferring eviction");
                }
                !busy
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            slots.remove(id);
            tracing::info!(session_id = %id, "Evicted idle session");
        }
        expired.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_or_create(&self, session_id: &str) -> (Arc<SessionSlot>, bool) {
        let now = Utc::now();
        if let Some(slot) = self.slots.read().await.get(session_id) {
            slot.touch_at(now);
            return (Arc::clone(slot), false);
        }

        let mut slots = self.slots.write().await;
        // 两次加锁之间可能已被其它请求创建
        if let Some(slot) = slots.get(session_id) {
            slot.touch_at(now);
            return (Arc::clone(slot), false);
        }
        tracing::info!(session_id, "Creating new session");
        let slot = Arc::new(SessionSlot::new(Session::new(session_id), now));
        slots.insert(session_id.to_string(), Arc::clone(&slot));
        (slot, true)
    }

    async fn get(&self, session_id: &str) -> Option<Arc<SessionSlot>> {
        self.slots.read().await.get(session_id).cloned()
    }

    async fn touch(&self, session_id: &str) -> bool {
        match self.slots.read().await.get(session_id) {
            Some(slot) => {
                slot.touch_at(Utc::now());
                true
            }
            None => false,
        }
    }

    async fn delete(&self, session_id: &str) -> bool {
        self.slots.write().await.remove(session_id).is_some()
    }

    async fn list_active(&self) -> Vec<SessionSummary> {
        let mut list: Vec<SessionSummary> = self
            .slots
            .read()
            .await
            .values()
            .filter_map(|slot| slot.summary())
            .collect();
        list.sort_by(|a, b| b.last_access.cmp(&a.last_access));
        list
    }

    async fn cleanup_expired(&self) -> usize {
        self.evict_idle(Utc::now()).await
    }

    async fn active_count(&self) -> usize {
        self.slots.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentId;
    use crate::memory::Turn;

    #[tokio::test]
    async fn test_get_or_create_reuses_slot() {
        let store = MemorySessionStore::new(60);
        let (a, created) = store.get_or_create("s1").await;
        assert!(created);
        let (b, created) = store.get_or_create("s1").await;
        assert!(!created);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_commit_updates_summary() {
        let store = MemorySessionStore::new(60);
        let (slot, _) = store.get_or_create("s1").await;
        {
            let mut guard = slot.lock().await;
            let mut updated = guard.clone();
            updated.current_agent = Some(AgentId::Finance);
            updated.turns.push(Turn::user("refund please"));
            slot.commit(&mut guard, updated);
        }
        let list = store.list_active().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].current_agent, Some(AgentId::Finance));
        assert_eq!(list[0].message_count, 1);
    }

    #[tokio::test]
    async fn test_evict_idle_sessions() {
        let store = MemorySessionStore::new(60);
        store.get_or_create("old").await;
        store.get_or_create("fresh").await;

        let later = Utc::now() + chrono::Duration::seconds(61);
        if let Some(slot) = store.get("fresh").await {
            slot.touch_at(later);
        }

        assert_eq!(store.evict_idle(later).await, 1);
        let ids: Vec<String> = store
            .list_active()
            .await
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        assert_eq!(ids, vec!["fresh".to_string()]);

        let (_, created) = store.get_or_create("old").await;
        assert!(created);
    }

    #[tokio::test]
    async fn test_busy_session_is_not_evicted() {
        let store = MemorySessionStore::new(1);
        let (slot, _) = store.get_or_create("busy").await;
        let later = Utc::now() + chrono::Duration::seconds(10);

        let guard = slot.lock().await;
        assert_eq!(store.evict_idle(later).await, 0);
        drop(guard);

        assert_eq!(store.evict_idle(later).await, 1);
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_and_touch_unknown() {
        let store = MemorySessionStore::new(60);
        assert!(!store.delete("missing").await);
        assert!(!store.touch("missing").await);
        store.get_or_create("s").await;
        assert!(store.touch("s").await);
        assert!(store.delete("s").await);
        assert!(!store.delete("s").await);
    }
}
