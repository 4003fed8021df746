//! 空闲会话清扫任务
//!
//! 显式启动、可取消的周期任务；由进程生命周期（ShutdownManager 的 token）控制退出。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::session_store::SessionStore;

pub struct SessionSweeper {
    store: Arc<dyn SessionStore>,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(store: Arc<dyn SessionStore>, interval_secs: u64) -> Self {
        Self {
            store,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// 启动清扫循环；token 取消后退出
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            // 第一次 tick 立即返回，跳过
            timer.tick().await;
            tracing::info!("Session sweeper started (every {:?})", self.interval);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = timer.tick() => {
                        let expired = self.store.cleanup_expired().await;
                        if expired > 0 {
                            tracing::info!("Cleaned up {} expired sessions", expired);
                        }
                    }
                }
            }
            tracing::info!("Session sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemorySessionStore;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_and_stops() {
        let store = Arc::new(MemorySessionStore::new(60));
        let (slot, _) = store.get_or_create("s").await;
        slot.touch_at(chrono::Utc::now() - chrono::Duration::minutes(5));

        let token = CancellationToken::new();
        let handle = SessionSweeper::new(store.clone(), 1).spawn(token.clone());
        tokio::task::yield_now().await;

        // 未到第一个清扫周期
        tokio::time::advance(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.active_count().await, 1);

        tokio::time::advance(Duration::from_millis(600)).await;
        for _ in 0..10 {
            if store.active_count().await == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(store.active_count().await, 0);

        token.cancel();
        handle.await.unwrap();
    }
}
