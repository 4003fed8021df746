//! SQLite 对话存储
//!
//! 单个 rusqlite Connection 包在 Mutex 中；所有访问经 spawn_blocking 进入阻塞线程池，
//! 避免在 async 运行时线程上做同步 I/O。

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::memory::{ConversationStore, Speaker, Turn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  TEXT NOT NULL,
    role        TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    agent       TEXT,
    content     TEXT NOT NULL,
    timestamp   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_session ON messages (session_id, id);
";

/// SQLite 持久化：messages(id, session_id, role, agent, content, timestamp)
pub struct SqliteConversationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConversationStore {
    /// 打开（或创建）数据库文件，父目录不存在时自动创建
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite database {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        tracing::info!("Conversation store opened at {}", path.display());
        Self::init(conn)
    }

    /// 内存数据库（测试用）
    pub fn in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA).context("creating messages table")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("sqlite connection mutex poisoned"))?;
            f(&mut guard)
        })
        .await
        .context("sqlite task panicked")?
    }
}

fn row_to_turn(role: String, agent: Option<String>, content: String, at: DateTime<Utc>) -> anyhow::Result<Turn> {
    let from = match (role.as_str(), agent) {
        ("user", _) => Speaker::User,
        (_, Some(agent)) => Speaker::Agent(agent.parse()?),
        (other, None) => anyhow::bail!("assistant row without agent (role = {})", other),
    };
    Ok(Turn { from, content, at })
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn append(&self, session_id: &str, turns: &[Turn]) -> anyhow::Result<()> {
        let session_id = session_id.to_string();
        let turns = turns.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO messages (session_id, role, agent, content, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for turn in &turns {
                    stmt.execute(params![
                        session_id,
                        turn.from.role().as_str(),
                        turn.from.agent().map(|a| a.as_str()),
                        turn.content,
                        turn.at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn load(&self, session_id: &str) -> anyhow::Result<Vec<Turn>> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT role, agent, content, timestamp FROM messages
                 WHERE session_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, DateTime<Utc>>(3)?,
                ))
            })?;
            let mut turns = Vec::new();
            for row in rows {
                let (role, agent, content, at) = row?;
                turns.push(row_to_turn(role, agent, content, at)?);
            }
            Ok(turns)
        })
        .await
    }

    async fn clear(&self, session_id: &str) -> anyhow::Result<()> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM messages WHERE session_id = ?1", params![session_id])?;
            Ok(())
        })
        .await
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentId;

    #[tokio::test]
    async fn test_sqlite_round_trip_preserves_speakers() {
        let store = SqliteConversationStore::in_memory().unwrap();
        store
            .append(
                "session_1",
                &[
                    Turn::user("the toilet is leaking"),
                    Turn::agent(AgentId::Maintenance, "Which room are you in?"),
                ],
            )
            .await
            .unwrap();

        let turns = store.load("session_1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].from, Speaker::User);
        assert_eq!(turns[1].from, Speaker::Agent(AgentId::Maintenance));
        assert_eq!(turns[1].content, "Which room are you in?");
    }

    #[tokio::test]
    async fn test_sqlite_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("conversations.db");
        {
            let store = SqliteConversationStore::open(&path).unwrap();
            store.append("s", &[Turn::user("hello")]).await.unwrap();
        }
        let store = SqliteConversationStore::open(&path).unwrap();
        assert_eq!(store.load("s").await.unwrap().len(), 1);

        store.clear("s").await.unwrap();
        assert!(store.load("s").await.unwrap().is_empty());
    }
}
