//! 会话
//!
//! 一个会话 = 当前负责的 Agent + 累积的客人事实 + 有序对话日志。
//! 会话只在一轮对话成功完成后整体提交，其它调用方看不到中间状态。

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::facts::FactSet;
use crate::agents::AgentId;
use crate::memory::{Speaker, Turn};

/// 会话 ID（不透明字符串）
pub type SessionId = String;

/// 单个会话
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// 首次路由前为 None
    pub current_agent: Option<AgentId>,
    pub facts: FactSet,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            current_agent: None,
            facts: FactSet::default(),
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// 该 Agent 在本会话中是否已经回复过（决定是否跳过自我介绍）
    pub fn has_spoken(&self, agent: AgentId) -> bool {
        self.turns.iter().any(|t| t.from == Speaker::Agent(agent))
    }

    /// 最后一个发言的 Agent
    pub fn last_agent(&self) -> Option<AgentId> {
        self.turns.iter().rev().find_map(|t| t.from.agent())
    }
}

/// 活跃会话列表项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub current_agent: Option<AgentId>,
    pub last_access: DateTime<Utc>,
    pub message_count: usize,
}

impl SessionSummary {
    pub fn of(session: &Session, last_access: DateTime<Utc>) -> Self {
        Self {
            session_id: session.id.clone(),
            current_agent: session.current_agent,
            last_access,
            message_count: session.turns.len(),
        }
    }
}

/// 生成会话 ID：`session_<毫秒时间戳>_<8 位随机>`
pub fn generate_session_id() -> SessionId {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", Utc::now().timestamp_millis(), &random[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert!(a.starts_with("session_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_has_spoken_and_last_agent() {
        let mut session = Session::new("s");
        assert!(!session.has_spoken(AgentId::Reception));
        assert_eq!(session.last_agent(), None);

        session.turns.push(Turn::user("hi"));
        session.turns.push(Turn::agent(AgentId::Reception, "Hello! I'm Mira"));
        session.turns.push(Turn::user("I'm hungry"));
        session.turns.push(Turn::agent(AgentId::Restaurant, "Welcome"));

        assert!(session.has_spoken(AgentId::Reception));
        assert!(!session.has_spoken(AgentId::Finance));
        assert_eq!(session.last_agent(), Some(AgentId::Restaurant));
    }
}
