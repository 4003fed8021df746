//! 编排器：单轮对话状态机
//!
//! 每条消息依次经过 `Start → FactsExtracted → Routed → AgentExecuted → Finalized`。
//! 整轮持有该会话的锁；在副本上推进，成功后整体提交。任一阶段失败则会话保持进入本轮时的样子，
//! 返回固定致歉回复与错误码，Finalized 仍会到达。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::agents::{AgentExecutor, AgentId, PersonaRegistry};
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::gateway::{
    self, facts, generate_session_id, FactSet, MemorySessionStore, Session, SessionStore,
    SessionSummary,
};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::memory::{create_store_from_config, ConversationStore, Speaker, Turn};

/// 模型调用失败等情况下返回给客人的固定回复
pub const APOLOGY: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again in a moment.";

pub const EMPTY_MESSAGE_ERROR: &str = "Message is required and must be a non-empty string";

/// 单轮处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Start,
    FactsExtracted,
    Routed,
    AgentExecuted,
    Finalized,
}

/// 一轮对话的结果（HTTP `response` 字段）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub session_id: String,
    pub response: String,
    pub user_info: FactSet,
    /// 本轮回复的 Agent；降级回复时为 None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentId>,
    /// 降级回复时的错误码（如 model_call_failed）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TurnResponse {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

pub struct Orchestrator {
    sessions: Arc<dyn SessionStore>,
    executor: AgentExecutor,
    restore_from_store: bool,
}

impl Orchestrator {
    pub fn new(sessions: Arc<dyn SessionStore>, executor: AgentExecutor) -> Self {
        Self {
            sessions,
            executor,
            restore_from_store: false,
        }
    }

    /// 新会话若在持久化存储中有历史，则恢复之
    pub fn with_restore_from_store(mut self, enabled: bool) -> Self {
        self.restore_from_store = enabled;
        self
    }

    /// 按配置装配：LLM、持久化存储、人设、会话存储
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<(Self, Arc<MemorySessionStore>)> {
        let llm = create_llm_from_config(&cfg.llm);
        let store = create_store_from_config(&cfg.store)?;
        Ok(Self::assemble(cfg, llm, store))
    }

    /// 以给定的 LLM 与持久化存储装配（测试与 CLI 复用）
    pub fn assemble(
        cfg: &AppConfig,
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn ConversationStore>,
    ) -> (Self, Arc<MemorySessionStore>) {
        let sessions = Arc::new(MemorySessionStore::new(cfg.session.idle_timeout_secs));
        let executor = AgentExecutor::new(llm, store)
            .with_personas(PersonaRegistry::from_overrides(&cfg.agents))
            .with_policy(cfg.store.persistence)
            .with_request_timeout(Duration::from_secs(cfg.llm.timeouts.request.max(1)))
            .with_max_context_turns(cfg.session.max_context_turns);
        let orchestrator = Self::new(sessions.clone(), executor)
            .with_restore_from_store(cfg.session.restore_from_store);
        (orchestrator, sessions)
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// 处理一条客人消息；仅校验失败返回 Err，其它失败以降级回复返回
    pub async fn process_message(
        &self,
        session_id: Option<&str>,
        message: &str,
    ) -> Result<TurnResponse, AgentError> {
        if message.trim().is_empty() {
            return Err(AgentError::Validation(EMPTY_MESSAGE_ERROR.to_string()));
        }

        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(generate_session_id);

        let (slot, created) = self.sessions.get_or_create(&session_id).await;
        let mut guard = slot.lock().await;

        if created && self.restore_from_store {
            if let Some(restored) = self.restore(&session_id).await {
                slot.commit(&mut guard, restored);
            }
        }

        let entering = guard.clone();
        tracing::info!(session_id = %session_id, "Processing message: {:?}", message);

        let response = match self.run_turn(&entering, message).await {
            Ok(updated) => {
                let response = TurnResponse {
                    session_id: session_id.clone(),
                    response: updated
                        .turns
                        .last()
                        .map(|t| t.content.clone())
                        .unwrap_or_default(),
                    user_info: updated.facts.clone(),
                    agent: updated.current_agent,
                    error: None,
                };
                log_conversation(&updated);
                slot.commit(&mut guard, updated);
                response
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, "Turn failed, session left unchanged: {}", e);
                TurnResponse {
                    session_id: session_id.clone(),
                    response: APOLOGY.to_string(),
                    user_info: entering.facts.clone(),
                    agent: None,
                    error: Some(e.code().to_string()),
                }
            }
        };
        tracing::debug!(session_id = %session_id, phase = ?TurnPhase::Finalized, "Turn finished");
        Ok(response)
    }

    /// 在会话副本上推进一轮，成功返回提交用的新会话
    async fn run_turn(&self, entering: &Session, message: &str) -> Result<Session, AgentError> {
        let mut phase = TurnPhase::Start;
        tracing::debug!(session_id = %entering.id, ?phase, "Turn started");

        let facts = facts::extract(message, &entering.facts);
        phase = TurnPhase::FactsExtracted;
        tracing::debug!(session_id = %entering.id, ?phase, ?facts, "Facts extracted");

        let decision = gateway::route(message, entering.current_agent);
        phase = TurnPhase::Routed;
        tracing::info!(
            session_id = %entering.id,
            from = ?entering.current_agent,
            to = %decision.next_agent,
            switched = decision.switched,
            rule = ?decision.rule,
            "Routed message"
        );

        let outcome = self
            .executor
            .execute(decision.next_agent, entering, &facts, message)
            .await?;
        phase = TurnPhase::AgentExecuted;
        tracing::debug!(session_id = %entering.id, ?phase, persisted = ?outcome.persisted, "Agent replied");

        let mut updated = entering.clone();
        updated.current_agent = Some(outcome.agent);
        updated.facts = outcome.updated_facts;
        updated.turns.extend(outcome.exchange);
        Ok(updated)
    }

    /// 从持久化存储重建会话：回放客人消息得到事实，当前 Agent 取最后发言者
    async fn restore(&self, session_id: &str) -> Option<Session> {
        let turns = match self.executor.store().load(session_id).await {
            Ok(turns) if !turns.is_empty() => turns,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(session_id, "Could not restore session from store: {:#}", e);
                return None;
            }
        };

        let mut session = Session::new(session_id);
        session.facts = turns
            .iter()
            .filter(|t| t.from == Speaker::User)
            .fold(FactSet::default(), |acc, t| facts::extract_at(&t.content, &acc, t.at));
        session.turns = turns;
        session.current_agent = session.last_agent();
        tracing::info!(
            session_id,
            turns = session.turns.len(),
            "Restored session from store"
        );
        Some(session)
    }

    /// 会话的有序对话日志：优先内存，其次持久化存储；都没有则 NotFound
    pub async fn history(&self, session_id: &str) -> Result<Vec<Turn>, AgentError> {
        if let Some(slot) = self.sessions.get(session_id).await {
            let turns = slot.lock().await.turns.clone();
            if !turns.is_empty() {
                return Ok(turns);
            }
        }

        let stored = self
            .executor
            .store()
            .load(session_id)
            .await
            .map_err(|e| AgentError::Persistence(format!("{:#}", e)))?;
        if stored.is_empty() {
            return Err(AgentError::NotFound(session_id.to_string()));
        }
        Ok(stored)
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.sessions.list_active().await
    }

    /// 删除会话并清除其持久化历史（后者尽力而为）；内存中不存在则 NotFound
    pub async fn delete_session(&self, session_id: &str) -> Result<(), AgentError> {
        let removed = self.sessions.delete(session_id).await;
        if let Err(e) = self.executor.store().clear(session_id).await {
            tracing::warn!(session_id, "Failed to clear stored history: {:#}", e);
        }
        if removed {
            tracing::info!(session_id, "Session deleted");
            Ok(())
        } else {
            Err(AgentError::NotFound(session_id.to_string()))
        }
    }
}

fn log_conversation(session: &Session) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    for turn in &session.turns {
        let who = match turn.from {
            Speaker::User => "user".to_string(),
            Speaker::Agent(agent) => agent.to_string(),
        };
        tracing::debug!(session_id = %session.id, "{}: {}", who, turn.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::IssueCategory;
    use crate::llm::{FailingLlmClient, MockLlmClient, RecordingLlmClient};
    use crate::memory::MemoryConversationStore;

    fn orchestrator(llm: Arc<dyn LlmClient>) -> (Orchestrator, Arc<MemoryConversationStore>) {
        let store = Arc::new(MemoryConversationStore::new());
        let (o, _) = Orchestrator::assemble(&AppConfig::default(), llm, store.clone());
        (o, store)
    }

    #[tokio::test]
    async fn test_empty_message_rejected_without_session() {
        let (o, _) = orchestrator(Arc::new(MockLlmClient));
        let err = o.process_message(Some("s1"), "   ").await.unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        assert!(o.list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_dana_scenario() {
        let (o, store) = orchestrator(Arc::new(MockLlmClient));
        let resp = o
            .process_message(None, "Hi, I'm Dana and my room 310 has no hot water")
            .await
            .unwrap();

        assert!(resp.session_id.starts_with("session_"));
        assert_eq!(resp.agent, Some(AgentId::Maintenance));
        assert!(resp.response.starts_with("[Sam]"));
        assert_eq!(resp.user_info.name.as_deref(), Some("Dana"));
        assert_eq!(resp.user_info.room_number.as_deref(), Some("310"));
        assert_eq!(resp.user_info.maintenance_issues.len(), 1);
        assert_eq!(resp.user_info.maintenance_issues[0].category, IssueCategory::Plumbing);
        assert_eq!(resp.user_info.maintenance_issues[0].keyword, "hot water");

        let stored = store.load(&resp.session_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].from, Speaker::Agent(AgentId::Maintenance));
    }

    #[tokio::test]
    async fn test_model_failure_leaves_session_unchanged() {
        let llm = Arc::new(RecordingLlmClient::with_replies(vec![
            Ok("Welcome to The Horizon.".to_string()),
            Err("upstream 429".to_string()),
        ]));
        let (o, store) = orchestrator(llm);

        let first = o.process_message(Some("s1"), "can I see the menu").await.unwrap();
        assert_eq!(first.agent, Some(AgentId::Restaurant));

        let second = o
            .process_message(Some("s1"), "my name is Bob, the toilet is leaking")
            .await
            .unwrap();
        assert!(second.is_degraded());
        assert_eq!(second.response, APOLOGY);
        assert_eq!(second.error.as_deref(), Some("model_call_failed"));
        assert_eq!(second.user_info.name, None);

        let history = o.history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        let sessions = o.list_sessions().await;
        assert_eq!(sessions[0].current_agent, Some(AgentId::Restaurant));
        assert_eq!(store.load("s1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_continuation_clause_after_first_reply() {
        let llm = Arc::new(RecordingLlmClient::new());
        let (o, _) = orchestrator(llm.clone());

        o.process_message(Some("s"), "hello").await.unwrap();
        let first = llm.last_system_prompt().unwrap();
        assert!(!first.contains("DO NOT introduce yourself again"));

        o.process_message(Some("s"), "thanks").await.unwrap();
        let second = llm.last_system_prompt().unwrap();
        assert!(second.starts_with("You are Mira"));
        assert!(second.contains("DO NOT introduce yourself again"));
    }

    #[tokio::test]
    async fn test_degraded_turn_for_failing_model() {
        let (o, _) = orchestrator(Arc::new(FailingLlmClient::new("down")));
        let resp = o.process_message(Some("s"), "hello").await.unwrap();
        assert!(resp.is_degraded());
        // 会话已创建但没有任何记录
        assert!(matches!(o.history("s").await, Err(AgentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (o, store) = orchestrator(Arc::new(MockLlmClient));
        o.process_message(Some("s"), "hello").await.unwrap();

        o.delete_session("s").await.unwrap();
        assert!(store.load("s").await.unwrap().is_empty());
        assert!(matches!(o.delete_session("s").await, Err(AgentError::NotFound(_))));
        assert!(matches!(o.history("s").await, Err(AgentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_history_falls_back_to_store_and_restore() {
        let store = Arc::new(MemoryConversationStore::new());
        store
            .append(
                "old",
                &[
                    Turn::user("my name is Erin, I'm vegan"),
                    Turn::agent(AgentId::Restaurant, "Noted!"),
                ],
            )
            .await
            .unwrap();

        let mut cfg = AppConfig::default();
        cfg.session.restore_from_store = true;
        let (o, _) = Orchestrator::assemble(&cfg, Arc::new(MockLlmClient), store.clone());

        assert_eq!(o.history("old").await.unwrap().len(), 2);

        let resp = o.process_message(Some("old"), "what time is it").await.unwrap();
        assert_eq!(resp.agent, Some(AgentId::Restaurant));
        assert_eq!(resp.user_info.name.as_deref(), Some("Erin"));
        assert_eq!(resp.user_info.dietary_preferences, vec!["vegan".to_string()]);
        assert_eq!(o.history("old").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_session_are_sequenced() {
        let (o, _) = orchestrator(Arc::new(MockLlmClient));
        let o = Arc::new(o);
        let mut handles = Vec::new();
        for i in 0..8 {
            let o = Arc::clone(&o);
            handles.push(tokio::spawn(async move {
                o.process_message(Some("shared"), &format!("message {}", i)).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(o.history("shared").await.unwrap().len(), 16);
    }
}
