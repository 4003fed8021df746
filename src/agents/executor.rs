//! Agent 执行器
//!
//! 给定目标 Agent、会话与本轮消息：拼 system prompt → 带历史调用 LLM → 持久化本轮问答 → 返回回复。
//! 执行器只读会话，不修改它；提交由编排层在整轮成功后完成。

use std::sync::Arc;
use std::time::Duration;

use crate::agents::{build_system_prompt, AgentId, PersonaRegistry};
use crate::config::PersistencePolicy;
use crate::core::AgentError;
use crate::gateway::{FactSet, Session};
use crate::llm::LlmClient;
use crate::memory::{ConversationMemory, ConversationStore, Message, Turn};

/// 本轮问答的持久化结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Stored,
    /// best_effort 策略下写入失败，仅记录日志
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub agent: AgentId,
    pub reply: String,
    pub updated_facts: FactSet,
    /// 本轮新增的两条记录（客人消息、Agent 回复）
    pub exchange: Vec<Turn>,
    pub persisted: PersistOutcome,
}

pub struct AgentExecutor {
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn ConversationStore>,
    personas: PersonaRegistry,
    policy: PersistencePolicy,
    request_timeout: Duration,
    max_context_turns: usize,
}

impl AgentExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            llm,
            store,
            personas: PersonaRegistry::builtin(),
            policy: PersistencePolicy::BestEffort,
            request_timeout: Duration::from_secs(60),
            max_context_turns: 20,
        }
    }

    pub fn with_personas(mut self, personas: PersonaRegistry) -> Self {
        self.personas = personas;
        self
    }

    pub fn with_policy(mut self, policy: PersistencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_context_turns(mut self, turns: usize) -> Self {
        self.max_context_turns = turns;
        self
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// 组装发给 LLM 的消息：system + 最近历史 + 本轮消息
    pub fn build_messages(
        &self,
        agent: AgentId,
        session: &Session,
        facts: &FactSet,
        user_message: &str,
    ) -> Vec<Message> {
        let persona = self.personas.resolve(agent);
        let system = build_system_prompt(persona, facts, session.has_spoken(agent));
        let history = ConversationMemory::from_turns(&session.turns, self.max_context_turns);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system));
        messages.extend_from_slice(history.messages());
        messages.push(Message::user(user_message));
        messages
    }

    pub async fn execute(
        &self,
        agent: AgentId,
        session: &Session,
        facts: &FactSet,
        user_message: &str,
    ) -> Result<ExecutionOutcome, AgentError> {
        let messages = self.build_messages(agent, session, facts, user_message);

        let reply = match tokio::time::timeout(self.request_timeout, self.llm.complete(&messages)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(AgentError::ModelCall(e)),
            Err(_) => {
                return Err(AgentError::ModelCall(format!(
                    "timed out after {}s",
                    self.request_timeout.as_secs()
                )))
            }
        };

        let exchange = vec![Turn::user(user_message), Turn::agent(agent, reply.clone())];
        let persisted = self.best_effort_persist(&session.id, &exchange).await?;

        Ok(ExecutionOutcome {
            agent,
            reply,
            updated_facts: facts.clone(),
            exchange,
            persisted,
        })
    }

    /// 按持久化策略写入本轮问答：best_effort 下失败只告警，required 下失败即本轮失败
    pub async fn best_effort_persist(
        &self,
        session_id: &str,
        exchange: &[Turn],
    ) -> Result<PersistOutcome, AgentError> {
        match self.store.append(session_id, exchange).await {
            Ok(()) => Ok(PersistOutcome::Stored),
            Err(e) => match self.policy {
                PersistencePolicy::BestEffort => {
                    tracing::warn!(
                        session_id,
                        store = self.store.name(),
                        "Failed to persist exchange, continuing: {:#}",
                        e
                    );
                    Ok(PersistOutcome::Failed(e.to_string()))
                }
                PersistencePolicy::Required => Err(AgentError::Persistence(format!("{:#}", e))),
            },
        }
    }
}
