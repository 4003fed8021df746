//! 短期记忆：对话消息与会话轮次
//!
//! - `Message`：发给 LLM 的角色消息（system / user / assistant）
//! - `Turn`：会话日志中的一条记录，标明是客人还是哪个部门的 Agent 说的
//! - `ConversationMemory`：保留最近 N 轮，超出时剪枝，用于拼装 LLM 上下文

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::AgentId;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 发言方：客人，或某个部门 Agent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Speaker {
    User,
    Agent(AgentId),
}

impl Speaker {
    /// 序列化名：`user` 或 Agent 名（reception / restaurant / ...）
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Agent(agent) => agent.as_str(),
        }
    }

    /// 发给 LLM 时的角色：客人为 user，任何 Agent 为 assistant
    pub fn role(&self) -> Role {
        match self {
            Speaker::User => Role::User,
            Speaker::Agent(_) => Role::Assistant,
        }
    }

    pub fn agent(&self) -> Option<AgentId> {
        match self {
            Speaker::User => None,
            Speaker::Agent(agent) => Some(*agent),
        }
    }
}

impl Serialize for Speaker {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Speaker {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "user" {
            return Ok(Speaker::User);
        }
        raw.parse::<AgentId>()
            .map(Speaker::Agent)
            .map_err(serde::de::Error::custom)
    }
}

/// 会话日志中的一轮发言；追加后不再修改
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub from: Speaker,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            from: Speaker::User,
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn agent(agent: AgentId, content: impl Into<String>) -> Self {
        Self {
            from: Speaker::Agent(agent),
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn to_message(&self) -> Message {
        Message {
            role: self.from.role(),
            content: self.content.clone(),
        }
    }
}

/// 短期记忆：最近 N 轮对话（每轮含 user + assistant，故实际保留约 max_turns*2 条消息）
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns,
        }
    }

    /// 由会话日志构建，按窗口剪枝
    pub fn from_turns(turns: &[Turn], max_turns: usize) -> Self {
        let mut memory = Self::new(max_turns);
        for turn in turns {
            memory.push(turn.to_message());
        }
        memory
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.prune();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 超出 max_turns*2 时丢弃最旧的消息，保留最近部分
    fn prune(&mut self) {
        if self.messages.len() > self.max_turns * 2 {
            let keep = self.max_turns * 2;
            self.messages.drain(..self.messages.len() - keep);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
