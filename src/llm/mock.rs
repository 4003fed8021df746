//! Mock LLM 客户端（用于测试与离线演示，无需 API）

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// 回显客户端：以人设名开头，复述客人最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let persona = messages
            .iter()
            .find(|m| m.role == Role::System)
            .and_then(|m| persona_name(&m.content))
            .unwrap_or("Concierge");
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("[{}] You said: {}", persona, last_user))
    }
}

/// "You are Mira, the ..." -> "Mira"
fn persona_name(system: &str) -> Option<&str> {
    let rest = system.strip_prefix("You are ")?;
    let end = rest.find(',').unwrap_or(rest.len());
    Some(rest[..end].trim()).filter(|s| !s.is_empty())
}

/// 始终失败的客户端
#[derive(Debug, Default)]
pub struct FailingLlmClient {
    pub reason: String,
}

impl FailingLlmClient {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LlmClient for FailingLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        Err(self.reason.clone())
    }
}

/// 记录每次调用收到的消息；按队列返回预设回复，队列空时回复 "ok"
#[derive(Debug, Default)]
pub struct RecordingLlmClient {
    calls: Mutex<Vec<Vec<Message>>>,
    replies: Mutex<VecDeque<Result<String, String>>>,
}

impl RecordingLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// 最近一次调用的 system prompt
    pub fn last_system_prompt(&self) -> Option<String> {
        self.calls()
            .last()
            .and_then(|msgs| msgs.iter().find(|m| m.role == Role::System).cloned())
            .map(|m| m.content)
    }
}

#[async_trait]
impl LlmClient for RecordingLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        next.unwrap_or_else(|| Ok("ok".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_replies_as_persona() {
        let messages = vec![
            Message::system("You are Chef Alex, the Restaurant Agent"),
            Message::user("what's on the menu"),
        ];
        let reply = MockLlmClient.complete(&messages).await.unwrap();
        assert_eq!(reply, "[Chef Alex] You said: what's on the menu");
    }

    #[tokio::test]
    async fn test_recording_client_queues_replies() {
        let client = RecordingLlmClient::with_replies(vec![Err("boom".to_string())]);
        assert!(client.complete(&[Message::user("a")]).await.is_err());
        assert_eq!(client.complete(&[Message::user("b")]).await.unwrap(), "ok");
        assert_eq!(client.calls().len(), 2);
    }
}
