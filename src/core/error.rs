//! 错误类型
//!
//! 每一轮对话可能在校验、路由、模型调用、持久化任一阶段失败；
//! HTTP 层按变体映射状态码，编排层据此决定是否提交会话。

use thiserror::Error;

/// 对话处理过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 入参不合法（空消息、非字符串等），不改变任何状态
    #[error("Validation error: {0}")]
    Validation(String),

    /// 未知 Agent 或人设缺失
    #[error("Routing error: {0}")]
    Routing(String),

    /// LLM 调用失败或超时
    #[error("Model call failed: {0}")]
    ModelCall(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Session not found: {0}")]
    NotFound(String),
}

impl AgentError {
    /// 对外暴露的稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Validation(_) => "validation_error",
            AgentError::Routing(_) => "routing_error",
            AgentError::ModelCall(_) => "model_call_failed",
            AgentError::Persistence(_) => "persistence_failed",
            AgentError::NotFound(_) => "not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AgentError::ModelCall("timeout".into()).code(), "model_call_failed");
        assert_eq!(
            AgentError::NotFound("session_1".into()).to_string(),
            "Session not found: session_1"
        );
    }
}
