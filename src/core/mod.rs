//! 核心编排层：错误类型、单轮对话编排、优雅关闭

pub mod error;
pub mod orchestrator;
pub mod shutdown;

pub use error::AgentError;
pub use orchestrator::{Orchestrator, TurnPhase, TurnResponse, APOLOGY};
pub use shutdown::{ShutdownManager, ShutdownReason};
