//! Concierge - 酒店礼宾多智能体路由服务
//!
//! 模块划分：
//! - **agents**: 四个部门 Agent（前台 / 餐厅 / 维修 / 财务）的人设、prompt 拼装与执行器
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 单轮对话编排、错误类型、优雅关闭
//! - **gateway**: 事实抽取、意图路由、会话存储与空闲清扫
//! - **integrations**: HTTP 接口（axum）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话轮次、上下文窗口、持久化（SQLite / 内存）
//! - **observability**: 日志初始化

pub mod agents;
pub mod config;
pub mod core;
pub mod gateway;
pub mod integrations;
pub mod llm;
pub mod memory;
pub mod observability;

pub use crate::core::{AgentError, Orchestrator, TurnResponse};
