//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use mock::{FailingLlmClient, MockLlmClient, RecordingLlmClient};
pub use openai::OpenAiClient;
pub use traits::LlmClient;

use crate::config::LlmSection;

/// 根据 [llm] 段与环境变量选择后端；openai 缺少 API Key 时退回 Mock
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = cfg.provider.to_lowercase();
    let has_key = std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.trim().is_empty());

    match provider.as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient)
        }
        "openai" if has_key => {
            tracing::info!("Using OpenAI LLM ({})", cfg.model);
            Arc::new(
                OpenAiClient::new(cfg.base_url.as_deref(), &cfg.model, None)
                    .with_temperature(cfg.temperature),
            )
        }
        "openai" => {
            tracing::warn!("OPENAI_API_KEY not set, using Mock LLM");
            Arc::new(MockLlmClient)
        }
        other => {
            tracing::warn!("Unknown LLM provider '{}', using Mock LLM", other);
            Arc::new(MockLlmClient)
        }
    }
}
