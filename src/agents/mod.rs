//! 部门 Agent：身份、人设、系统提示拼装、执行器
//!
//! - **AgentId**：四个部门（前台 / 餐厅 / 维修 / 财务）
//! - **persona**：每个部门的固定人设与关注的客人事实
//! - **prompt**：人设 + 续聊提示 + 事实子句 → system prompt
//! - **executor**：调用 LLM、持久化本轮对话、返回回复

pub mod executor;
pub mod persona;
pub mod prompt;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

pub use executor::{AgentExecutor, ExecutionOutcome, PersistOutcome};
pub use persona::{AgentPersona, FactSensitivity, PersonaRegistry};
pub use prompt::build_system_prompt;

/// 部门 Agent 身份
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    Reception,
    Restaurant,
    Maintenance,
    Finance,
}

impl AgentId {
    pub const ALL: [AgentId; 4] = [
        AgentId::Reception,
        AgentId::Restaurant,
        AgentId::Maintenance,
        AgentId::Finance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Reception => "reception",
            AgentId::Restaurant => "restaurant",
            AgentId::Maintenance => "maintenance",
            AgentId::Finance => "finance",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reception" => Ok(AgentId::Reception),
            "restaurant" => Ok(AgentId::Restaurant),
            "maintenance" => Ok(AgentId::Maintenance),
            "finance" => Ok(AgentId::Finance),
            other => Err(AgentError::Routing(format!("unknown agent '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_round_trips_through_name() {
        for agent in AgentId::ALL {
            assert_eq!(agent.as_str().parse::<AgentId>().unwrap(), agent);
        }
        assert_eq!(" Finance ".parse::<AgentId>().unwrap(), AgentId::Finance);
    }

    #[test]
    fn test_unknown_agent_is_routing_error() {
        let err = "spa".parse::<AgentId>().unwrap_err();
        assert!(matches!(err, AgentError::Routing(_)));
    }
}
