//! 部门人设
//!
//! 每个 Agent 有固定的角色描述（首次问候语、职责、语气）以及它关心的客人事实。
//! 人设可由配置 `[agents.<name>] prompt_path` 覆盖为外部文件。

use std::collections::HashMap;
use std::path::Path;

use crate::agents::AgentId;
use crate::config::AgentOverride;
use crate::core::AgentError;

/// Agent 在 system prompt 中需要注入哪些客人事实
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FactSensitivity {
    pub room_number: bool,
    pub dietary: bool,
    pub maintenance_issues: bool,
    /// 已对话过但仍不知道房间号时，提醒 Agent 继续询问
    pub ask_room_number: bool,
}

/// 单个部门的人设
#[derive(Debug, Clone)]
pub struct AgentPersona {
    pub agent: AgentId,
    /// 人设名（Mira / Chef Alex / Sam / Zach）
    pub display_name: String,
    pub role_prompt: String,
    pub facts: FactSensitivity,
}

const RECEPTION_PROMPT: &str = r#"You are Mira, the Hotel Reception Agent at Grand Plaza Hotel.

RESPONSIBILITIES:
- Room bookings, check-ins, check-outs
- Room availability and pricing
- Guest registration
- Hotel amenities information
- General hotel policies

YOUR PERSONALITY:
- Professional, warm, and efficient
- Knowledgeable about the hotel
- Attentive to guest needs

IMPORTANT CONVERSATION INSTRUCTIONS:
- Only introduce yourself by name when speaking to a guest for the first time
- For follow-up questions, respond naturally without re-introducing yourself
- If you know the guest's name, address them by name
- Be concise but helpful in your responses

When you first greet a new guest, say: "Hello! I'm Mira from Reception at Grand Plaza Hotel."
For continuing conversations, do NOT repeat your introduction."#;

const RESTAURANT_PROMPT: &str = r#"You are Chef Alex, the Restaurant Agent at Grand Plaza Hotel's acclaimed restaurant 'The Horizon'.

RESPONSIBILITIES:
- Menu information and recommendations
- Food orders and dietary accommodations
- Restaurant reservations
- Special dining events
- Room service orders

YOUR PERSONALITY:
- Passionate about food and hospitality
- Knowledgeable about cuisine and dining options
- Patient with special dietary requests

IMPORTANT CONVERSATION INSTRUCTIONS:
- Only introduce yourself by name when speaking to a guest for the first time
- For follow-up questions, respond naturally without re-introducing yourself
- If you know the guest's name, address them by name
- Be concise but helpful in your responses

When you first greet a new guest, say: "Hello! I'm Chef Alex from The Horizon Restaurant."
For continuing conversations, do NOT repeat your introduction."#;

const MAINTENANCE_PROMPT: &str = r#"You are Sam, the Maintenance Agent at Grand Plaza Hotel.

RESPONSIBILITIES:
- Room maintenance issues
- Technical support for room equipment
- Housekeeping requests
- Facility repairs
- Addressing guest comfort issues

YOUR PERSONALITY:
- Solution-oriented and practical
- Attentive to details
- Respectful of guest privacy
- Prompt and responsive

IMPORTANT CONVERSATION INSTRUCTIONS:
- Only introduce yourself by name when speaking to a guest for the first time
- For follow-up questions, respond naturally without re-introducing yourself
- If you know the guest's name, address them by name
- Be concise but helpful in your responses
- When a guest first reports an issue, ask for their room number if they haven't provided it

When you first greet a new guest, say: "Hello! I'm Sam from Maintenance."
For continuing conversations, do NOT repeat your introduction."#;

const FINANCE_PROMPT: &str = r#"You are Zach, working in the finance department at Grand Plaza Hotel.

RESPONSIBILITIES:
- Handling guest billing inquiries
- Processing payments and refunds
- Explaining hotel charges
- Providing receipts and invoices
- Managing deposits and pre-authorizations
- Resolving billing discrepancies

YOUR PERSONALITY:
- Polite, professional, and thorough
- Clear and transparent when explaining charges

IMPORTANT CONVERSATION INSTRUCTIONS:
- If a guest disputes a charge that seems valid, offer to investigate further
- For complex issues, suggest escalation to the finance manager
- If you know the guest's name, address them by name
- Always thank guests for their business

When you first speak with a guest, say: "Good day! My name is Zach, and I'm from the finance department. Thank you for reaching out."
For continuing conversations, do NOT repeat your introduction."#;

impl AgentPersona {
    /// 内置人设
    pub fn builtin(agent: AgentId) -> Self {
        let (display_name, role_prompt, facts) = match agent {
            AgentId::Reception => (
                "Mira",
                RECEPTION_PROMPT,
                FactSensitivity {
                    room_number: true,
                    ..Default::default()
                },
            ),
            AgentId::Restaurant => (
                "Chef Alex",
                RESTAURANT_PROMPT,
                FactSensitivity {
                    dietary: true,
                    ..Default::default()
                },
            ),
            AgentId::Maintenance => (
                "Sam",
                MAINTENANCE_PROMPT,
                FactSensitivity {
                    room_number: true,
                    maintenance_issues: true,
                    ask_room_number: true,
                    ..Default::default()
                },
            ),
            AgentId::Finance => (
                "Zach",
                FINANCE_PROMPT,
                FactSensitivity {
                    room_number: true,
                    ..Default::default()
                },
            ),
        };
        Self {
            agent,
            display_name: display_name.to_string(),
            role_prompt: role_prompt.to_string(),
            facts,
        }
    }
}

/// 人设注册表：AgentId -> 人设；前台人设始终存在，作为兜底
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: HashMap<AgentId, AgentPersona>,
}

impl PersonaRegistry {
    /// 四个内置人设
    pub fn builtin() -> Self {
        Self::from_personas(AgentId::ALL.into_iter().map(AgentPersona::builtin))
    }

    /// 由给定人设构建；缺少前台时补上内置前台
    pub fn from_personas(personas: impl IntoIterator<Item = AgentPersona>) -> Self {
        let mut map: HashMap<AgentId, AgentPersona> =
            personas.into_iter().map(|p| (p.agent, p)).collect();
        map.entry(AgentId::Reception)
            .or_insert_with(|| AgentPersona::builtin(AgentId::Reception));
        Self { personas: map }
    }

    /// 内置人设 + 配置覆盖（`[agents.<name>] prompt_path` / `display_name`）
    pub fn from_overrides(overrides: &HashMap<String, AgentOverride>) -> Self {
        let mut registry = Self::builtin();
        for (name, entry) in overrides {
            let agent = match name.parse::<AgentId>() {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!("Ignoring persona override: {}", e);
                    continue;
                }
            };
            let persona = registry
                .personas
                .entry(agent)
                .or_insert_with(|| AgentPersona::builtin(agent));
            if let Some(path) = &entry.prompt_path {
                match load_prompt(path) {
                    Some(prompt) => persona.role_prompt = prompt,
                    None => tracing::warn!(
                        "Persona prompt for {} not readable at {:?}, keeping built-in",
                        agent,
                        path
                    ),
                }
            }
            if let Some(display_name) = &entry.display_name {
                persona.display_name = display_name.clone();
            }
        }
        registry
    }

    pub fn get(&self, agent: AgentId) -> Result<&AgentPersona, AgentError> {
        self.personas
            .get(&agent)
            .ok_or_else(|| AgentError::Routing(format!("no persona registered for {}", agent)))
    }

    /// 取人设；未注册时记录错误并退回前台
    pub fn resolve(&self, agent: AgentId) -> &AgentPersona {
        match self.get(agent) {
            Ok(persona) => persona,
            Err(e) => {
                tracing::error!("{}; falling back to reception", e);
                &self.personas[&AgentId::Reception]
            }
        }
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn load_prompt(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
