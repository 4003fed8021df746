//! System prompt 拼装
//!
//! 人设 + 续聊子句（该 Agent 已回复过时）+ 按人设关注点注入的事实子句。
//! 每个子句都是固定模板替换，结果完全确定。

use crate::agents::AgentPersona;
use crate::gateway::FactSet;

const CONTINUATION_CLAUSE: &str =
    "This is a continuing conversation with a guest you've already greeted. DO NOT introduce yourself again.";

const ROOM_STILL_NEEDED_CLAUSE: &str =
    "You still need to get the guest's room number to help them properly.";

pub fn build_system_prompt(persona: &AgentPersona, facts: &FactSet, has_spoken_before: bool) -> String {
    let mut clauses: Vec<String> = vec![persona.role_prompt.clone()];

    if has_spoken_before {
        clauses.push(CONTINUATION_CLAUSE.to_string());
    }

    if let Some(name) = &facts.name {
        clauses.push(format!(
            "The guest's name is {}. Address them by name in your response.",
            name
        ));
    }

    let sensitivity = persona.facts;
    if sensitivity.room_number {
        match &facts.room_number {
            Some(room) => clauses.push(format!("The guest is in Room {}.", room)),
            None if sensitivity.ask_room_number && has_spoken_before => {
                clauses.push(ROOM_STILL_NEEDED_CLAUSE.to_string())
            }
            None => {}
        }
    }

    if sensitivity.dietary && !facts.dietary_preferences.is_empty() {
        clauses.push(format!(
            "The guest has the following dietary preferences/restrictions: {}. Keep these in mind when making recommendations.",
            facts.dietary_preferences.join(", ")
        ));
    }

    if sensitivity.maintenance_issues && !facts.maintenance_issues.is_empty() {
        let issues: Vec<String> = facts
            .maintenance_issues
            .iter()
            .map(|i| format!("{} ({})", i.category, i.keyword))
            .collect();
        clauses.push(format!(
            "The guest has reported these maintenance issues: {}. Address these specifically.",
            issues.join(", ")
        ));
    }

    clauses.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentId;
    use crate::gateway::facts;

    fn persona(agent: AgentId) -> AgentPersona {
        AgentPersona::builtin(agent)
    }

    #[test]
    fn test_first_contact_has_no_continuation() {
        let prompt = build_system_prompt(&persona(AgentId::Reception), &FactSet::default(), false);
        assert!(prompt.starts_with("You are Mira"));
        assert!(!prompt.contains("DO NOT introduce yourself again"));
        assert!(!prompt.contains("The guest's name"));
    }

    #[test]
    fn test_maintenance_clauses() {
        let facts = facts::extract("Hi, I'm Dana and my room 310 has no hot water", &FactSet::default());
        let prompt = build_system_prompt(&persona(AgentId::Maintenance), &facts, false);
        assert!(prompt.contains("The guest's name is Dana. Address them by name in your response."));
        assert!(prompt.contains("The guest is in Room 310."));
        assert!(prompt.contains(
            "The guest has reported these maintenance issues: Plumbing (hot water). Address these specifically."
        ));
    }

    #[test]
    fn test_maintenance_asks_for_room_after_first_reply() {
        let facts = facts::extract("the wifi is down", &FactSet::default());
        let first = build_system_prompt(&persona(AgentId::Maintenance), &facts, false);
        assert!(!first.contains("You still need"));

        let again = build_system_prompt(&persona(AgentId::Maintenance), &facts, true);
        assert!(again.contains(CONTINUATION_CLAUSE));
        assert!(again.contains(ROOM_STILL_NEEDED_CLAUSE));
    }

    #[test]
    fn test_restaurant_gets_dietary_but_not_room() {
        let facts = facts::extract("I'm in room 12, vegan with a nut allergy", &FactSet::default());
        let prompt = build_system_prompt(&persona(AgentId::Restaurant), &facts, true);
        assert!(prompt.contains("dietary preferences/restrictions: vegan, nut allergy."));
        assert!(!prompt.contains("Room 12"));

        let finance = build_system_prompt(&persona(AgentId::Finance), &facts, false);
        assert!(finance.contains("The guest is in Room 12."));
        assert!(!finance.contains("dietary"));
    }
}
