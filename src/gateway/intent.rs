//! 意图路由
//!
//! 根据客人消息与当前负责的 Agent，决定下一轮由哪个部门接待：
//! 1. 固定短语直达（"book a table" → 餐厅），跳过打分
//! 2. 各部门关键词加权打分（3/2/1 三档）
//! 3. 决策阶梯：高分直接切换、中分视为换话题、转折语触发换话题、否则延续当前 Agent

use serde::Serialize;

use crate::agents::AgentId;

/// 路由结果：下一个 Agent，以及是否发生了切换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub next_agent: AgentId,
    pub switched: bool,
    /// 命中的决策规则（用于日志）
    #[serde(skip)]
    pub rule: RoutingRule,
}

/// 决策阶梯中生效的规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingRule {
    DomainPhrase,
    StrongScore,
    TopicChange,
    TransitionPhrase,
    Continue,
    WeakScore,
    #[default]
    Default,
}

/// 直达短语：按顺序扫描，首个命中即生效
const DOMAIN_PHRASES: &[(AgentId, &str)] = &[
    (AgentId::Restaurant, "book a table"),
    (AgentId::Restaurant, "reserve a table"),
    (AgentId::Restaurant, "a table for"),
    (AgentId::Restaurant, "room service"),
    (AgentId::Restaurant, "dinner reservation"),
    (AgentId::Maintenance, "hot water"),
    (AgentId::Maintenance, "not working"),
    (AgentId::Maintenance, "isn't working"),
    (AgentId::Maintenance, "doesn't work"),
    (AgentId::Maintenance, "air conditioning"),
    (AgentId::Finance, "my bill"),
    (AgentId::Finance, "charged twice"),
    (AgentId::Finance, "double charged"),
    (AgentId::Finance, "pay the bill"),
    (AgentId::Reception, "book a room"),
    (AgentId::Reception, "late checkout"),
    (AgentId::Reception, "wake-up call"),
    (AgentId::Reception, "extend my stay"),
];

const RESTAURANT_KEYWORDS: &[(&str, u32)] = &[
    ("restaurant", 3),
    ("menu", 3),
    ("breakfast", 3),
    ("brunch", 3),
    ("lunch", 3),
    ("dinner", 3),
    ("food", 3),
    ("cuisine", 3),
    ("hungry", 2),
    ("meal", 2),
    ("dish", 2),
    ("dessert", 2),
    ("wine", 2),
    ("chef", 2),
    ("vegetarian", 2),
    ("vegan", 2),
    ("gluten", 2),
    ("allergy", 2),
    ("a table", 2),
    ("drinks", 1),
    ("coffee", 1),
    ("snack", 1),
    ("order", 1),
];

const MAINTENANCE_KEYWORDS: &[(&str, u32)] = &[
    ("broken", 3),
    ("repair", 3),
    ("maintenance", 3),
    ("leak", 3),
    ("toilet", 3),
    ("shower", 3),
    ("heating", 3),
    ("plumbing", 3),
    ("clogged", 3),
    ("fix", 2),
    ("wifi", 2),
    ("internet", 2),
    ("sink", 2),
    ("outlet", 2),
    ("television", 2),
    ("remote", 2),
    ("noise", 2),
    ("noisy", 2),
    ("locked out", 2),
    ("keycard", 2),
    ("door", 1),
    ("the lights", 1),
    ("lamp", 1),
    ("towel", 1),
    ("sheets", 1),
    ("cleaning", 1),
    ("cold", 1),
    ("issue", 1),
    ("problem", 1),
];

const FINANCE_KEYWORDS: &[(&str, u32)] = &[
    ("bill", 3),
    ("invoice", 3),
    ("refund", 3),
    ("payment", 3),
    ("receipt", 3),
    ("deposit", 3),
    ("charge", 3),
    ("finance", 3),
    ("pay", 2),
    ("price", 2),
    ("cost", 2),
    ("credit card", 2),
    ("taxes", 2),
    ("fees", 2),
    ("discount", 2),
    ("currency", 2),
    ("money", 1),
    ("expensive", 1),
    ("total", 1),
    ("account", 1),
];

const RECEPTION_KEYWORDS: &[(&str, u32)] = &[
    ("check in", 3),
    ("check-in", 3),
    ("check out", 3),
    ("check-out", 3),
    ("checkout", 3),
    ("reception", 3),
    ("front desk", 3),
    ("booking", 3),
    ("reservation", 2),
    ("upgrade", 2),
    ("availability", 2),
    ("available", 2),
    ("luggage", 2),
    ("parking", 2),
    ("nights", 2),
    ("stay", 1),
    ("hotel", 1),
    ("pool", 1),
    ("gym", 1),
    ("amenities", 1),
    ("directions", 1),
    ("airport", 1),
    ("taxi", 1),
];

/// 换话题提示语
const TRANSITION_PHRASES: &[&str] = &[
    "by the way",
    "also",
    "another thing",
    "different",
    "new",
    "change topic",
    "something else",
    "instead",
    "rather",
    "what about",
];

/// 换话题启发式要求的最少词数（严格大于）
const TOPIC_CHANGE_MIN_TOKENS: usize = 3;

/// 强信号：直接路由到最高分部门
const STRONG_SCORE: u32 = 3;
/// 中等信号：与当前 Agent 不同则视为换话题
const TOPIC_SWITCH_SCORE: u32 = 2;

/// 打分顺序；后面的部门只有严格更高分才能胜出，前台为默认
const SCORING_ORDER: [AgentId; 4] = [
    AgentId::Restaurant,
    AgentId::Maintenance,
    AgentId::Finance,
    AgentId::Reception,
];

fn vocabulary(agent: AgentId) -> &'static [(&'static str, u32)] {
    match agent {
        AgentId::Restaurant => RESTAURANT_KEYWORDS,
        AgentId::Maintenance => MAINTENANCE_KEYWORDS,
        AgentId::Finance => FINANCE_KEYWORDS,
        AgentId::Reception => RECEPTION_KEYWORDS,
    }
}

/// 直达短语匹配（大小写不敏感子串）
pub fn match_domain_phrase(text: &str) -> Option<AgentId> {
    let lower = text.to_lowercase();
    DOMAIN_PHRASES
        .iter()
        .find(|(_, phrase)| lower.contains(phrase))
        .map(|(agent, _)| *agent)
}

/// 单个部门的加权得分
pub fn score(text: &str, agent: AgentId) -> u32 {
    let lower = text.to_lowercase();
    score_lower(&lower, agent)
}

fn score_lower(lower: &str, agent: AgentId) -> u32 {
    vocabulary(agent)
        .iter()
        .filter(|(keyword, _)| lower.contains(keyword))
        .map(|(_, weight)| weight)
        .sum()
}

/// 最高分部门及其得分；平分按打分顺序取前者
pub fn top_scoring(text: &str) -> (AgentId, u32) {
    let lower = text.to_lowercase();
    let mut best = (AgentId::Reception, 0);
    for agent in SCORING_ORDER {
        let s = score_lower(&lower, agent);
        if s > best.1 {
            best = (agent, s);
        }
    }
    best
}

/// 换话题启发式：词数 > 3 且包含转折语
pub fn is_new_topic(text: &str) -> bool {
    if text.split_whitespace().count() <= TOPIC_CHANGE_MIN_TOKENS {
        return false;
    }
    let lower = text.to_lowercase();
    TRANSITION_PHRASES.iter().any(|p| lower.contains(p))
}

/// 路由：确定性，仅依赖消息文本与当前 Agent
pub fn route(text: &str, current: Option<AgentId>) -> RoutingDecision {
    let decide = |next: AgentId, rule: RoutingRule| RoutingDecision {
        next_agent: next,
        switched: current.map_or(true, |c| c != next),
        rule,
    };

    if let Some(agent) = match_domain_phrase(text) {
        return decide(agent, RoutingRule::DomainPhrase);
    }

    let (winner, top) = top_scoring(text);

    if top >= STRONG_SCORE {
        return decide(winner, RoutingRule::StrongScore);
    }
    if top >= TOPIC_SWITCH_SCORE {
        if let Some(c) = current {
            if c != winner {
                return decide(winner, RoutingRule::TopicChange);
            }
        }
    }
    if top > 0 && is_new_topic(text) {
        return decide(winner, RoutingRule::TransitionPhrase);
    }
    if let Some(c) = current {
        return decide(c, RoutingRule::Continue);
    }
    if top > 0 {
        return decide(winner, RoutingRule::WeakScore);
    }
    decide(AgentId::Reception, RoutingRule::Default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leak_routes_to_maintenance_from_anywhere() {
        assert!(score("the toilet is leaking", AgentId::Maintenance) >= 3);
        for current in [None, Some(AgentId::Restaurant), Some(AgentId::Finance)] {
            let d = route("the toilet is leaking", current);
            assert_eq!(d.next_agent, AgentId::Maintenance);
        }
    }

    #[test]
    fn test_continuity_without_keywords() {
        let d = route("and what time does it open", Some(AgentId::Restaurant));
        assert_eq!(d.next_agent, AgentId::Restaurant);
        assert!(!d.switched);
        assert_eq!(d.rule, RoutingRule::Continue);
    }

    #[test]
    fn test_domain_phrase_beats_scores() {
        let text = "book a table, and the shower is broken and the toilet leaks";
        assert!(score(text, AgentId::Maintenance) > score(text, AgentId::Restaurant));
        let d = route(text, Some(AgentId::Maintenance));
        assert_eq!(d.next_agent, AgentId::Restaurant);
        assert_eq!(d.rule, RoutingRule::DomainPhrase);
        assert!(d.switched);
    }

    #[test]
    fn test_first_message_defaults_to_reception() {
        let d = route("hello there", None);
        assert_eq!(d.next_agent, AgentId::Reception);
        assert!(d.switched);
        assert_eq!(d.rule, RoutingRule::Default);
    }

    #[test]
    fn test_medium_score_switches_topic() {
        // "wifi" = 2
        let d = route("is there wifi", Some(AgentId::Restaurant));
        assert_eq!(d.next_agent, AgentId::Maintenance);
        assert_eq!(d.rule, RoutingRule::TopicChange);

        let stay = route("is there wifi", Some(AgentId::Maintenance));
        assert_eq!(stay.rule, RoutingRule::Continue);
        assert!(!stay.switched);
    }

    #[test]
    fn test_transition_phrase_with_weak_score() {
        // "coffee" = 1
        let d = route("by the way could I get some coffee", Some(AgentId::Maintenance));
        assert_eq!(d.next_agent, AgentId::Restaurant);
        assert_eq!(d.rule, RoutingRule::TransitionPhrase);

        // 词数不足，延续当前
        let short = route("also coffee", Some(AgentId::Maintenance));
        assert_eq!(short.next_agent, AgentId::Maintenance);
    }

    #[test]
    fn test_weak_score_without_current() {
        let d = route("some coffee please", None);
        assert_eq!(d.next_agent, AgentId::Restaurant);
        assert_eq!(d.rule, RoutingRule::WeakScore);
    }

    #[test]
    fn test_ties_prefer_scoring_order() {
        // restaurant "menu" 3 vs finance "bill" 3
        assert_eq!(top_scoring("menu and bill").0, AgentId::Restaurant);
        // finance "invoice" 3 vs reception "booking" 3
        assert_eq!(top_scoring("invoice for my booking").0, AgentId::Finance);
        assert_eq!(top_scoring("nothing relevant"), (AgentId::Reception, 0));
    }

    #[test]
    fn test_finance_routing() {
        let d = route("I need a refund", Some(AgentId::Reception));
        assert_eq!(d.next_agent, AgentId::Finance);
        assert_eq!(route("can you check my bill", None).rule, RoutingRule::DomainPhrase);
    }

    #[test]
    fn test_dana_routes_to_maintenance() {
        let d = route("Hi, I'm Dana and my room 310 has no hot water", None);
        assert_eq!(d.next_agent, AgentId::Maintenance);
    }
}
