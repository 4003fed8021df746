//! 客人事实抽取
//!
//! 从客人的原话中抽取姓名、房间号、饮食偏好与报修问题，并与已有事实合并。
//! 纯函数、确定性、不会失败：无法识别的内容保持原值不变。

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 报修问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCategory {
    #[serde(rename = "HVAC")]
    Hvac,
    Plumbing,
    Electronics,
    Internet,
    Electrical,
    Housekeeping,
    #[serde(rename = "Noise Complaint")]
    NoiseComplaint,
    #[serde(rename = "Door/Lock")]
    DoorLock,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Hvac => "HVAC",
            IssueCategory::Plumbing => "Plumbing",
            IssueCategory::Electronics => "Electronics",
            IssueCategory::Internet => "Internet",
            IssueCategory::Electrical => "Electrical",
            IssueCategory::Housekeeping => "Housekeeping",
            IssueCategory::NoiseComplaint => "Noise Complaint",
            IssueCategory::DoorLock => "Door/Lock",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条报修记录；按 (category, keyword) 去重
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceIssue {
    pub category: IssueCategory,
    pub keyword: String,
    pub reported: DateTime<Utc>,
}

/// 累积的客人事实
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dietary_preferences: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintenance_issues: Vec<MaintenanceIssue>,
}

impl FactSet {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.room_number.is_none()
            && self.dietary_preferences.is_empty()
            && self.maintenance_issues.is_empty()
    }

    pub fn has_issue(&self, category: IssueCategory, keyword: &str) -> bool {
        self.maintenance_issues
            .iter()
            .any(|i| i.category == category && i.keyword == keyword)
    }
}

/// 姓名线索，按优先级排列；首个命中者生效
const NAME_CUES: [&str; 3] = ["my name is ", "i'm ", "i am "];

/// 截断姓名的标点
const NAME_TERMINATORS: [char; 5] = ['.', ',', '!', '?', ';'];

/// 姓名之后常见的连接词，遇到即停止
const NAME_STOP_WORDS: &[&str] = &[
    "and", "but", "or", "so", "in", "at", "from", "with", "staying", "here", "the", "a", "an",
    "my", "room", "calling", "looking", "checking", "trying", "going", "also", "too", "not",
    "just", "very", "really", "currently", "for", "on", "to", "still", "sure", "sorry",
    "hungry", "thirsty", "tired", "fine", "good", "ok", "okay", "happy", "interested",
    "wondering", "hoping", "afraid", "having", "getting", "waiting", "leaving", "done",
    "vegan", "vegetarian", "gluten-free", "dairy-free", "lactose", "allergic",
];

/// 姓名最多取几个词
const MAX_NAME_WORDS: usize = 3;

const DIETARY_KEYWORDS: [&str; 7] = [
    "vegetarian",
    "vegan",
    "gluten-free",
    "nut allergy",
    "dairy-free",
    "lactose intolerant",
    "shellfish allergy",
];

/// 报修关键词 → 类别（顺序即记录顺序）
const MAINTENANCE_KEYWORDS: [(&str, IssueCategory); 26] = [
    ("air conditioning", IssueCategory::Hvac),
    ("ac", IssueCategory::Hvac),
    ("heating", IssueCategory::Hvac),
    ("hot water", IssueCategory::Plumbing),
    ("water", IssueCategory::Plumbing),
    ("toilet", IssueCategory::Plumbing),
    ("sink", IssueCategory::Plumbing),
    ("shower", IssueCategory::Plumbing),
    ("leak", IssueCategory::Plumbing),
    ("tv", IssueCategory::Electronics),
    ("television", IssueCategory::Electronics),
    ("remote", IssueCategory::Electronics),
    ("wifi", IssueCategory::Internet),
    ("internet", IssueCategory::Internet),
    ("light", IssueCategory::Electrical),
    ("power", IssueCategory::Electrical),
    ("outlet", IssueCategory::Electrical),
    ("cleaning", IssueCategory::Housekeeping),
    ("towel", IssueCategory::Housekeeping),
    ("bed", IssueCategory::Housekeeping),
    ("sheet", IssueCategory::Housekeeping),
    ("noise", IssueCategory::NoiseComplaint),
    ("door", IssueCategory::DoorLock),
    ("handle", IssueCategory::DoorLock),
    ("lock", IssueCategory::DoorLock),
    ("key", IssueCategory::DoorLock),
];

/// 不超过该长度的关键词须整词匹配（避免 "ac" 命中 "place"）
const WHOLE_WORD_MAX_LEN: usize = 2;

/// 抽取并合并事实（报修时间取当前时间）
pub fn extract(text: &str, prior: &FactSet) -> FactSet {
    extract_at(text, prior, Utc::now())
}

/// 抽取并合并事实，报修时间由调用方给定
pub fn extract_at(text: &str, prior: &FactSet, now: DateTime<Utc>) -> FactSet {
    let mut facts = prior.clone();

    if let Some(name) = extract_name(text) {
        facts.name = Some(name);
    }
    if let Some(room) = extract_room_number(text) {
        facts.room_number = Some(room);
    }
    for diet in extract_dietary_preferences(text) {
        if !facts.dietary_preferences.iter().any(|d| d == diet) {
            facts.dietary_preferences.push(diet.to_string());
        }
    }
    for (keyword, category) in extract_maintenance_keywords(text) {
        if !facts.has_issue(category, keyword) {
            facts.maintenance_issues.push(MaintenanceIssue {
                category,
                keyword: keyword.to_string(),
                reported: now,
            });
        }
    }

    facts
}

/// 姓名：首个命中的线索之后、首个标点之前的名字词
///
/// 大小写不限；遇到连接词或状态词即停止，"I'm looking for dinner" 不产生姓名。
pub fn extract_name(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let (cue, start) = NAME_CUES
        .iter()
        .find_map(|cue| find_at_word_start(&lower, cue).map(|idx| (*cue, idx)))?;

    let rest = &text[start + cue.len()..];
    let clause = rest.split(NAME_TERMINATORS).next().unwrap_or("").trim();

    let words: Vec<&str> = clause
        .split_whitespace()
        .take_while(|w| is_name_word(w))
        .take(MAX_NAME_WORDS)
        .collect();

    let name = words.join(" ");
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn is_name_word(word: &str) -> bool {
    let starts_alpha = word.chars().next().is_some_and(|c| c.is_alphabetic());
    let all_name_chars = word
        .chars()
        .all(|c| c.is_alphabetic() || c == '-' || c == '\'');
    starts_alpha && all_name_chars && !NAME_STOP_WORDS.contains(&word.to_lowercase().as_str())
}

/// 在词首位置查找 needle（前一个字符不是字母数字）
fn find_at_word_start(haystack: &str, needle: &str) -> Option<usize> {
    haystack.match_indices(needle).map(|(i, _)| i).find(|&i| {
        haystack[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

fn room_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\broom\s*(\d+)").expect("room regex is valid"))
}

/// 房间号："room 204" 取数字；否则整条消息为 1–4 位数字时视为房间号
pub fn extract_room_number(text: &str) -> Option<String> {
    if let Some(caps) = room_regex().captures(text) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    let trimmed = text.trim();
    if (1..=4).contains(&trimmed.len()) && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(trimmed.to_string());
    }
    None
}

/// 饮食偏好：固定词表的子串匹配，按词表顺序返回
pub fn extract_dietary_preferences(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    DIETARY_KEYWORDS
        .iter()
        .copied()
        .filter(|diet| lower.contains(diet))
        .collect()
}

/// 报修关键词：按表顺序返回命中的 (keyword, category)
///
/// 较长关键词先占位，完全落在其命中区间内的较短关键词不再单独记录
/// （"hot water" 不会再额外产生 "water"）。
pub fn extract_maintenance_keywords(text: &str) -> Vec<(&'static str, IssueCategory)> {
    let lower = text.to_lowercase();

    let mut by_length: Vec<usize> = (0..MAINTENANCE_KEYWORDS.len()).collect();
    by_length.sort_by_key(|&i| std::cmp::Reverse(MAINTENANCE_KEYWORDS[i].0.len()));

    let mut claimed: Vec<(usize, usize)> = Vec::new();
    let mut matched = vec![false; MAINTENANCE_KEYWORDS.len()];

    for i in by_length {
        let keyword = MAINTENANCE_KEYWORDS[i].0;
        let free: Vec<(usize, usize)> = keyword_spans(&lower, keyword)
            .into_iter()
            .filter(|&(s, e)| !claimed.iter().any(|&(cs, ce)| cs <= s && e <= ce))
            .collect();
        if !free.is_empty() {
            matched[i] = true;
            claimed.extend(free);
        }
    }

    MAINTENANCE_KEYWORDS
        .iter()
        .zip(matched)
        .filter(|(_, hit)| *hit)
        .map(|(entry, _)| *entry)
        .collect()
}

fn keyword_spans(lower: &str, keyword: &str) -> Vec<(usize, usize)> {
    lower
        .match_indices(keyword)
        .map(|(i, _)| (i, i + keyword.len()))
        .filter(|&(s, e)| keyword.len() > WHOLE_WORD_MAX_LEN || is_whole_word(lower, s, e))
        .collect()
}

fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.map_or(true, |c| !c.is_alphanumeric()) && after.map_or(true, |c| !c.is_alphanumeric())
}
