//! Lexical relevance scoring between a task and a skill.
//!
//! Three capped sub-scores are summed:
//! - name overlap (0.40): share of the skill's name words found in the task
//! - keyword overlap (0.35): share of keywords found in the task, denominator
//!   capped at 20 so large keyword sets are not penalized
//! - description containment (0.25): share of task tokens that occur inside
//!   the description text
//!
//! The score depends only on its two inputs.

use crate::types::SkillRecord;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const NAME_WEIGHT: f64 = 0.40;
pub const KEYWORD_WEIGHT: f64 = 0.35;
pub const DESCRIPTION_WEIGHT: f64 = 0.25;

/// Keyword denominator cap.
pub const MAX_KEYWORD_DENOMINATOR: usize = 20;

/// Breakdown of a lexical score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LexicalScore {
    pub name: f64,
    pub keywords: f64,
    pub description: f64,
}

impl LexicalScore {
    pub fn total(&self) -> f64 {
        (self.name + self.keywords + self.description).min(1.0)
    }
}

/// Tokenize text into lowercase word-like tokens of at least 3 characters.
///
/// Tokens start with a letter and may contain letters, digits, and hyphens.
pub fn tokenize(text: &str) -> HashSet<String> {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN_RE.get_or_init(|| Regex::new(r"\b[a-z][a-z0-9-]{2,}\b").unwrap());

    let lower = text.to_lowercase();
    re.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

/// Lexical score in `[0, 1]` for a task against one skill.
pub fn score(task: &str, skill: &SkillRecord) -> f64 {
    score_tokens(&tokenize(task), skill).total()
}

/// Score against a pre-tokenized task. Used when scoring a whole catalog.
pub fn score_tokens(task_tokens: &HashSet<String>, skill: &SkillRecord) -> LexicalScore {
    let name = skill.name.to_lowercase().replace('-', " ");

    if skill.keywords.is_empty() && name.is_empty() {
        return LexicalScore::default();
    }

    let mut result = LexicalScore::default();

    let name_words: HashSet<&str> = name.split_whitespace().collect();
    if !name_words.is_empty() {
        let hits = name_words
            .iter()
            .filter(|w| task_tokens.contains(**w))
            .count();
        result.name = NAME_WEIGHT * ratio(hits, name_words.len());
    }

    let keywords: HashSet<&str> = skill.keywords.iter().map(String::as_str).collect();
    if !keywords.is_empty() {
        let hits = keywords.iter().filter(|k| task_tokens.contains(**k)).count();
        let denominator = keywords.len().min(MAX_KEYWORD_DENOMINATOR);
        result.keywords = KEYWORD_WEIGHT * ratio(hits, denominator);
    }

    if !task_tokens.is_empty() {
        let description = skill.description.to_lowercase();
        let hits = task_tokens
            .iter()
            .filter(|t| description.contains(t.as_str()))
            .count();
        result.description = DESCRIPTION_WEIGHT * ratio(hits, task_tokens.len());
    }

    result
}

/// `hits / total`, capped at 1.0.
fn ratio(hits: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (hits as f64 / total as f64).min(1.0)
}
