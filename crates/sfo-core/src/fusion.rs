//! Fusion of lexical and semantic scores into the final ranking.
//!
//! - Skill ranked by the semantic service: `0.4 * lexical + 0.6 * semantic`.
//! - Semantic signal requested but no entry for the skill (service unavailable,
//!   or the skill was outside the window sent to it): `0.4 * lexical`.
//! - Semantic signal disabled by the caller: `lexical`.
//!
//! The output is sorted descending by final score with a stable sort, so ties
//! keep their lexical order.

use crate::types::ScoredSkill;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

pub const LEXICAL_WEIGHT: f64 = 0.4;
pub const SEMANTIC_WEIGHT: f64 = 0.6;

/// One entry returned by the semantic ranking service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticEntry {
    pub name: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub reason: String,
}

/// State of the semantic signal for one matching run.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticSignal {
    /// The caller asked for lexical-only ranking.
    Disabled,
    /// Requested; holds whatever the service returned. Empty means unavailable.
    Ranked(Vec<SemanticEntry>),
}

impl SemanticSignal {
    pub fn unavailable() -> Self {
        Self::Ranked(Vec::new())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Ranked(entries) if !entries.is_empty())
    }
}

/// Sort scored skills descending by lexical score, keeping catalog order on ties.
pub fn sort_lexical(skills: &mut [ScoredSkill]) {
    skills.sort_by(|a, b| descending(a.lexical_score(), b.lexical_score()));
}

/// Combine the signals and produce the final ranking.
///
/// `skills` is expected in lexical order; that order breaks ties. A name
/// ranked twice takes its last entry.
pub fn fuse(mut skills: Vec<ScoredSkill>, signal: &SemanticSignal) -> Vec<ScoredSkill> {
    match signal {
        SemanticSignal::Disabled => {
            for skill in &mut skills {
                skill.set_semantic(None, None);
                let lexical = skill.lexical_score();
                skill.set_final(lexical);
            }
        }
        SemanticSignal::Ranked(entries) => {
            let mut by_name: HashMap<&str, &SemanticEntry> = HashMap::new();
            for entry in entries {
                by_name.insert(entry.name.as_str(), entry);
            }

            for skill in &mut skills {
                let lexical = skill.lexical_score();
                if let Some(entry) = by_name.get(skill.name()).copied() {
                    let semantic = entry.score.clamp(0.0, 1.0);
                    skill.set_semantic(Some(semantic), Some(entry.reason.clone()));
                    skill.set_final(LEXICAL_WEIGHT * lexical + SEMANTIC_WEIGHT * semantic);
                } else {
                    skill.set_semantic(None, None);
                    skill.set_final(LEXICAL_WEIGHT * lexical);
                }
            }
        }
    }

    skills.sort_by(|a, b| descending(a.final_score(), b.final_score()));
    skills
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SkillRecord;

    fn scored(name: &str, lexical: f64) -> ScoredSkill {
        ScoredSkill::new(SkillRecord::new(name, "", ["kw"]), lexical)
    }

    fn entry(name: &str, score: f64) -> SemanticEntry {
        SemanticEntry {
            name: name.to_string(),
            score,
            reason: format!("{name} fits"),
        }
    }

    #[test]
    fn disabled_keeps_lexical_score() {
        let fused = fuse(vec![scored("a", 0.7), scored("b", 0.2)], &SemanticSignal::Disabled);
        assert_eq!(fused[0].final_score(), 0.7);
        assert_eq!(fused[1].final_score(), 0.2);
        assert!(fused[0].rationale().is_none());
    }

    #[test]
    fn unavailable_penalizes_every_candidate() {
        let fused = fuse(
            vec![scored("a", 0.7), scored("b", 0.2)],
            &SemanticSignal::unavailable(),
        );
        for skill in &fused {
            assert_eq!(skill.final_score(), LEXICAL_WEIGHT * skill.lexical_score());
            assert!(skill.semantic_score().is_none());
        }
    }

    #[test]
    fn semantic_entry_blends_scores() {
        let signal = SemanticSignal::Ranked(vec![entry("b", 0.9)]);
        let fused = fuse(vec![scored("a", 0.7), scored("b", 0.2)], &signal);

        assert_eq!(fused[0].name(), "b");
        assert_eq!(fused[0].final_score(), 0.4 * 0.2 + 0.6 * 0.9);
        assert_eq!(fused[0].rationale(), Some("b fits"));
        assert_eq!(fused[1].name(), "a");
        assert_eq!(fused[1].final_score(), 0.4 * 0.7);
    }

    #[test]
    fn ties_keep_lexical_order() {
        let mut skills = vec![scored("first", 0.5), scored("second", 0.5), scored("top", 0.9)];
        sort_lexical(&mut skills);
        let names: Vec<_> = skills.iter().map(ScoredSkill::name).collect();
        assert_eq!(names, vec!["top", "first", "second"]);

        let signal = SemanticSignal::Ranked(vec![entry("first", 0.5), entry("second", 0.5)]);
        let fused = fuse(skills, &signal);
        let names: Vec<_> = fused.iter().map(ScoredSkill::name).collect();
        assert_eq!(names, vec!["first", "second", "top"]);
    }

    #[test]
    fn duplicate_entries_keep_the_last() {
        let signal = SemanticSignal::Ranked(vec![entry("a", 0.1), entry("a", 0.9)]);
        let fused = fuse(vec![scored("a", 0.0)], &signal);
        assert_eq!(fused[0].semantic_score(), Some(0.9));
    }

    #[test]
    fn out_of_range_semantic_score_is_clamped() {
        let signal = SemanticSignal::Ranked(vec![entry("a", 4.0)]);
        let fused = fuse(vec![scored("a", 1.0)], &signal);
        assert_eq!(fused[0].semantic_score(), Some(1.0));
        assert!(fused[0].final_score() <= 1.0);
    }

    #[test]
    fn signal_availability() {
        assert!(!SemanticSignal::Disabled.is_available());
        assert!(!SemanticSignal::unavailable().is_available());
        assert!(SemanticSignal::Ranked(vec![entry("a", 0.5)]).is_available());
    }
}
