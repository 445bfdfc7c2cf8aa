//! Skill matching.
//!
//! Scores every catalog skill against the task, optionally asks the semantic
//! adapter to rerank the lexical leaders, and fuses both signals.

use crate::metrics::EngineMetrics;
use crate::ranker::SemanticAdapter;
use serde::{Deserialize, Serialize};
use sfo_core::fusion::{self, SemanticSignal};
use sfo_core::score::{score_tokens, tokenize};
use sfo_core::{ScoredSkill, SkillCatalog, SkillRecord};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to the semantic signal during one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SemanticStatus {
    /// The caller asked for lexical-only ranking.
    Disabled,
    /// Nothing to rank; the service was not called.
    Skipped,
    Ranked { entries: usize },
    /// Requested but unavailable; lexical scores were down-weighted.
    Degraded { reason: String },
}

/// Ranked candidates plus the state of the semantic signal.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub ranked: Vec<ScoredSkill>,
    pub semantic: SemanticStatus,
}

impl MatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

/// Matches tasks against a shared, read-only catalog.
#[derive(Debug)]
pub struct SkillMatcher {
    catalog: Arc<SkillCatalog>,
    adapter: Option<SemanticAdapter>,
    metrics: Arc<EngineMetrics>,
}

impl SkillMatcher {
    pub fn new(catalog: Arc<SkillCatalog>, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            catalog,
            adapter: None,
            metrics,
        }
    }

    #[must_use]
    pub fn with_adapter(mut self, adapter: SemanticAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn catalog(&self) -> &SkillCatalog {
        &self.catalog
    }

    pub fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Rank every catalog skill for `task`, best first.
    ///
    /// With `use_semantic` set, a missing or failing adapter degrades to
    /// lexical-only ranking instead of failing the match.
    pub fn match_task(&self, task: &str, use_semantic: bool) -> MatchOutcome {
        let tokens = tokenize(task);
        let mut scored: Vec<ScoredSkill> = self
            .catalog
            .skills()
            .iter()
            .map(|skill| ScoredSkill::new(skill.clone(), score_tokens(&tokens, skill).total()))
            .collect();
        self.metrics.inc_scored(scored.len());
        fusion::sort_lexical(&mut scored);

        if scored.is_empty() {
            debug!("catalog is empty, nothing to match");
            let semantic = if use_semantic {
                SemanticStatus::Skipped
            } else {
                SemanticStatus::Disabled
            };
            return MatchOutcome {
                ranked: scored,
                semantic,
            };
        }

        let (signal, semantic) = if use_semantic {
            self.semantic_signal(task, &scored)
        } else {
            (SemanticSignal::Disabled, SemanticStatus::Disabled)
        };

        let ranked = fusion::fuse(scored, &signal);
        debug!(
            candidates = ranked.len(),
            top = ?ranked.first().map(ScoredSkill::name),
            "matched task"
        );
        MatchOutcome { ranked, semantic }
    }

    fn semantic_signal(
        &self,
        task: &str,
        scored: &[ScoredSkill],
    ) -> (SemanticSignal, SemanticStatus) {
        let Some(adapter) = &self.adapter else {
            self.metrics.inc_semantic_fallbacks();
            return (
                SemanticSignal::unavailable(),
                SemanticStatus::Degraded {
                    reason: "semantic ranker not configured".to_string(),
                },
            );
        };

        let window: Vec<&SkillRecord> = scored
            .iter()
            .take(adapter.limit())
            .map(|s| &s.skill)
            .collect();

        self.metrics.inc_semantic_requests();
        match adapter.try_rank(task, &window) {
            Ok(entries) if !entries.is_empty() => {
                let status = SemanticStatus::Ranked {
                    entries: entries.len(),
                };
                (SemanticSignal::Ranked(entries), status)
            }
            Ok(_) => {
                self.metrics.inc_semantic_fallbacks();
                warn!("semantic ranker returned no usable entries");
                (
                    SemanticSignal::unavailable(),
                    SemanticStatus::Degraded {
                        reason: "no usable entries".to_string(),
                    },
                )
            }
            Err(e) => {
                self.metrics.inc_semantic_fallbacks();
                warn!(error = %e, "semantic ranking failed, using keyword matching only");
                (
                    SemanticSignal::unavailable(),
                    SemanticStatus::Degraded {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }
}
