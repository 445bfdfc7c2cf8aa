//! Engine counters.
//!
//! Atomic counters, shared across the matcher and orchestrator through an `Arc`.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters for matching and orchestration.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Skills scored by the lexical scorer.
    pub skills_scored_total: AtomicUsize,
    /// Calls made to the semantic ranking service.
    pub semantic_requests_total: AtomicUsize,
    /// Matches that fell back to lexical-only ranking after requesting the semantic signal.
    pub semantic_fallbacks_total: AtomicUsize,
    /// Plan steps executed successfully.
    pub steps_executed_total: AtomicUsize,
    pub templates_saved_total: AtomicUsize,
    /// EXPERT runs served from a saved template.
    pub template_hits_total: AtomicUsize,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_scored(&self, count: usize) {
        self.skills_scored_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_semantic_requests(&self) {
        self.semantic_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_semantic_fallbacks(&self) {
        self.semantic_fallbacks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_steps_executed(&self) {
        self.steps_executed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_templates_saved(&self) {
        self.templates_saved_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_template_hits(&self) {
        self.template_hits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_scored(&self) -> usize {
        self.skills_scored_total.load(Ordering::Relaxed)
    }

    pub fn get_semantic_requests(&self) -> usize {
        self.semantic_requests_total.load(Ordering::Relaxed)
    }

    pub fn get_semantic_fallbacks(&self) -> usize {
        self.semantic_fallbacks_total.load(Ordering::Relaxed)
    }

    pub fn get_steps_executed(&self) -> usize {
        self.steps_executed_total.load(Ordering::Relaxed)
    }

    pub fn get_templates_saved(&self) -> usize {
        self.templates_saved_total.load(Ordering::Relaxed)
    }

    pub fn get_template_hits(&self) -> usize {
        self.template_hits_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_scored() {
        let metrics = EngineMetrics::new();
        assert_eq!(metrics.get_scored(), 0);
        metrics.inc_scored(5);
        metrics.inc_scored(3);
        assert_eq!(metrics.get_scored(), 8);
    }

    #[test]
    fn increments_semantic_counters() {
        let metrics = EngineMetrics::new();
        metrics.inc_semantic_requests();
        metrics.inc_semantic_requests();
        metrics.inc_semantic_fallbacks();
        assert_eq!(metrics.get_semantic_requests(), 2);
        assert_eq!(metrics.get_semantic_fallbacks(), 1);
    }

    #[test]
    fn increments_run_counters() {
        let metrics = EngineMetrics::new();
        metrics.inc_steps_executed();
        metrics.inc_templates_saved();
        metrics.inc_template_hits();
        assert_eq!(metrics.get_steps_executed(), 1);
        assert_eq!(metrics.get_templates_saved(), 1);
        assert_eq!(metrics.get_template_hits(), 1);
    }
}
