//! Plan composition and validation.
//!
//! A plan is a strictly linear chain: every node after the first depends on
//! exactly the node before it. Fan-in and fan-out are not supported.

use crate::types::{PlanNode, ScoredSkill};
use std::collections::HashSet;

/// Error type for plan validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("duplicate node id: {0}")]
    DuplicateId(String),
    #[error("node {node} depends on {dependency}, which is not an earlier node")]
    ForwardReference { node: String, dependency: String },
}

/// Node id for the step at `index`.
pub fn node_id(index: usize) -> String {
    format!("n{index}")
}

/// Build a chain from the first `count` ranked skills.
pub fn compose(ranked: &[ScoredSkill], count: usize) -> Vec<PlanNode> {
    compose_names(ranked.iter().take(count).map(ScoredSkill::name))
}

/// Build a chain from skill names in execution order.
pub fn compose_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<PlanNode> {
    let mut plan: Vec<PlanNode> = Vec::new();

    for (index, name) in names.into_iter().enumerate() {
        let mut node = PlanNode::new(node_id(index), name);
        if let Some(prev) = plan.last() {
            node.depends_on.push(prev.id.clone());
        }
        plan.push(node);
    }

    plan
}

/// Check that ids are unique and dependencies only point backwards.
///
/// Used for plans loaded from templates, which may have been written by hand.
pub fn validate(plan: &[PlanNode]) -> Result<(), PlanError> {
    let mut seen: HashSet<&str> = HashSet::new();

    for node in plan {
        for dependency in &node.depends_on {
            if !seen.contains(dependency.as_str()) {
                return Err(PlanError::ForwardReference {
                    node: node.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        if !seen.insert(node.id.as_str()) {
            return Err(PlanError::DuplicateId(node.id.clone()));
        }
    }

    Ok(())
}
