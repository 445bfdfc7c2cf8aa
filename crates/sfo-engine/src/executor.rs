//! Skill execution seam.

use sfo_core::{ExecutionContext, PlanNode};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("skill '{skill}' failed: {message}")]
pub struct ExecutorError {
    pub skill: String,
    pub message: String,
}

impl ExecutorError {
    pub fn new(skill: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            skill: skill.into(),
            message: message.into(),
        }
    }
}

/// Runs one plan node and returns its output.
///
/// The context holds outputs of the steps already completed in this run.
pub trait SkillExecutor {
    fn execute(&self, node: &PlanNode, context: &ExecutionContext) -> Result<String, ExecutorError>;
}

/// Executor that reports success without doing any work.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderExecutor;

impl SkillExecutor for PlaceholderExecutor {
    fn execute(&self, node: &PlanNode, _context: &ExecutionContext) -> Result<String, ExecutorError> {
        Ok(format!("Skill '{}' executed successfully", node.skill_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfo_core::Mode;

    #[test]
    fn placeholder_output_names_skill() {
        let context = ExecutionContext::new("task", Mode::Quick);
        let node = PlanNode::new("n0", "react-deploy");
        assert_eq!(
            PlaceholderExecutor.execute(&node, &context).unwrap(),
            "Skill 'react-deploy' executed successfully"
        );
    }

    #[test]
    fn error_message_includes_skill() {
        let err = ExecutorError::new("lint", "exit status 2");
        assert_eq!(err.to_string(), "skill 'lint' failed: exit status 2");
    }
}
