//! Run lifecycle events.
//!
//! Each event renders to the message written into the daily run log.

use crate::types::{truncate_chars, RunStatus};
use serde::{Deserialize, Serialize};

/// Event type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    RunStarted,
    SemanticDegraded,
    NoMatch,
    PlanComposed,
    StepStarted,
    StepFailed,
    TemplateFound,
    TemplateExecuted,
    TemplateSaved,
    TemplateSaveFailed,
    RunCompleted,
    RunFailed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunStarted => "RUN_STARTED",
            Self::SemanticDegraded => "SEMANTIC_DEGRADED",
            Self::NoMatch => "NO_MATCH",
            Self::PlanComposed => "PLAN_COMPOSED",
            Self::StepStarted => "STEP_STARTED",
            Self::StepFailed => "STEP_FAILED",
            Self::TemplateFound => "TEMPLATE_FOUND",
            Self::TemplateExecuted => "TEMPLATE_EXECUTED",
            Self::TemplateSaved => "TEMPLATE_SAVED",
            Self::TemplateSaveFailed => "TEMPLATE_SAVE_FAILED",
            Self::RunCompleted => "RUN_COMPLETED",
            Self::RunFailed => "RUN_FAILED",
        }
    }
}

/// A lifecycle event with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunEvent {
    RunStarted { task: String, max_task_chars: usize },
    SemanticDegraded { reason: String },
    NoMatch,
    PlanComposed { skills: Vec<String> },
    StepStarted { node_id: String, skill: String },
    StepFailed { node_id: String, error: String },
    TemplateFound { name: String },
    TemplateExecuted { name: String },
    TemplateSaved { name: String },
    TemplateSaveFailed { reason: String },
    RunCompleted { steps: usize },
    RunFailed { reason: String },
}

impl RunEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::RunStarted { .. } => EventType::RunStarted,
            Self::SemanticDegraded { .. } => EventType::SemanticDegraded,
            Self::NoMatch => EventType::NoMatch,
            Self::PlanComposed { .. } => EventType::PlanComposed,
            Self::StepStarted { .. } => EventType::StepStarted,
            Self::StepFailed { .. } => EventType::StepFailed,
            Self::TemplateFound { .. } => EventType::TemplateFound,
            Self::TemplateExecuted { .. } => EventType::TemplateExecuted,
            Self::TemplateSaved { .. } => EventType::TemplateSaved,
            Self::TemplateSaveFailed { .. } => EventType::TemplateSaveFailed,
            Self::RunCompleted { .. } => EventType::RunCompleted,
            Self::RunFailed { .. } => EventType::RunFailed,
        }
    }

    /// Terminal status implied by the event, if any.
    pub fn terminal_status(&self) -> Option<RunStatus> {
        match self {
            Self::RunCompleted { .. } => Some(RunStatus::Completed),
            Self::RunFailed { .. } => Some(RunStatus::Failed),
            _ => None,
        }
    }

    /// Human-readable log message.
    pub fn message(&self) -> String {
        match self {
            Self::RunStarted {
                task,
                max_task_chars,
            } => format!(
                "Started orchestration: {}",
                truncate_chars(task, *max_task_chars)
            ),
            Self::SemanticDegraded { reason } => {
                format!("Semantic ranking unavailable, using keyword matching only: {reason}")
            }
            Self::NoMatch => "No matching skills found".to_string(),
            Self::PlanComposed { skills } => {
                format!("Composed plan ({} steps): {}", skills.len(), skills.join(" -> "))
            }
            Self::StepStarted { skill, .. } => format!("Executing skill: {skill}"),
            Self::StepFailed { node_id, error } => format!("Step {node_id} failed: {error}"),
            Self::TemplateFound { name } => format!("Found template: {name}"),
            Self::TemplateExecuted { name } => format!("Executed template: {name}"),
            Self::TemplateSaved { name } => format!("Saved template: {name}"),
            Self::TemplateSaveFailed { reason } => format!("Failed to save template: {reason}"),
            Self::RunCompleted { .. } => "Completed orchestration".to_string(),
            Self::RunFailed { reason } => format!("Orchestration failed: {reason}"),
        }
    }
}
