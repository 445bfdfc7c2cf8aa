//! Core types for the skill flow orchestrator.
//!
//! Covers the skill records read from the catalog, the per-run scoring results,
//! plan nodes, the persisted execution context, and saved templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for runs.
/// Uses `UUIDv7` for time-ordered lexicographic sorting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub String);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// --- Enumerations ---

/// Orchestration mode. Trades latency for thoroughness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// Single best skill.
    Quick,
    /// Chain of the top three skills.
    #[default]
    Standard,
    /// Chain of the top five skills, saved as a template on success.
    Deep,
    /// Template lookup first, DEEP behavior otherwise.
    Expert,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "QUICK",
            Self::Standard => "STANDARD",
            Self::Deep => "DEEP",
            Self::Expert => "EXPERT",
        }
    }

    /// Number of ranked skills kept for the plan.
    ///
    /// EXPERT only composes a plan when no template matched, in which case it
    /// behaves like DEEP.
    pub fn candidate_count(&self) -> usize {
        match self {
            Self::Quick => 1,
            Self::Standard => 3,
            Self::Deep | Self::Expert => 5,
        }
    }

    /// Whether a successful composed plan is frozen into a template.
    pub fn saves_template(&self) -> bool {
        matches!(self, Self::Deep | Self::Expert)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode '{0}', expected: QUICK, STANDARD, DEEP, EXPERT")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "QUICK" => Ok(Self::Quick),
            "STANDARD" => Ok(Self::Standard),
            "DEEP" => Ok(Self::Deep),
            "EXPERT" => Ok(Self::Expert),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Created,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// --- Catalog and scoring ---

/// A skill as produced by the external indexer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkillRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Helper scripts shipped with the skill.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<String>,
    /// Reference documents shipped with the skill.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// Directory the indexer found the skill in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SkillRecord {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        keywords: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// A catalog skill with the scores computed for one matching run.
///
/// `final_score` is derived from the other two scores and cannot be set
/// directly; see [`crate::fusion`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSkill {
    pub skill: SkillRecord,
    lexical_score: f64,
    semantic_score: Option<f64>,
    rationale: Option<String>,
    final_score: f64,
}

impl ScoredSkill {
    /// Wraps a lexical score. Until fused, the final score equals it.
    pub fn new(skill: SkillRecord, lexical_score: f64) -> Self {
        let lexical_score = lexical_score.clamp(0.0, 1.0);
        Self {
            skill,
            lexical_score,
            semantic_score: None,
            rationale: None,
            final_score: lexical_score,
        }
    }

    pub fn name(&self) -> &str {
        &self.skill.name
    }

    pub fn lexical_score(&self) -> f64 {
        self.lexical_score
    }

    pub fn semantic_score(&self) -> Option<f64> {
        self.semantic_score
    }

    pub fn rationale(&self) -> Option<&str> {
        self.rationale.as_deref()
    }

    pub fn final_score(&self) -> f64 {
        self.final_score
    }

    pub(crate) fn set_semantic(&mut self, score: Option<f64>, rationale: Option<String>) {
        self.semantic_score = score.map(|s| s.clamp(0.0, 1.0));
        self.rationale = rationale;
    }

    pub(crate) fn set_final(&mut self, final_score: f64) {
        self.final_score = final_score.clamp(0.0, 1.0);
    }
}

// --- Plans, context, templates ---

/// A single step in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanNode {
    /// Run-local identifier (`n0`, `n1`, ...).
    pub id: String,
    #[serde(alias = "skill")]
    pub skill_name: String,
    /// Ids of earlier nodes this one waits on. At most one in a chain.
    #[serde(default, alias = "depends")]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub output: Option<String>,
}

impl PlanNode {
    pub fn new(id: impl Into<String>, skill_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            skill_name: skill_name.into(),
            depends_on: Vec::new(),
            completed: false,
            output: None,
        }
    }

    /// Copy of the node with execution state cleared.
    pub fn reset(&self) -> Self {
        Self {
            completed: false,
            output: None,
            ..self.clone()
        }
    }
}

/// Error descriptor recorded in the execution context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub at: DateTime<Utc>,
    /// Plan node the error belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("step {node_id} would exceed total steps ({total})")]
    StepOverflow { node_id: String, total: usize },
    #[error("total steps {total} is below current step {current}")]
    TotalBelowCurrent { total: usize, current: usize },
}

/// Mutable, persisted record of one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    #[serde(default)]
    pub id: Id,
    pub task: String,
    pub mode: Mode,
    pub started_at: DateTime<Utc>,
    current_step: usize,
    total_steps: usize,
    #[serde(default)]
    outputs: BTreeMap<String, String>,
    #[serde(default)]
    errors: Vec<ErrorRecord>,
}

impl ExecutionContext {
    pub fn new(task: impl Into<String>, mode: Mode) -> Self {
        Self {
            id: Id::new(),
            task: task.into(),
            mode,
            started_at: Utc::now(),
            current_step: 0,
            total_steps: 0,
            outputs: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn outputs(&self) -> &BTreeMap<String, String> {
        &self.outputs
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Declare the plan length for this run.
    pub fn set_total_steps(&mut self, total: usize) -> Result<(), ContextError> {
        if total < self.current_step {
            return Err(ContextError::TotalBelowCurrent {
                total,
                current: self.current_step,
            });
        }
        self.total_steps = total;
        Ok(())
    }

    /// Record a finished step and its output together.
    pub fn record_step(
        &mut self,
        node_id: &str,
        output: impl Into<String>,
    ) -> Result<(), ContextError> {
        if self.current_step >= self.total_steps {
            return Err(ContextError::StepOverflow {
                node_id: node_id.to_string(),
                total: self.total_steps,
            });
        }
        self.outputs.insert(node_id.to_string(), output.into());
        self.current_step += 1;
        Ok(())
    }

    pub fn record_error(&mut self, step: Option<&str>, message: impl Into<String>) {
        self.errors.push(ErrorRecord {
            at: Utc::now(),
            step: step.map(str::to_string),
            message: message.into(),
        });
    }

    pub fn is_finished(&self) -> bool {
        self.current_step == self.total_steps
    }
}

/// A successful plan frozen for reuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub trigger_patterns: Vec<String>,
    #[serde(alias = "dag")]
    pub plan: Vec<PlanNode>,
    pub created_at: DateTime<Utc>,
}

impl Template {
    /// Snapshot a plan for the given task.
    ///
    /// The name is `auto-<timestamp>-<suffix>`; the suffix comes from the
    /// random tail of a `UUIDv7` so templates created within the same second
    /// do not collide.
    pub fn from_plan(
        task: &str,
        plan: &[PlanNode],
        created_at: DateTime<Utc>,
        description_chars: usize,
        trigger_chars: usize,
    ) -> Self {
        let uuid = Uuid::now_v7().simple().to_string();
        let suffix = &uuid[uuid.len() - 8..];
        let trigger = truncate_chars(task.trim(), trigger_chars);
        Self {
            name: format!("auto-{}-{suffix}", created_at.format("%Y%m%d-%H%M%S")),
            description: truncate_chars(task, description_chars),
            trigger_patterns: if trigger.is_empty() {
                Vec::new()
            } else {
                vec![trigger]
            },
            plan: plan.to_vec(),
            created_at,
        }
    }

    /// Case-insensitive containment of any trigger pattern in the task.
    ///
    /// Blank patterns never match.
    pub fn matches(&self, task: &str) -> bool {
        let task = task.to_lowercase();
        self.trigger_patterns.iter().any(|pattern| {
            let pattern = pattern.trim().to_lowercase();
            !pattern.is_empty() && task.contains(&pattern)
        })
    }
}

/// Truncate to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_generates_unique_values() {
        let id1 = Id::new();
        let id2 = Id::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn mode_serializes_correctly() {
        assert_eq!(serde_json::to_string(&Mode::Quick).unwrap(), "\"QUICK\"");
        assert_eq!(serde_json::to_string(&Mode::Expert).unwrap(), "\"EXPERT\"");
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("deep".parse::<Mode>().unwrap(), Mode::Deep);
        assert_eq!("Standard".parse::<Mode>().unwrap(), Mode::Standard);
        assert!("turbo".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_candidate_counts() {
        assert_eq!(Mode::Quick.candidate_count(), 1);
        assert_eq!(Mode::Standard.candidate_count(), 3);
        assert_eq!(Mode::Deep.candidate_count(), 5);
        assert!(Mode::Deep.saves_template());
        assert!(!Mode::Standard.saves_template());
    }

    #[test]
    fn run_status_serializes_correctly() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn skill_record_accepts_indexer_fields() {
        let json = r#"{
            "name": "react-deploy",
            "description": "Build and deploy React apps",
            "keywords": ["react", "deploy"],
            "scripts": ["deploy.sh"],
            "references": [],
            "path": "/skills/react-deploy",
            "version": "1.0.0"
        }"#;
        let skill: SkillRecord = serde_json::from_str(json).unwrap();
        assert_eq!(skill.name, "react-deploy");
        assert_eq!(skill.scripts, vec!["deploy.sh"]);
        assert_eq!(skill.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn context_tracks_steps() {
        let mut ctx = ExecutionContext::new("task", Mode::Standard);
        ctx.set_total_steps(2).unwrap();
        ctx.record_step("n0", "out0").unwrap();
        ctx.record_step("n1", "out1").unwrap();
        assert_eq!(ctx.current_step(), 2);
        assert!(ctx.is_finished());
        assert_eq!(ctx.outputs().len(), 2);

        let err = ctx.record_step("n2", "out2").unwrap_err();
        assert!(matches!(err, ContextError::StepOverflow { .. }));
        assert_eq!(ctx.current_step(), 2);
    }

    #[test]
    fn context_rejects_shrinking_total() {
        let mut ctx = ExecutionContext::new("task", Mode::Quick);
        ctx.set_total_steps(1).unwrap();
        ctx.record_step("n0", "done").unwrap();
        assert!(ctx.set_total_steps(0).is_err());
    }

    #[test]
    fn context_round_trips_through_json() {
        let mut ctx = ExecutionContext::new("deploy the app", Mode::Deep);
        ctx.set_total_steps(1).unwrap();
        ctx.record_step("n0", "ok").unwrap();
        ctx.record_error(Some("n0"), "warning");

        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"current_step\":1"));
        assert!(json.contains("\"mode\":\"DEEP\""));
        let back: ExecutionContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn plan_node_reads_legacy_field_names() {
        let json = r#"{"id": "n1", "skill": "lint", "depends": ["n0"], "completed": true, "output": "x"}"#;
        let node: PlanNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.skill_name, "lint");
        assert_eq!(node.depends_on, vec!["n0"]);
        let fresh = node.reset();
        assert!(!fresh.completed);
        assert!(fresh.output.is_none());
        assert_eq!(fresh.depends_on, vec!["n0"]);
    }

    #[test]
    fn template_name_and_truncation() {
        let task = "x".repeat(120);
        let created = Utc::now();
        let tpl = Template::from_plan(&task, &[PlanNode::new("n0", "a")], created, 100, 50);
        assert!(tpl.name.starts_with("auto-"));
        assert_eq!(tpl.description.chars().count(), 100);
        assert_eq!(tpl.trigger_patterns[0].chars().count(), 50);

        let other = Template::from_plan(&task, &[], created, 100, 50);
        assert_ne!(tpl.name, other.name);
    }

    #[test]
    fn template_matches_case_insensitively() {
        let tpl = Template {
            name: "auto-1".to_string(),
            description: String::new(),
            trigger_patterns: vec!["Deploy React".to_string()],
            plan: Vec::new(),
            created_at: Utc::now(),
        };
        assert!(tpl.matches("please DEPLOY react to prod"));
        assert!(!tpl.matches("deploy vue"));
    }

    #[test]
    fn blank_trigger_never_matches() {
        let tpl = Template {
            name: "auto-1".to_string(),
            description: String::new(),
            trigger_patterns: vec!["  ".to_string()],
            plan: Vec::new(),
            created_at: Utc::now(),
        };
        assert!(!tpl.matches("anything"));
    }

    #[test]
    fn trigger_is_trimmed_on_create_and_match() {
        let tpl = Template::from_plan("  deploy react  ", &[], Utc::now(), 100, 50);
        assert_eq!(tpl.trigger_patterns, vec!["deploy react".to_string()]);
        assert!(tpl.matches("deploy react app"));

        let edited = Template {
            trigger_patterns: vec![" Deploy React\n".to_string()],
            ..tpl
        };
        assert!(edited.matches("please deploy react now"));
    }

    #[test]
    fn truncate_chars_respects_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
