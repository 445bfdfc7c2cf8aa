//! Run orchestration.
//!
//! One [`Orchestrator::run`] call drives a single run through
//! `CREATED -> RUNNING -> COMPLETED | FAILED`:
//!
//! 1. Take the run lock and persist a fresh context.
//! 2. EXPERT only: replay the first saved template whose trigger matches.
//! 3. Otherwise match, compose a chain of `mode.candidate_count()` skills,
//!    and execute it step by step, persisting the context after each step.
//! 4. DEEP and EXPERT save the executed plan as a template on success. A
//!    failed save is logged and the run still completes.
//!
//! Every lifecycle event is appended to the daily run log.

use crate::executor::{PlaceholderExecutor, SkillExecutor};
use crate::matcher::{SemanticStatus, SkillMatcher};
use crate::metrics::EngineMetrics;
use crate::storage::{Storage, StorageError};
use chrono::Utc;
use serde::Serialize;
use sfo_core::events::RunEvent;
use sfo_core::{
    plan, Config, ContextError, ExecutionContext, Mode, PlanNode, RunStatus, ScoredSkill, Template,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("context error: {0}")]
    Context(#[from] ContextError),
    #[error("invalid state transition: {0} -> {1}")]
    InvalidTransition(String, String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Per-run knobs taken from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub use_semantic: bool,
    pub run_lock: bool,
    pub log_task_chars: usize,
    pub template_description_chars: usize,
    pub template_trigger_chars: usize,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            use_semantic: config.ai_enabled,
            run_lock: config.run_lock,
            log_task_chars: config.log_task_chars,
            template_description_chars: config.template_description_chars,
            template_trigger_chars: config.template_trigger_chars,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub context: ExecutionContext,
    /// Plan as executed, with completion flags and outputs.
    pub plan: Vec<PlanNode>,
    /// Candidates the plan was composed from. Empty for template replays.
    pub selected: Vec<ScoredSkill>,
    /// `None` when matching was skipped.
    pub semantic: Option<SemanticStatus>,
    pub template_used: Option<String>,
    pub template_saved: Option<String>,
    pub failure: Option<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// In-flight run state.
struct Run {
    mode: Mode,
    status: RunStatus,
    context: ExecutionContext,
}

impl Run {
    fn new(task: &str, mode: Mode) -> Self {
        Self {
            mode,
            status: RunStatus::Created,
            context: ExecutionContext::new(task, mode),
        }
    }

    fn transition(&mut self, next: RunStatus) -> Result<()> {
        let allowed = matches!(
            (self.status, next),
            (RunStatus::Created, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Completed | RunStatus::Failed)
        );
        if !allowed {
            return Err(OrchestratorError::InvalidTransition(
                self.status.as_str().to_string(),
                next.as_str().to_string(),
            ));
        }
        self.status = next;
        Ok(())
    }
}

/// Outcome of executing a plan.
enum Execution {
    Completed,
    Failed { node_id: String, error: String },
}

/// Drives runs against one storage root and one catalog.
#[derive(Debug)]
pub struct Orchestrator<E = PlaceholderExecutor> {
    storage: Storage,
    matcher: SkillMatcher,
    executor: E,
    settings: RunSettings,
}

impl Orchestrator<PlaceholderExecutor> {
    pub fn new(storage: Storage, matcher: SkillMatcher, settings: RunSettings) -> Self {
        Self {
            storage,
            matcher,
            executor: PlaceholderExecutor,
            settings,
        }
    }
}

impl<E: SkillExecutor> Orchestrator<E> {
    pub fn with_executor<X: SkillExecutor>(self, executor: X) -> Orchestrator<X> {
        Orchestrator {
            storage: self.storage,
            matcher: self.matcher,
            executor,
            settings: self.settings,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn matcher(&self) -> &SkillMatcher {
        &self.matcher
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        self.matcher.metrics()
    }

    /// Run `task` in `mode` to a terminal state.
    ///
    /// Returns `Err` only for setup and persistence failures. A task with no
    /// matching skills, or a failing step, yields a `FAILED` report.
    pub fn run(&self, task: &str, mode: Mode) -> Result<RunReport> {
        let _lock = if self.settings.run_lock {
            Some(self.storage.acquire_lock()?)
        } else {
            None
        };

        let mut run = Run::new(task, mode);
        self.storage.save_context(&run.context)?;
        info!(run_id = %run.context.id, mode = mode.as_str(), "starting run");

        run.transition(RunStatus::Running)?;
        self.emit(
            &run,
            &RunEvent::RunStarted {
                task: task.to_string(),
                max_task_chars: self.settings.log_task_chars,
            },
        )?;

        if mode == Mode::Expert {
            if let Some(template) = self.lookup_template(task) {
                return self.replay_template(run, template);
            }
            debug!("no template matched, composing a new plan");
        }

        self.compose_and_execute(run, task)
    }

    fn lookup_template(&self, task: &str) -> Option<Template> {
        match self.storage.find_template(task) {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "template lookup failed, composing a new plan");
                None
            }
        }
    }

    fn replay_template(&self, mut run: Run, template: Template) -> Result<RunReport> {
        self.metrics().inc_template_hits();
        self.emit(
            &run,
            &RunEvent::TemplateFound {
                name: template.name.clone(),
            },
        )?;

        let mut nodes: Vec<PlanNode> = template.plan.iter().map(PlanNode::reset).collect();
        run.context.set_total_steps(nodes.len())?;
        self.storage.save_context(&run.context)?;

        let execution = self.execute(&mut run, &mut nodes)?;
        if matches!(execution, Execution::Completed) {
            self.emit(
                &run,
                &RunEvent::TemplateExecuted {
                    name: template.name.clone(),
                },
            )?;
        }

        let mut report = self.finish(run, nodes, execution, None)?;
        report.template_used = Some(template.name);
        Ok(report)
    }

    fn compose_and_execute(&self, mut run: Run, task: &str) -> Result<RunReport> {
        let outcome = self.matcher.match_task(task, self.settings.use_semantic);
        if let SemanticStatus::Degraded { reason } = &outcome.semantic {
            self.emit(
                &run,
                &RunEvent::SemanticDegraded {
                    reason: reason.clone(),
                },
            )?;
        }

        if outcome.is_empty() {
            return self.finish_no_match(run, outcome.semantic);
        }

        let count = run.mode.candidate_count();
        let mut nodes = plan::compose(&outcome.ranked, count);
        let selected: Vec<ScoredSkill> = outcome.ranked.into_iter().take(count).collect();

        run.context.set_total_steps(nodes.len())?;
        self.storage.save_context(&run.context)?;
        self.emit(
            &run,
            &RunEvent::PlanComposed {
                skills: nodes.iter().map(|n| n.skill_name.clone()).collect(),
            },
        )?;

        let execution = self.execute(&mut run, &mut nodes)?;

        let template_saved = match execution {
            Execution::Completed if run.mode.saves_template() => {
                self.save_template(&run, &nodes)?
            }
            _ => None,
        };

        let mut report = self.finish(run, nodes, execution, template_saved)?;
        report.selected = selected;
        report.semantic = Some(outcome.semantic);
        Ok(report)
    }

    /// Execute nodes in order. Stops at the first failing step.
    fn execute(&self, run: &mut Run, nodes: &mut [PlanNode]) -> Result<Execution> {
        for node in nodes.iter_mut() {
            self.emit(
                run,
                &RunEvent::StepStarted {
                    node_id: node.id.clone(),
                    skill: node.skill_name.clone(),
                },
            )?;

            match self.executor.execute(node, &run.context) {
                Ok(output) => {
                    node.completed = true;
                    node.output = Some(output.clone());
                    run.context.record_step(&node.id, output)?;
                    self.storage.save_context(&run.context)?;
                    self.metrics().inc_steps_executed();
                    debug!(node_id = %node.id, skill = %node.skill_name, "step completed");
                }
                Err(e) => {
                    let error = e.to_string();
                    warn!(node_id = %node.id, skill = %node.skill_name, error = %error, "step failed");
                    run.context.record_error(Some(&node.id), error.clone());
                    self.storage.save_context(&run.context)?;
                    self.emit(
                        run,
                        &RunEvent::StepFailed {
                            node_id: node.id.clone(),
                            error: error.clone(),
                        },
                    )?;
                    return Ok(Execution::Failed {
                        node_id: node.id.clone(),
                        error,
                    });
                }
            }
        }
        Ok(Execution::Completed)
    }

    /// Save the completed plan as a template. A failed write is logged and
    /// does not fail the run.
    fn save_template(&self, run: &Run, nodes: &[PlanNode]) -> Result<Option<String>> {
        let template = Template::from_plan(
            &run.context.task,
            nodes,
            Utc::now(),
            self.settings.template_description_chars,
            self.settings.template_trigger_chars,
        );
        if let Err(e) = self.storage.save_template(&template) {
            warn!(template = %template.name, error = %e, "failed to save template");
            self.emit(
                run,
                &RunEvent::TemplateSaveFailed {
                    reason: e.to_string(),
                },
            )?;
            return Ok(None);
        }
        self.metrics().inc_templates_saved();
        self.emit(
            run,
            &RunEvent::TemplateSaved {
                name: template.name.clone(),
            },
        )?;
        Ok(Some(template.name))
    }

    fn finish(
        &self,
        mut run: Run,
        nodes: Vec<PlanNode>,
        execution: Execution,
        template_saved: Option<String>,
    ) -> Result<RunReport> {
        let failure = match execution {
            Execution::Completed => {
                debug_assert!(run.context.is_finished());
                run.transition(RunStatus::Completed)?;
                self.emit(
                    &run,
                    &RunEvent::RunCompleted {
                        steps: run.context.current_step(),
                    },
                )?;
                None
            }
            Execution::Failed { node_id, error } => {
                let reason = format!("step {node_id} failed: {error}");
                run.transition(RunStatus::Failed)?;
                self.emit(
                    &run,
                    &RunEvent::RunFailed {
                        reason: reason.clone(),
                    },
                )?;
                Some(reason)
            }
        };

        debug!(
            run_id = %run.context.id,
            status = run.status.as_str(),
            steps = run.context.current_step(),
            "run finished"
        );

        Ok(RunReport {
            status: run.status,
            context: run.context,
            plan: nodes,
            selected: Vec::new(),
            semantic: None,
            template_used: None,
            template_saved,
            failure,
        })
    }

    fn finish_no_match(&self, mut run: Run, semantic: SemanticStatus) -> Result<RunReport> {
        let reason = "no matching skills found".to_string();
        run.context.record_error(None, reason.clone());
        self.storage.save_context(&run.context)?;
        self.emit(&run, &RunEvent::NoMatch)?;

        run.transition(RunStatus::Failed)?;
        self.emit(
            &run,
            &RunEvent::RunFailed {
                reason: reason.clone(),
            },
        )?;
        debug!(run_id = %run.context.id, "run finished without a plan");

        Ok(RunReport {
            status: run.status,
            context: run.context,
            plan: Vec::new(),
            selected: Vec::new(),
            semantic: Some(semantic),
            template_used: None,
            template_saved: None,
            failure: Some(reason),
        })
    }

    fn emit(&self, run: &Run, event: &RunEvent) -> Result<()> {
        let message = event.message();
        let event_type = event.event_type().as_str();
        if event.terminal_status().is_some() {
            info!(run_id = %run.context.id, event = event_type, "{message}");
        } else {
            debug!(run_id = %run.context.id, event = event_type, "{message}");
        }
        self.storage.append_log(run.mode, &message)?;
        Ok(())
    }
}
