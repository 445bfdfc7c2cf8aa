//! Output rendering for sfoctl.

use serde::Serialize;
use sfo_core::{ExecutionContext, PlanNode, RunStatus, ScoredSkill, Template};
use sfo_engine::{RunReport, SemanticStatus};

const DEFAULT_REASON: &str = "Keyword match";

/// One `match --json` entry.
#[derive(Debug, Serialize)]
pub struct MatchEntry<'a> {
    pub name: &'a str,
    pub score: f64,
    pub reason: &'a str,
    pub keywords: &'a [String],
}

pub fn match_entries(ranked: &[ScoredSkill]) -> Vec<MatchEntry<'_>> {
    ranked
        .iter()
        .map(|s| MatchEntry {
            name: s.name(),
            score: s.final_score(),
            reason: reason(s),
            keywords: &s.skill.keywords,
        })
        .collect()
}

fn reason(skill: &ScoredSkill) -> &str {
    skill
        .rationale()
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REASON)
}

/// Print ranked matches as a numbered list.
pub fn print_matches(task: &str, ranked: &[ScoredSkill], semantic: &SemanticStatus) {
    println!("Task: {task}");
    if let SemanticStatus::Degraded { reason } = semantic {
        println!("(semantic ranking unavailable: {reason})");
    }
    println!();

    if ranked.is_empty() {
        println!("No matching skills found.");
        return;
    }

    for (i, skill) in ranked.iter().enumerate() {
        println!("{}. {} (score: {:.2})", i + 1, skill.name(), skill.final_score());
        println!("   {}", reason(skill));
    }
}

/// Print the outcome of a run.
pub fn print_run_report(report: &RunReport) {
    let context = &report.context;
    println!("Run:  {}", context.id);
    println!("Task: {}", context.task);
    println!("Mode: {}", context.mode);
    println!();

    if let Some(name) = &report.template_used {
        println!("Using template: {name}");
    } else if !report.selected.is_empty() {
        println!("Selected skills:");
        for skill in &report.selected {
            println!("  - {} (score: {:.2})", skill.name(), skill.final_score());
        }
    }

    if !report.plan.is_empty() {
        println!();
        println!("Plan:");
        print_plan(&report.plan);
    }

    println!();
    match report.status {
        RunStatus::Completed => {
            println!(
                "Completed {}/{} steps.",
                context.current_step(),
                context.total_steps()
            );
        }
        status => {
            println!("Status: {}", status.as_str());
            if let Some(failure) = &report.failure {
                println!("Reason: {failure}");
            }
        }
    }
    if let Some(name) = &report.template_saved {
        println!("Saved template: {name}");
    }
}

fn print_plan(plan: &[PlanNode]) {
    for node in plan {
        let marker = if node.completed { "x" } else { " " };
        let deps = if node.depends_on.is_empty() {
            String::new()
        } else {
            format!(" (after {})", node.depends_on.join(", "))
        };
        println!("  [{marker}] {}: {}{deps}", node.id, node.skill_name);
    }
}

/// Print the persisted execution context.
pub fn print_context(context: &ExecutionContext) {
    println!("Run: {}", context.id);
    println!();
    println!("  Task:     {}", context.task);
    println!("  Mode:     {}", context.mode);
    println!("  Started:  {}", format_time(&context.started_at));
    println!(
        "  Progress: {}/{}",
        context.current_step(),
        context.total_steps()
    );

    if !context.outputs().is_empty() {
        println!();
        println!("  Outputs:");
        for (node_id, output) in context.outputs() {
            println!("    {node_id}: {output}");
        }
    }

    if !context.errors().is_empty() {
        println!();
        println!("  Errors:");
        for error in context.errors() {
            let step = error.step.as_deref().unwrap_or("-");
            println!(
                "    {}  {:<4}  {}",
                format_time(&error.at),
                step,
                error.message
            );
        }
    }
}

/// Print stored templates in lookup order.
pub fn print_templates(templates: &[Template]) {
    if templates.is_empty() {
        println!("No templates found.");
        return;
    }

    println!("{:<36}  {:<6}  {:<20}  TRIGGER", "NAME", "STEPS", "CREATED");
    println!("{}", "-".repeat(90));

    for template in templates {
        println!(
            "{:<36}  {:<6}  {:<20}  {}",
            template.name,
            template.plan.len(),
            format_time(&template.created_at),
            template.trigger_patterns.join(" | "),
        );
    }

    println!();
    println!("{} template(s)", templates.len());
}

fn format_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
