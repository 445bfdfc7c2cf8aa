//! sfoctl - skill flow orchestrator CLI
//!
//! Matches tasks to catalog skills and runs skill chains against a local
//! storage root.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod render;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use sfo_core::catalog::CatalogSource;
use sfo_core::{Config, Id, Mode, SkillCatalog};
use sfo_engine::{EngineMetrics, Orchestrator, RunSettings, SemanticAdapter, SkillMatcher, Storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Skill flow orchestrator.
#[derive(Parser)]
#[command(name = "sfoctl")]
#[command(about = "Match tasks to skills and run skill chains")]
#[command(version)]
struct Cli {
    /// Storage root for context, logs, and templates
    #[arg(long, global = true, env = "SFO_ROOT", default_value = ".sfo")]
    root: PathBuf,

    /// Config file path (overrides <root>/config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skill index document (overrides catalog_path)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank catalog skills for a task
    Match {
        /// Task description
        task: String,

        /// Keyword matching only
        #[arg(long)]
        no_ai: bool,

        /// Number of results to show (default: match_top)
        #[arg(long)]
        top: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compose and execute a skill chain for a task
    Run {
        /// Task description
        task: String,

        /// QUICK, STANDARD, DEEP, or EXPERT
        #[arg(long, default_value_t = Mode::Standard)]
        mode: Mode,

        /// Keyword matching only
        #[arg(long)]
        no_ai: bool,
    },

    /// Show the persisted execution context
    Context {
        /// Only show the context if it belongs to this run
        #[arg(long)]
        id: Option<String>,
    },

    /// List saved templates
    Templates,
}

fn main() {
    let cli = Cli::parse();

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = dispatch(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> eyre::Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Match {
            task,
            no_ai,
            top,
            json,
        } => run_match(&config, &task, !no_ai && config.ai_enabled, top, json),
        Command::Run { task, mode, no_ai } => {
            run_orchestrate(&cli.root, &config, &task, mode, !no_ai && config.ai_enabled)
        }
        Command::Context { id } => show_context(&cli.root, id),
        Command::Templates => list_templates(&cli.root),
    }
}

fn load_config(cli: &Cli) -> eyre::Result<Config> {
    let mut config =
        Config::load(&cli.root, cli.config.as_deref()).wrap_err("failed to load config")?;
    if let Some(catalog) = &cli.catalog {
        config.catalog_path.clone_from(catalog);
    }
    debug!(catalog = %config.catalog_path.display(), "loaded config");
    Ok(config)
}

fn build_matcher(config: &Config, use_semantic: bool) -> eyre::Result<SkillMatcher> {
    let catalog = SkillCatalog::load(&config.catalog_path).wrap_err("failed to load skill catalog")?;
    if catalog.source() == CatalogSource::Missing {
        warn!(
            path = %config.catalog_path.display(),
            "skill index not found, catalog is empty"
        );
    }
    if !catalog.duplicates().is_empty() {
        warn!(
            names = ?catalog.duplicates(),
            "duplicate skill names in index, keeping first"
        );
    }

    let mut matcher = SkillMatcher::new(Arc::new(catalog), Arc::new(EngineMetrics::new()));
    if use_semantic {
        match SemanticAdapter::gemini(config) {
            Ok(adapter) => matcher = matcher.with_adapter(adapter),
            Err(e) => warn!(error = %e, "semantic ranker unavailable"),
        }
    }
    debug!(
        skills = matcher.catalog().len(),
        semantic = matcher.has_adapter(),
        "matcher ready"
    );
    Ok(matcher)
}

fn run_match(
    config: &Config,
    task: &str,
    use_semantic: bool,
    top: Option<usize>,
    json: bool,
) -> eyre::Result<()> {
    let matcher = build_matcher(config, use_semantic)?;
    let outcome = matcher.match_task(task, use_semantic);
    let shown = &outcome.ranked[..outcome.ranked.len().min(top.unwrap_or(config.match_top))];

    if json {
        let out = serde_json::to_string_pretty(&render::match_entries(shown))
            .wrap_err("failed to encode matches")?;
        println!("{out}");
    } else {
        render::print_matches(task, shown, &outcome.semantic);
    }
    Ok(())
}

fn run_orchestrate(
    root: &Path,
    config: &Config,
    task: &str,
    mode: Mode,
    use_semantic: bool,
) -> eyre::Result<()> {
    let matcher = build_matcher(config, use_semantic)?;
    let storage = Storage::open(root).wrap_err("failed to open storage")?;
    let settings = RunSettings {
        use_semantic,
        ..RunSettings::from_config(config)
    };

    let orchestrator = Orchestrator::new(storage, matcher, settings);
    let report = orchestrator.run(task, mode).wrap_err("run aborted")?;
    render::print_run_report(&report);

    let metrics = orchestrator.metrics();
    debug!(
        scored = metrics.get_scored(),
        semantic_requests = metrics.get_semantic_requests(),
        semantic_fallbacks = metrics.get_semantic_fallbacks(),
        steps = metrics.get_steps_executed(),
        templates_saved = metrics.get_templates_saved(),
        template_hits = metrics.get_template_hits(),
        "run metrics"
    );
    Ok(())
}

fn show_context(root: &Path, id: Option<String>) -> eyre::Result<()> {
    let storage = Storage::open(root).wrap_err("failed to open storage")?;
    let context = match id {
        Some(id) => storage.load_context_by_id(&Id::from_string(id)),
        None => storage.load_context(),
    }
    .wrap_err("failed to read context")?;

    match context {
        Some(context) => render::print_context(&context),
        None => println!("No context found."),
    }
    Ok(())
}

fn list_templates(root: &Path) -> eyre::Result<()> {
    let storage = Storage::open(root).wrap_err("failed to open storage")?;
    let templates = storage
        .list_templates()
        .wrap_err("failed to read templates")?;
    render::print_templates(&templates);
    Ok(())
}
