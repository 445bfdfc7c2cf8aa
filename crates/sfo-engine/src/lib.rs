//! Matching and orchestration engine.
//!
//! Wires the pure scoring and planning code in `sfo-core` to file storage,
//! the semantic ranking service, and skill executors.

pub mod executor;
pub mod matcher;
pub mod metrics;
pub mod orchestrator;
pub mod ranker;
pub mod storage;

pub use executor::{ExecutorError, PlaceholderExecutor, SkillExecutor};
pub use matcher::{MatchOutcome, SemanticStatus, SkillMatcher};
pub use metrics::EngineMetrics;
pub use orchestrator::{Orchestrator, OrchestratorError, RunReport, RunSettings};
pub use ranker::{RankerError, RankingService, SemanticAdapter};
pub use storage::{RunLock, Storage, StorageError};
