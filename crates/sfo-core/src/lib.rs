pub mod catalog;
pub mod config;
pub mod events;
pub mod fusion;
pub mod journal;
pub mod plan;
pub mod score;
pub mod types;

pub use catalog::SkillCatalog;
pub use config::Config;
pub use types::*;
