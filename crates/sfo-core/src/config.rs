//! Configuration parsing for the orchestrator.
//!
//! Plain `key=value` lines, `#` comments, optional quotes.
//! Precedence: CLI flags > `--config` file > `<storage_root>/config` > defaults.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest candidate window the semantic ranker accepts.
pub const MAX_SEMANTIC_LIMIT: usize = 20;

/// Name of the config file inside the storage root.
pub const CONFIG_FILE_NAME: &str = "config";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid config line: {0}")]
    InvalidLine(String),
    #[error("invalid boolean value for {key}: {value}")]
    InvalidBool { key: String, value: String },
    #[error("invalid integer value for {key}: {value}")]
    InvalidInt { key: String, value: String },
    #[error("{key} must be between 1 and {max}, got {value}")]
    OutOfRange {
        key: String,
        value: usize,
        max: usize,
    },
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Skill index document. Relative paths resolve against the storage root.
    pub catalog_path: PathBuf,

    // Semantic ranker
    /// Request the semantic signal unless the caller opts out.
    pub ai_enabled: bool,
    pub semantic_model: String,
    pub semantic_endpoint: String,
    /// Request timeout; 0 disables it.
    pub semantic_timeout_sec: u64,
    /// Number of lexical candidates sent to the ranker (max 20).
    pub semantic_limit: usize,
    /// Number of ranked entries the prompt asks for.
    pub semantic_top: usize,
    /// Description characters sent per candidate.
    pub semantic_description_chars: usize,

    // Output and artifacts
    /// Default number of results printed by `match`.
    pub match_top: usize,
    pub template_description_chars: usize,
    pub template_trigger_chars: usize,
    pub log_task_chars: usize,

    /// Hold `run.lock` in the storage root while a run is active.
    pub run_lock: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("skill_index.json"),
            ai_enabled: true,
            semantic_model: "gemini-2.0-flash".to_string(),
            semantic_endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            semantic_timeout_sec: 30,
            semantic_limit: MAX_SEMANTIC_LIMIT,
            semantic_top: 5,
            semantic_description_chars: 200,
            match_top: 5,
            template_description_chars: 100,
            template_trigger_chars: 50,
            log_task_chars: 50,
            run_lock: true,
        }
    }
}

impl Config {
    /// Load config from a file, merging with defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.load_file(path)?;
        Ok(config)
    }

    /// Load defaults, then `<storage_root>/config` if present, then `override_path`.
    pub fn load(storage_root: &Path, override_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let root_config = storage_root.join(CONFIG_FILE_NAME);
        if root_config.is_file() {
            config.load_file(&root_config)?;
        }
        if let Some(path) = override_path {
            config.load_file(path)?;
        }
        config.resolve_paths(storage_root);
        Ok(config)
    }

    /// Load and merge values from a config file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        self.parse_content(&content)
    }

    /// Parse config content (key=value format).
    fn parse_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine(line.to_string()));
            };

            let key = key.trim();
            let value = Self::unquote(value.trim());

            self.apply_value(key, &value)?;
        }
        Ok(())
    }

    /// Remove surrounding quotes from a value.
    fn unquote(value: &str) -> String {
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            return value[1..value.len() - 1].to_string();
        }
        value.to_string()
    }

    /// Apply a single config value.
    fn apply_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "catalog_path" => self.catalog_path = PathBuf::from(value),
            "ai_enabled" => self.ai_enabled = Self::parse_bool(key, value)?,
            "semantic_model" => self.semantic_model = value.to_string(),
            "semantic_endpoint" => {
                self.semantic_endpoint = value.trim_end_matches('/').to_string();
            }
            "semantic_timeout_sec" => self.semantic_timeout_sec = Self::parse_int(key, value)?,
            "semantic_limit" => {
                let limit = Self::parse_int(key, value)?;
                if limit == 0 || limit > MAX_SEMANTIC_LIMIT {
                    return Err(ConfigError::OutOfRange {
                        key: key.to_string(),
                        value: limit,
                        max: MAX_SEMANTIC_LIMIT,
                    });
                }
                self.semantic_limit = limit;
            }
            "semantic_top" => self.semantic_top = Self::parse_int(key, value)?,
            "semantic_description_chars" => {
                self.semantic_description_chars = Self::parse_int(key, value)?;
            }
            "match_top" => self.match_top = Self::parse_int(key, value)?,
            "template_description_chars" => {
                self.template_description_chars = Self::parse_int(key, value)?;
            }
            "template_trigger_chars" => {
                self.template_trigger_chars = Self::parse_int(key, value)?;
            }
            "log_task_chars" => self.log_task_chars = Self::parse_int(key, value)?,
            "run_lock" => self.run_lock = Self::parse_bool(key, value)?,
            _ => {
                // Warn but don't fail for unknown keys.
                eprintln!("Warning: unknown config key: {key}");
            }
        }
        Ok(())
    }

    /// Parse a boolean value.
    fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "on" => Ok(true),
            "false" | "0" | "no" | "n" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
        value.parse().map_err(|_| ConfigError::InvalidInt {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Resolve relative paths against the storage root.
    pub fn resolve_paths(&mut self, storage_root: &Path) {
        if self.catalog_path.is_relative() {
            self.catalog_path = storage_root.join(&self.catalog_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert!(config.ai_enabled);
        assert_eq!(config.semantic_model, "gemini-2.0-flash");
        assert_eq!(config.semantic_limit, 20);
        assert_eq!(config.semantic_top, 5);
        assert_eq!(config.semantic_description_chars, 200);
        assert_eq!(config.template_description_chars, 100);
        assert_eq!(config.template_trigger_chars, 50);
        assert!(config.run_lock);
    }

    #[test]
    fn parse_simple_config() {
        let mut config = Config::default();
        let content = r#"
# ranker
semantic_model="gemini-2.5-flash"
semantic_timeout_sec=5
ai_enabled=no
match_top=10
"#;
        config.parse_content(content).unwrap();
        assert_eq!(config.semantic_model, "gemini-2.5-flash");
        assert_eq!(config.semantic_timeout_sec, 5);
        assert!(!config.ai_enabled);
        assert_eq!(config.match_top, 10);
    }

    #[test]
    fn unquote_removes_quotes() {
        assert_eq!(Config::unquote("\"hello\""), "hello");
        assert_eq!(Config::unquote("'world'"), "world");
        assert_eq!(Config::unquote("noquotes"), "noquotes");
    }

    #[test]
    fn parse_bool_accepts_variants() {
        assert!(Config::parse_bool("test", "true").unwrap());
        assert!(Config::parse_bool("test", "1").unwrap());
        assert!(Config::parse_bool("test", "on").unwrap());
        assert!(!Config::parse_bool("test", "false").unwrap());
        assert!(!Config::parse_bool("test", "off").unwrap());
        assert!(Config::parse_bool("test", "maybe").is_err());
    }

    #[test]
    fn semantic_limit_is_bounded() {
        let mut config = Config::default();
        assert!(matches!(
            config.parse_content("semantic_limit=50"),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(config.parse_content("semantic_limit=0").is_err());
        config.parse_content("semantic_limit=8").unwrap();
        assert_eq!(config.semantic_limit, 8);
    }

    #[test]
    fn invalid_line_is_rejected() {
        let mut config = Config::default();
        assert!(matches!(
            config.parse_content("no equals sign"),
            Err(ConfigError::InvalidLine(_))
        ));
        assert!(matches!(
            config.parse_content("match_top=many"),
            Err(ConfigError::InvalidInt { .. })
        ));
    }

    #[test]
    fn load_applies_root_then_override() {
        let root = TempDir::new().unwrap();
        std::fs::write(
            root.path().join(CONFIG_FILE_NAME),
            "match_top=7\nsemantic_top=3\n",
        )
        .unwrap();
        let override_path = root.path().join("override.conf");
        std::fs::write(&override_path, "match_top=9\ncatalog_path=/srv/index.json\n").unwrap();

        let config = Config::load(root.path(), Some(&override_path)).unwrap();
        assert_eq!(config.match_top, 9);
        assert_eq!(config.semantic_top, 3);
        assert_eq!(config.catalog_path, PathBuf::from("/srv/index.json"));
    }

    #[test]
    fn load_resolves_catalog_against_root() {
        let root = TempDir::new().unwrap();
        let config = Config::load(root.path(), None).unwrap();
        assert_eq!(config.catalog_path, root.path().join("skill_index.json"));
    }
}
