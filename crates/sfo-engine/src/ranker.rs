//! Semantic ranking adapter.
//!
//! Sends the task and a bounded window of lexical candidates to an external
//! ranking service and parses its JSON answer. Every failure (missing
//! credentials, transport error, timeout, malformed answer) surfaces to the
//! matcher as "no semantic signal", never as a run error.

use serde::{Deserialize, Serialize};
use sfo_core::config::{Config, MAX_SEMANTIC_LIMIT};
use sfo_core::fusion::SemanticEntry;
use sfo_core::{truncate_chars, SkillRecord};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variables checked for the ranker API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

#[derive(Debug, Error)]
pub enum RankerError {
    #[error("no API key set (GEMINI_API_KEY or GOOGLE_API_KEY)")]
    MissingCredentials,
    #[error("ranker request timed out")]
    Timeout,
    #[error("ranker HTTP error: {0}")]
    Http(String),
    #[error("ranker returned an error: {0}")]
    Response(String),
    #[error("malformed ranker response: {0}")]
    Parse(String),
}

/// External ranking service: prompt text in, raw response text out.
pub trait RankingService {
    fn complete(&self, prompt: &str) -> Result<String, RankerError>;
}

/// Gemini client settings.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
    /// Build from orchestrator config and the API key environment variables.
    pub fn from_env(config: &Config) -> Result<Self, RankerError> {
        let api_key = api_key_from_env().ok_or(RankerError::MissingCredentials)?;
        Ok(Self {
            api_key,
            model: config.semantic_model.clone(),
            endpoint: config.semantic_endpoint.clone(),
            timeout: (config.semantic_timeout_sec > 0)
                .then(|| Duration::from_secs(config.semantic_timeout_sec)),
        })
    }
}

/// First non-empty API key from [`API_KEY_VARS`].
pub fn api_key_from_env() -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
}

/// Blocking Gemini `generateContent` client.
pub struct GeminiService {
    client: reqwest::blocking::Client,
    config: GeminiConfig,
}

impl std::fmt::Debug for GeminiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GeminiService {
    pub fn new(config: GeminiConfig) -> Result<Self, RankerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RankerError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint, self.config.model
        )
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContentResponse,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

fn http_error(e: &reqwest::Error) -> RankerError {
    if e.is_timeout() {
        RankerError::Timeout
    } else {
        RankerError::Http(e.to_string())
    }
}

impl RankingService for GeminiService {
    fn complete(&self, prompt: &str) -> Result<String, RankerError> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig { temperature: 0.0 },
        };

        debug!(model = %self.config.model, "requesting semantic ranking");

        // Key goes in a header so it never shows up in error messages.
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| http_error(&e))?;

        let status = response.status();
        let text = response.text().map_err(|e| http_error(&e))?;
        if !status.is_success() {
            return Err(RankerError::Response(format!("HTTP {status}: {text}")));
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&text).map_err(|e| RankerError::Parse(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(RankerError::Response(error.message));
        }

        parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| RankerError::Response("no content in response".to_string()))
    }
}

/// Builds the ranking prompt, bounds the candidate window, and parses answers.
pub struct SemanticAdapter {
    service: Box<dyn RankingService>,
    limit: usize,
    top: usize,
    description_chars: usize,
}

impl std::fmt::Debug for SemanticAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticAdapter")
            .field("limit", &self.limit)
            .field("top", &self.top)
            .field("description_chars", &self.description_chars)
            .finish_non_exhaustive()
    }
}

impl SemanticAdapter {
    pub fn new(service: Box<dyn RankingService>, config: &Config) -> Self {
        Self {
            service,
            limit: config.semantic_limit.clamp(1, MAX_SEMANTIC_LIMIT),
            top: config.semantic_top.max(1),
            description_chars: config.semantic_description_chars,
        }
    }

    /// Adapter backed by Gemini, if an API key is available.
    pub fn gemini(config: &Config) -> Result<Self, RankerError> {
        let service = GeminiService::new(GeminiConfig::from_env(config)?)?;
        Ok(Self::new(Box::new(service), config))
    }

    /// Maximum number of candidates sent to the service.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Rank candidates, degrading to an empty ranking on any failure.
    pub fn rank(&self, task: &str, candidates: &[&SkillRecord]) -> Vec<SemanticEntry> {
        self.try_rank(task, candidates).unwrap_or_else(|e| {
            warn!(error = %e, "semantic ranking failed, using keyword matching only");
            Vec::new()
        })
    }

    /// Rank candidates, reporting why the signal is missing.
    ///
    /// Candidates beyond the window are dropped before the call, and entries
    /// naming skills outside the window are dropped from the answer.
    pub fn try_rank(
        &self,
        task: &str,
        candidates: &[&SkillRecord],
    ) -> Result<Vec<SemanticEntry>, RankerError> {
        let window = &candidates[..candidates.len().min(self.limit)];
        if window.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = self.build_prompt(task, window);
        let text = self.service.complete(&prompt)?;
        let names: HashSet<&str> = window.iter().map(|s| s.name.as_str()).collect();
        let entries = parse_response(&text, &names)?;

        debug!(
            window = window.len(),
            ranked = entries.len(),
            "semantic ranking received"
        );
        Ok(entries)
    }

    fn build_prompt(&self, task: &str, window: &[&SkillRecord]) -> String {
        let skill_list = window
            .iter()
            .map(|s| {
                format!(
                    "- {}: {}",
                    s.name,
                    truncate_chars(&s.description, self.description_chars)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Given this task: "{task}"

And these available skills:
{skill_list}

Return a JSON array of the top {top} most relevant skills for this task, ranked by relevance.
Format: [{{"name": "skill-name", "score": 0.95, "reason": "why relevant"}}]

Only return valid JSON, no markdown or explanation."#,
            top = self.top
        )
    }
}

/// Remove a surrounding ```` ```json ```` / ```` ``` ```` fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse the ranker answer into entries for skills inside the window.
///
/// Scores are clamped to `[0, 1]`; a name listed twice keeps its last entry.
pub fn parse_response(
    text: &str,
    window: &HashSet<&str>,
) -> Result<Vec<SemanticEntry>, RankerError> {
    let payload = strip_code_fence(text);
    let raw: Vec<SemanticEntry> =
        serde_json::from_str(payload).map_err(|e| RankerError::Parse(e.to_string()))?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut entries: Vec<SemanticEntry> = raw
        .into_iter()
        .rev()
        .filter(|entry| window.contains(entry.name.as_str()))
        .filter(|entry| seen.insert(entry.name.clone()))
        .map(|entry| SemanticEntry {
            score: if entry.score.is_finite() {
                entry.score.clamp(0.0, 1.0)
            } else {
                0.0
            },
            ..entry
        })
        .collect();
    entries.reverse();
    Ok(entries)
}
