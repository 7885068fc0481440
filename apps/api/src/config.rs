//! Configuration — environment bootstrap plus the engine config document.
//!
//! Two layers: `Config::from_env` picks up the server port and the path of
//! the engine document; `ConfigDoc::load` parses and validates that document
//! (flow tuning knobs, LLM routes, agent registry). Either failing is fatal
//! at startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Process-level configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub engine_config_path: PathBuf,
    pub seed_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            engine_config_path: require_env("PARLEY_CONFIG")?.into(),
            seed_path: std::env::var("PARLEY_SEED").ok().map(PathBuf::from),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

// ────────────────────────────────────────────────────────────────────────────
// Engine config document
// ────────────────────────────────────────────────────────────────────────────

/// Flow tuning parameters governing stage transitions and session hygiene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSettings {
    pub warmup_limit: u32,
    pub follow_up_limit: u32,
    pub low_score_streak_limit: u32,
    pub low_score_threshold: f64,
    pub coverage_min_questions: u32,
    pub evaluator_window_messages: usize,
    pub turn_deadline_ms: u64,
    pub session_timeout_minutes: f64,
    pub checkpoint_interval_minutes: f64,
    #[serde(default = "default_complete_grace")]
    pub complete_grace_minutes: f64,
}

fn default_complete_grace() -> f64 {
    30.0
}

impl Default for FlowSettings {
    fn default() -> Self {
        FlowSettings {
            warmup_limit: 1,
            follow_up_limit: 4,
            low_score_streak_limit: 2,
            low_score_threshold: 2.0,
            coverage_min_questions: 2,
            evaluator_window_messages: 8,
            turn_deadline_ms: 120_000,
            session_timeout_minutes: 45.0,
            checkpoint_interval_minutes: 3.0,
            complete_grace_minutes: 30.0,
        }
    }
}

impl FlowSettings {
    fn validate(&self) -> Result<()> {
        if self.warmup_limit < 1 {
            bail!("flow.warmup_limit must be >= 1");
        }
        if self.follow_up_limit < 1 {
            bail!("flow.follow_up_limit must be >= 1");
        }
        if self.low_score_streak_limit < 1 {
            bail!("flow.low_score_streak_limit must be >= 1");
        }
        if !(1.0..=5.0).contains(&self.low_score_threshold) {
            bail!("flow.low_score_threshold must be within 1..=5");
        }
        if self.evaluator_window_messages < 4 {
            bail!("flow.evaluator_window_messages must be >= 4");
        }
        if self.turn_deadline_ms == 0 {
            bail!("flow.turn_deadline_ms must be > 0");
        }
        Ok(())
    }
}

/// Response format requested from the provider for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
    Text,
}

/// One LLM endpoint configuration. `name` is filled from the routes map key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRoute {
    #[serde(default)]
    pub name: String,
    pub base_url: String,
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_response_format")]
    pub response_format: ResponseFormat,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
}

fn default_max_retries() -> u32 {
    2
}

fn default_response_format() -> ResponseFormat {
    ResponseFormat::JsonObject
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    /// Name of the environment variable carrying the provider credential.
    /// The value itself never appears in config or logs.
    pub api_key_env: String,
}

/// The engine configuration document, one structured file validated on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDoc {
    pub flow: FlowSettings,
    pub llm: LlmSection,
    pub routes: BTreeMap<String, LlmRoute>,
    pub registry: BTreeMap<String, String>,
}

impl ConfigDoc {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read engine config at {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut doc: ConfigDoc =
            serde_json::from_str(raw).context("Engine config is not valid JSON")?;
        for (key, route) in doc.routes.iter_mut() {
            route.name = key.clone();
        }
        doc.flow.validate()?;
        if doc.llm.api_key_env.trim().is_empty() {
            bail!("llm.api_key_env must name an environment variable");
        }
        Ok(doc)
    }

    /// Resolves the agent registry into concrete routes. Fails when any
    /// required agent key is unmapped or points at a missing route.
    pub fn resolve_registry(&self, required: &[&str]) -> Result<RouteRegistry> {
        let mut resolved = BTreeMap::new();
        for key in required {
            let route_id = self
                .registry
                .get(*key)
                .with_context(|| format!("registry is missing agent key '{key}'"))?;
            let route = self
                .routes
                .get(route_id)
                .with_context(|| format!("route '{route_id}' (for '{key}') is not defined"))?;
            resolved.insert((*key).to_string(), route.clone());
        }
        Ok(RouteRegistry { routes: resolved })
    }
}

/// Read-only mapping from agent key to its LLM route, built once at startup.
#[derive(Debug, Clone)]
pub struct RouteRegistry {
    routes: BTreeMap<String, LlmRoute>,
}

impl RouteRegistry {
    pub fn route_for(&self, key: &str) -> &LlmRoute {
        self.routes
            .get(key)
            .unwrap_or_else(|| panic!("agent key '{key}' was not resolved at startup"))
    }
}

#[cfg(test)]
pub(crate) fn test_registry() -> RouteRegistry {
    RouteRegistry {
        routes: crate::agents::AGENT_KEYS
            .iter()
            .map(|key| ((*key).to_string(), test_route(key)))
            .collect(),
    }
}

#[cfg(test)]
pub(crate) fn test_route(name: &str) -> LlmRoute {
    LlmRoute {
        name: name.to_string(),
        base_url: "http://localhost:9999".to_string(),
        endpoint: "/v1/chat/completions".to_string(),
        model: "test-model".to_string(),
        timeout_ms: 5_000,
        max_retries: 1,
        response_format: ResponseFormat::JsonObject,
        temperature: None,
        top_p: None,
    }
}
