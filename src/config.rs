//! Configuration for agent society runs
//!
//! Defaults, overridable from environment variables or a TOML file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AgoraError, Result};

/// Run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgoraConfig {
    /// Model used by the OpenAI executor
    pub model: String,

    /// Sampling temperature; provider default when unset
    pub temperature: Option<f32>,

    /// Completion token cap; provider default when unset
    pub max_tokens: Option<u32>,

    /// Peer review evaluations allowed in flight at once
    pub review_concurrency: usize,

    /// Where the CLI writes the exported trace
    pub trace_file: PathBuf,

    /// Number of agents in a leader election
    pub agent_count: usize,
}

impl Default for AgoraConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: None,
            max_tokens: None,
            review_concurrency: 4,
            trace_file: PathBuf::from("leader_election_trace.json"),
            agent_count: 3,
        }
    }
}

/// Configuration builder
pub struct ConfigBuilder {
    config: AgoraConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AgoraConfig::default(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = Some(tokens);
        self
    }

    pub fn review_concurrency(mut self, limit: usize) -> Self {
        self.config.review_concurrency = limit;
        self
    }

    pub fn trace_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.trace_file = path.into();
        self
    }

    pub fn agent_count(mut self, n: usize) -> Self {
        self.config.agent_count = n;
        self
    }

    pub fn build(self) -> AgoraConfig {
        self.config
    }
}

/// Load configuration from environment variables
pub fn from_env() -> AgoraConfig {
    apply_env(AgoraConfig::default())
}

/// Overlay environment variables on `config`.
pub fn apply_env(mut config: AgoraConfig) -> AgoraConfig {
    if let Ok(model) = std::env::var("OPENAI_MODEL") {
        config.model = model;
    }

    if let Ok(temp) = std::env::var("OPENAI_TEMPERATURE") {
        if let Ok(temp_f) = temp.parse::<f32>() {
            config.temperature = Some(temp_f);
        }
    }

    if let Ok(limit) = std::env::var("AGORA_REVIEW_CONCURRENCY") {
        if let Ok(limit) = limit.parse::<usize>() {
            config.review_concurrency = limit;
        }
    }

    if let Ok(path) = std::env::var("AGORA_TRACE_FILE") {
        config.trace_file = PathBuf::from(path);
    }

    config
}

/// Load configuration from a TOML file
pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<AgoraConfig> {
    let contents = std::fs::read_to_string(path)?;
    from_toml(&contents)
}

pub fn from_toml(contents: &str) -> Result<AgoraConfig> {
    let config: AgoraConfig =
        toml::from_str(contents).map_err(|e| AgoraError::Config(e.to_string()))?;
    if config.review_concurrency == 0 {
        return Err(AgoraError::Config(
            "review_concurrency must be at least 1".to_string(),
        ));
    }
    Ok(config)
}
