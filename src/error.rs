//! Error types for agent society runs

use thiserror::Error;
use tower::BoxError;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, AgoraError>;

/// Main error type for orchestration runs
#[derive(Debug, Error)]
pub enum AgoraError {
    /// The executor could not produce any output for an agent
    #[error("Agent {agent} failed: {source}")]
    Execution {
        agent: String,
        #[source]
        source: BoxError,
    },

    /// Structured output could not be read as the requested schema
    #[error("Schema mismatch from {agent}: {message}")]
    SchemaMismatch { agent: String, message: String },

    /// A single peer review cell failed; the whole batch is abandoned
    #[error("Review {evaluator} -> {subject} failed: {source}")]
    Review {
        evaluator: String,
        subject: String,
        #[source]
        source: Box<AgoraError>,
    },

    /// A roster needs at least one agent
    #[error("Roster is empty")]
    EmptyRoster,

    /// Agent names are the only identifier and must be unique
    #[error("Duplicate agent name: {name}")]
    DuplicateAgent { name: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the OpenAI API
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgoraError {
    pub(crate) fn execution(agent: impl Into<String>, source: BoxError) -> Self {
        // Executors may already surface a typed schema error through the box.
        match source.downcast::<AgoraError>() {
            Ok(inner) => match *inner {
                AgoraError::SchemaMismatch { message, .. } => AgoraError::SchemaMismatch {
                    agent: agent.into(),
                    message,
                },
                other => AgoraError::Execution {
                    agent: agent.into(),
                    source: Box::new(other),
                },
            },
            Err(source) => AgoraError::Execution {
                agent: agent.into(),
                source,
            },
        }
    }

    /// Name of the agent (or reviewing agent) the failure is attributed to.
    pub fn agent(&self) -> Option<&str> {
        match self {
            AgoraError::Execution { agent, .. } | AgoraError::SchemaMismatch { agent, .. } => {
                Some(agent)
            }
            AgoraError::Review { evaluator, .. } => Some(evaluator),
            _ => None,
        }
    }
}
