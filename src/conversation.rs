//! Conversation threading between turns
//!
//! A [`Conversation`] is the append-only transcript passed from one agent to the next
//! during a deliberation. It is an ordinary value: the sequencer owns it for one run
//! and hands it back for diagnostics, nothing keeps it globally.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "name", rename_all = "snake_case")]
pub enum Speaker {
    User,
    Agent(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            content: content.into(),
        }
    }

    pub fn agent(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Agent(name.into()),
            content: content.into(),
        }
    }
}

/// Ordered, append-only transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcript opened by a single user statement.
    pub fn opening(statement: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(statement)],
        }
    }

    /// Returns the transcript extended by `turn`.
    pub fn appended(mut self, turn: Turn) -> Self {
        self.turns.push(turn);
        self
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

impl From<Vec<Turn>> for Conversation {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

/// What an executor is asked to respond to.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorInput {
    Prompt(String),
    Conversation(Conversation),
}

impl ExecutorInput {
    /// The input as a transcript; a bare prompt becomes a single user turn.
    pub fn to_conversation(&self) -> Conversation {
        match self {
            ExecutorInput::Prompt(p) => Conversation::opening(p.clone()),
            ExecutorInput::Conversation(c) => c.clone(),
        }
    }
}

impl From<&str> for ExecutorInput {
    fn from(prompt: &str) -> Self {
        ExecutorInput::Prompt(prompt.to_string())
    }
}

impl From<String> for ExecutorInput {
    fn from(prompt: String) -> Self {
        ExecutorInput::Prompt(prompt)
    }
}

impl From<Conversation> for ExecutorInput {
    fn from(c: Conversation) -> Self {
        ExecutorInput::Conversation(c)
    }
}

/// Value produced by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentOutput {
    Text(String),
    Structured(Value),
}

impl AgentOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AgentOutput::Text(s) => Some(s),
            AgentOutput::Structured(_) => None,
        }
    }
}

impl fmt::Display for AgentOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentOutput::Text(s) => f.write_str(s),
            AgentOutput::Structured(v) => write!(f, "{}", v),
        }
    }
}
