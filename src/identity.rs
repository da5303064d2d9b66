//! Agent identities and rosters
//!
//! An [`AgentIdentity`] is the immutable profile of one participant: a unique name,
//! its instructions and, for agents that must answer with a typed record, an
//! [`OutputSchema`]. A [`Roster`] is the ordered, non-empty list of identities taking
//! part in a run. Names are the only identifier used for nomination matching and as
//! map keys, so the roster rejects duplicates at construction.

use std::collections::HashSet;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgoraError, Result};

/// JSON schema advertised to the executor for structured replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

impl OutputSchema {
    /// Generate the schema of `T`.
    pub fn of<T: JsonSchema>() -> Self {
        let root = schemars::schema_for!(T);
        let name = root
            .schema
            .metadata
            .as_ref()
            .and_then(|m| m.title.clone())
            .unwrap_or_else(|| T::schema_name());
        let schema = serde_json::to_value(&root).unwrap_or(Value::Null);
        Self { name, schema }
    }
}

/// Immutable profile of a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub name: String,
    pub instructions: String,
    pub output_schema: Option<OutputSchema>,
}

impl AgentIdentity {
    /// A free-text agent.
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            output_schema: None,
        }
    }

    /// Require replies conforming to `T`.
    pub fn with_output<T: JsonSchema>(mut self) -> Self {
        self.output_schema = Some(OutputSchema::of::<T>());
        self
    }

    pub fn is_structured(&self) -> bool {
        self.output_schema.is_some()
    }
}

/// Ordered list of agents with unique names.
#[derive(Debug, Clone)]
pub struct Roster {
    agents: Vec<Arc<AgentIdentity>>,
}

impl Roster {
    pub fn new(agents: impl IntoIterator<Item = AgentIdentity>) -> Result<Self> {
        let agents: Vec<Arc<AgentIdentity>> = agents.into_iter().map(Arc::new).collect();
        if agents.is_empty() {
            return Err(AgoraError::EmptyRoster);
        }
        let mut seen = HashSet::with_capacity(agents.len());
        for agent in &agents {
            if !seen.insert(agent.name.as_str()) {
                return Err(AgoraError::DuplicateAgent {
                    name: agent.name.clone(),
                });
            }
        }
        Ok(Self { agents })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AgentIdentity>> {
        self.agents.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|a| a.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<AgentIdentity>> {
        self.agents.iter().find(|a| a.name == name)
    }
}

impl<'a> IntoIterator for &'a Roster {
    type Item = &'a Arc<AgentIdentity>;
    type IntoIter = std::slice::Iter<'a, Arc<AgentIdentity>>;

    fn into_iter(self) -> Self::IntoIter {
        self.agents.iter()
    }
}
