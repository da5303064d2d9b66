//! Deterministic executor for tests and offline runs.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tower::{BoxError, Service};

use super::{ExecuteRequest, ExecutionResult};
use crate::conversation::AgentOutput;

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, VecDeque<AgentOutput>>,
    failures: HashMap<String, String>,
    calls: Vec<String>,
}

/// Executor replaying scripted outputs keyed by agent name.
///
/// Agents without a script fall back to a fixed reply: free-text agents say
/// `"{name} has nothing to add."`, structured agents return [`MockExecutor::default_rating`].
#[derive(Clone, Default)]
pub struct MockExecutor {
    script: Arc<Mutex<Script>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply for `agent`.
    pub fn with_reply(self, agent: impl Into<String>, text: impl Into<String>) -> Self {
        self.push(agent.into(), AgentOutput::Text(text.into()));
        self
    }

    /// Queue a structured reply for `agent`.
    pub fn with_structured(self, agent: impl Into<String>, value: Value) -> Self {
        self.push(agent.into(), AgentOutput::Structured(value));
        self
    }

    /// Make every call for `agent` fail with `message`.
    pub fn with_failure(self, agent: impl Into<String>, message: impl Into<String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.failures.insert(agent.into(), message.into());
        }
        self
    }

    /// Names of the agents invoked so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.script
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    /// Rating used for structured agents without a script.
    pub fn default_rating() -> Value {
        json!({
            "collaboration": 3,
            "handoff_clarity": 3,
            "reliability": 3,
            "communication": 3,
            "initiative": 3,
            "overall": 3,
            "rationale": "Offline placeholder rating."
        })
    }

    fn push(&self, agent: String, output: AgentOutput) {
        if let Ok(mut script) = self.script.lock() {
            script.replies.entry(agent).or_default().push_back(output);
        }
    }

    fn next_output(&self, req: &ExecuteRequest) -> Result<AgentOutput, BoxError> {
        let name = &req.identity.name;
        let mut script = self
            .script
            .lock()
            .map_err(|_| BoxError::from("mock script poisoned"))?;
        script.calls.push(name.clone());
        if let Some(message) = script.failures.get(name) {
            return Err(message.clone().into());
        }
        if let Some(out) = script.replies.get_mut(name).and_then(|q| q.pop_front()) {
            return Ok(out);
        }
        Ok(if req.identity.is_structured() {
            AgentOutput::Structured(Self::default_rating())
        } else {
            AgentOutput::Text(format!("{} has nothing to add.", name))
        })
    }
}

impl Service<ExecuteRequest> for MockExecutor {
    type Response = ExecutionResult;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ExecuteRequest) -> Self::Future {
        let outcome = self.next_output(&req);
        Box::pin(async move {
            let output = outcome?;
            Ok(ExecutionResult::reply(&req, output))
        })
    }
}
