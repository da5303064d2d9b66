//! Agent executor capability
//!
//! The language model behind an agent is opaque to the orchestration code. It is
//! reached through a single Tower service:
//!
//! - `AgentExecutor: Service<ExecuteRequest, Response = ExecutionResult, Error = BoxError>`
//!
//! Implementations
//! - [`OpenAIExecutor`]: chat completions through `async-openai`
//! - [`MockExecutor`]: deterministic scripted replies for tests and offline runs
//! - any `tower::service_fn` closure with the right signature
//!
//! Because the capability is a plain `Service`, cross-cutting concerns (recording,
//! timeouts, rate limits) compose as ordinary Tower layers around it.

use std::sync::Arc;

use tower::{BoxError, Service, ServiceExt};
use tracing::debug;

use crate::conversation::{AgentOutput, Conversation, ExecutorInput, Turn};
use crate::error::{AgoraError, Result};
use crate::identity::AgentIdentity;

pub mod mock;
pub mod openai;

pub use mock::MockExecutor;
pub use openai::OpenAIExecutor;

/// One invocation of an agent.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub identity: Arc<AgentIdentity>,
    pub input: ExecutorInput,
}

impl ExecuteRequest {
    pub fn new(identity: Arc<AgentIdentity>, input: impl Into<ExecutorInput>) -> Self {
        Self {
            identity,
            input: input.into(),
        }
    }
}

/// What an agent produced, plus the transcript extended with its reply.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub output: AgentOutput,
    pub context: Conversation,
}

impl ExecutionResult {
    /// Build a result by appending `output` as the agent's turn to the request input.
    pub fn reply(req: &ExecuteRequest, output: AgentOutput) -> Self {
        let context = req
            .input
            .to_conversation()
            .appended(Turn::agent(req.identity.name.clone(), output.to_string()));
        Self { output, context }
    }
}

pub trait AgentExecutor:
    Service<ExecuteRequest, Response = ExecutionResult, Error = BoxError>
{
}
impl<T> AgentExecutor for T where
    T: Service<ExecuteRequest, Response = ExecutionResult, Error = BoxError>
{
}

/// Drive one executor call, attributing any failure to the agent.
pub async fn execute<E>(
    executor: &mut E,
    identity: Arc<AgentIdentity>,
    input: impl Into<ExecutorInput>,
) -> Result<ExecutionResult>
where
    E: AgentExecutor,
{
    let agent = identity.name.clone();
    let req = ExecuteRequest::new(identity, input);
    let ready = ServiceExt::<ExecuteRequest>::ready(executor)
        .await
        .map_err(|e| AgoraError::execution(agent.clone(), e))?;
    let result = ready
        .call(req)
        .await
        .map_err(|e| AgoraError::execution(agent.clone(), e))?;
    debug!(agent = %agent, context_len = result.context.len(), "agent replied");
    Ok(result)
}
