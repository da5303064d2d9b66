//! Turn sequencing
//!
//! Two ways to drive a roster through one round:
//!
//! - [`deliberate`]: leader-election mode. Agents speak strictly in roster order and
//!   each one sees the whole transcript so far, including the previous agent's reply.
//! - [`run_team_task`]: team-task mode. Every agent answers the same prompt on its
//!   own; nothing is shared between them.
//!
//! Both modes are fail-fast: the first executor error aborts the round and no
//! partial output map is returned.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use serde::{Serialize, Serializer};
use tracing::{info, info_span, Instrument};

use crate::conversation::Conversation;
use crate::error::Result;
use crate::executor::{execute, AgentExecutor};
use crate::identity::Roster;

/// Opening statement of a leader election.
pub const OPENING_STATEMENT: &str = "Begin leader election";

/// Final text of each agent, in roster order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamOutputs {
    entries: Vec<(String, String)>,
}

impl TeamOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `agent`'s output, replacing any earlier one.
    pub fn insert(&mut self, agent: impl Into<String>, output: impl Into<String>) {
        let agent = agent.into();
        let output = output.into();
        match self.entries.iter_mut().find(|(name, _)| *name == agent) {
            Some(slot) => slot.1 = output,
            None => self.entries.push((agent, output)),
        }
    }

    pub fn get(&self, agent: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == agent)
            .map(|(_, out)| out.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, o)| (n.as_str(), o.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.iter().cloned().collect()
    }
}

impl<A: Into<String>, O: Into<String>> FromIterator<(A, O)> for TeamOutputs {
    fn from_iter<I: IntoIterator<Item = (A, O)>>(iter: I) -> Self {
        let mut outputs = TeamOutputs::new();
        for (agent, output) in iter {
            outputs.insert(agent, output);
        }
        outputs
    }
}

impl Serialize for TeamOutputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Outcome of a leader-election round.
#[derive(Debug, Clone)]
pub struct Deliberation {
    pub outputs: TeamOutputs,
    /// Full transcript, kept for diagnostics.
    pub conversation: Conversation,
}

/// Run every agent in order over a shared, growing transcript.
pub async fn deliberate<E>(
    executor: &mut E,
    roster: &Roster,
    opening: &str,
) -> Result<Deliberation>
where
    E: AgentExecutor,
{
    let mut conversation = Conversation::opening(opening);
    let mut outputs = TeamOutputs::new();

    for (turn, identity) in roster.iter().enumerate() {
        let span = info_span!("agent.turn", agent = %identity.name, turn);
        let result = execute(executor, identity.clone(), conversation)
            .instrument(span)
            .await?;
        outputs.insert(identity.name.clone(), result.output.to_string());
        conversation = result.context;
    }

    info!(agents = roster.len(), turns = conversation.len(), "deliberation finished");
    Ok(Deliberation {
        outputs,
        conversation,
    })
}

/// Run every agent independently against the same prompt.
pub async fn run_team_task<E>(executor: &E, roster: &Roster, prompt: &str) -> Result<TeamOutputs>
where
    E: AgentExecutor + Clone,
{
    let calls = roster.iter().map(|identity| {
        let mut exec = executor.clone();
        let identity = identity.clone();
        let span = info_span!("agent.task", agent = %identity.name);
        async move {
            let result = execute(&mut exec, identity.clone(), prompt).await?;
            Ok::<_, crate::error::AgoraError>((identity.name.clone(), result.output.to_string()))
        }
        .instrument(span)
    });

    let outputs: TeamOutputs = try_join_all(calls).await?.into_iter().collect();
    info!(agents = outputs.len(), "team task finished");
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{AgentOutput, Speaker};
    use crate::error::AgoraError;
    use crate::executor::{ExecuteRequest, ExecutionResult};
    use crate::identity::AgentIdentity;
    use std::sync::{Arc, Mutex};
    use tower::{service_fn, BoxError};

    fn roster(names: &[&str]) -> Roster {
        Roster::new(names.iter().map(|n| AgentIdentity::new(*n, format!("You are {}", n))))
            .unwrap()
    }

    /// Echoes how many turns it received.
    fn length_echo() -> impl AgentExecutor + Clone {
        service_fn(|req: ExecuteRequest| async move {
            let seen = req.input.to_conversation().len();
            Ok::<_, BoxError>(ExecutionResult::reply(
                &req,
                AgentOutput::Text(format!("{} saw {}", req.identity.name, seen)),
            ))
        })
    }

    #[tokio::test]
    async fn deliberation_threads_context() {
        let mut exec = length_echo();
        let r = roster(&["Agent_1", "Agent_2", "Agent_3"]);
        let out = deliberate(&mut exec, &r, OPENING_STATEMENT).await.unwrap();

        assert_eq!(out.outputs.get("Agent_1"), Some("Agent_1 saw 1"));
        assert_eq!(out.outputs.get("Agent_2"), Some("Agent_2 saw 2"));
        assert_eq!(out.outputs.get("Agent_3"), Some("Agent_3 saw 3"));

        let turns = out.conversation.turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].content, OPENING_STATEMENT);
        assert_eq!(turns[1].speaker, Speaker::Agent("Agent_1".into()));
        assert_eq!(turns[3].content, "Agent_3 saw 3");
    }

    #[tokio::test]
    async fn each_agent_sees_all_prior_utterances_in_order() {
        let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
        let seen_cl = seen.clone();
        let mut exec = service_fn(move |req: ExecuteRequest| {
            let seen = seen_cl.clone();
            async move {
                let contents: Vec<String> = req
                    .input
                    .to_conversation()
                    .turns()
                    .iter()
                    .map(|t| t.content.clone())
                    .collect();
                seen.lock().unwrap().push(contents);
                let text = format!("{} speaks", req.identity.name);
                Ok::<_, BoxError>(ExecutionResult::reply(&req, AgentOutput::Text(text)))
            }
        });
        let r = roster(&["A", "B", "C"]);
        deliberate(&mut exec, &r, OPENING_STATEMENT).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], vec![OPENING_STATEMENT]);
        assert_eq!(seen[1], vec![OPENING_STATEMENT, "A speaks"]);
        assert_eq!(seen[2], vec![OPENING_STATEMENT, "A speaks", "B speaks"]);
    }

    #[tokio::test]
    async fn deliberation_fails_fast() {
        let calls = Arc::new(Mutex::new(Vec::<String>::new()));
        let calls_cl = calls.clone();
        let mut exec = service_fn(move |req: ExecuteRequest| {
            let calls = calls_cl.clone();
            async move {
                calls.lock().unwrap().push(req.identity.name.clone());
                if req.identity.name == "Agent_2" {
                    return Err::<ExecutionResult, BoxError>("timeout".into());
                }
                Ok(ExecutionResult::reply(&req, AgentOutput::Text("ok".into())))
            }
        });
        let r = roster(&["Agent_1", "Agent_2", "Agent_3"]);
        let err = deliberate(&mut exec, &r, OPENING_STATEMENT)
            .await
            .unwrap_err();
        assert!(matches!(err, AgoraError::Execution { ref agent, .. } if agent == "Agent_2"));
        assert_eq!(*calls.lock().unwrap(), vec!["Agent_1", "Agent_2"]);
    }

    #[tokio::test]
    async fn team_task_uses_unmodified_prompt() {
        let exec = length_echo();
        let r = roster(&["Planner", "Implementer", "Reviewer"]);
        let outputs = run_team_task(&exec, &r, "Draft an update").await.unwrap();
        assert_eq!(outputs.len(), 3);
        for (name, out) in outputs.iter() {
            assert_eq!(out, format!("{} saw 1", name));
        }
        let order: Vec<&str> = outputs.names().collect();
        assert_eq!(order, vec!["Planner", "Implementer", "Reviewer"]);
    }

    #[tokio::test]
    async fn team_task_has_no_partial_result() {
        let exec = service_fn(|req: ExecuteRequest| async move {
            if req.identity.name == "Reviewer" {
                return Err::<ExecutionResult, BoxError>("model error".into());
            }
            Ok(ExecutionResult::reply(&req, AgentOutput::Text("done".into())))
        });
        let r = roster(&["Planner", "Reviewer"]);
        let err = run_team_task(&exec, &r, "task").await.unwrap_err();
        assert_eq!(err.agent(), Some("Reviewer"));
    }

    #[test]
    fn team_outputs_serialize_as_map() {
        let outputs: TeamOutputs = vec![("Agent_2", "b"), ("Agent_1", "a")].into_iter().collect();
        let v = serde_json::to_value(&outputs).unwrap();
        assert_eq!(v, serde_json::json!({"Agent_1": "a", "Agent_2": "b"}));
        assert_eq!(outputs.names().next(), Some("Agent_2"));
    }
}
