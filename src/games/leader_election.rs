//! Leader election through natural-language nominations.

use rand::Rng;
use serde::Serialize;
use tower::Layer;
use tracing::info;

use crate::consensus::{detect, ConsensusVerdict};
use crate::conversation::Conversation;
use crate::error::{AgoraError, Result};
use crate::executor::AgentExecutor;
use crate::identity::{AgentIdentity, Roster};
use crate::sequencer::{deliberate, TeamOutputs, OPENING_STATEMENT};
use crate::trace::{RecordingLayer, TraceRecorder};

/// Range of the private scores handed to agents.
pub const SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=100;

/// Outcome of one election.
#[derive(Debug, Clone, Serialize)]
pub struct ElectionReport {
    pub votes: TeamOutputs,
    pub agreed: bool,
    pub nominees: Vec<String>,
    pub leader: Option<String>,
    #[serde(skip)]
    pub conversation: Conversation,
}

/// Agents `Agent_1..Agent_n`, each knowing only its own private score.
#[derive(Debug, Clone)]
pub struct LeaderElectionGame {
    roster: Roster,
    scores: Vec<u8>,
}

fn instructions(name: &str, score: u8) -> String {
    format!(
        "You are {}. Your private score is {}.\n\
         Nominate the agent with the highest known score. \
         Say 'I nominate Agent_X'. If everyone agrees, finish with 'LEADER: Agent_X'.",
        name, score
    )
}

impl LeaderElectionGame {
    /// `num_agents` agents with random private scores.
    pub fn new(num_agents: usize) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let scores = (0..num_agents)
            .map(|_| rng.gen_range(SCORE_RANGE))
            .collect();
        Self::with_scores(scores)
    }

    /// One agent per score, in order.
    pub fn with_scores(scores: Vec<u8>) -> Result<Self> {
        if let Some(bad) = scores.iter().find(|s| !SCORE_RANGE.contains(s)) {
            return Err(AgoraError::Config(format!(
                "private score {} is outside 1..=100",
                bad
            )));
        }
        let agents = scores.iter().enumerate().map(|(i, score)| {
            let name = format!("Agent_{}", i + 1);
            let instructions = instructions(&name, *score);
            AgentIdentity::new(name, instructions)
        });
        let roster = Roster::new(agents)?;
        Ok(Self { roster, scores })
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn private_score(&self, agent: &str) -> Option<u8> {
        self.roster
            .names()
            .position(|n| n == agent)
            .map(|i| self.scores[i])
    }

    /// Deliberate once and check for consensus, recording a `leader_election` trace.
    pub async fn run<E>(&self, executor: E, recorder: &TraceRecorder) -> Result<ElectionReport>
    where
        E: AgentExecutor,
        E::Future: Send + 'static,
    {
        let mut executor = RecordingLayer::new(recorder.clone()).layer(executor);
        recorder
            .in_trace("leader_election", async {
                let round = deliberate(&mut executor, &self.roster, OPENING_STATEMENT).await?;
                let verdict: ConsensusVerdict = detect(&round.outputs);
                info!(
                    agreed = verdict.agreed,
                    leader = ?verdict.leader(),
                    "leader election finished"
                );
                Ok(ElectionReport {
                    leader: verdict.leader().map(str::to_string),
                    agreed: verdict.agreed,
                    nominees: verdict.nominees.into_iter().collect(),
                    votes: round.outputs,
                    conversation: round.conversation,
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockExecutor;
    use crate::trace::SpanKind;

    #[test]
    fn random_scores_are_in_range() {
        let game = LeaderElectionGame::new(5).unwrap();
        assert_eq!(game.roster().len(), 5);
        for name in game.roster().names() {
            let score = game.private_score(name).unwrap();
            assert!(SCORE_RANGE.contains(&score));
        }
    }

    #[test]
    fn instructions_embed_private_score() {
        let game = LeaderElectionGame::with_scores(vec![17, 88]).unwrap();
        let agent = game.roster().get("Agent_2").unwrap();
        assert!(agent.instructions.starts_with("You are Agent_2. Your private score is 88."));
        assert!(agent.instructions.contains("I nominate Agent_X"));
        assert_eq!(game.private_score("Agent_1"), Some(17));
        assert_eq!(game.private_score("Agent_9"), None);
    }

    #[test]
    fn zero_agents_is_an_error() {
        assert!(matches!(
            LeaderElectionGame::new(0),
            Err(AgoraError::EmptyRoster)
        ));
        assert!(LeaderElectionGame::with_scores(vec![0]).is_err());
    }

    #[tokio::test]
    async fn split_election_records_one_span_per_turn() {
        let game = LeaderElectionGame::with_scores(vec![10, 90, 40]).unwrap();
        let exec = MockExecutor::new()
            .with_reply("Agent_1", "My score is 10. I nominate Agent_1 for now.")
            .with_reply("Agent_2", "My score is 90, higher. I nominate Agent_2.")
            .with_reply("Agent_3", "I nominate Agent_2. LEADER: Agent_2");
        let recorder = TraceRecorder::new();
        let report = game.run(exec.clone(), &recorder).await.unwrap();

        assert!(!report.agreed);
        assert_eq!(report.nominees, vec!["Agent_1", "Agent_2"]);
        assert_eq!(report.conversation.len(), 4);
        assert_eq!(exec.calls(), vec!["Agent_1", "Agent_2", "Agent_3"]);

        let spans = recorder.spans();
        assert_eq!(spans.len(), 3);
        assert!(matches!(&spans[0].kind, SpanKind::Agent { agent_name } if agent_name == "Agent_1"));
        assert_eq!(recorder.traces()[0].name, "leader_election");
    }

    #[tokio::test]
    async fn unanimous_election_has_leader() {
        let game = LeaderElectionGame::with_scores(vec![5, 6]).unwrap();
        let exec = MockExecutor::new()
            .with_reply("Agent_1", "I nominate Agent_2")
            .with_reply("Agent_2", "I nominate Agent_2. LEADER: Agent_2");
        let report = game.run(exec, &TraceRecorder::new()).await.unwrap();
        assert!(report.agreed);
        assert_eq!(report.leader.as_deref(), Some("Agent_2"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["votes"]["Agent_1"], "I nominate Agent_2");
        assert_eq!(json["agreed"], true);
    }

    #[tokio::test]
    async fn failed_turn_fails_election() {
        let game = LeaderElectionGame::with_scores(vec![5, 6]).unwrap();
        let exec = MockExecutor::new().with_failure("Agent_2", "quota exceeded");
        let recorder = TraceRecorder::new();
        let err = game.run(exec, &recorder).await.unwrap_err();
        assert_eq!(err.agent(), Some("Agent_2"));
        assert_eq!(recorder.spans()[1].error.as_deref(), Some("quota exceeded"));
    }
}
