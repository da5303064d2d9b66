//! RefCheckArena: a small team works through tasks, then every member
//! reference-checks every other member.

use serde::Serialize;
use serde_json::json;
use tower::Layer;
use tracing::{info, info_span, Instrument};

use crate::aggregate::{aggregate, AggregateScore};
use crate::error::Result;
use crate::executor::AgentExecutor;
use crate::identity::{AgentIdentity, Roster};
use crate::review::{ConcurrencyLimit, PeerReview, RatingMatrix};
use crate::sequencer::{run_team_task, TeamOutputs};
use crate::trace::{RecordingLayer, SpanKind, TraceRecorder};

/// One task: what each member produced and how they rated each other.
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub task: String,
    pub team_outputs: TeamOutputs,
    pub peer_checks: RatingMatrix,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArenaReport {
    pub rounds: Vec<RoundReport>,
    /// Means over every rating from every round.
    pub aggregate: AggregateScore,
}

#[derive(Debug, Clone)]
pub struct RefCheckArena {
    team: Roster,
    tasks: Vec<String>,
    limit: ConcurrencyLimit,
}

/// Planner, Implementer and Reviewer.
pub fn default_team() -> Result<Roster> {
    Roster::new([
        AgentIdentity::new(
            "Planner",
            "You are a concise project planner. Focus on task breakdowns and handoffs.",
        ),
        AgentIdentity::new(
            "Implementer",
            "You are an implementation-focused collaborator. Emphasize concrete actions.",
        ),
        AgentIdentity::new(
            "Reviewer",
            "You are a reviewer who highlights risks and clarifies communication.",
        ),
    ])
}

pub fn default_tasks() -> Vec<String> {
    vec![
        "Draft a concise project update and hand off next steps to a teammate.".to_string(),
        "Propose a plan for debugging a flaky test and specify who does what.".to_string(),
    ]
}

impl RefCheckArena {
    pub fn new(team: Roster) -> Self {
        Self {
            team,
            tasks: default_tasks(),
            limit: ConcurrencyLimit::default(),
        }
    }

    pub fn tasks<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tasks = tasks.into_iter().map(Into::into).collect();
        self
    }

    pub fn review_concurrency(mut self, limit: usize) -> Self {
        self.limit = ConcurrencyLimit(limit);
        self
    }

    pub fn team(&self) -> &Roster {
        &self.team
    }

    /// Run every task in order, inside a `RefCheckArena run` trace.
    pub async fn run<E>(&self, executor: E, recorder: &TraceRecorder) -> Result<ArenaReport>
    where
        E: AgentExecutor + Clone + Send + 'static,
        E::Future: Send + 'static,
    {
        let executor = RecordingLayer::new(recorder.clone()).layer(executor);
        let review = PeerReview::new(executor.clone()).concurrency_limit(self.limit.0);

        recorder
            .in_trace("RefCheckArena run", async {
                let mut rounds = Vec::with_capacity(self.tasks.len());
                for (round, task) in self.tasks.iter().enumerate() {
                    let span = info_span!("arena.round", round);
                    let report = async {
                        let team_outputs = run_team_task(&executor, &self.team, task).await?;
                        let span_id = recorder.start_span(SpanKind::Custom {
                            name: "peer_review".to_string(),
                            data: json!({ "task": task, "participants": team_outputs.len() }),
                        });
                        let peer_checks = match review.collect(task, &team_outputs).await {
                            Ok(matrix) => {
                                recorder.end_span(&span_id);
                                matrix
                            }
                            Err(e) => {
                                recorder.fail_span(&span_id, e.to_string());
                                return Err(e);
                            }
                        };
                        Ok::<_, crate::error::AgoraError>(RoundReport {
                            task: task.clone(),
                            team_outputs,
                            peer_checks,
                        })
                    }
                    .instrument(span)
                    .await?;
                    rounds.push(report);
                }

                let aggregate = aggregate(rounds.iter().flat_map(|r| r.peer_checks.records()));
                info!(rounds = rounds.len(), overall = aggregate.overall, "arena finished");
                Ok(ArenaReport { rounds, aggregate })
            })
            .await
    }
}
