//! Peer reference checks
//!
//! After a team task, every participant rates every other participant. For each
//! unordered pair {A, B} two independent evaluations run, A rating B and B rating
//! A, each through a fresh one-shot reference-checker agent that must answer with
//! a [`RatingRecord`].
//!
//! Implementation strategy
//! - Enumerate ordered [`Pairing`]s up front; each is one unit of work with its own
//!   output slot, so no shared mutable state exists between units.
//! - Fan out on the Tokio runtime, bounded by a semaphore ([`ConcurrencyLimit`]).
//! - Fan in by `(evaluator, subject)` key. The matrix is assembled only once every
//!   unit succeeded.
//!
//! Failure policy: the first failing unit fails the whole batch. Outstanding units
//! are aborted and the error names the pair. A partial matrix is never returned,
//! and dropping the future mid-flight aborts the spawned units as well.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::{AgoraError, Result};
use crate::executor::{execute, AgentExecutor};
use crate::identity::AgentIdentity;
use crate::sequencer::TeamOutputs;

mod rating;

pub use rating::{Pairing, RatingMatrix, RatingRecord};

const RUBRIC: &str = "Rate the colleague using 1-5 integers for each dimension. \
Use 1 for poor and 5 for excellent. Provide an overall rating and a brief rationale.";

/// Maximum number of evaluations in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimit(pub usize);

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        ConcurrencyLimit(4)
    }
}

/// Every ordered pair of distinct names: for each unordered pair `{a, b}` with `a`
/// first in `names`, `a → b` then `b → a`.
pub fn pairings<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<Pairing> {
    let names: Vec<&str> = names.into_iter().collect();
    let mut out = Vec::with_capacity(names.len() * names.len().saturating_sub(1));
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            out.push(Pairing::new(*a, *b));
            out.push(Pairing::new(*b, *a));
        }
    }
    out
}

/// One-shot checker identity for `pairing`.
pub fn reference_checker(pairing: &Pairing) -> AgentIdentity {
    let instructions = format!(
        "You are a reference checker evaluating a colleague after working together on a task. \
         Be direct, specific, and grounded in the provided task context. {}",
        RUBRIC
    );
    AgentIdentity::new(
        format!("{}_rates_{}", pairing.evaluator, pairing.subject),
        instructions,
    )
    .with_output::<RatingRecord>()
}

/// Context handed to a checker: task, the evaluator's own output, then the
/// colleague's output.
pub fn review_context(task: &str, own_output: &str, colleague_output: &str) -> String {
    format!(
        "Task prompt:\n{}\n\nYour output:\n{}\n\nColleague output:\n{}",
        task, own_output, colleague_output
    )
}

/// Builder and runner for one batch of peer reviews.
#[derive(Clone)]
pub struct PeerReview<E> {
    executor: E,
    limit: ConcurrencyLimit,
}

impl<E> PeerReview<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            limit: ConcurrencyLimit::default(),
        }
    }

    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.limit = ConcurrencyLimit(limit);
        self
    }
}

impl<E> PeerReview<E>
where
    E: AgentExecutor + Clone + Send + 'static,
    E::Future: Send + 'static,
{
    /// Rate every participant by every other participant on `task`.
    pub async fn collect(&self, task: &str, outputs: &TeamOutputs) -> Result<RatingMatrix> {
        let units = pairings(outputs.names());
        let expected = units.len();
        let sem = Arc::new(Semaphore::new(self.limit.0.max(1)));
        let task: Arc<str> = Arc::from(task);
        let mut set = JoinSet::new();
        let mut owners: HashMap<task::Id, Pairing> = HashMap::with_capacity(expected);

        for pairing in units {
            let own = outputs.get(&pairing.evaluator).unwrap_or_default().to_string();
            let colleague = outputs.get(&pairing.subject).unwrap_or_default().to_string();
            let mut exec = self.executor.clone();
            let sem = sem.clone();
            let task = task.clone();
            let span = info_span!(
                "review.cell",
                evaluator = %pairing.evaluator,
                subject = %pairing.subject
            );
            let owner = pairing.clone();
            let handle = set.spawn(
                async move {
                    let _permit = sem.acquire_owned().await;
                    let checker = Arc::new(reference_checker(&pairing));
                    let context = review_context(&task, &own, &colleague);
                    let outcome = match execute(&mut exec, checker.clone(), context).await {
                        Ok(result) => RatingRecord::from_output(&checker.name, &result.output),
                        Err(e) => Err(e),
                    };
                    match outcome {
                        Ok(record) => {
                            debug!(overall = record.overall, "review cell done");
                            Ok((pairing, record))
                        }
                        Err(e) => Err(AgoraError::Review {
                            evaluator: pairing.evaluator,
                            subject: pairing.subject,
                            source: Box::new(e),
                        }),
                    }
                }
                .instrument(span),
            );
            owners.insert(handle.id(), owner);
        }

        let mut cells = Vec::with_capacity(expected);
        while let Some(joined) = set.join_next_with_id().await {
            let cell = match joined {
                Ok((_, cell)) => cell,
                Err(join_err) => {
                    let pairing = owners
                        .remove(&join_err.id())
                        .unwrap_or_else(|| Pairing::new("unknown", "unknown"));
                    let checker = reference_checker(&pairing).name;
                    Err(AgoraError::Review {
                        evaluator: pairing.evaluator,
                        subject: pairing.subject,
                        source: Box::new(AgoraError::Execution {
                            agent: checker,
                            source: Box::new(join_err),
                        }),
                    })
                }
            };
            match cell {
                Ok(cell) => cells.push(cell),
                Err(e) => {
                    warn!(error = %e, "peer review failed; abandoning batch");
                    set.abort_all();
                    return Err(e);
                }
            }
        }

        let matrix = RatingMatrix::from_cells(cells)?;
        info!(cells = matrix.len(), expected, "peer review finished");
        Ok(matrix)
    }
}

/// Convenience: review with the default concurrency limit.
pub async fn collect_peer_checks<E>(
    executor: E,
    task: &str,
    outputs: &TeamOutputs,
) -> Result<RatingMatrix>
where
    E: AgentExecutor + Clone + Send + 'static,
    E::Future: Send + 'static,
{
    PeerReview::new(executor).collect(task, outputs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::AgentOutput;
    use crate::executor::{ExecuteRequest, ExecutionResult, MockExecutor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};
    use tower::{service_fn, BoxError};

    fn team() -> TeamOutputs {
        vec![
            ("Planner", "plan: split work"),
            ("Implementer", "impl: wrote code"),
            ("Reviewer", "review: found risks"),
        ]
        .into_iter()
        .collect()
    }

    fn rating_json(overall: u8) -> serde_json::Value {
        serde_json::json!({
            "collaboration": 4, "handoff_clarity": 4, "reliability": 4,
            "communication": 4, "initiative": 4, "overall": overall,
            "rationale": "solid"
        })
    }

    #[test]
    fn pairings_cover_both_directions() {
        let p = pairings(["A", "B", "C"]);
        assert_eq!(
            p,
            vec![
                Pairing::new("A", "B"),
                Pairing::new("B", "A"),
                Pairing::new("A", "C"),
                Pairing::new("C", "A"),
                Pairing::new("B", "C"),
                Pairing::new("C", "B"),
            ]
        );
        assert!(pairings(["solo"]).is_empty());
    }

    #[test]
    fn checker_identity_names_both_sides() {
        let id = reference_checker(&Pairing::new("Planner", "Reviewer"));
        assert_eq!(id.name, "Planner_rates_Reviewer");
        assert!(id.instructions.contains("1-5 integers"));
        assert_eq!(id.output_schema.unwrap().name, "RatingRecord");
    }

    #[test]
    fn context_orders_labelled_sections() {
        let ctx = review_context("Do X", "mine", "theirs");
        let task_at = ctx.find("Task prompt:\nDo X").unwrap();
        let own_at = ctx.find("Your output:\nmine").unwrap();
        let other_at = ctx.find("Colleague output:\ntheirs").unwrap();
        assert!(task_at < own_at && own_at < other_at);
    }

    #[tokio::test]
    async fn full_matrix_without_self_ratings() {
        let matrix = collect_peer_checks(MockExecutor::new(), "task", &team())
            .await
            .unwrap();
        assert_eq!(matrix.len(), 6);
        assert!(matrix.iter().all(|(e, s, _)| e != s));
        assert!(matrix.is_complete(team().names()));
    }

    #[tokio::test]
    async fn contexts_swap_roles_per_direction() {
        let seen: Arc<Mutex<HashMap<String, String>>> = Arc::default();
        let seen_cl = seen.clone();
        let exec = service_fn(move |req: ExecuteRequest| {
            let seen = seen_cl.clone();
            async move {
                if let crate::conversation::ExecutorInput::Prompt(p) = &req.input {
                    seen.lock().unwrap().insert(req.identity.name.clone(), p.clone());
                }
                Ok::<_, BoxError>(ExecutionResult::reply(
                    &req,
                    AgentOutput::Structured(rating_json(3)),
                ))
            }
        });
        let outputs: TeamOutputs = vec![("A", "alpha work"), ("B", "beta work")]
            .into_iter()
            .collect();
        PeerReview::new(exec).collect("shared task", &outputs).await.unwrap();

        let seen = seen.lock().unwrap();
        let a_rates_b = &seen["A_rates_B"];
        let b_rates_a = &seen["B_rates_A"];
        assert!(a_rates_b.contains("shared task"));
        assert!(a_rates_b.contains("Your output:\nalpha work"));
        assert!(a_rates_b.contains("Colleague output:\nbeta work"));
        assert!(b_rates_a.contains("Your output:\nbeta work"));
        assert_ne!(a_rates_b, b_rates_a);
    }

    #[tokio::test]
    async fn one_failed_cell_fails_the_batch() {
        let exec = MockExecutor::new().with_failure("Implementer_rates_Reviewer", "timeout");
        let err = PeerReview::new(exec)
            .concurrency_limit(1)
            .collect("task", &team())
            .await
            .unwrap_err();
        match err {
            AgoraError::Review {
                evaluator, subject, ..
            } => {
                assert_eq!(evaluator, "Implementer");
                assert_eq!(subject, "Reviewer");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_cell_names_its_pair() {
        let exec = service_fn(|req: ExecuteRequest| async move {
            if req.identity.name == "B_rates_A" {
                panic!("executor bug");
            }
            Ok::<_, BoxError>(ExecutionResult::reply(
                &req,
                AgentOutput::Structured(rating_json(3)),
            ))
        });
        let outputs: TeamOutputs = vec![("A", "a"), ("B", "b")].into_iter().collect();
        let err = PeerReview::new(exec)
            .collect("task", &outputs)
            .await
            .unwrap_err();
        assert_eq!(err.agent(), Some("B"));
        match err {
            AgoraError::Review {
                evaluator,
                subject,
                source,
            } => {
                assert_eq!((evaluator.as_str(), subject.as_str()), ("B", "A"));
                assert_eq!(source.agent(), Some("B_rates_A"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_rating_fails_the_batch() {
        let exec = MockExecutor::new().with_reply("A_rates_B", "five out of five");
        let outputs: TeamOutputs = vec![("A", "a"), ("B", "b")].into_iter().collect();
        let err = collect_peer_checks(exec, "task", &outputs).await.unwrap_err();
        match err {
            AgoraError::Review { source, .. } => {
                assert!(matches!(*source, AgoraError::SchemaMismatch { .. }))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn limit_bounds_cells_in_flight() {
        let current = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (cur, max) = (current.clone(), max_seen.clone());
        let exec = service_fn(move |req: ExecuteRequest| {
            let (cur, max) = (cur.clone(), max.clone());
            async move {
                let now = cur.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                cur.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, BoxError>(ExecutionResult::reply(
                    &req,
                    AgentOutput::Structured(rating_json(5)),
                ))
            }
        });
        let outputs: TeamOutputs = (1..=4)
            .map(|i| (format!("Agent_{}", i), format!("out {}", i)))
            .collect();
        let matrix = PeerReview::new(exec)
            .concurrency_limit(2)
            .collect("task", &outputs)
            .await
            .unwrap();
        assert_eq!(matrix.len(), 12);
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn fewer_than_two_agents_yield_empty_matrix() {
        let outputs: TeamOutputs = vec![("Solo", "alone")].into_iter().collect();
        let matrix = collect_peer_checks(MockExecutor::new(), "task", &outputs)
            .await
            .unwrap();
        assert!(matrix.is_empty());
    }
}
