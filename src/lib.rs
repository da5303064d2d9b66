//! # Tower Agora
//!
//! Small agent societies on top of Tower services: agents take turns over a
//! shared transcript and nominate a leader, or work a task side by side and then
//! reference-check one another.
//!
//! ## Core Concepts
//!
//! - **Executor**: any Tower service turning an [`ExecuteRequest`] into an
//!   [`ExecutionResult`]. [`OpenAIExecutor`] talks to the API, [`MockExecutor`] runs offline.
//! - **Sequencer**: ordered turns over a growing [`Conversation`], or independent
//!   parallel calls against one prompt.
//! - **Consensus**: finds `Agent_N` nominations in free text and decides whether they agree.
//! - **Peer review**: every ordered pair of teammates, rated concurrently into a [`RatingMatrix`].
//! - **Trace**: [`RecordingLayer`] records one span per executor call for export.
//!
//! ## Getting Started
//!
//! Set `OPENAI_API_KEY` to use [`OpenAIExecutor`]; the example below runs offline.
//!
//! ```rust,no_run
//! use tower_agora::{games::LeaderElectionGame, MockExecutor, TraceRecorder};
//!
//! # async fn example() -> tower_agora::Result<()> {
//! let game = LeaderElectionGame::new(3)?;
//! let recorder = TraceRecorder::new();
//! let report = game.run(MockExecutor::new(), &recorder).await?;
//!
//! println!("agreed: {} leader: {:?}", report.agreed, report.leader);
//! recorder.write_json("leader_election_trace.json")?;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod consensus;
pub mod conversation;
pub mod error;
pub mod executor;
pub mod games;
pub mod identity;
pub mod review;
pub mod sequencer;
pub mod trace;

pub use aggregate::{aggregate, AggregateScore, Dimension};
pub use config::{AgoraConfig, ConfigBuilder};
pub use consensus::{detect, parse_nomination, ConsensusVerdict};
pub use conversation::{AgentOutput, Conversation, ExecutorInput, Speaker, Turn};
pub use error::{AgoraError, Result};
pub use executor::{
    execute, AgentExecutor, ExecuteRequest, ExecutionResult, MockExecutor, OpenAIExecutor,
};
pub use identity::{AgentIdentity, OutputSchema, Roster};
pub use review::{
    collect_peer_checks, pairings, ConcurrencyLimit, Pairing, PeerReview, RatingMatrix,
    RatingRecord,
};
pub use sequencer::{deliberate, run_team_task, Deliberation, TeamOutputs};
pub use trace::{RecordingLayer, SpanKind, SpanRecord, TraceRecord, TraceRecorder};
