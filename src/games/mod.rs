//! Ready-made societies built on the sequencer, consensus and review modules.
//!
//! - [`leader_election`]: agents with private scores deliberate until they name a leader
//! - [`refcheck`]: a team works on shared tasks, then reference-checks each other

pub mod leader_election;
pub mod refcheck;

pub use leader_election::{ElectionReport, LeaderElectionGame};
pub use refcheck::{ArenaReport, RefCheckArena, RoundReport};
