//! Nomination consensus
//!
//! Each agent's final utterance is scanned for the first `Agent_<digits>` token,
//! which counts as that agent's nomination. The round is agreed when at least one
//! nomination was parsed and all parsed nominations name the same agent.
//! Utterances without a token are left out rather than counted as dissent.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::sequencer::TeamOutputs;

fn nomination_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Agent_[0-9]+").expect("static nomination pattern"))
}

/// First nomination token in `text`, if any.
pub fn parse_nomination(text: &str) -> Option<&str> {
    nomination_pattern().find(text).map(|m| m.as_str())
}

/// Result of a single detection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsensusVerdict {
    pub agreed: bool,
    /// Distinct nominees across all parsed utterances.
    pub nominees: BTreeSet<String>,
    /// Per-agent nomination; `None` when the utterance had no token.
    pub nominations: BTreeMap<String, Option<String>>,
}

impl ConsensusVerdict {
    /// The agreed leader.
    pub fn leader(&self) -> Option<&str> {
        if self.agreed {
            self.nominees.iter().next().map(String::as_str)
        } else {
            None
        }
    }

    /// True when not a single utterance contained a nomination.
    pub fn is_silent(&self) -> bool {
        self.nominees.is_empty()
    }
}

pub fn detect(outputs: &TeamOutputs) -> ConsensusVerdict {
    let nominations: BTreeMap<String, Option<String>> = outputs
        .iter()
        .map(|(agent, text)| (agent.to_string(), parse_nomination(text).map(str::to_string)))
        .collect();
    let nominees: BTreeSet<String> = nominations.values().flatten().cloned().collect();
    let agreed = nominees.len() == 1;
    debug!(agreed, nominees = ?nominees, "consensus checked");
    ConsensusVerdict {
        agreed,
        nominees,
        nominations,
    }
}
