//! Per-dimension averages of reference-check ratings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::review::RatingRecord;

/// A scored aspect of a colleague's work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Collaboration,
    HandoffClarity,
    Reliability,
    Communication,
    Initiative,
    Overall,
}

impl Dimension {
    /// Same order as [`RatingRecord::scores`].
    pub const ALL: [Dimension; 6] = [
        Dimension::Collaboration,
        Dimension::HandoffClarity,
        Dimension::Reliability,
        Dimension::Communication,
        Dimension::Initiative,
        Dimension::Overall,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Collaboration => "collaboration",
            Dimension::HandoffClarity => "handoff_clarity",
            Dimension::Reliability => "reliability",
            Dimension::Communication => "communication",
            Dimension::Initiative => "initiative",
            Dimension::Overall => "overall",
        }
    }
}

/// Arithmetic mean of each dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateScore {
    pub collaboration: f64,
    pub handoff_clarity: f64,
    pub reliability: f64,
    pub communication: f64,
    pub initiative: f64,
    pub overall: f64,
}

impl AggregateScore {
    pub fn get(&self, dim: Dimension) -> f64 {
        match dim {
            Dimension::Collaboration => self.collaboration,
            Dimension::HandoffClarity => self.handoff_clarity,
            Dimension::Reliability => self.reliability,
            Dimension::Communication => self.communication,
            Dimension::Initiative => self.initiative,
            Dimension::Overall => self.overall,
        }
    }

    /// Dimension name → mean.
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        Dimension::ALL
            .iter()
            .map(|d| (d.name(), self.get(*d)))
            .collect()
    }
}

/// Average `records`; an empty collection averages to 0.0 everywhere.
pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a RatingRecord>) -> AggregateScore {
    let mut totals = [0u64; 6];
    let mut count = 0u64;
    for record in records {
        for (total, score) in totals.iter_mut().zip(record.scores()) {
            *total += u64::from(score);
        }
        count += 1;
    }
    if count == 0 {
        return AggregateScore::default();
    }
    let mean = |i: usize| totals[i] as f64 / count as f64;
    AggregateScore {
        collaboration: mean(0),
        handoff_clarity: mean(1),
        reliability: mean(2),
        communication: mean(3),
        initiative: mean(4),
        overall: mean(5),
    }
}
