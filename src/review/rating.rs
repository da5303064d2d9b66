//! Reference-check ratings and the matrix that holds them.

use std::collections::BTreeMap;

use agora_derive::structured_output;
use serde::Serialize;
use serde_json::Value;

use crate::conversation::AgentOutput;
use crate::error::{AgoraError, Result};

/// One evaluator's view of one colleague. Every score is an integer from 1 (poor)
/// to 5 (excellent).
#[structured_output]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingRecord {
    #[schemars(range(min = 1, max = 5))]
    pub collaboration: u8,
    #[schemars(range(min = 1, max = 5))]
    pub handoff_clarity: u8,
    #[schemars(range(min = 1, max = 5))]
    pub reliability: u8,
    #[schemars(range(min = 1, max = 5))]
    pub communication: u8,
    #[schemars(range(min = 1, max = 5))]
    pub initiative: u8,
    #[schemars(range(min = 1, max = 5))]
    pub overall: u8,
    pub rationale: String,
}

impl RatingRecord {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Scores in dimension order: collaboration, handoff_clarity, reliability,
    /// communication, initiative, overall.
    pub fn scores(&self) -> [u8; 6] {
        [
            self.collaboration,
            self.handoff_clarity,
            self.reliability,
            self.communication,
            self.initiative,
            self.overall,
        ]
    }

    /// Read a record from an executor output, checking every score is in range.
    pub fn from_output(agent: &str, output: &AgentOutput) -> Result<Self> {
        let value = match output {
            AgentOutput::Structured(v) => v.clone(),
            AgentOutput::Text(t) => {
                serde_json::from_str::<Value>(t).map_err(|e| AgoraError::SchemaMismatch {
                    agent: agent.to_string(),
                    message: format!("reply is not a rating: {}", e),
                })?
            }
        };
        let record: RatingRecord =
            serde_json::from_value(value).map_err(|e| AgoraError::SchemaMismatch {
                agent: agent.to_string(),
                message: e.to_string(),
            })?;
        record.validate(agent)?;
        Ok(record)
    }

    fn validate(&self, agent: &str) -> Result<()> {
        let names = crate::aggregate::Dimension::ALL;
        for (dim, score) in names.iter().zip(self.scores()) {
            if !(Self::MIN..=Self::MAX).contains(&score) {
                return Err(AgoraError::SchemaMismatch {
                    agent: agent.to_string(),
                    message: format!("{} = {} is outside 1..=5", dim.name(), score),
                });
            }
        }
        Ok(())
    }
}

/// Ordered (evaluator, subject) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pairing {
    pub evaluator: String,
    pub subject: String,
}

impl Pairing {
    pub fn new(evaluator: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            evaluator: evaluator.into(),
            subject: subject.into(),
        }
    }
}

/// evaluator → subject → rating. Never holds a self-rating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RatingMatrix {
    cells: BTreeMap<String, BTreeMap<String, RatingRecord>>,
}

impl RatingMatrix {
    /// Assemble a matrix from finished cells. Self-ratings and repeated cells are
    /// rejected.
    pub fn from_cells(cells: impl IntoIterator<Item = (Pairing, RatingRecord)>) -> Result<Self> {
        let mut matrix = RatingMatrix::default();
        for (pairing, record) in cells {
            if pairing.evaluator == pairing.subject {
                return Err(AgoraError::SchemaMismatch {
                    agent: pairing.evaluator,
                    message: "self-rating is not allowed".to_string(),
                });
            }
            let row = matrix.cells.entry(pairing.evaluator.clone()).or_default();
            if row.contains_key(&pairing.subject) {
                return Err(AgoraError::SchemaMismatch {
                    agent: pairing.evaluator,
                    message: format!("duplicate rating of {}", pairing.subject),
                });
            }
            row.insert(pairing.subject, record);
        }
        Ok(matrix)
    }

    pub fn get(&self, evaluator: &str, subject: &str) -> Option<&RatingRecord> {
        self.cells.get(evaluator).and_then(|row| row.get(subject))
    }

    /// Ratings given by `evaluator`.
    pub fn row(&self, evaluator: &str) -> Option<&BTreeMap<String, RatingRecord>> {
        self.cells.get(evaluator)
    }

    /// Ratings received by `subject`.
    pub fn received_by<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a RatingRecord> {
        self.cells.values().filter_map(move |row| row.get(subject))
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All cells as `(evaluator, subject, rating)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &RatingRecord)> {
        self.cells.iter().flat_map(|(evaluator, row)| {
            row.iter()
                .map(move |(subject, r)| (evaluator.as_str(), subject.as_str(), r))
        })
    }

    /// Flattened ratings, ready for aggregation.
    pub fn records(&self) -> impl Iterator<Item = &RatingRecord> {
        self.cells.values().flat_map(BTreeMap::values)
    }

    /// Whether every ordered pair of distinct `names` has a cell.
    pub fn is_complete<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        let names: Vec<&str> = names.into_iter().collect();
        let n = names.len();
        self.len() == n * n.saturating_sub(1)
            && names.iter().all(|e| {
                names
                    .iter()
                    .filter(|s| *s != e)
                    .all(|s| self.get(e, s).is_some())
            })
    }
}
