//! Record ordering and occurrence tracking.
//!
//! Every marshal or unmarshal call first asks the tracker whether the record
//! may appear now ([`OccurrenceTracker::check`]), processes the record, and
//! only then records the occurrence ([`OccurrenceTracker::commit`]). A failed
//! record therefore leaves the counters untouched.

use recmap_schema::RecordDefinition;
use thiserror::Error;
use tracing::trace;

/// Occurrence and ordering violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OccurrenceError {
    #[error("Record '{0}' is not declared in this stream")]
    UnknownRecord(String),

    #[error("Record '{record}' cannot appear after '{current}'")]
    OutOfOrder { record: String, current: String },

    #[error("Record '{record}' skips mandatory record '{missing}'")]
    MissingRecord { record: String, missing: String },

    #[error("Record '{record}' exceeds its maximum of {max} occurrences")]
    TooManyOccurrences { record: String, max: usize },

    #[error("Record '{record}' occurs {count} times, minimum required is {min}")]
    Incomplete {
        record: String,
        count: usize,
        min: usize,
    },
}

/// Occurrence bounds of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceRule {
    pub record: String,
    pub min_occurs: usize,
    pub max_occurs: Option<usize>,
}

impl From<&RecordDefinition> for OccurrenceRule {
    fn from(record: &RecordDefinition) -> Self {
        Self {
            record: record.name.clone(),
            min_occurs: record.min_occurs,
            max_occurs: record.max_occurs,
        }
    }
}

/// Position of the tracker in the declared record order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OccurrenceState {
    /// No record processed since creation or the last reset
    #[default]
    Idle,
    /// The last record processed and how often it has occurred
    AwaitingRecord { index: usize, occurrence: usize },
}

/// An accepted but not yet committed occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Transition {
    pub index: usize,
    pub occurrence: usize,
}

/// Per-stream occurrence state machine
#[derive(Debug, Clone)]
pub struct OccurrenceTracker {
    rules: Vec<OccurrenceRule>,
    ordered: bool,
    state: OccurrenceState,
    counts: Vec<usize>,
}

impl OccurrenceTracker {
    /// Create a tracker over records in declaration order
    pub fn new(rules: Vec<OccurrenceRule>, ordered: bool) -> Self {
        let counts = vec![0; rules.len()];
        Self {
            rules,
            ordered,
            state: OccurrenceState::Idle,
            counts,
        }
    }

    pub fn state(&self) -> OccurrenceState {
        self.state
    }

    /// Index of the last committed record
    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            OccurrenceState::Idle => None,
            OccurrenceState::AwaitingRecord { index, .. } => Some(index),
        }
    }

    /// Times a record has been committed
    pub fn count(&self, index: usize) -> usize {
        self.counts.get(index).copied().unwrap_or(0)
    }

    /// Decide whether a record may occur now, without changing any state.
    ///
    /// # Errors
    ///
    /// Returns an [`OccurrenceError`] when the record is unknown, appears out
    /// of order, skips a record whose minimum is unmet, or exceeds its
    /// maximum.
    pub fn check(&self, record: &str) -> Result<Transition, OccurrenceError> {
        let index = self
            .rules
            .iter()
            .position(|r| r.record == record)
            .ok_or_else(|| OccurrenceError::UnknownRecord(record.to_string()))?;

        if self.ordered {
            let start = self.current_index().unwrap_or(0);
            if index < start {
                return Err(OccurrenceError::OutOfOrder {
                    record: record.to_string(),
                    current: self.rules[start].record.clone(),
                });
            }
            if let Some(skipped) = (start..index).find(|&k| self.counts[k] < self.rules[k].min_occurs)
            {
                return Err(OccurrenceError::MissingRecord {
                    record: record.to_string(),
                    missing: self.rules[skipped].record.clone(),
                });
            }
        }

        let occurrence = self.counts[index] + 1;
        if let Some(max) = self.rules[index].max_occurs {
            if occurrence > max {
                return Err(OccurrenceError::TooManyOccurrences {
                    record: record.to_string(),
                    max,
                });
            }
        }
        Ok(Transition { index, occurrence })
    }

    /// Record an accepted occurrence
    pub fn commit(&mut self, transition: Transition) {
        if let Some(count) = self.counts.get_mut(transition.index) {
            *count = transition.occurrence;
            self.state = OccurrenceState::AwaitingRecord {
                index: transition.index,
                occurrence: transition.occurrence,
            };
            trace!(
                record = %self.rules[transition.index].record,
                occurrence = transition.occurrence,
                "Committed record occurrence"
            );
        }
    }

    /// Check that every record reached its minimum, as at end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`OccurrenceError::Incomplete`] for the first record below its
    /// minimum.
    pub fn verify_complete(&self) -> Result<(), OccurrenceError> {
        match self
            .rules
            .iter()
            .zip(&self.counts)
            .find(|(rule, count)| **count < rule.min_occurs)
        {
            Some((rule, count)) => Err(OccurrenceError::Incomplete {
                record: rule.record.clone(),
                count: *count,
                min: rule.min_occurs,
            }),
            None => Ok(()),
        }
    }

    /// Forget every occurrence
    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.state = OccurrenceState::Idle;
    }
}
