//! Loss-record lookup: the read-only view the enricher joins against.

use serde::{Deserialize, Serialize};

use crate::error::EnrichError;

/// One farmer's sampled loss within a village.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    pub village: String,
    pub farmer_name: Option<String>,
    /// Fraction, e.g. 0.3 for 30 %.
    pub loss_percentage: Option<f64>,
    /// Mean loss of all samples with the same reported loss level.
    pub avg_loss_same_level: Option<f64>,
}

impl LossRecord {
    pub fn new(village: &str, farmer_name: Option<&str>, loss_percentage: Option<f64>, avg_loss_same_level: Option<f64>) -> Self {
        Self {
            village: village.to_string(),
            farmer_name: farmer_name.map(str::to_string),
            loss_percentage,
            avg_loss_same_level,
        }
    }

    /// Trimmed farmer name; blank names never take part in a join.
    pub fn join_key(&self) -> Option<&str> {
        self.farmer_name.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Village-scoped record source.
///
/// Results keep the store's insertion order; an unknown village yields an
/// empty list, never an error.
pub trait LossStore {
    fn find_by_village(&self, village: &str) -> Result<Vec<LossRecord>, EnrichError>;
}

/// In-memory store, mainly for tests and small fixed datasets.
#[derive(Debug, Clone, Default)]
pub struct MemoryLossStore {
    records: Vec<LossRecord>,
}

impl MemoryLossStore {
    pub fn new(records: Vec<LossRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: LossRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LossStore for MemoryLossStore {
    fn find_by_village(&self, village: &str) -> Result<Vec<LossRecord>, EnrichError> {
        let village = village.trim();
        Ok(self.records.iter().filter(|r| r.village == village).cloned().collect())
    }
}
