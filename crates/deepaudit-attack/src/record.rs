//! # Attack Records
//!
//! Every executed attack produces one [`AttackRecord`]. Records are kept in
//! an append-only [`AttackLog`] and keyed by `(kind, sequence)`, so running
//! the same kind twice in one session keeps both outcomes.

use std::collections::BTreeMap;

use deepaudit_core::Identity;
use serde::{Deserialize, Serialize};

use crate::attack::AttackKind;

/// Outcome of one attack execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackRecord {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    /// Attack kind.
    pub kind: AttackKind,
    /// Targeted identities; the primary victim first.
    pub targets: Vec<Identity>,
    /// Scalar attack parameters.
    pub parameters: BTreeMap<String, f64>,
    /// Cosine between the primary victim's Protected vector before and after.
    pub similarity_to_original: f64,
    /// Cosine between the victim's Clean and Protected vectors before the attack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_before: Option<f64>,
    /// Cosine between the victim's Clean and Protected vectors after the attack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_after: Option<f64>,
    /// Cosine between the morphed vector and the morph target. Gradient
    /// morph only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_to_target: Option<f64>,
    /// Whether similarity-based integrity checks are expected to notice.
    pub detectable: bool,
}

impl AttackRecord {
    /// The `(kind, sequence)` key.
    pub fn key(&self) -> (AttackKind, u64) {
        (self.kind, self.sequence)
    }
}

/// Append-only sequence of attack records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttackLog {
    records: Vec<AttackRecord>,
}

impl AttackLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next record will receive.
    pub fn next_sequence(&self) -> u64 {
        self.records.len() as u64
    }

    /// Append a record, assigning its sequence number.
    pub fn append(&mut self, mut record: AttackRecord) -> &AttackRecord {
        record.sequence = self.next_sequence();
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// All records in execution order.
    pub fn records(&self) -> &[AttackRecord] {
        &self.records
    }

    /// Records of one kind, in execution order.
    pub fn by_kind(&self, kind: AttackKind) -> impl Iterator<Item = &AttackRecord> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    /// Look a record up by its `(kind, sequence)` key.
    pub fn get(&self, kind: AttackKind, sequence: u64) -> Option<&AttackRecord> {
        self.records
            .get(usize::try_from(sequence).ok()?)
            .filter(|r| r.kind == kind)
    }

    /// Number of records flagged detectable.
    pub fn detectable_count(&self) -> usize {
        self.records.iter().filter(|r| r.detectable).count()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the log into its records.
    pub fn into_records(self) -> Vec<AttackRecord> {
        self.records
    }
}
