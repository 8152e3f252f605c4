//! Finalized batches and the newest-first history ledger.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use printqc_core::types::SLOT_COUNT;

/// Batch identifier derived from the completion time in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub i64);

impl BatchId {
    /// Id for a batch completed at `at`, kept strictly above `previous`.
    pub fn at(at: DateTime<Utc>, previous: Option<BatchId>) -> Self {
        let millis = at.timestamp_millis();
        match previous {
            Some(BatchId(prev)) if millis <= prev => BatchId(prev + 1),
            _ => BatchId(millis),
        }
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable record of one printed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub start_seq: u64,
    pub end_seq: u64,
    pub values: [String; SLOT_COUNT],
    pub completed_at: DateTime<Utc>,
}

impl Batch {
    /// `start_seq` is at most `MAX_START_SEQUENCE`; the controller enforces it.
    pub fn new(
        id: BatchId,
        start_seq: u64,
        values: [String; SLOT_COUNT],
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            start_seq,
            end_seq: start_seq + SLOT_COUNT as u64 - 1,
            values,
            completed_at,
        }
    }

    /// Absolute sequence number of the slot at `index`.
    pub fn sequence_of(&self, index: usize) -> u64 {
        self.start_seq + index as u64
    }
}

/// One row of the export contract: a single slot of a single batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub timestamp: DateTime<Utc>,
    pub batch_id: BatchId,
    pub sequence: u64,
    pub label: String,
    pub value: String,
}

/// Append-only batch history, newest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryLedger {
    batches: VecDeque<Batch>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch as the newest entry.
    pub fn append(&mut self, batch: Batch) {
        self.batches.push_front(batch);
    }

    /// Batches, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Batch> {
        self.batches.iter()
    }

    pub fn latest(&self) -> Option<&Batch> {
        self.batches.front()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Batch> {
        self.batches.iter().cloned().collect()
    }

    /// Flatten the ledger into export rows: batches newest first, each
    /// batch's slots in index order.
    pub fn export_rows(&self, labels: &[String; SLOT_COUNT]) -> Vec<ExportRow> {
        self.batches
            .iter()
            .flat_map(|batch| {
                batch
                    .values
                    .iter()
                    .enumerate()
                    .map(move |(index, value)| ExportRow {
                        timestamp: batch.completed_at,
                        batch_id: batch.id,
                        sequence: batch.sequence_of(index),
                        label: labels[index].clone(),
                        value: value.clone(),
                    })
            })
            .collect()
    }
}
