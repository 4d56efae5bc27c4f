use riyal_core::constants::DISTRIBUTION_BATCH_CAP;
use riyal_core::instruction::Transfer;
use riyal_core::types::{Address, Amount};
use riyal_crypto::batch_idempotency_key;

use crate::recipients::RecipientEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

/// Up to `DISTRIBUTION_BATCH_CAP` transfers sent as one ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionBatch {
    pub sequence_index: usize,
    pub entries: Vec<RecipientEntry>,
    pub status: BatchStatus,
    pub failure_reason: Option<String>,
    /// Ledger signature once confirmed.
    pub signature: Option<String>,
}

impl DistributionBatch {
    pub fn new(sequence_index: usize, entries: Vec<RecipientEntry>) -> Self {
        Self {
            sequence_index,
            entries,
            status: BatchStatus::Pending,
            failure_reason: None,
            signature: None,
        }
    }

    pub fn total(&self) -> Amount {
        self.entries
            .iter()
            .fold(0, |acc: Amount, e| acc.saturating_add(e.amount))
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.entries.iter().map(Transfer::from).collect()
    }

    /// Same for every attempt at this batch on `mint`.
    pub fn idempotency_key(&self, mint: &Address) -> [u8; 32] {
        batch_idempotency_key(mint, self.sequence_index, &self.transfers())
    }

    /// Back to Pending, keeping position and entries.
    pub fn reset(&mut self) {
        self.status = BatchStatus::Pending;
        self.failure_reason = None;
        self.signature = None;
    }
}

/// Cut `entries` into order-preserving chunks of at most
/// `DISTRIBUTION_BATCH_CAP`.
pub fn plan(entries: Vec<RecipientEntry>) -> Vec<DistributionBatch> {
    entries
        .chunks(DISTRIBUTION_BATCH_CAP)
        .enumerate()
        .map(|(i, chunk)| DistributionBatch::new(i, chunk.to_vec()))
        .collect()
}
