use std::sync::Arc;

use tracing::{info, warn};

use riyal_authority::TokenAuthorityEngine;
use riyal_core::types::Address;

use crate::batch::{BatchStatus, DistributionBatch};
use crate::recipients::RecipientEntry;

/// Pays out planned batches through the authority engine's transfer
/// primitive, one ledger transaction per batch, strictly in order.
pub struct DistributionEngine {
    authority: Arc<TokenAuthorityEngine>,
}

impl DistributionEngine {
    pub fn new(authority: Arc<TokenAuthorityEngine>) -> Self {
        Self { authority }
    }

    /// Run every batch given, in order. A failed batch is recorded and the
    /// run continues. Batches are executed as given, Confirmed ones included;
    /// use [`DistributionReport::retry_plan`] to re-run only what is left.
    pub async fn execute(&self, mint: &Address, batches: Vec<DistributionBatch>) -> DistributionReport {
        let count = batches.len();
        info!(%mint, batches = count, "distribution started");

        let mut done = Vec::with_capacity(count);
        for mut batch in batches {
            batch.status = BatchStatus::Submitted;
            let key = batch.idempotency_key(mint);
            match self
                .authority
                .transfer_batch(mint, &batch.transfers(), Some(key))
                .await
            {
                Ok(receipt) => {
                    info!(
                        %mint,
                        batch = batch.sequence_index,
                        recipients = batch.entries.len(),
                        signature = %receipt.signature,
                        "batch confirmed"
                    );
                    batch.status = BatchStatus::Confirmed;
                    batch.signature = Some(receipt.signature);
                    batch.failure_reason = None;
                }
                Err(e) => {
                    warn!(%mint, batch = batch.sequence_index, error = %e, "batch failed");
                    batch.status = BatchStatus::Failed;
                    batch.failure_reason = Some(e.to_string());
                }
            }
            done.push(batch);
        }

        let report = DistributionReport {
            mint: *mint,
            batches: done,
        };
        info!(
            %mint,
            confirmed = report.confirmed().count(),
            failed = report.failed().count(),
            "distribution finished"
        );
        report
    }
}

/// Per-batch outcome of one distribution run.
#[derive(Debug, Clone)]
pub struct DistributionReport {
    pub mint: Address,
    pub batches: Vec<DistributionBatch>,
}

impl DistributionReport {
    pub fn confirmed(&self) -> impl Iterator<Item = &DistributionBatch> {
        self.batches.iter().filter(|b| b.status == BatchStatus::Confirmed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &DistributionBatch> {
        self.batches.iter().filter(|b| b.status == BatchStatus::Failed)
    }

    pub fn is_complete(&self) -> bool {
        self.batches.iter().all(|b| b.status == BatchStatus::Confirmed)
    }

    /// Sum actually paid out.
    pub fn confirmed_amount(&self) -> u128 {
        self.confirmed().map(|b| b.total() as u128).sum()
    }

    pub fn failed_amount(&self) -> u128 {
        self.failed().map(|b| b.total() as u128).sum()
    }

    /// Every recipient in a Confirmed batch, in list order.
    pub fn paid_recipients(&self) -> Vec<&RecipientEntry> {
        self.confirmed().flat_map(|b| b.entries.iter()).collect()
    }

    /// Non-Confirmed batches reset to Pending, ready for another `execute`.
    /// Each keeps its sequence index and so its idempotency key.
    pub fn retry_plan(&self) -> Vec<DistributionBatch> {
        self.batches
            .iter()
            .filter(|b| b.status != BatchStatus::Confirmed)
            .cloned()
            .map(|mut b| {
                b.reset();
                b
            })
            .collect()
    }
}
