//! riyal-airdrop
//!
//! Bulk distribution: parse a free-form recipient list, cut it into
//! ledger-sized batches, and pay them out one transaction per batch.

pub mod batch;
pub mod executor;
pub mod recipients;

pub use batch::{plan, BatchStatus, DistributionBatch};
pub use executor::{DistributionEngine, DistributionReport};
pub use recipients::{
    parse_recipients, parse_token_amount, LineError, ParsedRecipients, RecipientEntry, RejectedLine,
};
