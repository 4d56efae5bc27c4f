use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use riyal_core::instruction::{Acknowledgment, SignedInstruction};
use riyal_core::types::Address;

use crate::config::Endpoint;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("rate limited by endpoint")]
    RateLimited,

    #[error("account not found: {0}")]
    NotFound(String),

    #[error("ledger rejected instruction: {0}")]
    Rejected(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("unexpected response: {0}")]
    Protocol(String),
}

/// The two calls the treasury needs from a ledger node.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Native balance of `address` in base units.
    async fn get_balance(&self, address: &Address) -> Result<u64, TransportError>;

    /// Submit a signed instruction and wait for the node to accept it.
    async fn submit(&self, signed: &SignedInstruction) -> Result<Acknowledgment, TransportError>;
}

/// Builds a fresh transport for an endpoint. Called once per connection.
pub trait TransportFactory: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> Arc<dyn LedgerTransport>;
}
