use async_trait::async_trait;
use thiserror::Error;

use riyal_core::error::TreasuryError;
use riyal_core::types::Address;
use riyal_core::wallet::WalletRecord;

use crate::identifier::Identifier;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("verification code must be at least {min} characters")]
    CodeTooShort { min: usize },

    #[error("code not accepted or no wallet linked to {0}")]
    NotVerified(String),

    #[error("recovery service declined the request")]
    Declined,

    #[error("recovered wallet failed validation: {0}")]
    InvalidWallet(#[from] TreasuryError),

    #[error("recovery service error: {0}")]
    Service(String),
}

/// External identity verification and wallet lookup.
///
/// Implementations only move data; the caller validates any wallet returned.
#[async_trait]
pub trait RecoveryLinkService: Send + Sync {
    /// Send a one-time code to `identifier`. `Ok(false)` if the service
    /// refused to send one.
    async fn request_code(&self, identifier: &Identifier) -> Result<bool, RecoveryError>;

    /// Check `code` and return the wallet linked to `identifier`, if any.
    async fn verify_code(
        &self,
        identifier: &Identifier,
        code: &str,
    ) -> Result<Option<WalletRecord>, RecoveryError>;

    /// Link a wallet to a recovery email and phone.
    async fn link_identity(
        &self,
        public_key: &Address,
        email: &Identifier,
        phone: &Identifier,
    ) -> Result<bool, RecoveryError>;
}
