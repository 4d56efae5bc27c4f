use thiserror::Error;

use crate::types::{Address, AuthorityKind, ClusterIdentity};

/// Reasons a piece of secret-key material was refused on import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("secret key must be {expected} bytes, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("unsupported key format: use a hex string or a [u8] array")]
    UnsupportedFormat,

    #[error("malformed byte array: {0}")]
    MalformedByteArray(String),

    #[error("secret key does not derive the public key it claims")]
    KeyMismatch,

    #[error("wallet record carries no secret key")]
    MissingSecretKey,
}

#[derive(Debug, Error)]
pub enum TreasuryError {
    // ── Credential errors ────────────────────────────────────────────────────
    #[error("invalid key encoding: {0}")]
    InvalidEncoding(#[from] EncodingError),

    #[error("wallet {0} is managed by an external extension; no secret key is held")]
    ExtensionManaged(Address),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    // ── Token authority errors ───────────────────────────────────────────────
    #[error("invalid token metadata: {0}")]
    InvalidMetadata(String),

    #[error("unknown mint: {0}")]
    UnknownMint(Address),

    #[error("{kind} authority for mint {mint} has been revoked")]
    AuthorityRevoked { mint: Address, kind: AuthorityKind },

    #[error("{kind} authority for mint {mint} is already revoked")]
    AlreadyRevoked { mint: Address, kind: AuthorityKind },

    #[error("insufficient treasury balance: need {need}, have {have}")]
    InsufficientBalance { need: u64, have: u64 },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("irreversible action was not confirmed")]
    NotConfirmed,

    // ── Submission errors ────────────────────────────────────────────────────
    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("result discarded: issued on {issued} but session moved on")]
    StaleResult { issued: ClusterIdentity },

    #[error("transport error: {0}")]
    Transport(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl TreasuryError {
    /// True when the caller may retry the whole operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TreasuryError::SubmissionFailed(_) | TreasuryError::StaleResult { .. }
        )
    }

    /// True when the outcome leaves state exactly as the caller wanted it.
    pub fn is_noop(&self) -> bool {
        matches!(self, TreasuryError::AlreadyRevoked { .. })
    }
}

pub type TreasuryResult<T> = Result<T, TreasuryError>;
