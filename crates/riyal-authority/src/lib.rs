//! riyal-authority
//!
//! Per-mint authority state machine and the two-phase protocol that drives
//! every mutating token operation through the ledger.

pub mod confirm;
pub mod engine;

pub use confirm::{AlwaysConfirm, ConfirmIrreversible, IrreversibleAction};
pub use engine::{Receipt, TokenAuthorityEngine};
