//! riyal-recovery
//!
//! Wallet recovery and identity linking through an external verification
//! service. The service proves control of an email address or phone number
//! and hands back the wallet record linked to it; nothing it returns is
//! trusted until it passes the credential derivation check.

pub mod flow;
pub mod http;
pub mod identifier;
pub mod service;

pub use flow::{link_identity, recover_wallet, request_code, RecoveredWallet};
pub use http::HttpRecoveryLink;
pub use identifier::Identifier;
pub use service::{RecoveryError, RecoveryLinkService};
