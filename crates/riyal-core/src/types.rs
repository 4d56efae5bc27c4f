use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::PUBLIC_KEY_LEN;
use crate::error::TreasuryError;

/// Token amount in the mint's base units.
pub type Amount = u64;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

// ── Address ──────────────────────────────────────────────────────────────────

/// 32-byte ledger address: an Ed25519 public key, displayed as base-58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; PUBLIC_KEY_LEN]);

impl Address {
    pub fn from_bytes(b: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, TreasuryError> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| TreasuryError::InvalidAddress(format!("{s}: {e}")))?;
        let arr: [u8; PUBLIC_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            TreasuryError::InvalidAddress(format!(
                "{s}: expected {PUBLIC_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// First `n` characters of the base-58 form, for file names and logs.
    pub fn short(&self, n: usize) -> String {
        self.to_b58().chars().take(n).collect()
    }
}

impl FromStr for Address {
    type Err = TreasuryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_b58(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short(8))
    }
}

// ── ClusterIdentity ──────────────────────────────────────────────────────────

/// The three networks a treasury session can point at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterIdentity {
    Production,
    #[default]
    Staging,
    Test,
}

impl ClusterIdentity {
    pub const ALL: [ClusterIdentity; 3] = [
        ClusterIdentity::Production,
        ClusterIdentity::Staging,
        ClusterIdentity::Test,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterIdentity::Production => "production",
            ClusterIdentity::Staging => "staging",
            ClusterIdentity::Test => "test",
        }
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterIdentity {
    type Err = TreasuryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "mainnet" | "mainnet-beta" => Ok(ClusterIdentity::Production),
            "staging" | "devnet" => Ok(ClusterIdentity::Staging),
            "test" | "testnet" => Ok(ClusterIdentity::Test),
            other => Err(TreasuryError::Other(format!("unknown cluster: {other}"))),
        }
    }
}

// ── AuthorityKind ────────────────────────────────────────────────────────────

/// The two revocable capabilities a treasury holds over a mint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityKind {
    Mint,
    Freeze,
}

impl fmt::Display for AuthorityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorityKind::Mint => f.write_str("mint"),
            AuthorityKind::Freeze => f.write_str("freeze"),
        }
    }
}

impl FromStr for AuthorityKind {
    type Err = TreasuryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mint" => Ok(AuthorityKind::Mint),
            "freeze" => Ok(AuthorityKind::Freeze),
            other => Err(TreasuryError::Other(format!("unknown authority kind: {other}"))),
        }
    }
}
