use serde::{Deserialize, Serialize};

use crate::constants::MAX_TOKEN_DECIMALS;
use crate::error::TreasuryError;
use crate::types::{Address, Amount, AuthorityKind};

fn default_true() -> bool {
    true
}

// ── TokenMetadata ────────────────────────────────────────────────────────────

/// Parameters for a new mint, as entered by the operator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    /// Initial supply in base units, credited to the treasury.
    pub supply: Amount,
    /// Keep the mint authority after creation.
    #[serde(default = "default_true")]
    pub mint_authority: bool,
    /// Keep the freeze authority after creation.
    #[serde(default = "default_true")]
    pub freeze_authority: bool,
}

impl TokenMetadata {
    pub fn validate(&self) -> Result<(), TreasuryError> {
        if self.decimals > MAX_TOKEN_DECIMALS {
            return Err(TreasuryError::InvalidMetadata(format!(
                "decimals must be between 0 and {MAX_TOKEN_DECIMALS}, got {}",
                self.decimals
            )));
        }
        if self.name.trim().is_empty() {
            return Err(TreasuryError::InvalidMetadata("name must not be empty".into()));
        }
        if self.symbol.trim().is_empty() {
            return Err(TreasuryError::InvalidMetadata("symbol must not be empty".into()));
        }
        Ok(())
    }
}

// ── TokenTransition ──────────────────────────────────────────────────────────

/// A local state change the engine applies once the ledger acknowledges it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenTransition {
    Mint(Amount),
    Burn(Amount),
    Revoke(AuthorityKind),
    /// Freeze or thaw a holder account; ledger-side only.
    Freeze,
    /// Treasury pays out `Amount` in total to other holders.
    Transfer(Amount),
}

// ── ManagedToken ─────────────────────────────────────────────────────────────

/// The treasury's view of one mint it administers.
///
/// Authority flags only ever move from active to revoked.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagedToken {
    pub mint_address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub supply: Amount,
    pub treasury_balance: Amount,
    pub mint_authority_active: bool,
    pub freeze_authority_active: bool,
}

impl ManagedToken {
    /// Build the record for a freshly created mint. Metadata must be valid.
    pub fn from_metadata(mint_address: Address, meta: &TokenMetadata) -> Result<Self, TreasuryError> {
        meta.validate()?;
        Ok(Self {
            mint_address,
            name: meta.name.trim().to_string(),
            symbol: meta.symbol.trim().to_uppercase(),
            decimals: meta.decimals,
            supply: meta.supply,
            treasury_balance: meta.supply,
            mint_authority_active: meta.mint_authority,
            freeze_authority_active: meta.freeze_authority,
        })
    }

    pub fn authority_active(&self, kind: AuthorityKind) -> bool {
        match kind {
            AuthorityKind::Mint => self.mint_authority_active,
            AuthorityKind::Freeze => self.freeze_authority_active,
        }
    }

    /// Both authorities revoked: nothing administrative is left to do.
    pub fn is_terminal(&self) -> bool {
        !self.mint_authority_active && !self.freeze_authority_active
    }

    /// Check the guard for `t` without changing anything.
    pub fn check(&self, t: &TokenTransition) -> Result<(), TreasuryError> {
        match *t {
            TokenTransition::Mint(amount) => {
                if !self.mint_authority_active {
                    return Err(self.revoked(AuthorityKind::Mint));
                }
                if amount == 0 {
                    return Err(TreasuryError::ZeroAmount);
                }
                if self.supply.checked_add(amount).is_none() {
                    return Err(TreasuryError::InvalidAmount(format!(
                        "minting {amount} would overflow supply {}",
                        self.supply
                    )));
                }
                Ok(())
            }
            TokenTransition::Burn(amount) | TokenTransition::Transfer(amount) => {
                if amount == 0 {
                    return Err(TreasuryError::ZeroAmount);
                }
                if amount > self.treasury_balance {
                    return Err(TreasuryError::InsufficientBalance {
                        need: amount,
                        have: self.treasury_balance,
                    });
                }
                Ok(())
            }
            TokenTransition::Revoke(kind) => {
                if !self.authority_active(kind) {
                    return Err(TreasuryError::AlreadyRevoked {
                        mint: self.mint_address,
                        kind,
                    });
                }
                Ok(())
            }
            TokenTransition::Freeze => {
                if !self.freeze_authority_active {
                    return Err(self.revoked(AuthorityKind::Freeze));
                }
                Ok(())
            }
        }
    }

    /// Check and apply `t`. On error the token is unchanged.
    pub fn apply(&mut self, t: &TokenTransition) -> Result<(), TreasuryError> {
        self.check(t)?;
        match *t {
            TokenTransition::Mint(amount) => {
                self.supply += amount;
                self.treasury_balance = self.treasury_balance.saturating_add(amount);
            }
            TokenTransition::Burn(amount) => {
                self.supply -= amount;
                self.treasury_balance -= amount;
            }
            TokenTransition::Transfer(amount) => {
                self.treasury_balance -= amount;
            }
            TokenTransition::Revoke(AuthorityKind::Mint) => self.mint_authority_active = false,
            TokenTransition::Revoke(AuthorityKind::Freeze) => self.freeze_authority_active = false,
            TokenTransition::Freeze => {}
        }
        Ok(())
    }

    fn revoked(&self, kind: AuthorityKind) -> TreasuryError {
        TreasuryError::AuthorityRevoked {
            mint: self.mint_address,
            kind,
        }
    }
}
