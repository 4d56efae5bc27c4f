use serde::{Deserialize, Serialize};

use crate::error::TreasuryError;
use crate::types::{Address, Amount, AuthorityKind, Timestamp};

/// One leg of a batched transfer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    pub to: Address,
    pub amount: Amount,
}

/// Every ledger write the treasury issues is one of these.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Instruction {
    /// Create a new mint and credit `initial_supply` to the treasury.
    CreateMint {
        mint: Address,
        decimals: u8,
        initial_supply: Amount,
        mint_authority: Option<Address>,
        freeze_authority: Option<Address>,
    },

    MintTo {
        mint: Address,
        destination: Address,
        amount: Amount,
    },

    Burn {
        mint: Address,
        owner: Address,
        amount: Amount,
    },

    /// Set the authority to none. Irreversible on the ledger.
    RevokeAuthority {
        mint: Address,
        kind: AuthorityKind,
    },

    FreezeAccount {
        mint: Address,
        target: Address,
    },

    ThawAccount {
        mint: Address,
        target: Address,
    },

    /// Pay several recipients from the treasury in one transaction.
    TransferBatch {
        mint: Address,
        source: Address,
        transfers: Vec<Transfer>,
        /// Lets a ledger drop a batch it has already applied.
        idempotency_key: Option<[u8; 32]>,
    },
}

impl Instruction {
    pub fn mint(&self) -> &Address {
        match self {
            Instruction::CreateMint { mint, .. }
            | Instruction::MintTo { mint, .. }
            | Instruction::Burn { mint, .. }
            | Instruction::RevokeAuthority { mint, .. }
            | Instruction::FreezeAccount { mint, .. }
            | Instruction::ThawAccount { mint, .. }
            | Instruction::TransferBatch { mint, .. } => mint,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Instruction::CreateMint { .. } => "create_mint",
            Instruction::MintTo { .. } => "mint_to",
            Instruction::Burn { .. } => "burn",
            Instruction::RevokeAuthority { .. } => "revoke_authority",
            Instruction::FreezeAccount { .. } => "freeze_account",
            Instruction::ThawAccount { .. } => "thaw_account",
            Instruction::TransferBatch { .. } => "transfer_batch",
        }
    }
}

/// Borrowed view of the bytes a signer commits to.
#[derive(Serialize)]
pub struct SigningPayload<'a> {
    pub instruction: &'a Instruction,
    pub signer: &'a Address,
    pub issued_at: Timestamp,
}

impl SigningPayload<'_> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TreasuryError> {
        bincode::serialize(self).map_err(|e| TreasuryError::Serialization(e.to_string()))
    }
}

/// An instruction plus the treasury signature over its payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedInstruction {
    pub instruction: Instruction,
    pub signer: Address,
    pub issued_at: Timestamp,
    /// 64-byte Ed25519 signature.
    pub signature: Vec<u8>,
}

impl SignedInstruction {
    pub fn payload(&self) -> SigningPayload<'_> {
        SigningPayload {
            instruction: &self.instruction,
            signer: &self.signer,
            issued_at: self.issued_at,
        }
    }

    /// Hex-encoded bincode, the wire form the RPC transport sends.
    pub fn to_wire(&self) -> Result<String, TreasuryError> {
        let bytes = bincode::serialize(self).map_err(|e| TreasuryError::Serialization(e.to_string()))?;
        Ok(hex::encode(bytes))
    }

    pub fn from_wire(s: &str) -> Result<Self, TreasuryError> {
        let bytes = hex::decode(s).map_err(|e| TreasuryError::Serialization(e.to_string()))?;
        bincode::deserialize(&bytes).map_err(|e| TreasuryError::Serialization(e.to_string()))
    }
}

/// Ledger acknowledgment of a submitted instruction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Acknowledgment {
    /// Transaction signature / id as reported by the ledger.
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_decodes_back() {
        let signed = SignedInstruction {
            instruction: Instruction::TransferBatch {
                mint: Address::from_bytes([1u8; 32]),
                source: Address::from_bytes([2u8; 32]),
                transfers: vec![Transfer { to: Address::from_bytes([3u8; 32]), amount: 5 }],
                idempotency_key: Some([4u8; 32]),
            },
            signer: Address::from_bytes([2u8; 32]),
            issued_at: 1_700_000_000,
            signature: vec![0u8; 64],
        };
        let wire = signed.to_wire().unwrap();
        assert_eq!(SignedInstruction::from_wire(&wire).unwrap(), signed);
        assert_eq!(signed.instruction.label(), "transfer_batch");
    }
}
