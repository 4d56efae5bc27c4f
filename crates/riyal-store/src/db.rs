use std::path::Path;

use tracing::debug;

use riyal_core::error::TreasuryError;
use riyal_core::token::ManagedToken;
use riyal_core::types::Address;

/// Persistent registry of managed tokens, backed by sled.
///
/// Named trees:
///   tokens: mint address bytes → bincode(ManagedToken)
///   meta  : utf8 key bytes     → raw bytes
pub struct TokenStore {
    db: sled::Db,
    tokens: sled::Tree,
    meta: sled::Tree,
}

fn storage(e: sled::Error) -> TreasuryError {
    TreasuryError::Storage(e.to_string())
}

impl TokenStore {
    /// Open or create the registry at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TreasuryError> {
        let db = sled::open(path).map_err(storage)?;
        let tokens = db.open_tree("tokens").map_err(storage)?;
        let meta = db.open_tree("meta").map_err(storage)?;
        Ok(Self { db, tokens, meta })
    }

    /// In-memory registry that vanishes on drop. Used for dry runs.
    pub fn temporary() -> Result<Self, TreasuryError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage)?;
        let tokens = db.open_tree("tokens").map_err(storage)?;
        let meta = db.open_tree("meta").map_err(storage)?;
        Ok(Self { db, tokens, meta })
    }

    // ── Tokens ───────────────────────────────────────────────────────────────

    pub fn get_token(&self, mint: &Address) -> Result<Option<ManagedToken>, TreasuryError> {
        match self.tokens.get(mint.as_bytes()).map_err(storage)? {
            Some(bytes) => {
                let token = bincode::deserialize(&bytes)
                    .map_err(|e| TreasuryError::Serialization(e.to_string()))?;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }

    pub fn put_token(&self, token: &ManagedToken) -> Result<(), TreasuryError> {
        let bytes =
            bincode::serialize(token).map_err(|e| TreasuryError::Serialization(e.to_string()))?;
        self.tokens
            .insert(token.mint_address.as_bytes(), bytes)
            .map_err(storage)?;
        debug!(mint = %token.mint_address, supply = token.supply, "token persisted");
        Ok(())
    }

    pub fn token_exists(&self, mint: &Address) -> bool {
        self.tokens.contains_key(mint.as_bytes()).unwrap_or(false)
    }

    /// Every stored token, in mint-address byte order.
    pub fn list_tokens(&self) -> Result<Vec<ManagedToken>, TreasuryError> {
        let mut out = Vec::new();
        for item in self.tokens.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let token = bincode::deserialize(&bytes)
                .map_err(|e| TreasuryError::Serialization(e.to_string()))?;
            out.push(token);
        }
        Ok(out)
    }

    // ── Meta ─────────────────────────────────────────────────────────────────

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), TreasuryError> {
        self.meta.insert(key.as_bytes(), value).map_err(storage)?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, TreasuryError> {
        self.meta
            .get(key.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(storage)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), TreasuryError> {
        self.db.flush().map_err(storage)?;
        Ok(())
    }
}
