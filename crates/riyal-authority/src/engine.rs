use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use riyal_cluster::{ClusterHandle, ClusterTicket};
use riyal_core::error::TreasuryError;
use riyal_core::instruction::{Acknowledgment, Instruction, Transfer};
use riyal_core::token::{ManagedToken, TokenMetadata, TokenTransition};
use riyal_core::types::{Address, Amount, AuthorityKind};
use riyal_crypto::KeyRecord;
use riyal_store::TokenStore;

use crate::confirm::{ConfirmIrreversible, IrreversibleAction};

type TokenCell = Arc<Mutex<ManagedToken>>;

/// Outcome of an acknowledged operation.
#[derive(Debug, Clone)]
pub struct Receipt {
    /// Ledger transaction signature.
    pub signature: String,
    /// Token state after the transition was applied.
    pub token: ManagedToken,
}

// ── TokenAuthorityEngine ─────────────────────────────────────────────────────

/// Mediates every mutating token operation.
///
/// Each operation runs under its mint's lock for its whole duration:
///   1. check the transition against the current state
///   2. sign and submit the instruction, await acknowledgment
///   3. pin the cluster ticket taken before submission
///   4. apply the transition locally and persist it
///
/// Failure in 1–3 leaves local state untouched. Different mints proceed
/// concurrently.
pub struct TokenAuthorityEngine {
    cluster: ClusterHandle,
    signer: Arc<KeyRecord>,
    tokens: RwLock<HashMap<Address, TokenCell>>,
    store: Option<Arc<TokenStore>>,
}

impl TokenAuthorityEngine {
    pub fn new(cluster: ClusterHandle, signer: Arc<KeyRecord>) -> Self {
        Self {
            cluster,
            signer,
            tokens: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    /// Persist transitions to `store` and load the tokens it already holds.
    pub fn with_store(mut self, store: Arc<TokenStore>) -> Result<Self, TreasuryError> {
        let loaded = store.list_tokens()?;
        info!(count = loaded.len(), "loaded managed tokens");
        let map = self.tokens.get_mut();
        for token in loaded {
            map.insert(token.mint_address, Arc::new(Mutex::new(token)));
        }
        self.store = Some(store);
        Ok(self)
    }

    pub fn signer(&self) -> &Arc<KeyRecord> {
        &self.signer
    }

    pub fn cluster(&self) -> &ClusterHandle {
        &self.cluster
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub async fn token(&self, mint: &Address) -> Option<ManagedToken> {
        let cell = self.tokens.read().await.get(mint).cloned()?;
        let token = cell.lock().await.clone();
        Some(token)
    }

    /// All managed tokens, ordered by symbol.
    pub async fn tokens(&self) -> Vec<ManagedToken> {
        let cells: Vec<TokenCell> = self.tokens.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(cells.len());
        for cell in cells {
            out.push(cell.lock().await.clone());
        }
        out.sort_by(|a, b| {
            a.symbol
                .cmp(&b.symbol)
                .then_with(|| a.mint_address.as_bytes().cmp(b.mint_address.as_bytes()))
        });
        out
    }

    // ── Operations ───────────────────────────────────────────────────────────

    /// Create a new mint with a fresh address. The initial supply is credited
    /// to the treasury; authorities are kept as `meta` requests.
    pub async fn create_token(&self, meta: TokenMetadata) -> Result<Receipt, TreasuryError> {
        let mint = *KeyRecord::generate().public_key();
        let token = ManagedToken::from_metadata(mint, &meta)?;
        let authority = *self.signer.public_key();
        let instruction = Instruction::CreateMint {
            mint,
            decimals: token.decimals,
            initial_supply: token.supply,
            mint_authority: meta.mint_authority.then_some(authority),
            freeze_authority: meta.freeze_authority.then_some(authority),
        };

        let (ticket, ack) = self.submit(instruction).await?;
        let _pin = self.cluster.pin(&ticket).await?;

        self.persist(&token);
        self.tokens
            .write()
            .await
            .insert(mint, Arc::new(Mutex::new(token.clone())));
        info!(mint = %mint, symbol = %token.symbol, supply = token.supply, "token created");
        Ok(Receipt {
            signature: ack.signature,
            token,
        })
    }

    pub async fn mint(&self, mint: &Address, amount: Amount) -> Result<Receipt, TreasuryError> {
        let destination = *self.signer.public_key();
        self.execute(mint, TokenTransition::Mint(amount), |_| Instruction::MintTo {
            mint: *mint,
            destination,
            amount,
        })
        .await
    }

    pub async fn burn(&self, mint: &Address, amount: Amount) -> Result<Receipt, TreasuryError> {
        let owner = *self.signer.public_key();
        self.execute(mint, TokenTransition::Burn(amount), |_| Instruction::Burn {
            mint: *mint,
            owner,
            amount,
        })
        .await
    }

    /// Permanently drop an authority.
    ///
    /// An already-revoked authority fails with `AlreadyRevoked` before the
    /// operator is asked. Declining gives `NotConfirmed` and submits nothing.
    pub async fn revoke_authority(
        &self,
        mint: &Address,
        kind: AuthorityKind,
        confirm: &dyn ConfirmIrreversible,
    ) -> Result<Receipt, TreasuryError> {
        let transition = TokenTransition::Revoke(kind);
        let cell = self.cell(mint).await?;
        let mut token = cell.lock().await;
        token.check(&transition)?;

        let action = IrreversibleAction::RevokeAuthority {
            mint: *mint,
            symbol: token.symbol.clone(),
            kind,
        };
        if !confirm.confirm(&action) {
            info!(mint = %mint, %kind, "revoke declined by operator");
            return Err(TreasuryError::NotConfirmed);
        }

        let receipt = self
            .commit(&mut token, transition, Instruction::RevokeAuthority { mint: *mint, kind })
            .await?;
        warn!(mint = %mint, %kind, "authority revoked permanently");
        Ok(receipt)
    }

    pub async fn freeze(&self, mint: &Address, target: &Address) -> Result<Receipt, TreasuryError> {
        self.execute(mint, TokenTransition::Freeze, |_| Instruction::FreezeAccount {
            mint: *mint,
            target: *target,
        })
        .await
    }

    pub async fn thaw(&self, mint: &Address, target: &Address) -> Result<Receipt, TreasuryError> {
        self.execute(mint, TokenTransition::Freeze, |_| Instruction::ThawAccount {
            mint: *mint,
            target: *target,
        })
        .await
    }

    /// Pay several recipients from the treasury in one ledger transaction.
    pub async fn transfer_batch(
        &self,
        mint: &Address,
        transfers: &[Transfer],
        idempotency_key: Option<[u8; 32]>,
    ) -> Result<Receipt, TreasuryError> {
        if transfers.is_empty() {
            return Err(TreasuryError::InvalidAmount("empty transfer batch".into()));
        }
        let mut total: Amount = 0;
        for t in transfers {
            if t.amount == 0 {
                return Err(TreasuryError::ZeroAmount);
            }
            total = total
                .checked_add(t.amount)
                .ok_or_else(|| TreasuryError::InvalidAmount("batch total overflows".into()))?;
        }
        let source = *self.signer.public_key();
        self.execute(mint, TokenTransition::Transfer(total), |_| Instruction::TransferBatch {
            mint: *mint,
            source,
            transfers: transfers.to_vec(),
            idempotency_key,
        })
        .await
    }

    // ── Two-phase plumbing ───────────────────────────────────────────────────

    async fn cell(&self, mint: &Address) -> Result<TokenCell, TreasuryError> {
        self.tokens
            .read()
            .await
            .get(mint)
            .cloned()
            .ok_or(TreasuryError::UnknownMint(*mint))
    }

    async fn execute<F>(
        &self,
        mint: &Address,
        transition: TokenTransition,
        build: F,
    ) -> Result<Receipt, TreasuryError>
    where
        F: FnOnce(&ManagedToken) -> Instruction,
    {
        let cell = self.cell(mint).await?;
        let mut token = cell.lock().await;
        token.check(&transition)?;
        let instruction = build(&token);
        self.commit(&mut token, transition, instruction).await
    }

    /// Submit, then apply `transition` only if the ledger acknowledged it on
    /// the connection that is still current. Caller holds the mint lock.
    async fn commit(
        &self,
        token: &mut ManagedToken,
        transition: TokenTransition,
        instruction: Instruction,
    ) -> Result<Receipt, TreasuryError> {
        let (ticket, ack) = self.submit(instruction).await?;
        let _pin = self.cluster.pin(&ticket).await?;
        token.apply(&transition)?;
        self.persist(token);
        debug!(
            mint = %token.mint_address,
            supply = token.supply,
            treasury = token.treasury_balance,
            "transition applied"
        );
        Ok(Receipt {
            signature: ack.signature,
            token: token.clone(),
        })
    }

    async fn submit(
        &self,
        instruction: Instruction,
    ) -> Result<(ClusterTicket, Acknowledgment), TreasuryError> {
        let (ticket, connection) = self.cluster.snapshot().await;
        let op = instruction.label();
        let mint = *instruction.mint();
        let signed = self
            .signer
            .sign_instruction(instruction, chrono::Utc::now().timestamp())?;
        debug!(%mint, op, cluster = %ticket.identity, "submitting");
        match connection.submit(&signed).await {
            Ok(ack) => {
                info!(%mint, op, signature = %ack.signature, "acknowledged");
                Ok((ticket, ack))
            }
            Err(e) => {
                warn!(%mint, op, error = %e, "submission failed");
                Err(e)
            }
        }
    }

    /// The ledger already changed, so a store failure is logged, not returned.
    fn persist(&self, token: &ManagedToken) {
        if let Some(store) = &self.store {
            if let Err(e) = store.put_token(token) {
                warn!(mint = %token.mint_address, error = %e, "failed to persist token state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::AlwaysConfirm;
    use riyal_cluster::{ClusterConfig, ClusterConnection, MemoryLedger, MemoryLedgerFactory};
    use riyal_core::types::ClusterIdentity;
    use riyal_crypto::CredentialCodec;

    fn meta(decimals: u8, supply: Amount) -> TokenMetadata {
        TokenMetadata {
            name: "Digital Riyal".into(),
            symbol: "DRN".into(),
            decimals,
            description: String::new(),
            logo_url: None,
            supply,
            mint_authority: true,
            freeze_authority: true,
        }
    }

    fn engine_on(ledger: &Arc<MemoryLedger>) -> TokenAuthorityEngine {
        let factory = Arc::new(MemoryLedgerFactory::shared(Arc::clone(ledger)));
        let conn = ClusterConnection::new(ClusterIdentity::Test, ClusterConfig::default(), factory);
        TokenAuthorityEngine::new(ClusterHandle::new(conn), Arc::new(KeyRecord::generate()))
    }

    #[tokio::test]
    async fn revoked_mint_authority_blocks_minting() {
        let kp = KeyRecord::generate();
        let hex = CredentialCodec::encode(&kp).unwrap();
        assert_eq!(hex.len(), 128);
        let signer = CredentialCodec::decode(&hex).unwrap();
        assert_eq!(CredentialCodec::encode(&signer).unwrap(), hex);

        let ledger = MemoryLedger::new();
        let factory = Arc::new(MemoryLedgerFactory::shared(Arc::clone(&ledger)));
        let conn = ClusterConnection::new(ClusterIdentity::Test, ClusterConfig::default(), factory);
        let engine = TokenAuthorityEngine::new(ClusterHandle::new(conn), Arc::new(signer));

        let created = engine.create_token(meta(9, 1_000_000)).await.unwrap();
        let mint = created.token.mint_address;
        engine
            .revoke_authority(&mint, AuthorityKind::Mint, &AlwaysConfirm)
            .await
            .unwrap();

        let err = engine.mint(&mint, 10).await.unwrap_err();
        assert!(matches!(err, TreasuryError::AuthorityRevoked { kind: AuthorityKind::Mint, .. }));
        let token = engine.token(&mint).await.unwrap();
        assert_eq!(token.supply, 1_000_000);
        assert!(!token.mint_authority_active);
        assert!(token.freeze_authority_active);
        assert_eq!(ledger.accepted().len(), 2);
    }

    #[tokio::test]
    async fn mint_and_burn_move_supply_and_treasury() {
        let ledger = MemoryLedger::new();
        let engine = engine_on(&ledger);
        let mint = engine.create_token(meta(2, 500)).await.unwrap().token.mint_address;

        let r = engine.mint(&mint, 250).await.unwrap();
        assert_eq!((r.token.supply, r.token.treasury_balance), (750, 750));
        let r = engine.burn(&mint, 700).await.unwrap();
        assert_eq!((r.token.supply, r.token.treasury_balance), (50, 50));

        let err = engine.burn(&mint, 51).await.unwrap_err();
        assert!(matches!(err, TreasuryError::InsufficientBalance { need: 51, have: 50 }));
        assert!(matches!(engine.mint(&mint, 0).await, Err(TreasuryError::ZeroAmount)));
    }

    #[tokio::test]
    async fn failed_submission_leaves_state_untouched() {
        let ledger = MemoryLedger::new();
        let engine = engine_on(&ledger);
        let mint = engine.create_token(meta(9, 1_000)).await.unwrap().token.mint_address;

        ledger.script_submissions(&[false]);
        let err = engine.mint(&mint, 10).await.unwrap_err();
        assert!(matches!(err, TreasuryError::SubmissionFailed(_)));
        assert!(err.is_retryable());
        assert_eq!(engine.token(&mint).await.unwrap().supply, 1_000);

        engine.mint(&mint, 10).await.unwrap();
        assert_eq!(engine.token(&mint).await.unwrap().supply, 1_010);
    }

    #[tokio::test]
    async fn declined_revoke_submits_nothing() {
        let ledger = MemoryLedger::new();
        let engine = engine_on(&ledger);
        let mint = engine.create_token(meta(9, 1)).await.unwrap().token.mint_address;
        let seen = ledger.submissions_seen();

        let decline = |_: &IrreversibleAction| false;
        let err = engine
            .revoke_authority(&mint, AuthorityKind::Freeze, &decline)
            .await
            .unwrap_err();
        assert!(matches!(err, TreasuryError::NotConfirmed));
        assert_eq!(ledger.submissions_seen(), seen);
        assert!(engine.token(&mint).await.unwrap().freeze_authority_active);
    }

    #[tokio::test]
    async fn second_revoke_is_noop_without_prompt() {
        let ledger = MemoryLedger::new();
        let engine = engine_on(&ledger);
        let mint = engine.create_token(meta(9, 1)).await.unwrap().token.mint_address;
        engine
            .revoke_authority(&mint, AuthorityKind::Freeze, &AlwaysConfirm)
            .await
            .unwrap();

        let must_not_ask = |_: &IrreversibleAction| -> bool { panic!("prompted for a no-op") };
        let err = engine
            .revoke_authority(&mint, AuthorityKind::Freeze, &must_not_ask)
            .await
            .unwrap_err();
        assert!(err.is_noop());

        let target = Address::from_bytes([7u8; 32]);
        assert!(matches!(
            engine.freeze(&mint, &target).await,
            Err(TreasuryError::AuthorityRevoked { kind: AuthorityKind::Freeze, .. })
        ));
    }

    #[tokio::test]
    async fn freeze_and_thaw_reach_the_ledger() {
        let ledger = MemoryLedger::new();
        let engine = engine_on(&ledger);
        let mint = engine.create_token(meta(0, 10)).await.unwrap().token.mint_address;
        let target = Address::from_bytes([7u8; 32]);

        engine.freeze(&mint, &target).await.unwrap();
        assert!(ledger.is_frozen(&mint, &target));
        engine.thaw(&mint, &target).await.unwrap();
        assert!(!ledger.is_frozen(&mint, &target));
    }

    #[tokio::test]
    async fn authorities_can_be_declined_at_creation() {
        let ledger = MemoryLedger::new();
        let engine = engine_on(&ledger);
        let mut m = meta(6, 100);
        m.mint_authority = false;
        let token = engine.create_token(m).await.unwrap().token;
        assert!(!token.mint_authority_active);
        assert!(matches!(
            engine.mint(&token.mint_address, 1).await,
            Err(TreasuryError::AuthorityRevoked { .. })
        ));
        match &ledger.accepted()[0].instruction {
            Instruction::CreateMint { mint_authority, freeze_authority, .. } => {
                assert!(mint_authority.is_none());
                assert!(freeze_authority.is_some());
            }
            other => panic!("unexpected instruction {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_metadata_and_unknown_mint() {
        let ledger = MemoryLedger::new();
        let engine = engine_on(&ledger);
        assert!(matches!(
            engine.create_token(meta(13, 1)).await,
            Err(TreasuryError::InvalidMetadata(_))
        ));
        let ghost = Address::from_bytes([1u8; 32]);
        assert!(matches!(engine.mint(&ghost, 1).await, Err(TreasuryError::UnknownMint(_))));
        assert_eq!(ledger.submissions_seen(), 0);
    }

    #[tokio::test]
    async fn transfer_batch_debits_treasury_only() {
        let ledger = MemoryLedger::new();
        let engine = engine_on(&ledger);
        let mint = engine.create_token(meta(0, 100)).await.unwrap().token.mint_address;
        let transfers = vec![
            Transfer { to: Address::from_bytes([2u8; 32]), amount: 30 },
            Transfer { to: Address::from_bytes([3u8; 32]), amount: 20 },
        ];
        let r = engine.transfer_batch(&mint, &transfers, Some([9u8; 32])).await.unwrap();
        assert_eq!((r.token.supply, r.token.treasury_balance), (100, 50));

        let too_much = vec![Transfer { to: Address::from_bytes([2u8; 32]), amount: 51 }];
        assert!(matches!(
            engine.transfer_batch(&mint, &too_much, None).await,
            Err(TreasuryError::InsufficientBalance { .. })
        ));
        assert!(engine.transfer_batch(&mint, &[], None).await.is_err());
    }

    #[tokio::test]
    async fn extension_wallet_cannot_submit() {
        let ledger = MemoryLedger::new();
        let factory = Arc::new(MemoryLedgerFactory::shared(Arc::clone(&ledger)));
        let conn = ClusterConnection::new(ClusterIdentity::Test, ClusterConfig::default(), factory);
        let signer = KeyRecord::extension_managed(Address::from_bytes([4u8; 32]));
        let engine = TokenAuthorityEngine::new(ClusterHandle::new(conn), Arc::new(signer));
        assert!(matches!(
            engine.create_token(meta(9, 1)).await,
            Err(TreasuryError::ExtensionManaged(_))
        ));
        assert_eq!(ledger.submissions_seen(), 0);
    }

    #[tokio::test]
    async fn store_keeps_tokens_across_engines() {
        let store = Arc::new(TokenStore::temporary().unwrap());
        let ledger = MemoryLedger::new();
        let engine = engine_on(&ledger).with_store(Arc::clone(&store)).unwrap();
        let mint = engine.create_token(meta(9, 1_000)).await.unwrap().token.mint_address;
        engine
            .revoke_authority(&mint, AuthorityKind::Mint, &AlwaysConfirm)
            .await
            .unwrap();
        drop(engine);

        let engine = engine_on(&ledger).with_store(store).unwrap();
        let token = engine.token(&mint).await.unwrap();
        assert!(!token.mint_authority_active);
        assert_eq!(engine.tokens().await.len(), 1);
    }

    #[tokio::test]
    async fn switch_mid_flight_discards_acknowledgment() {
        let factory = Arc::new(MemoryLedgerFactory::isolated());
        let test_ledger = factory.ledger_for(ClusterIdentity::Test);
        let conn = ClusterConnection::new(
            ClusterIdentity::Test,
            ClusterConfig::default(),
            Arc::clone(&factory) as Arc<dyn riyal_cluster::TransportFactory>,
        );
        let handle = ClusterHandle::new(conn);
        let engine = Arc::new(TokenAuthorityEngine::new(
            handle.clone(),
            Arc::new(KeyRecord::generate()),
        ));
        let mint = engine.create_token(meta(9, 1_000)).await.unwrap().token.mint_address;

        let gate = test_ledger.hold_submissions();
        let task = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.mint(&mint, 10).await })
        };
        gate.entered.notified().await;
        assert!(handle.switch_cluster(ClusterIdentity::Staging).await);
        gate.release.notify_one();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, TreasuryError::StaleResult { issued: ClusterIdentity::Test }));
        // The Test ledger did accept it; the local view must not.
        assert_eq!(test_ledger.accepted().len(), 2);
        assert_eq!(engine.token(&mint).await.unwrap().supply, 1_000);
    }

    #[tokio::test]
    async fn different_mints_do_not_block_each_other() {
        let ledger = MemoryLedger::new();
        let engine = Arc::new(engine_on(&ledger));
        let a = engine.create_token(meta(0, 10)).await.unwrap().token.mint_address;
        let b = engine.create_token(meta(0, 10)).await.unwrap().token.mint_address;

        // Hold a's lock; b must still make progress.
        let cell = engine.cell(&a).await.unwrap();
        let _held = cell.lock().await;
        let r = tokio::time::timeout(std::time::Duration::from_secs(5), engine.mint(&b, 1))
            .await
            .expect("mint on b blocked by a");
        assert_eq!(r.unwrap().token.supply, 11);
    }
}
