use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{info, warn};

use riyal_core::error::TreasuryError;
use riyal_core::instruction::{Acknowledgment, SignedInstruction};
use riyal_core::types::{Address, ClusterIdentity};

use crate::config::{ClusterConfig, Endpoint};
use crate::transport::{LedgerTransport, TransportError, TransportFactory};

// ── ClusterConnection ────────────────────────────────────────────────────────

/// The single live link to one network.
///
/// A connection never changes network in place: `switch_cluster` drops the
/// transport and connects a new one through the factory.
#[derive(Clone)]
pub struct ClusterConnection {
    endpoint: Endpoint,
    transport: Arc<dyn LedgerTransport>,
    config: ClusterConfig,
    factory: Arc<dyn TransportFactory>,
}

impl ClusterConnection {
    pub fn new(
        identity: ClusterIdentity,
        config: ClusterConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        let endpoint = config.endpoint(identity);
        let transport = factory.connect(&endpoint);
        info!(cluster = %identity, url = %endpoint.url, "connected");
        Self {
            endpoint,
            transport,
            config,
            factory,
        }
    }

    pub fn identity(&self) -> ClusterIdentity {
        self.endpoint.identity
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn retry_on_rate_limit(&self) -> bool {
        self.endpoint.retry_on_rate_limit
    }

    /// Rebuild for `identity`. Returns false (and keeps the transport) when
    /// the identity is unchanged.
    pub fn switch_cluster(&mut self, identity: ClusterIdentity) -> bool {
        if identity == self.endpoint.identity {
            return false;
        }
        *self = Self::new(identity, self.config.clone(), Arc::clone(&self.factory));
        true
    }

    /// Balance with transport errors surfaced. Use when zero must mean zero.
    pub async fn try_get_balance(&self, address: &Address) -> Result<u64, TreasuryError> {
        let t = Arc::clone(&self.transport);
        let addr = *address;
        self.with_retry(self.config.balance_timeout, move || {
            let t = Arc::clone(&t);
            async move { t.get_balance(&addr).await }
        })
        .await
        .map_err(|e| TreasuryError::Transport(e.to_string()))
    }

    /// Balance for display: any transport trouble, timeout or unknown account
    /// reads as zero.
    pub async fn get_balance(&self, address: &Address) -> u64 {
        match self.try_get_balance(address).await {
            Ok(b) => b,
            Err(e) => {
                warn!(cluster = %self.identity(), %address, error = %e, "balance query failed, reporting zero");
                0
            }
        }
    }

    /// Submit and wait for acknowledgment within the submit timeout.
    pub async fn submit(&self, signed: &SignedInstruction) -> Result<Acknowledgment, TreasuryError> {
        let t = Arc::clone(&self.transport);
        let signed = signed.clone();
        self.with_retry(self.config.submit_timeout, move || {
            let t = Arc::clone(&t);
            let signed = signed.clone();
            async move { t.submit(&signed).await }
        })
        .await
        .map_err(|e| TreasuryError::SubmissionFailed(e.to_string()))
    }

    /// Run `call` under one overall deadline, retrying rate-limit answers with
    /// doubling backoff when this endpoint allows it.
    async fn with_retry<T, F, Fut>(&self, deadline: Duration, call: F) -> Result<T, TransportError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let attempts = async {
            let mut backoff = self.config.rate_limit_backoff;
            let mut retries = 0u32;
            loop {
                match call().await {
                    Err(TransportError::RateLimited)
                        if self.retry_on_rate_limit() && retries < self.config.rate_limit_retries =>
                    {
                        retries += 1;
                        warn!(cluster = %self.identity(), retries, "rate limited, backing off");
                        tokio::time::sleep(backoff).await;
                        backoff = backoff.saturating_mul(2);
                    }
                    other => return other,
                }
            }
        };
        match tokio::time::timeout(deadline, attempts).await {
            Ok(r) => r,
            Err(_) => Err(TransportError::Connection(format!(
                "timed out after {}ms",
                deadline.as_millis()
            ))),
        }
    }
}

impl std::fmt::Debug for ClusterConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConnection")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

// ── ClusterHandle ────────────────────────────────────────────────────────────

/// Proof of which connection an operation was issued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterTicket {
    pub identity: ClusterIdentity,
    pub generation: u64,
}

struct Current {
    connection: Arc<ClusterConnection>,
    generation: u64,
}

/// Shared owner of the session's one connection.
///
/// Every switch (or session reset) bumps the generation. Operations take a
/// ticket before submitting and must pin it before applying their result;
/// pinning fails if the generation moved, and a pinned ticket blocks
/// switches until released.
#[derive(Clone)]
pub struct ClusterHandle {
    inner: Arc<RwLock<Current>>,
}

/// Read guard proving the ticket is still current.
pub struct PinnedCluster<'a> {
    _guard: RwLockReadGuard<'a, Current>,
}

impl ClusterHandle {
    pub fn new(connection: ClusterConnection) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Current {
                connection: Arc::new(connection),
                generation: 0,
            })),
        }
    }

    pub async fn identity(&self) -> ClusterIdentity {
        self.inner.read().await.connection.identity()
    }

    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }

    pub async fn connection(&self) -> Arc<ClusterConnection> {
        Arc::clone(&self.inner.read().await.connection)
    }

    /// Current connection plus a ticket naming it.
    pub async fn snapshot(&self) -> (ClusterTicket, Arc<ClusterConnection>) {
        let cur = self.inner.read().await;
        (
            ClusterTicket {
                identity: cur.connection.identity(),
                generation: cur.generation,
            },
            Arc::clone(&cur.connection),
        )
    }

    pub async fn is_current(&self, ticket: &ClusterTicket) -> bool {
        self.inner.read().await.generation == ticket.generation
    }

    /// Hold off switches while a result from `ticket` is applied.
    pub async fn pin(&self, ticket: &ClusterTicket) -> Result<PinnedCluster<'_>, TreasuryError> {
        let guard = self.inner.read().await;
        if guard.generation != ticket.generation {
            warn!(
                issued = %ticket.identity,
                now = %guard.connection.identity(),
                "discarding result from superseded connection"
            );
            return Err(TreasuryError::StaleResult {
                issued: ticket.identity,
            });
        }
        Ok(PinnedCluster { _guard: guard })
    }

    /// Replace the connection with a fresh one for `identity`.
    pub async fn switch_cluster(&self, identity: ClusterIdentity) -> bool {
        let mut cur = self.inner.write().await;
        if cur.connection.identity() == identity {
            return false;
        }
        let mut next = (*cur.connection).clone();
        next.switch_cluster(identity);
        cur.connection = Arc::new(next);
        cur.generation += 1;
        info!(cluster = %identity, generation = cur.generation, "cluster switched");
        true
    }

    /// Invalidate outstanding tickets without changing network.
    pub async fn invalidate(&self) {
        let mut cur = self.inner.write().await;
        cur.generation += 1;
    }

    pub async fn get_balance(&self, address: &Address) -> u64 {
        self.connection().await.get_balance(address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryLedger, MemoryLedgerFactory};
    use riyal_core::instruction::Instruction;
    use riyal_crypto::KeyRecord;

    fn fast_config() -> ClusterConfig {
        ClusterConfig {
            balance_timeout: Duration::from_millis(500),
            submit_timeout: Duration::from_millis(500),
            rate_limit_backoff: Duration::from_millis(1),
            ..ClusterConfig::default()
        }
    }

    fn conn(identity: ClusterIdentity, ledger: &Arc<MemoryLedger>) -> ClusterConnection {
        ClusterConnection::new(
            identity,
            fast_config(),
            Arc::new(MemoryLedgerFactory::shared(Arc::clone(ledger))),
        )
    }

    #[tokio::test]
    async fn balance_errors_read_as_zero() {
        let ledger = MemoryLedger::new();
        let c = conn(ClusterIdentity::Test, &ledger);
        let addr = Address::from_bytes([3u8; 32]);
        assert_eq!(c.get_balance(&addr).await, 0);
        assert!(c.try_get_balance(&addr).await.is_err());

        ledger.set_balance(addr, 2_500_000_000);
        assert_eq!(c.get_balance(&addr).await, 2_500_000_000);

        ledger.set_unreachable(true);
        assert_eq!(c.get_balance(&addr).await, 0);
    }

    #[tokio::test]
    async fn rate_limit_retried_except_on_public_production() {
        let ledger = MemoryLedger::new();
        let addr = Address::from_bytes([3u8; 32]);
        ledger.set_balance(addr, 10);

        let test = conn(ClusterIdentity::Test, &ledger);
        ledger.rate_limit_next(2);
        assert_eq!(test.try_get_balance(&addr).await.unwrap(), 10);

        let prod = conn(ClusterIdentity::Production, &ledger);
        assert!(!prod.retry_on_rate_limit());
        ledger.rate_limit_next(1);
        assert!(prod.try_get_balance(&addr).await.is_err());
    }

    #[tokio::test]
    async fn submission_timeout_is_submission_failed() {
        let ledger = MemoryLedger::new();
        let c = conn(ClusterIdentity::Test, &ledger);
        let _gate = ledger.hold_submissions();
        let kp = KeyRecord::generate();
        let signed = kp
            .sign_instruction(
                Instruction::ThawAccount {
                    mint: Address::from_bytes([1u8; 32]),
                    target: Address::from_bytes([2u8; 32]),
                },
                0,
            )
            .unwrap();
        let err = c.submit(&signed).await.unwrap_err();
        assert!(matches!(err, TreasuryError::SubmissionFailed(_)));
        assert!(ledger.accepted().is_empty());
    }

    #[tokio::test]
    async fn switch_to_same_identity_is_noop() {
        let ledger = MemoryLedger::new();
        let handle = ClusterHandle::new(conn(ClusterIdentity::Staging, &ledger));
        assert!(!handle.switch_cluster(ClusterIdentity::Staging).await);
        assert_eq!(handle.generation().await, 0);

        let before = handle.connection().await;
        assert!(handle.switch_cluster(ClusterIdentity::Test).await);
        let after = handle.connection().await;
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.identity(), ClusterIdentity::Test);
        assert_eq!(handle.generation().await, 1);
    }

    #[tokio::test]
    async fn ticket_goes_stale_after_switch() {
        let ledger = MemoryLedger::new();
        let handle = ClusterHandle::new(conn(ClusterIdentity::Test, &ledger));
        let (ticket, _) = handle.snapshot().await;
        assert!(handle.pin(&ticket).await.is_ok());
        handle.switch_cluster(ClusterIdentity::Staging).await;
        assert!(!handle.is_current(&ticket).await);
        assert!(matches!(
            handle.pin(&ticket).await,
            Err(TreasuryError::StaleResult { issued: ClusterIdentity::Test })
        ));
    }
}
