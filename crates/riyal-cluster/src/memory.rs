//! In-process ledger used for dry runs and tests.
//!
//! Verifies signatures, answers balance queries from a table, remembers every
//! accepted instruction, and can be told to fail, rate-limit, or hold
//! submissions so callers can exercise their error paths.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

use riyal_core::instruction::{Acknowledgment, Instruction, SignedInstruction};
use riyal_core::types::Address;
use riyal_crypto::verify_instruction;

use crate::config::Endpoint;
use crate::transport::{LedgerTransport, TransportError, TransportFactory};

/// Scripted outcome for an upcoming submission.
#[derive(Debug, Clone)]
enum Scripted {
    Accept,
    Fail(TransportError),
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Address, u64>,
    accepted: Vec<SignedInstruction>,
    acks_by_key: HashMap<[u8; 32], Acknowledgment>,
    frozen: HashSet<(Address, Address)>,
    script: VecDeque<Scripted>,
    rate_limits_pending: u32,
    unreachable: bool,
    submissions_seen: u64,
}

/// Pair of signals for holding one submission mid-flight.
#[derive(Clone, Default)]
pub struct SubmissionGate {
    /// Fires when a submission reaches the ledger and starts waiting.
    pub entered: Arc<Notify>,
    /// Notify once to let the held submission finish.
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    gate: Mutex<Option<SubmissionGate>>,
}

impl MemoryLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        // A panic while holding the lock only happens in a failing test.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_balance(&self, address: Address, amount: u64) {
        self.state().balances.insert(address, amount);
    }

    /// Make every call fail with a connection error until reset.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Answer the next `n` calls with a rate-limit error.
    pub fn rate_limit_next(&self, n: u32) {
        self.state().rate_limits_pending = n;
    }

    /// Queue outcomes for upcoming submissions, oldest first.
    /// `true` accepts, `false` rejects. Unscripted submissions are accepted.
    pub fn script_submissions(&self, outcomes: &[bool]) {
        let mut st = self.state();
        for ok in outcomes {
            st.script.push_back(if *ok {
                Scripted::Accept
            } else {
                Scripted::Fail(TransportError::Rejected("scripted rejection".into()))
            });
        }
    }

    /// Reject the next submission with `err`.
    pub fn fail_next_submission(&self, err: TransportError) {
        self.state().script.push_back(Scripted::Fail(err));
    }

    /// Hold every following submission until its gate is released.
    pub fn hold_submissions(&self) -> SubmissionGate {
        let gate = SubmissionGate::default();
        *self.gate.lock().unwrap_or_else(|p| p.into_inner()) = Some(gate.clone());
        gate
    }

    pub fn accepted(&self) -> Vec<SignedInstruction> {
        self.state().accepted.clone()
    }

    pub fn submissions_seen(&self) -> u64 {
        self.state().submissions_seen
    }

    pub fn is_frozen(&self, mint: &Address, target: &Address) -> bool {
        self.state().frozen.contains(&(*mint, *target))
    }

    fn take_rate_limit(st: &mut LedgerState) -> bool {
        if st.rate_limits_pending > 0 {
            st.rate_limits_pending -= 1;
            true
        } else {
            false
        }
    }

    fn accept(st: &mut LedgerState, signed: &SignedInstruction) -> Acknowledgment {
        let key = match &signed.instruction {
            Instruction::TransferBatch { idempotency_key: Some(k), .. } => Some(*k),
            _ => None,
        };
        if let Some(ack) = key.and_then(|k| st.acks_by_key.get(&k)) {
            debug!("duplicate batch dropped by idempotency key");
            return ack.clone();
        }
        let sig_hex = hex::encode(blake3::hash(&signed.signature).as_bytes());
        let ack = Acknowledgment { signature: sig_hex };
        match &signed.instruction {
            Instruction::FreezeAccount { mint, target } => {
                st.frozen.insert((*mint, *target));
            }
            Instruction::ThawAccount { mint, target } => {
                st.frozen.remove(&(*mint, *target));
            }
            _ => {}
        }
        if let Some(k) = key {
            st.acks_by_key.insert(k, ack.clone());
        }
        st.accepted.push(signed.clone());
        ack
    }
}

#[async_trait]
impl LedgerTransport for MemoryLedger {
    async fn get_balance(&self, address: &Address) -> Result<u64, TransportError> {
        let mut st = self.state();
        if st.unreachable {
            return Err(TransportError::Connection("memory ledger unreachable".into()));
        }
        if Self::take_rate_limit(&mut st) {
            return Err(TransportError::RateLimited);
        }
        st.balances
            .get(address)
            .copied()
            .ok_or_else(|| TransportError::NotFound(address.to_b58()))
    }

    async fn submit(&self, signed: &SignedInstruction) -> Result<Acknowledgment, TransportError> {
        let gate = self.gate.lock().unwrap_or_else(|p| p.into_inner()).clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let mut st = self.state();
        st.submissions_seen += 1;
        if st.unreachable {
            return Err(TransportError::Connection("memory ledger unreachable".into()));
        }
        if Self::take_rate_limit(&mut st) {
            return Err(TransportError::RateLimited);
        }
        if !verify_instruction(signed) {
            return Err(TransportError::Rejected("signature verification failed".into()));
        }
        match st.script.pop_front() {
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Accept) | None => Ok(Self::accept(&mut st, signed)),
        }
    }
}

/// Hands out the same ledger for every endpoint, or one ledger per identity.
pub struct MemoryLedgerFactory {
    shared: Option<Arc<MemoryLedger>>,
    per_identity: Mutex<HashMap<riyal_core::types::ClusterIdentity, Arc<MemoryLedger>>>,
}

impl MemoryLedgerFactory {
    /// Every connection talks to `ledger`.
    pub fn shared(ledger: Arc<MemoryLedger>) -> Self {
        Self {
            shared: Some(ledger),
            per_identity: Mutex::new(HashMap::new()),
        }
    }

    /// Each cluster identity gets its own ledger, created on first connect.
    pub fn isolated() -> Self {
        Self {
            shared: None,
            per_identity: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger_for(&self, identity: riyal_core::types::ClusterIdentity) -> Arc<MemoryLedger> {
        if let Some(l) = &self.shared {
            return Arc::clone(l);
        }
        let mut map = self.per_identity.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(map.entry(identity).or_insert_with(MemoryLedger::new))
    }
}

impl TransportFactory for MemoryLedgerFactory {
    fn connect(&self, endpoint: &Endpoint) -> Arc<dyn LedgerTransport> {
        self.ledger_for(endpoint.identity)
    }
}
