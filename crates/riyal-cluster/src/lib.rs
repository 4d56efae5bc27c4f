//! riyal-cluster
//!
//! Everything between the treasury and a ledger network: endpoint selection,
//! the transport seam, the one live connection per session, and the session
//! itself with its generation counter for discarding stale results.

pub mod config;
pub mod connection;
pub mod memory;
pub mod rpc_client;
pub mod session;
pub mod transport;

pub use config::{ClusterConfig, Endpoint};
pub use connection::{ClusterConnection, ClusterHandle, ClusterTicket, PinnedCluster};
pub use memory::{MemoryLedger, MemoryLedgerFactory, SubmissionGate};
pub use rpc_client::{RpcTransport, RpcTransportFactory};
pub use session::Session;
pub use transport::{LedgerTransport, TransportError, TransportFactory};
