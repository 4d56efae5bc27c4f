use std::time::Duration;

use riyal_core::constants::{
    DEFAULT_BALANCE_TIMEOUT_SECS, DEFAULT_RATE_LIMIT_BACKOFF_MS, DEFAULT_RATE_LIMIT_RETRIES,
    DEFAULT_SUBMIT_TIMEOUT_SECS,
};
use riyal_core::types::ClusterIdentity;

/// Public RPC endpoints used when no override applies.
pub fn default_endpoint(identity: ClusterIdentity) -> &'static str {
    match identity {
        ClusterIdentity::Production => "https://api.mainnet-beta.solana.com",
        ClusterIdentity::Staging => "https://api.devnet.solana.com",
        ClusterIdentity::Test => "https://api.testnet.solana.com",
    }
}

/// Network settings shared by every connection a session builds.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Operator RPC URL for production. Always wins for that identity and is
    /// ignored for the others.
    pub production_rpc_override: Option<String>,
    /// Bounded wait for a balance query.
    pub balance_timeout: Duration,
    /// Bounded wait for an instruction submission.
    pub submit_timeout: Duration,
    /// Retries after a rate-limit response, where retrying is enabled.
    pub rate_limit_retries: u32,
    /// First retry delay; doubles on each further attempt.
    pub rate_limit_backoff: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            production_rpc_override: None,
            balance_timeout: Duration::from_secs(DEFAULT_BALANCE_TIMEOUT_SECS),
            submit_timeout: Duration::from_secs(DEFAULT_SUBMIT_TIMEOUT_SECS),
            rate_limit_retries: DEFAULT_RATE_LIMIT_RETRIES,
            rate_limit_backoff: Duration::from_millis(DEFAULT_RATE_LIMIT_BACKOFF_MS),
        }
    }
}

/// A resolved network endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub identity: ClusterIdentity,
    pub url: String,
    /// Off for the shared public production node so calls fail fast instead
    /// of hanging under load.
    pub retry_on_rate_limit: bool,
}

impl ClusterConfig {
    pub fn with_production_override(mut self, url: Option<String>) -> Self {
        self.production_rpc_override = url;
        self
    }

    fn production_override(&self) -> Option<&str> {
        self.production_rpc_override
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// Resolve the one endpoint for `identity`.
    pub fn endpoint(&self, identity: ClusterIdentity) -> Endpoint {
        let over = match identity {
            ClusterIdentity::Production => self.production_override(),
            _ => None,
        };
        let url = over.unwrap_or_else(|| default_endpoint(identity)).to_string();
        let retry_on_rate_limit =
            !(identity == ClusterIdentity::Production && self.production_override().is_none());
        Endpoint {
            identity,
            url,
            retry_on_rate_limit,
        }
    }
}
