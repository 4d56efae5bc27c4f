use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use riyal_core::instruction::{Acknowledgment, SignedInstruction};
use riyal_core::types::Address;

use crate::config::Endpoint;
use crate::transport::{LedgerTransport, TransportError, TransportFactory};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-RPC 2.0 transport over HTTP POST.
///
/// Uses raw reqwest + serde_json; timeouts and rate-limit retries are applied
/// one level up by `ClusterConnection`, so this type makes exactly one call.
pub struct RpcTransport {
    url: String,
    client: reqwest::Client,
}

impl RpcTransport {
    pub fn new(url: &str) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: url.to_string(),
            client,
        }
    }

    /// Call a JSON-RPC method and return the `result` field.
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Connection(format!("{}: {e}", self.url)))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::RateLimited);
        }
        if !resp.status().is_success() {
            return Err(TransportError::Connection(format!("HTTP {}", resp.status())));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| TransportError::Protocol(format!("parsing RPC response: {e}")))?;

        if let Some(err) = json.get("error") {
            return Err(classify_rpc_error(err));
        }

        Ok(json["result"].clone())
    }
}

fn classify_rpc_error(err: &Value) -> TransportError {
    let code = err["code"].as_i64().unwrap_or_default();
    let message = err["message"].as_str().unwrap_or("unknown error").to_string();
    if code == 429 || message.to_ascii_lowercase().contains("rate limit") {
        TransportError::RateLimited
    } else if message.to_ascii_lowercase().contains("not found") {
        TransportError::NotFound(message)
    } else {
        TransportError::Rejected(format!("RPC error {code}: {message}"))
    }
}

/// Balance results come either bare or wrapped as `{ context, value }`.
fn parse_balance(result: &Value) -> Result<u64, TransportError> {
    let v = result.get("value").unwrap_or(result);
    v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| TransportError::Protocol(format!("expected integer balance, got {v}")))
}

#[async_trait]
impl LedgerTransport for RpcTransport {
    async fn get_balance(&self, address: &Address) -> Result<u64, TransportError> {
        let result = self
            .call(
                "getBalance",
                serde_json::json!([address.to_b58(), { "commitment": "confirmed" }]),
            )
            .await?;
        if result.is_null() {
            return Err(TransportError::NotFound(address.to_b58()));
        }
        parse_balance(&result)
    }

    async fn submit(&self, signed: &SignedInstruction) -> Result<Acknowledgment, TransportError> {
        let wire = signed
            .to_wire()
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        debug!(op = signed.instruction.label(), bytes = wire.len() / 2, "sending instruction");

        let result = self
            .call(
                "sendTransaction",
                serde_json::json!([wire, { "encoding": "hex", "preflightCommitment": "confirmed" }]),
            )
            .await?;

        result
            .as_str()
            .map(|s| Acknowledgment { signature: s.to_string() })
            .ok_or_else(|| TransportError::Protocol("expected signature string from sendTransaction".into()))
    }
}

/// Builds one `RpcTransport` per connection.
pub struct RpcTransportFactory;

impl TransportFactory for RpcTransportFactory {
    fn connect(&self, endpoint: &Endpoint) -> Arc<dyn LedgerTransport> {
        Arc::new(RpcTransport::new(&endpoint.url))
    }
}
