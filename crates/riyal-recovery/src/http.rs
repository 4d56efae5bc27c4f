use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use riyal_core::types::Address;
use riyal_core::wallet::WalletRecord;

use crate::identifier::Identifier;
use crate::service::{RecoveryError, RecoveryLinkService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Recovery service client posting JSON to `{base}/auth/send-otp`,
/// `{base}/auth/verify` and `{base}/recovery/link`.
pub struct HttpRecoveryLink {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkRequest<'a> {
    public_key: String,
    email: &'a str,
    phone: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    wallet: Option<WalletRecord>,
}

impl HttpRecoveryLink {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, RecoveryError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "recovery request");
        self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RecoveryError::Service(format!("{url}: {e}")))
    }
}

#[async_trait]
impl RecoveryLinkService for HttpRecoveryLink {
    async fn request_code(&self, identifier: &Identifier) -> Result<bool, RecoveryError> {
        let body = serde_json::json!({
            "identifier": identifier.as_str(),
            "type": identifier.kind(),
        });
        let resp = self.post("/auth/send-otp", &body).await?;
        if !resp.status().is_success() {
            warn!(status = %resp.status(), kind = identifier.kind(), "code request refused");
        }
        Ok(resp.status().is_success())
    }

    async fn verify_code(
        &self,
        identifier: &Identifier,
        code: &str,
    ) -> Result<Option<WalletRecord>, RecoveryError> {
        let body = serde_json::json!({ "identifier": identifier.as_str(), "otp": code });
        let resp = self.post("/auth/verify", &body).await?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RecoveryError::Service(format!("verify returned HTTP {status}")));
        }
        let json: Value = resp
            .json()
            .await
            .map_err(|e| RecoveryError::Service(format!("parsing verify response: {e}")))?;
        parse_verify(json)
    }

    async fn link_identity(
        &self,
        public_key: &Address,
        email: &Identifier,
        phone: &Identifier,
    ) -> Result<bool, RecoveryError> {
        let body = LinkRequest {
            public_key: public_key.to_b58(),
            email: email.as_str(),
            phone: phone.as_str(),
        };
        let resp = self.post("/recovery/link", &body).await?;
        Ok(resp.status().is_success())
    }
}

/// `{ "wallet": {...} }` or `{ "wallet": null }`.
fn parse_verify(json: Value) -> Result<Option<WalletRecord>, RecoveryError> {
    let parsed: VerifyResponse = serde_json::from_value(json)
        .map_err(|e| RecoveryError::Service(format!("unexpected verify response: {e}")))?;
    Ok(parsed.wallet)
}
