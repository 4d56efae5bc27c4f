use tracing::{info, warn};

use riyal_core::constants::MIN_VERIFICATION_CODE_LEN;
use riyal_core::types::Address;
use riyal_crypto::{CredentialCodec, KeyRecord};

use crate::identifier::Identifier;
use crate::service::{RecoveryError, RecoveryLinkService};

/// A wallet restored through the recovery service, with its contacts.
#[derive(Debug)]
pub struct RecoveredWallet {
    pub key: KeyRecord,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// Ask the service to send a code to `raw_identifier`.
pub async fn request_code(
    service: &dyn RecoveryLinkService,
    raw_identifier: &str,
) -> Result<Identifier, RecoveryError> {
    let id = Identifier::parse(raw_identifier)?;
    if !service.request_code(&id).await? {
        return Err(RecoveryError::Declined);
    }
    info!(kind = id.kind(), "verification code sent");
    Ok(id)
}

/// Verify `code` and restore the linked wallet.
///
/// Short codes are refused before the service is called. A returned wallet
/// must pass the derivation check or it is refused too.
pub async fn recover_wallet(
    service: &dyn RecoveryLinkService,
    raw_identifier: &str,
    code: &str,
) -> Result<RecoveredWallet, RecoveryError> {
    let id = Identifier::parse(raw_identifier)?;
    let code = code.trim();
    if code.chars().count() < MIN_VERIFICATION_CODE_LEN {
        return Err(RecoveryError::CodeTooShort {
            min: MIN_VERIFICATION_CODE_LEN,
        });
    }

    let record = service
        .verify_code(&id, code)
        .await?
        .ok_or_else(|| RecoveryError::NotVerified(id.to_string()))?;

    let key = CredentialCodec::decode_record(&record).map_err(|e| {
        warn!(kind = id.kind(), error = %e, "recovery service returned an invalid wallet");
        RecoveryError::InvalidWallet(e)
    })?;
    info!(public_key = %key.public_key(), "wallet recovered");
    Ok(RecoveredWallet {
        key,
        email: record.email,
        phone_number: record.phone_number,
    })
}

/// Link `public_key` to a recovery email and phone. Returns both in
/// canonical form for the caller to store.
pub async fn link_identity(
    service: &dyn RecoveryLinkService,
    public_key: &Address,
    email: &str,
    phone: &str,
) -> Result<(String, String), RecoveryError> {
    let email = Identifier::parse(email)?;
    if !email.is_email() {
        return Err(RecoveryError::InvalidIdentifier(format!("not an email address: {email}")));
    }
    let phone = Identifier::parse(phone)?;
    if phone.is_email() {
        return Err(RecoveryError::InvalidIdentifier(format!("not a phone number: {phone}")));
    }
    if !service.link_identity(public_key, &email, &phone).await? {
        return Err(RecoveryError::Declined);
    }
    info!(%public_key, "recovery contacts linked");
    Ok((email.as_str().to_string(), phone.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use riyal_core::wallet::WalletRecord;

    const CODE: &str = "482913";

    #[derive(Default)]
    struct FakeVault {
        wallets: Mutex<HashMap<String, WalletRecord>>,
        calls: Mutex<u32>,
    }

    impl FakeVault {
        fn with(id: &str, rec: WalletRecord) -> Self {
            let v = Self::default();
            v.wallets.lock().unwrap().insert(id.to_string(), rec);
            v
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl RecoveryLinkService for FakeVault {
        async fn request_code(&self, _identifier: &Identifier) -> Result<bool, RecoveryError> {
            *self.calls.lock().unwrap() += 1;
            Ok(true)
        }

        async fn verify_code(
            &self,
            identifier: &Identifier,
            code: &str,
        ) -> Result<Option<WalletRecord>, RecoveryError> {
            *self.calls.lock().unwrap() += 1;
            if code != CODE {
                return Ok(None);
            }
            Ok(self.wallets.lock().unwrap().get(identifier.as_str()).cloned())
        }

        async fn link_identity(
            &self,
            public_key: &Address,
            email: &Identifier,
            phone: &Identifier,
        ) -> Result<bool, RecoveryError> {
            *self.calls.lock().unwrap() += 1;
            let rec = WalletRecord {
                public_key: public_key.to_b58(),
                private_key: String::new(),
                mnemonic: String::new(),
                email: Some(email.to_string()),
                phone_number: Some(phone.to_string()),
            };
            let mut w = self.wallets.lock().unwrap();
            w.insert(email.to_string(), rec.clone());
            w.insert(phone.to_string(), rec);
            Ok(true)
        }
    }

    fn stored(kp: &KeyRecord) -> WalletRecord {
        CredentialCodec::to_record(kp, Some("ops@riyal.example".into()), Some("+966501234567".into()))
            .unwrap()
    }

    #[tokio::test]
    async fn recovers_by_email_in_any_case() {
        let kp = KeyRecord::generate();
        let vault = FakeVault::with("ops@riyal.example", stored(&kp));
        let got = recover_wallet(&vault, " OPS@riyal.example ", CODE).await.unwrap();
        assert_eq!(got.key.public_key(), kp.public_key());
        assert_eq!(got.phone_number.as_deref(), Some("+966501234567"));
    }

    #[tokio::test]
    async fn recovers_by_phone_with_spaces() {
        let kp = KeyRecord::generate();
        let vault = FakeVault::with("+966501234567", stored(&kp));
        let got = recover_wallet(&vault, "+966 50 123 4567", CODE).await.unwrap();
        assert_eq!(got.key.public_key(), kp.public_key());
    }

    #[tokio::test]
    async fn short_code_never_reaches_service() {
        let vault = FakeVault::default();
        let err = recover_wallet(&vault, "ops@riyal.example", "123").await.unwrap_err();
        assert!(matches!(err, RecoveryError::CodeTooShort { min: 4 }));
        assert_eq!(vault.calls(), 0);
    }

    #[tokio::test]
    async fn wrong_code_is_not_verified() {
        let kp = KeyRecord::generate();
        let vault = FakeVault::with("ops@riyal.example", stored(&kp));
        let err = recover_wallet(&vault, "ops@riyal.example", "000000").await.unwrap_err();
        assert!(matches!(err, RecoveryError::NotVerified(_)));
    }

    #[tokio::test]
    async fn tampered_wallet_from_service_is_refused() {
        let kp = KeyRecord::generate();
        let mut rec = stored(&kp);
        rec.public_key = KeyRecord::generate().public_key().to_b58();
        let vault = FakeVault::with("ops@riyal.example", rec);
        let err = recover_wallet(&vault, "ops@riyal.example", CODE).await.unwrap_err();
        assert!(matches!(err, RecoveryError::InvalidWallet(_)));
    }

    #[tokio::test]
    async fn link_normalises_contacts() {
        let vault = FakeVault::default();
        let pk = Address::from_bytes([5u8; 32]);
        let (email, phone) = link_identity(&vault, &pk, "Ops@Riyal.Example", "+966 50 123 4567")
            .await
            .unwrap();
        assert_eq!(email, "ops@riyal.example");
        assert_eq!(phone, "+966501234567");

        assert!(link_identity(&vault, &pk, "+966 50", "+966 50").await.is_err());
        assert!(link_identity(&vault, &pk, "a@b.co", "c@d.co").await.is_err());
    }

    #[tokio::test]
    async fn request_code_returns_canonical_identifier() {
        let vault = FakeVault::default();
        let id = request_code(&vault, "Ops@Riyal.Example").await.unwrap();
        assert_eq!(id, Identifier::Email("ops@riyal.example".into()));
        assert!(request_code(&vault, "").await.is_err());
    }
}
