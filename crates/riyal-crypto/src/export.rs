use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use riyal_core::error::TreasuryError;
use riyal_core::EXTENSION_MANAGED_PLACEHOLDER;

use crate::codec::CredentialCodec;
use crate::keypair::KeyRecord;

/// Plain-text credential pack for offline cold storage.
///
/// Holds the secret in clear; build it only on an explicit export request and
/// let it drop as soon as the text is written out.
pub struct ExportBundle {
    pub public_key: String,
    secret_key: Zeroizing<String>,
    recovery_phrase: Zeroizing<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl ExportBundle {
    pub fn new(
        key: &KeyRecord,
        email: Option<String>,
        phone_number: Option<String>,
    ) -> Result<Self, TreasuryError> {
        let secret_key = if key.has_secret() {
            CredentialCodec::encode(key)?
        } else {
            EXTENSION_MANAGED_PLACEHOLDER.to_string()
        };
        Ok(Self {
            public_key: key.public_key().to_b58(),
            secret_key: Zeroizing::new(secret_key),
            recovery_phrase: Zeroizing::new(key.backup().as_note().to_string()),
            email,
            phone_number,
            generated_at: Utc::now(),
        })
    }

    pub fn at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    /// Suggested file name, e.g. `treasury_recovery_pack_7xKXtg2C.txt`.
    pub fn file_name(&self) -> String {
        let prefix: String = self.public_key.chars().take(8).collect();
        format!("treasury_recovery_pack_{prefix}.txt")
    }

    pub fn render(&self) -> Zeroizing<String> {
        let rule = "-".repeat(50);
        Zeroizing::new(format!(
            "DIGITAL RIYAL NETWORK TREASURY CREDENTIALS\n\
             Generated: {generated}\n\
             Recovery Cluster:\n\
             Email: {email}\n\
             Phone: {phone}\n\
             {rule}\n\
             PUBLIC KEY:\n\
             {public}\n\
             \n\
             PRIVATE KEY:\n\
             {secret}\n\
             \n\
             RECOVERY PHRASE (MNEMONIC):\n\
             {phrase}\n\
             {rule}\n\
             Security notice: store this file offline in a secure physical location.\n",
            generated = self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            email = self.email.as_deref().unwrap_or("Not Set"),
            phone = self.phone_number.as_deref().unwrap_or("Not Set"),
            public = self.public_key,
            secret = self.secret_key.as_str(),
            phrase = self.recovery_phrase.as_str(),
        ))
    }
}
