use serde::{Deserialize, Serialize};

use crate::constants::EXTENSION_MANAGED_PLACEHOLDER;

/// Persisted wallet record, shared with the storage layer and the recovery
/// service. Field names match the existing JSON on disk.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub public_key: String,
    /// Hex or `[u8]` text, or the extension placeholder.
    pub private_key: String,
    #[serde(default)]
    pub mnemonic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl WalletRecord {
    pub fn is_extension_managed(&self) -> bool {
        self.private_key == EXTENSION_MANAGED_PLACEHOLDER
    }

    pub fn has_recovery_contacts(&self) -> bool {
        self.email.is_some() && self.phone_number.is_some()
    }
}

impl std::fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRecord")
            .field("public_key", &self.public_key)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .finish_non_exhaustive()
    }
}
