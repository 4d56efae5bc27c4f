use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use riyal_core::constants::{
    IMPORTED_KEY_NOTE, NEW_WALLET_REMINDER, PUBLIC_KEY_LEN, SECRET_KEY_LEN, SEED_LEN,
};
use riyal_core::error::{EncodingError, TreasuryError};
use riyal_core::instruction::{Instruction, SignedInstruction, SigningPayload};
use riyal_core::types::{Address, Timestamp};

/// Where a key record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOrigin {
    Generated,
    Imported,
    /// Keys live in an external signer; only the public key is known here.
    ExtensionManaged,
}

/// What the operator has (or has not) written down for this wallet.
#[derive(Clone, PartialEq, Eq)]
pub enum BackupStatus {
    /// Fresh key, nothing backed up yet. Callers should warn.
    NotBackedUp,
    ImportedFromKey,
    ManagedExternally,
    /// An actual recovery phrase.
    Phrase(String),
}

impl BackupStatus {
    /// Text stored in the wallet record's `mnemonic` field.
    pub fn as_note(&self) -> &str {
        match self {
            BackupStatus::NotBackedUp => NEW_WALLET_REMINDER,
            BackupStatus::ImportedFromKey => IMPORTED_KEY_NOTE,
            BackupStatus::ManagedExternally => riyal_core::EXTENSION_MANAGED_PLACEHOLDER,
            BackupStatus::Phrase(p) => p,
        }
    }

    pub fn from_note(note: &str) -> Self {
        match note.trim() {
            NEW_WALLET_REMINDER => BackupStatus::NotBackedUp,
            IMPORTED_KEY_NOTE | "" => BackupStatus::ImportedFromKey,
            riyal_core::EXTENSION_MANAGED_PLACEHOLDER => BackupStatus::ManagedExternally,
            phrase => BackupStatus::Phrase(phrase.to_string()),
        }
    }

    /// Warning to show the operator, if any.
    pub fn reminder(&self) -> Option<&'static str> {
        match self {
            BackupStatus::NotBackedUp => Some(NEW_WALLET_REMINDER),
            _ => None,
        }
    }
}

impl std::fmt::Debug for BackupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupStatus::NotBackedUp => f.write_str("NotBackedUp"),
            BackupStatus::ImportedFromKey => f.write_str("ImportedFromKey"),
            BackupStatus::ManagedExternally => f.write_str("ManagedExternally"),
            BackupStatus::Phrase(_) => f.write_str("Phrase(..)"),
        }
    }
}

/// A treasury wallet: Ed25519 signing key plus the address it derives.
///
/// The signing key zeroizes itself on drop. The public key is always derived
/// from the secret, never taken on trust, except for extension-managed
/// wallets which hold no secret at all.
pub struct KeyRecord {
    public_key: Address,
    signing_key: Option<SigningKey>,
    origin: KeyOrigin,
    backup: BackupStatus,
}

impl KeyRecord {
    /// Generate a fresh keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key = Address::from_bytes(signing_key.verifying_key().to_bytes());
        Self {
            public_key,
            signing_key: Some(signing_key),
            origin: KeyOrigin::Generated,
            backup: BackupStatus::NotBackedUp,
        }
    }

    /// Restore from a 64-byte `seed ‖ public key` secret.
    ///
    /// The public half must equal what the seed derives; anything else is a
    /// corrupted or spliced key and is refused.
    pub fn from_secret_bytes(bytes: &[u8], origin: KeyOrigin) -> Result<Self, EncodingError> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(EncodingError::LengthMismatch {
                expected: SECRET_KEY_LEN,
                got: bytes.len(),
            });
        }
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        seed.copy_from_slice(&bytes[..SEED_LEN]);
        let signing_key = SigningKey::from_bytes(&seed);
        let derived = signing_key.verifying_key().to_bytes();
        if derived[..] != bytes[SEED_LEN..] {
            return Err(EncodingError::KeyMismatch);
        }
        let backup = match origin {
            KeyOrigin::Generated => BackupStatus::NotBackedUp,
            KeyOrigin::Imported => BackupStatus::ImportedFromKey,
            KeyOrigin::ExtensionManaged => BackupStatus::ManagedExternally,
        };
        Ok(Self {
            public_key: Address::from_bytes(derived),
            signing_key: Some(signing_key),
            origin,
            backup,
        })
    }

    /// A wallet whose keys are held by a browser extension or hardware signer.
    pub fn extension_managed(public_key: Address) -> Self {
        Self {
            public_key,
            signing_key: None,
            origin: KeyOrigin::ExtensionManaged,
            backup: BackupStatus::ManagedExternally,
        }
    }

    pub fn with_backup(mut self, backup: BackupStatus) -> Self {
        self.backup = backup;
        self
    }

    pub fn public_key(&self) -> &Address {
        &self.public_key
    }

    pub fn origin(&self) -> KeyOrigin {
        self.origin
    }

    pub fn backup(&self) -> &BackupStatus {
        &self.backup
    }

    pub fn has_secret(&self) -> bool {
        self.signing_key.is_some()
    }

    /// The 64-byte exported secret. Wiped when the returned value drops.
    pub fn secret_key_bytes(&self) -> Result<Zeroizing<[u8; SECRET_KEY_LEN]>, TreasuryError> {
        let sk = self.signing_key()?;
        Ok(Zeroizing::new(sk.to_keypair_bytes()))
    }

    /// Lowercase hex of [`secret_key_bytes`](Self::secret_key_bytes).
    pub fn secret_key_hex(&self) -> Result<Zeroizing<String>, TreasuryError> {
        Ok(Zeroizing::new(hex::encode(&self.secret_key_bytes()?[..])))
    }

    pub fn sign(&self, message: &[u8]) -> Result<[u8; 64], TreasuryError> {
        Ok(self.signing_key()?.sign(message).to_bytes())
    }

    /// Wrap `instruction` in a signed envelope ready for submission.
    pub fn sign_instruction(
        &self,
        instruction: Instruction,
        issued_at: Timestamp,
    ) -> Result<SignedInstruction, TreasuryError> {
        let bytes = SigningPayload {
            instruction: &instruction,
            signer: &self.public_key,
            issued_at,
        }
        .to_bytes()?;
        let signature = self.sign(&bytes)?.to_vec();
        Ok(SignedInstruction {
            instruction,
            signer: self.public_key,
            issued_at,
            signature,
        })
    }

    fn signing_key(&self) -> Result<&SigningKey, TreasuryError> {
        self.signing_key
            .as_ref()
            .ok_or(TreasuryError::ExtensionManaged(self.public_key))
    }
}

impl std::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "KeyRecord {{ public_key: {:?}, origin: {:?} }}",
            self.public_key, self.origin
        )
    }
}

/// Ed25519 verification of `signature` over `message` by `public_key`.
pub fn verify(public_key: &Address, message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(vk) = VerifyingKey::from_bytes(public_key.as_bytes()) else {
        return false;
    };
    vk.verify(message, &Signature::from_bytes(signature)).is_ok()
}

/// Check the signature on an envelope against its claimed signer.
pub fn verify_instruction(signed: &SignedInstruction) -> bool {
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signed.signature.as_slice()) else {
        return false;
    };
    let Ok(payload) = signed.payload().to_bytes() else {
        return false;
    };
    verify(&signed.signer, &payload, &sig_bytes)
}

const _: () = assert!(SEED_LEN + PUBLIC_KEY_LEN == SECRET_KEY_LEN);
