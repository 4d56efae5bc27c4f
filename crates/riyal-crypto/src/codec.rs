//! Import and export of secret-key material.
//!
//! Accepted inputs, checked in this order:
//!   1. `[12, 34, ...]`: a bracketed list of byte values
//!   2. `0a1b...`      : contiguous hex digits, any case, even length
//!
//! Every successful decode re-derives the public key from the seed, so a
//! corrupted key is refused rather than imported under the wrong address.

use tracing::debug;
use zeroize::Zeroizing;

use riyal_core::constants::SECRET_KEY_LEN;
use riyal_core::error::{EncodingError, TreasuryError};
use riyal_core::types::Address;
use riyal_core::wallet::WalletRecord;
use riyal_core::EXTENSION_MANAGED_PLACEHOLDER;

use crate::keypair::{BackupStatus, KeyOrigin, KeyRecord};

pub struct CredentialCodec;

impl CredentialCodec {
    /// Parse operator-supplied key text into a verified key record.
    pub fn decode(input: &str) -> Result<KeyRecord, EncodingError> {
        let bytes = decode_secret_bytes(input)?;
        let record = KeyRecord::from_secret_bytes(&bytes, KeyOrigin::Imported)?;
        debug!(public_key = %record.public_key(), "decoded secret key");
        Ok(record)
    }

    /// Lowercase hex of the 64-byte secret.
    pub fn encode(record: &KeyRecord) -> Result<String, TreasuryError> {
        let bytes = record.secret_key_bytes()?;
        Ok(hex::encode(&bytes[..]))
    }

    pub fn generate() -> KeyRecord {
        KeyRecord::generate()
    }

    /// Restore a key record from its persisted / recovered form.
    ///
    /// The stored public key must match the one derived from the secret.
    pub fn decode_record(record: &WalletRecord) -> Result<KeyRecord, TreasuryError> {
        if record.is_extension_managed() {
            let public_key = Address::from_b58(&record.public_key)?;
            return Ok(KeyRecord::extension_managed(public_key));
        }
        let backup = BackupStatus::from_note(&record.mnemonic);
        let origin = match backup {
            BackupStatus::NotBackedUp => KeyOrigin::Generated,
            _ => KeyOrigin::Imported,
        };
        let bytes = decode_secret_bytes(&record.private_key)?;
        let key = KeyRecord::from_secret_bytes(&bytes, origin)?.with_backup(backup);
        if key.public_key().to_b58() != record.public_key.trim() {
            return Err(EncodingError::KeyMismatch.into());
        }
        Ok(key)
    }

    /// Serialize a key record plus optional recovery contacts.
    pub fn to_record(
        key: &KeyRecord,
        email: Option<String>,
        phone_number: Option<String>,
    ) -> Result<WalletRecord, TreasuryError> {
        let private_key = if key.has_secret() {
            Self::encode(key)?
        } else {
            EXTENSION_MANAGED_PLACEHOLDER.to_string()
        };
        Ok(WalletRecord {
            public_key: key.public_key().to_b58(),
            private_key,
            mnemonic: key.backup().as_note().to_string(),
            email,
            phone_number,
        })
    }
}

/// Canonical form of hex key text: trimmed and lowercased.
pub fn normalize_hex(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

/// Decode key text into raw secret bytes without deriving anything.
pub fn decode_secret_bytes(input: &str) -> Result<Zeroizing<Vec<u8>>, EncodingError> {
    let trimmed = input.trim();

    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let bytes = parse_byte_array(&trimmed[1..trimmed.len() - 1])?;
        if bytes.len() != SECRET_KEY_LEN {
            return Err(EncodingError::LengthMismatch {
                expected: SECRET_KEY_LEN,
                got: bytes.len(),
            });
        }
        return Ok(bytes);
    }

    if is_even_hex(trimmed) {
        let bytes = Zeroizing::new(
            hex::decode(trimmed).map_err(|_| EncodingError::UnsupportedFormat)?,
        );
        if bytes.len() != SECRET_KEY_LEN {
            return Err(EncodingError::LengthMismatch {
                expected: SECRET_KEY_LEN,
                got: bytes.len(),
            });
        }
        return Ok(bytes);
    }

    Err(EncodingError::UnsupportedFormat)
}

fn parse_byte_array(inner: &str) -> Result<Zeroizing<Vec<u8>>, EncodingError> {
    let mut out = Zeroizing::new(Vec::with_capacity(SECRET_KEY_LEN));
    if inner.trim().is_empty() {
        return Ok(out);
    }
    for (i, tok) in inner.split(',').enumerate() {
        let tok = tok.trim();
        let byte = tok.parse::<u8>().map_err(|_| {
            EncodingError::MalformedByteArray(format!("element {i} is not an integer 0-255"))
        })?;
        out.push(byte);
    }
    Ok(out)
}

fn is_even_hex(s: &str) -> bool {
    !s.is_empty() && s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_hex() -> (KeyRecord, String) {
        let kp = KeyRecord::generate();
        let hex = CredentialCodec::encode(&kp).unwrap();
        (kp, hex)
    }

    #[test]
    fn hex_round_trip_is_normalised() {
        let (kp, hex) = sample_hex();
        assert_eq!(hex.len(), 128);
        let upper = format!("  {}\n", hex.to_uppercase());
        let decoded = CredentialCodec::decode(&upper).unwrap();
        assert_eq!(decoded.public_key(), kp.public_key());
        assert_eq!(CredentialCodec::encode(&decoded).unwrap(), normalize_hex(&upper));
    }

    #[test]
    fn byte_array_form_decodes_to_same_key() {
        let (kp, _) = sample_hex();
        let bytes = kp.secret_key_bytes().unwrap();
        let list: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
        let text = format!("[{}]", list.join(", "));
        let decoded = CredentialCodec::decode(&text).unwrap();
        assert_eq!(decoded.public_key(), kp.public_key());
        assert_eq!(decoded.origin(), KeyOrigin::Imported);
    }

    #[test]
    fn short_array_is_length_mismatch() {
        assert_eq!(
            CredentialCodec::decode("[1,2,3]").unwrap_err(),
            EncodingError::LengthMismatch { expected: 64, got: 3 }
        );
        assert_eq!(
            CredentialCodec::decode("[]").unwrap_err(),
            EncodingError::LengthMismatch { expected: 64, got: 0 }
        );
    }

    #[test]
    fn out_of_range_array_element_is_malformed() {
        let mut items = vec!["1".to_string(); 63];
        items.push("256".into());
        let err = CredentialCodec::decode(&format!("[{}]", items.join(","))).unwrap_err();
        assert!(matches!(err, EncodingError::MalformedByteArray(_)));
    }

    #[test]
    fn short_hex_is_length_mismatch() {
        assert_eq!(
            CredentialCodec::decode("0102").unwrap_err(),
            EncodingError::LengthMismatch { expected: 64, got: 2 }
        );
    }

    #[test]
    fn other_text_is_unsupported() {
        for input in ["", "abc", "0x0102", "not a key", "zz", "[1,2"] {
            assert_eq!(
                CredentialCodec::decode(input).unwrap_err(),
                EncodingError::UnsupportedFormat,
                "input {input:?}"
            );
        }
    }

    #[test]
    fn corrupted_seed_byte_is_refused() {
        let (_, hex) = sample_hex();
        let mut bytes = hex::decode(&hex).unwrap();
        bytes[0] ^= 0xff;
        assert_eq!(
            CredentialCodec::decode(&hex::encode(bytes)).unwrap_err(),
            EncodingError::KeyMismatch
        );
    }

    #[test]
    fn deterministic_seed_gives_fixed_address() {
        // seed = 01 02 .. 20, public half filled in from derivation
        let seed: Vec<u8> = (1u8..=32).collect();
        let sk = ed25519_dalek::SigningKey::from_bytes(&seed.clone().try_into().unwrap());
        let mut full = seed;
        full.extend_from_slice(&sk.verifying_key().to_bytes());
        let hex = hex::encode(&full);
        assert!(hex.starts_with("0102030405"));

        let a = CredentialCodec::decode(&hex).unwrap();
        let b = CredentialCodec::decode(&hex).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(CredentialCodec::encode(&a).unwrap(), hex);
    }

    #[test]
    fn wallet_record_round_trip_with_contacts() {
        let kp = KeyRecord::generate();
        let rec = CredentialCodec::to_record(&kp, Some("ops@riyal.example".into()), None).unwrap();
        assert_eq!(rec.mnemonic, riyal_core::NEW_WALLET_REMINDER);
        let back = CredentialCodec::decode_record(&rec).unwrap();
        assert_eq!(back.public_key(), kp.public_key());
        assert_eq!(back.origin(), KeyOrigin::Generated);
    }

    #[test]
    fn wallet_record_with_wrong_public_key_is_refused() {
        let kp = KeyRecord::generate();
        let other = KeyRecord::generate();
        let mut rec = CredentialCodec::to_record(&kp, None, None).unwrap();
        rec.public_key = other.public_key().to_b58();
        let err = CredentialCodec::decode_record(&rec).unwrap_err();
        assert!(matches!(err, TreasuryError::InvalidEncoding(EncodingError::KeyMismatch)));
    }

    #[test]
    fn extension_record_restores_without_secret() {
        let addr = Address::from_bytes([3u8; 32]);
        let rec = CredentialCodec::to_record(&KeyRecord::extension_managed(addr), None, None).unwrap();
        assert!(rec.is_extension_managed());
        let back = CredentialCodec::decode_record(&rec).unwrap();
        assert_eq!(back.origin(), KeyOrigin::ExtensionManaged);
        assert_eq!(back.public_key(), &addr);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_seed_round_trips(seed in proptest::array::uniform32(any::<u8>()), upper in any::<bool>()) {
            let sk = ed25519_dalek::SigningKey::from_bytes(&seed);
            let hex = hex::encode(sk.to_keypair_bytes());
            let input = if upper { hex.to_uppercase() } else { hex.clone() };
            let decoded = CredentialCodec::decode(&input).unwrap();
            prop_assert_eq!(CredentialCodec::encode(&decoded).unwrap(), normalize_hex(&input));
        }

        #[test]
        fn any_single_byte_corruption_is_refused(
            seed in proptest::array::uniform32(any::<u8>()),
            pos in 0usize..64,
            flip in 1u8..=255,
        ) {
            let sk = ed25519_dalek::SigningKey::from_bytes(&seed);
            let mut bytes = sk.to_keypair_bytes();
            bytes[pos] ^= flip;
            prop_assert!(CredentialCodec::decode(&hex::encode(bytes)).is_err());
        }
    }
}
