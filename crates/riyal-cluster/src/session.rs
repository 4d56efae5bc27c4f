//! The operator session: which network is active and which wallet is loaded.
//!
//! One value, loaded from and saved to a JSON file. Clearing it (logout)
//! removes the file and bumps the cluster generation so any operation still
//! in flight cannot apply its result afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use riyal_core::error::TreasuryError;
use riyal_core::types::ClusterIdentity;
use riyal_core::wallet::WalletRecord;
use riyal_crypto::{CredentialCodec, KeyRecord};

use crate::config::ClusterConfig;
use crate::connection::{ClusterConnection, ClusterHandle};
use crate::transport::TransportFactory;

/// On-disk form of a session.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    cluster: ClusterIdentity,
    #[serde(default)]
    wallet: Option<WalletRecord>,
}

pub struct Session {
    path: PathBuf,
    cluster: ClusterIdentity,
    handle: ClusterHandle,
    wallet: Option<Arc<KeyRecord>>,
    email: Option<String>,
    phone_number: Option<String>,
}

impl Session {
    /// Load the session at `path` and connect to its cluster.
    ///
    /// A missing file gives a fresh session on the default cluster. An
    /// unreadable file, or a stored wallet that no longer passes the
    /// derivation check, is logged and dropped rather than trusted.
    pub fn load(
        path: impl AsRef<Path>,
        config: ClusterConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Self, TreasuryError> {
        let path = path.as_ref().to_path_buf();
        let file = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str::<SessionFile>(&json).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "session file unreadable, starting fresh");
                SessionFile::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionFile::default(),
            Err(e) => {
                return Err(TreasuryError::Storage(format!(
                    "reading session {}: {e}",
                    path.display()
                )))
            }
        };

        let (wallet, email, phone_number) = match file.wallet {
            Some(rec) => match CredentialCodec::decode_record(&rec) {
                Ok(key) => (Some(Arc::new(key)), rec.email, rec.phone_number),
                Err(e) => {
                    warn!(public_key = %rec.public_key, error = %e, "stored wallet rejected");
                    (None, None, None)
                }
            },
            None => (None, None, None),
        };

        let handle = ClusterHandle::new(ClusterConnection::new(file.cluster, config, factory));
        Ok(Self {
            path,
            cluster: file.cluster,
            handle,
            wallet,
            email,
            phone_number,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), TreasuryError> {
        let file = SessionFile {
            cluster: self.cluster,
            wallet: self.wallet_record()?,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| TreasuryError::Serialization(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TreasuryError::Storage(format!("{}: {e}", parent.display())))?;
        }
        std::fs::write(&self.path, json)
            .map_err(|e| TreasuryError::Storage(format!("writing {}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Log out: forget the wallet, delete the file, invalidate in-flight work.
    /// The active cluster is kept.
    pub async fn clear(&mut self) -> Result<(), TreasuryError> {
        self.wallet = None;
        self.email = None;
        self.phone_number = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(TreasuryError::Storage(format!(
                    "removing {}: {e}",
                    self.path.display()
                )))
            }
        }
        self.handle.invalidate().await;
        info!("session cleared");
        Ok(())
    }

    pub fn wallet(&self) -> Option<&Arc<KeyRecord>> {
        self.wallet.as_ref()
    }

    /// The wallet in its persisted form, with recovery contacts.
    pub fn wallet_record(&self) -> Result<Option<WalletRecord>, TreasuryError> {
        self.wallet
            .as_deref()
            .map(|k| CredentialCodec::to_record(k, self.email.clone(), self.phone_number.clone()))
            .transpose()
    }

    pub fn set_wallet(
        &mut self,
        key: KeyRecord,
        email: Option<String>,
        phone_number: Option<String>,
    ) -> Arc<KeyRecord> {
        let key = Arc::new(key);
        info!(public_key = %key.public_key(), origin = ?key.origin(), "wallet loaded");
        self.wallet = Some(Arc::clone(&key));
        self.email = email;
        self.phone_number = phone_number;
        key
    }

    pub fn set_recovery_contacts(&mut self, email: Option<String>, phone_number: Option<String>) {
        self.email = email;
        self.phone_number = phone_number;
    }

    pub fn cluster(&self) -> ClusterIdentity {
        self.cluster
    }

    pub fn handle(&self) -> &ClusterHandle {
        &self.handle
    }

    /// Switch networks and persist the choice. No-op only when both the
    /// saved choice and the live connection are already on `identity`.
    pub async fn set_cluster(&mut self, identity: ClusterIdentity) -> Result<bool, TreasuryError> {
        let switched = self.handle.switch_cluster(identity).await;
        if !switched && identity == self.cluster {
            return Ok(false);
        }
        self.cluster = identity;
        self.save()?;
        Ok(true)
    }

    pub async fn generation(&self) -> u64 {
        self.handle.generation().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedgerFactory;

    fn temp_session(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("riyal_session_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("session.json")
    }

    fn load(path: &Path) -> Session {
        Session::load(
            path,
            ClusterConfig::default(),
            Arc::new(MemoryLedgerFactory::isolated()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn missing_file_gives_default_session() {
        let s = load(&temp_session("missing"));
        assert_eq!(s.cluster(), ClusterIdentity::Staging);
        assert!(s.wallet().is_none());
        assert_eq!(s.generation().await, 0);
    }

    #[tokio::test]
    async fn wallet_and_cluster_survive_save_and_load() {
        let path = temp_session("round_trip");
        let mut s = load(&path);
        let key = s.set_wallet(KeyRecord::generate(), Some("ops@riyal.example".into()), None);
        assert!(s.set_cluster(ClusterIdentity::Test).await.unwrap());
        s.save().unwrap();

        let again = load(&path);
        assert_eq!(again.cluster(), ClusterIdentity::Test);
        assert_eq!(again.wallet().unwrap().public_key(), key.public_key());
        let rec = again.wallet_record().unwrap().unwrap();
        assert_eq!(rec.email.as_deref(), Some("ops@riyal.example"));
    }

    #[tokio::test]
    async fn set_cluster_saves_after_temporary_switch() {
        let path = temp_session("temporary_switch");
        let mut s = load(&path);
        s.handle().switch_cluster(ClusterIdentity::Test).await;
        assert_eq!(s.cluster(), ClusterIdentity::Staging);

        assert!(s.set_cluster(ClusterIdentity::Test).await.unwrap());
        assert_eq!(s.cluster(), ClusterIdentity::Test);
        assert_eq!(load(&path).cluster(), ClusterIdentity::Test);
        assert!(!s.set_cluster(ClusterIdentity::Test).await.unwrap());

        // Saved choice matches but the live connection was moved away.
        s.handle().switch_cluster(ClusterIdentity::Production).await;
        assert!(s.set_cluster(ClusterIdentity::Test).await.unwrap());
        assert_eq!(s.handle().identity().await, ClusterIdentity::Test);
    }

    #[tokio::test]
    async fn clear_removes_file_and_bumps_generation() {
        let path = temp_session("clear");
        let mut s = load(&path);
        s.set_wallet(KeyRecord::generate(), None, None);
        s.save().unwrap();
        assert!(path.exists());

        let (ticket, _) = s.handle().snapshot().await;
        s.clear().await.unwrap();
        assert!(!path.exists());
        assert!(s.wallet().is_none());
        assert!(!s.handle().is_current(&ticket).await);
    }

    #[tokio::test]
    async fn tampered_wallet_is_dropped() {
        let path = temp_session("tampered");
        let mut s = load(&path);
        s.set_wallet(KeyRecord::generate(), None, None);
        s.save().unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        let other = KeyRecord::generate().public_key().to_b58();
        let mut file: serde_json::Value = serde_json::from_str(&json).unwrap();
        file["wallet"]["publicKey"] = serde_json::Value::String(other);
        std::fs::write(&path, file.to_string()).unwrap();

        assert!(load(&path).wallet().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_starts_fresh() {
        let path = temp_session("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let s = load(&path);
        assert!(s.wallet().is_none());
        assert_eq!(s.cluster(), ClusterIdentity::Staging);
    }
}
