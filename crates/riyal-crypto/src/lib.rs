pub mod codec;
pub mod export;
pub mod hash;
pub mod keypair;

pub use codec::CredentialCodec;
pub use export::ExportBundle;
pub use hash::batch_idempotency_key;
pub use keypair::{verify, verify_instruction, BackupStatus, KeyOrigin, KeyRecord};
