/// ─── Riyal Treasury Constants ───────────────────────────────────────────────
///
/// Key material follows the ledger's Ed25519 scheme: a 64-byte secret key is
/// the 32-byte seed followed by the 32-byte public key it derives.

// ── Key material ─────────────────────────────────────────────────────────────

/// Length of an exported secret key (seed ‖ public key).
pub const SECRET_KEY_LEN: usize = 64;

/// Length of the Ed25519 seed at the front of a secret key.
pub const SEED_LEN: usize = 32;

/// Length of a public key / address.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Placeholder stored in place of a secret key for extension-managed wallets.
pub const EXTENSION_MANAGED_PLACEHOLDER: &str = "MANAGED_BY_BROWSER_EXTENSION";

/// Reminder carried by freshly generated wallets until they are backed up.
pub const NEW_WALLET_REMINDER: &str = "Newly generated - Back up immediately!";

/// Recovery-phrase note for wallets imported from raw key material.
pub const IMPORTED_KEY_NOTE: &str = "Imported from Private Key";

// ── Tokens ───────────────────────────────────────────────────────────────────

/// Highest number of decimals a managed token may declare.
pub const MAX_TOKEN_DECIMALS: u8 = 12;

/// Native base units per whole native coin (balance display only).
pub const BASE_UNITS_PER_NATIVE: u64 = 1_000_000_000;

// ── Distribution ─────────────────────────────────────────────────────────────

/// Maximum transfers packed into one distribution transaction.
pub const DISTRIBUTION_BATCH_CAP: usize = 20;

// ── Network ──────────────────────────────────────────────────────────────────

/// Default bounded wait for balance queries (seconds).
pub const DEFAULT_BALANCE_TIMEOUT_SECS: u64 = 5;

/// Default bounded wait for instruction submission (seconds).
pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 60;

/// Rate-limit retries attempted before a call is reported as failed.
pub const DEFAULT_RATE_LIMIT_RETRIES: u32 = 5;

/// Initial backoff between rate-limit retries (milliseconds); doubles per try.
pub const DEFAULT_RATE_LIMIT_BACKOFF_MS: u64 = 500;

// ── Recovery ─────────────────────────────────────────────────────────────────

/// Shortest verification code accepted before calling the recovery service.
pub const MIN_VERIFICATION_CODE_LEN: usize = 4;
