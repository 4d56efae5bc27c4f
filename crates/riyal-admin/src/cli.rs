use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use riyal_core::types::{Address, AuthorityKind, ClusterIdentity};

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "riyal-admin",
    version,
    about = "Digital Riyal treasury administration"
)]
pub struct Args {
    /// Session file (active cluster and wallet).
    #[arg(long, global = true, default_value = "~/.riyal/session.json")]
    pub session: PathBuf,

    /// Managed-token registry (sled database directory).
    #[arg(long, global = true, default_value = "~/.riyal/tokens")]
    pub store: PathBuf,

    /// Use this cluster for this invocation only.
    #[arg(long, global = true)]
    pub cluster: Option<ClusterIdentity>,

    /// Operator RPC endpoint for production. Replaces the public node.
    #[arg(long, global = true, env = "RIYAL_PRODUCTION_RPC")]
    pub rpc_override: Option<String>,

    /// Recovery service base URL.
    #[arg(
        long,
        global = true,
        env = "RIYAL_RECOVERY_API",
        default_value = "https://api.digitalriyal.online/v1"
    )]
    pub recovery_api: String,

    /// Run against an in-process ledger; nothing real is submitted or saved.
    #[arg(long, global = true, default_value_t = false)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate a new treasury wallet and load it into the session.
    Keygen {
        /// Recovery email to record with the wallet.
        #[arg(long)]
        email: Option<String>,
        /// Recovery phone to record with the wallet.
        #[arg(long)]
        phone: Option<String>,
        /// Replace a wallet already loaded in the session.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Import a secret key (hex, or a `[u8, ...]` array).
    Import {
        /// Key text. Prefer --key-file to keep it out of shell history.
        #[arg(long, conflicts_with = "key_file")]
        key: Option<String>,
        /// File holding the key text.
        #[arg(long)]
        key_file: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Use a wallet whose keys live in a browser extension (read-only here).
    ImportExtension {
        /// Wallet public key (base-58).
        #[arg(long)]
        public_key: Address,
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Write the credential pack for offline storage.
    Export {
        /// Directory to write into. Prints to stdout when omitted.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Show cluster, wallet and balance.
    Status,

    /// Native balance of an address (defaults to the session wallet).
    Balance {
        #[arg(long)]
        address: Option<Address>,
    },

    /// Show or switch the active cluster.
    Cluster {
        /// production | staging | test
        identity: Option<ClusterIdentity>,
    },

    /// Forget the session wallet.
    Logout,

    /// Create a new token mint.
    CreateToken {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value_t = 9)]
        decimals: u8,
        /// Initial supply in whole tokens (decimals allowed).
        #[arg(long)]
        supply: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        logo_url: Option<String>,
        /// Give up the mint authority at creation.
        #[arg(long, default_value_t = false)]
        no_mint_authority: bool,
        /// Give up the freeze authority at creation.
        #[arg(long, default_value_t = false)]
        no_freeze_authority: bool,
    },

    /// Mint new supply into the treasury.
    Mint {
        #[arg(long)]
        mint: Address,
        /// Amount in whole tokens.
        #[arg(long)]
        amount: String,
    },

    /// Burn supply held by the treasury.
    Burn {
        #[arg(long)]
        mint: Address,
        #[arg(long)]
        amount: String,
    },

    /// Permanently revoke an authority.
    Revoke {
        #[arg(long)]
        mint: Address,
        /// mint | freeze
        #[arg(long)]
        authority: AuthorityKind,
        /// Skip the confirmation prompt.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// Freeze a holder account.
    Freeze {
        #[arg(long)]
        mint: Address,
        #[arg(long)]
        account: Address,
    },

    /// Thaw a frozen holder account.
    Thaw {
        #[arg(long)]
        mint: Address,
        #[arg(long)]
        account: Address,
    },

    /// List managed tokens.
    Tokens,

    /// Distribute a token to every recipient in a file.
    Airdrop {
        #[arg(long)]
        mint: Address,
        /// One `address, amount` per line.
        #[arg(long)]
        file: PathBuf,
        /// Send the valid lines even if some were rejected.
        #[arg(long, default_value_t = false)]
        skip_invalid: bool,
    },

    /// Restore a wallet through the recovery service.
    #[command(subcommand)]
    Recover(RecoverCommand),

    /// Link recovery email and phone to the session wallet.
    Link {
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RecoverCommand {
    /// Send a verification code to an email or phone.
    Request {
        #[arg(long)]
        identifier: String,
    },
    /// Verify the code and load the recovered wallet.
    Verify {
        #[arg(long)]
        identifier: String,
        #[arg(long)]
        code: String,
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
