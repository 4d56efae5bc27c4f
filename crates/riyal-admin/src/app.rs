use std::fmt::Write as _;
use std::io::{BufRead, BufReader, Write as _};
use std::sync::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use tempfile::TempDir;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{info, warn};

use riyal_airdrop::{
    parse_recipients, parse_token_amount, plan, BatchStatus, DistributionEngine, LineError,
};
use riyal_authority::{AlwaysConfirm, ConfirmIrreversible, IrreversibleAction, TokenAuthorityEngine};
use riyal_cluster::{
    ClusterConfig, MemoryLedgerFactory, RpcTransportFactory, Session, TransportFactory,
};
use riyal_core::constants::BASE_UNITS_PER_NATIVE;
use riyal_core::error::TreasuryError;
use riyal_core::token::{ManagedToken, TokenMetadata};
use riyal_core::types::Address;
use riyal_crypto::{CredentialCodec, ExportBundle, KeyRecord};
use riyal_recovery::{HttpRecoveryLink, Identifier, RecoveryLinkService};
use riyal_store::TokenStore;

use crate::cli::{expand_tilde, Args, Command, RecoverCommand};

const NATIVE_DECIMALS: u8 = BASE_UNITS_PER_NATIVE.ilog10() as u8;
const STORE_CLUSTER_KEY: &str = "cluster";

/// Everything one CLI invocation works with.
pub struct App {
    session: Session,
    store: Arc<TokenStore>,
    recovery: Arc<dyn RecoveryLinkService>,
    /// Dry-run copy of the session; removed when the app drops.
    scratch: Option<TempDir>,
}

impl App {
    /// Build from command-line settings.
    ///
    /// A dry run works on a scratch copy of the session and token registry
    /// and submits to an in-process ledger.
    pub async fn open(args: &Args) -> anyhow::Result<Self> {
        let config = ClusterConfig::default().with_production_override(args.rpc_override.clone());
        let session_path = expand_tilde(&args.session);
        let store_path = expand_tilde(&args.store);

        let mut scratch = None;
        let (factory, session_path, store): (Arc<dyn TransportFactory>, PathBuf, TokenStore) =
            if args.dry_run {
                let dir = tempfile::Builder::new()
                    .prefix("riyal-dry-run-")
                    .tempdir()
                    .context("creating dry-run scratch directory")?;
                let scratch_session = dir.path().join("session.json");
                scratch = Some(dir);
                if session_path.exists() {
                    std::fs::copy(&session_path, &scratch_session)
                        .with_context(|| format!("copying {}", session_path.display()))?;
                }
                let store = TokenStore::temporary()?;
                if store_path.exists() {
                    let real = TokenStore::open(&store_path)
                        .with_context(|| format!("opening token store {}", store_path.display()))?;
                    for token in real.list_tokens()? {
                        store.put_token(&token)?;
                    }
                }
                warn!("dry run: submitting to an in-process ledger, nothing is saved");
                (Arc::new(MemoryLedgerFactory::isolated()), scratch_session, store)
            } else {
                let store = TokenStore::open(&store_path)
                    .with_context(|| format!("opening token store {}", store_path.display()))?;
                (Arc::new(RpcTransportFactory), session_path, store)
            };

        let session = Session::load(&session_path, config, factory)
            .with_context(|| format!("loading session {}", session_path.display()))?;
        if let Some(cluster) = args.cluster {
            session.handle().switch_cluster(cluster).await;
        }
        let mut app = Self::from_parts(
            session,
            Arc::new(store),
            Arc::new(HttpRecoveryLink::new(&args.recovery_api)),
        );
        app.scratch = scratch;
        Ok(app)
    }

    pub fn from_parts(
        session: Session,
        store: Arc<TokenStore>,
        recovery: Arc<dyn RecoveryLinkService>,
    ) -> Self {
        Self {
            session,
            store,
            recovery,
            scratch: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Where a dry run keeps its session copy. `None` outside dry runs.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    /// Run one command and return what to print.
    pub async fn execute(&mut self, command: Command) -> anyhow::Result<String> {
        match command {
            Command::Keygen { email, phone, force } => {
                self.ensure_replaceable(force)?;
                let (email, phone) = normalize_contacts(email, phone)?;
                let key = self.session.set_wallet(CredentialCodec::generate(), email, phone);
                self.session.save()?;
                let mut out = format!(
                    "Generated new treasury wallet.\nPublic key: {}\n",
                    key.public_key()
                );
                if let Some(reminder) = key.backup().reminder() {
                    let _ = writeln!(
                        out,
                        "\n{reminder} Run `export` to write the credential pack."
                    );
                }
                Ok(out)
            }

            Command::Import { key, key_file, force } => {
                self.ensure_replaceable(force)?;
                let text = match (key, key_file) {
                    (Some(k), _) => k,
                    (None, Some(path)) => std::fs::read_to_string(&path)
                        .with_context(|| format!("reading key file {}", path.display()))?,
                    (None, None) => bail!("pass --key or --key-file"),
                };
                let key = CredentialCodec::decode(&text).context("importing secret key")?;
                let key = self.session.set_wallet(key, None, None);
                self.session.save()?;
                Ok(format!("Imported wallet {}\n", key.public_key()))
            }

            Command::ImportExtension { public_key, force } => {
                self.ensure_replaceable(force)?;
                let key = self
                    .session
                    .set_wallet(KeyRecord::extension_managed(public_key), None, None);
                self.session.save()?;
                Ok(format!(
                    "Using extension-managed wallet {}. Signing happens in the extension.\n",
                    key.public_key()
                ))
            }

            Command::Export { out_dir } => self.export(out_dir.as_deref()),

            Command::Status => self.status().await,

            Command::Balance { address } => {
                let address = match address {
                    Some(a) => a,
                    None => *self.wallet()?.public_key(),
                };
                let conn = self.session.handle().connection().await;
                let line = match conn.try_get_balance(&address).await {
                    Ok(b) => format!("{} ({b} base units)", format_units(b, NATIVE_DECIMALS)),
                    Err(e) => format!("0 (balance unavailable: {e})"),
                };
                Ok(format!("Account: {address}\nCluster: {}\nBalance: {line}\n", conn.identity()))
            }

            Command::Cluster { identity } => match identity {
                None => {
                    let conn = self.session.handle().connection().await;
                    Ok(format!("{} ({})\n", conn.identity(), conn.endpoint().url))
                }
                Some(id) => {
                    if self.session.set_cluster(id).await? {
                        Ok(format!("Switched to {id}.\n"))
                    } else {
                        Ok(format!("Already on {id}.\n"))
                    }
                }
            },

            Command::Logout => {
                self.session.clear().await?;
                // The cluster choice outlives the wallet.
                self.session.save()?;
                Ok("Session cleared.\n".into())
            }

            Command::CreateToken {
                name,
                symbol,
                decimals,
                supply,
                description,
                logo_url,
                no_mint_authority,
                no_freeze_authority,
            } => {
                let supply = match parse_token_amount(&supply, decimals) {
                    Ok(v) => v,
                    Err(LineError::ZeroAmount) => 0,
                    Err(e) => bail!("invalid supply: {e}"),
                };
                let engine = self.engine().await?;
                let receipt = engine
                    .create_token(TokenMetadata {
                        name,
                        symbol,
                        decimals,
                        description,
                        logo_url,
                        supply,
                        mint_authority: !no_mint_authority,
                        freeze_authority: !no_freeze_authority,
                    })
                    .await?;
                if matches!(self.store.get_meta(STORE_CLUSTER_KEY), Ok(None)) {
                    let cluster = engine.cluster().identity().await;
                    let recorded = self
                        .store
                        .put_meta(STORE_CLUSTER_KEY, cluster.as_str().as_bytes());
                    if let Err(e) = recorded {
                        warn!(error = %e, "could not record token store cluster");
                    }
                }
                let t = &receipt.token;
                Ok(format!(
                    "Created {} ({})\nMint:      {}\nSupply:    {}\nSignature: {}\n",
                    t.name,
                    t.symbol,
                    t.mint_address,
                    format_units(t.supply, t.decimals),
                    receipt.signature
                ))
            }

            Command::Mint { mint, amount } => {
                let engine = self.engine().await?;
                let amount = self.amount_for(&engine, &mint, &amount).await?;
                let r = engine.mint(&mint, amount).await?;
                Ok(supply_line("Minted", &r.token, amount, &r.signature))
            }

            Command::Burn { mint, amount } => {
                let engine = self.engine().await?;
                let amount = self.amount_for(&engine, &mint, &amount).await?;
                let r = engine.burn(&mint, amount).await?;
                Ok(supply_line("Burned", &r.token, amount, &r.signature))
            }

            Command::Revoke { mint, authority, yes } => {
                let engine = self.engine().await?;
                let prompt;
                let confirm: &dyn ConfirmIrreversible = if yes {
                    &AlwaysConfirm
                } else {
                    prompt = PromptConfirm::stdin();
                    &prompt
                };
                match engine.revoke_authority(&mint, authority, confirm).await {
                    Ok(r) => Ok(format!(
                        "Revoked {authority} authority of {}. This cannot be undone.\n\
                         Signature: {}\n",
                        r.token.symbol,
                        r.signature
                    )),
                    Err(e) if e.is_noop() => Ok(format!("{e}; nothing to do.\n")),
                    Err(TreasuryError::NotConfirmed) => Ok("Aborted.\n".into()),
                    Err(e) => Err(e.into()),
                }
            }

            Command::Freeze { mint, account } => {
                let r = self.engine().await?.freeze(&mint, &account).await?;
                Ok(format!("Froze {account} for {}.\nSignature: {}\n", r.token.symbol, r.signature))
            }

            Command::Thaw { mint, account } => {
                let r = self.engine().await?.thaw(&mint, &account).await?;
                Ok(format!(
                    "Thawed {account} for {}.\nSignature: {}\n",
                    r.token.symbol, r.signature
                ))
            }

            Command::Tokens => {
                let mut tokens = self.store.list_tokens()?;
                if tokens.is_empty() {
                    return Ok("No managed tokens.\n".into());
                }
                tokens.sort_by(|a, b| a.symbol.cmp(&b.symbol));
                let mut out = String::new();
                for t in tokens {
                    let _ = writeln!(
                        out,
                        "{:<8} {}  supply {}  treasury {}  mint:{} freeze:{}",
                        t.symbol,
                        t.mint_address,
                        format_units(t.supply, t.decimals),
                        format_units(t.treasury_balance, t.decimals),
                        flag(t.mint_authority_active),
                        flag(t.freeze_authority_active),
                    );
                }
                Ok(out)
            }

            Command::Airdrop {
                mint,
                file,
                skip_invalid,
            } => self.airdrop(mint, &file, skip_invalid).await,

            Command::Recover(RecoverCommand::Request { identifier }) => {
                let id = riyal_recovery::request_code(&*self.recovery, &identifier).await?;
                Ok(format!("Verification code sent to {} {id}.\n", id.kind()))
            }

            Command::Recover(RecoverCommand::Verify { identifier, code, force }) => {
                self.ensure_replaceable(force)?;
                let recovered =
                    riyal_recovery::recover_wallet(&*self.recovery, &identifier, &code).await?;
                let key = self
                    .session
                    .set_wallet(recovered.key, recovered.email, recovered.phone_number);
                self.session.save()?;
                Ok(format!("Recovered wallet {}\n", key.public_key()))
            }

            Command::Link { email, phone } => {
                let pk = *self.wallet()?.public_key();
                let (email, phone) =
                    riyal_recovery::link_identity(&*self.recovery, &pk, &email, &phone).await?;
                self.session
                    .set_recovery_contacts(Some(email.clone()), Some(phone.clone()));
                self.session.save()?;
                Ok(format!("Linked {pk} to {email} and {phone}.\n"))
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn wallet(&self) -> anyhow::Result<&Arc<KeyRecord>> {
        self.session
            .wallet()
            .ok_or_else(|| anyhow!("no wallet loaded; run `keygen`, `import` or `recover` first"))
    }

    fn ensure_replaceable(&self, force: bool) -> anyhow::Result<()> {
        if let Some(existing) = self.session.wallet() {
            if !force {
                bail!(
                    "wallet {} is already loaded. \
                     Export it first, then pass --force to replace it.",
                    existing.public_key()
                );
            }
        }
        Ok(())
    }

    async fn engine(&self) -> anyhow::Result<TokenAuthorityEngine> {
        let signer = Arc::clone(self.wallet()?);
        let engine = TokenAuthorityEngine::new(self.session.handle().clone(), signer)
            .with_store(Arc::clone(&self.store))?;
        let active = engine.cluster().identity().await;
        if let Ok(Some(recorded)) = self.store.get_meta(STORE_CLUSTER_KEY) {
            let recorded = String::from_utf8_lossy(&recorded).into_owned();
            if recorded != active.as_str() {
                warn!(store = %recorded, %active, "token registry was built on another cluster");
            }
        }
        Ok(engine)
    }

    async fn amount_for(
        &self,
        engine: &TokenAuthorityEngine,
        mint: &Address,
        text: &str,
    ) -> anyhow::Result<u64> {
        let token = engine
            .token(mint)
            .await
            .ok_or(TreasuryError::UnknownMint(*mint))?;
        parse_token_amount(text, token.decimals)
            .map_err(|e| anyhow!("invalid amount {text:?}: {e}"))
    }

    fn export(&self, out_dir: Option<&Path>) -> anyhow::Result<String> {
        let key = self.wallet()?;
        let record = self.session.wallet_record()?;
        let (email, phone) = record
            .map(|r| (r.email, r.phone_number))
            .unwrap_or_default();
        let bundle = ExportBundle::new(key, email, phone)?;
        let Some(dir) = out_dir else {
            return Ok(bundle.render().to_string());
        };
        let dir = expand_tilde(dir);
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join(bundle.file_name());
        let mut f = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(bundle.render().as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "credential pack written");
        Ok(format!(
            "Credential pack written to {}\nMove it to offline storage and delete this copy.\n",
            path.display()
        ))
    }

    async fn status(&self) -> anyhow::Result<String> {
        let conn = self.session.handle().connection().await;
        let mut out = format!("Cluster: {} ({})\n", conn.identity(), conn.endpoint().url);
        match self.session.wallet() {
            None => out.push_str("Wallet:  none\n"),
            Some(key) => {
                let _ = writeln!(out, "Wallet:  {} ({:?})", key.public_key(), key.origin());
                let balance = conn.get_balance(key.public_key()).await;
                let _ = writeln!(out, "Balance: {}", format_units(balance, NATIVE_DECIMALS));
                if let Some(reminder) = key.backup().reminder() {
                    let _ = writeln!(out, "Warning: {reminder}");
                }
                let contacts = self
                    .session
                    .wallet_record()?
                    .map(|r| r.has_recovery_contacts())
                    .unwrap_or(false);
                if !contacts {
                    out.push_str("Recovery contacts not linked; see `link`.\n");
                }
            }
        }
        Ok(out)
    }

    async fn airdrop(
        &self,
        mint: Address,
        file: &Path,
        skip_invalid: bool,
    ) -> anyhow::Result<String> {
        let engine = Arc::new(self.engine().await?);
        let token = engine
            .token(&mint)
            .await
            .ok_or(TreasuryError::UnknownMint(mint))?;
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("reading recipient list {}", file.display()))?;
        let parsed = parse_recipients(&text, token.decimals);

        let mut out = String::new();
        for r in &parsed.rejected {
            let _ = writeln!(out, "line {}: {} ({})", r.line_number, r.reason, r.content);
        }
        if !parsed.is_clean() && !skip_invalid {
            bail!(
                "{} line(s) rejected; fix them or pass --skip-invalid\n{out}",
                parsed.rejected.len()
            );
        }
        if parsed.entries.is_empty() {
            bail!("no valid recipients in {}", file.display());
        }

        let report = DistributionEngine::new(Arc::clone(&engine))
            .execute(&mint, plan(parsed.entries))
            .await;
        for b in &report.batches {
            let detail = match b.status {
                BatchStatus::Confirmed => b.signature.clone().unwrap_or_default(),
                _ => b.failure_reason.clone().unwrap_or_default(),
            };
            let _ = writeln!(
                out,
                "batch {:>3}  {:>2} recipients  {:<9?}  {detail}",
                b.sequence_index,
                b.entries.len(),
                b.status
            );
        }
        let _ = writeln!(
            out,
            "Paid {} {} to {} recipients.",
            format_units(
                u64::try_from(report.confirmed_amount()).unwrap_or(u64::MAX),
                token.decimals
            ),
            token.symbol,
            report.paid_recipients().len()
        );

        let retry = report.retry_plan();
        if !retry.is_empty() && self.scratch.is_some() {
            let _ = writeln!(
                out,
                "{} batch(es) failed. Dry run: no retry file written.",
                retry.len()
            );
        } else if !retry.is_empty() {
            let retry_path = file.with_extension("retry");
            let mut lines = String::new();
            for e in retry.iter().flat_map(|b| b.entries.iter()) {
                let amount = format_units(e.amount, token.decimals);
                let _ = writeln!(lines, "{}, {amount}", e.address);
            }
            std::fs::write(&retry_path, lines)
                .with_context(|| format!("writing {}", retry_path.display()))?;
            let _ = writeln!(
                out,
                "{} batch(es) failed. Unpaid recipients written to {}.",
                retry.len(),
                retry_path.display()
            );
        }
        Ok(out)
    }
}

fn normalize_contacts(
    email: Option<String>,
    phone: Option<String>,
) -> anyhow::Result<(Option<String>, Option<String>)> {
    let email = match email {
        Some(e) => match Identifier::parse(&e)? {
            id @ Identifier::Email(_) => Some(id.as_str().to_string()),
            _ => bail!("not an email address: {e}"),
        },
        None => None,
    };
    let phone = match phone {
        Some(p) => match Identifier::parse(&p)? {
            id @ Identifier::Phone(_) => Some(id.as_str().to_string()),
            _ => bail!("not a phone number: {p}"),
        },
        None => None,
    };
    Ok((email, phone))
}

fn supply_line(verb: &str, token: &ManagedToken, amount: u64, signature: &str) -> String {
    format!(
        "{verb} {} {}. Supply now {}, treasury {}.\nSignature: {signature}\n",
        format_units(amount, token.decimals),
        token.symbol,
        format_units(token.supply, token.decimals),
        format_units(token.treasury_balance, token.decimals),
    )
}

fn flag(active: bool) -> &'static str {
    if active {
        "active"
    } else {
        "revoked"
    }
}

/// Base units as a decimal string, trailing zeros dropped.
pub fn format_units(amount: u64, decimals: u8) -> String {
    let Some(scale) = 10u128.checked_pow(decimals as u32) else {
        return amount.to_string();
    };
    let whole = amount as u128 / scale;
    let frac = amount as u128 % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0width$}", width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Interactive confirmation read from a line source; only `yes` confirms.
struct PromptConfirm<R> {
    input: Mutex<R>,
}

impl PromptConfirm<BufReader<std::io::Stdin>> {
    fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead + Send> PromptConfirm<R> {
    fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }

    fn read_answer(&self, action: &IrreversibleAction) -> bool {
        eprint!("About to {action}. Type `yes` to continue: ");
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        let mut input = self.input.lock().unwrap_or_else(|p| p.into_inner());
        match input.read_line(&mut line) {
            Ok(_) => line.trim().eq_ignore_ascii_case("yes"),
            Err(_) => false,
        }
    }
}

impl<R: BufRead + Send> ConfirmIrreversible for PromptConfirm<R> {
    fn confirm(&self, action: &IrreversibleAction) -> bool {
        // The prompt blocks; hand the worker thread back to the runtime first.
        match Handle::try_current().map(|h| h.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| self.read_answer(action))
            }
            _ => self.read_answer(action),
        }
    }
}
