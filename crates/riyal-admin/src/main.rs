use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use riyal_admin::{App, Args};

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,riyal=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut app = App::open(&args).await.context("starting riyal-admin")?;
    let output = app.execute(args.command.clone()).await?;
    print!("{output}");
    Ok(())
}
