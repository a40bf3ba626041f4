//! Backfill empty tallies for every poll in the catalog.
//!
//! Safe to run repeatedly: once all known polls have an entry the vote file
//! is left untouched.

use std::collections::BTreeSet;
use std::process::ExitCode;

use clap::Parser;
use dotenvy::dotenv;
use tracing::{error, info};

use service::polls::{catalog, VoteStore};
use service::runtime;

#[derive(Debug, Parser)]
#[command(name = "ensure-polls", about = "Insert empty vote tallies for polls missing from the vote file")]
struct Args {
    /// Poll catalog (JSON). Defaults to `storage.catalog_file` from config.
    #[arg(long)]
    catalog: Option<String>,
    /// Vote file. Defaults to `storage.data_dir`/`storage.votes_file`.
    #[arg(long)]
    votes: Option<String>,
    /// Report missing polls without writing.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv().ok();
    common::utils::logging::init_logging_default();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "ensure-polls failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let cfg = configs::AppConfig::load_or_env()?;
    let catalog_path = args
        .catalog
        .or(cfg.storage.catalog_file.clone())
        .ok_or_else(|| anyhow::anyhow!("no catalog given; pass --catalog or set storage.catalog_file"))?;
    let votes_path = args
        .votes
        .unwrap_or_else(|| runtime::data_path(&cfg.storage.data_dir, &cfg.storage.votes_file));

    let known = catalog::load_catalog(&catalog_path).await?;
    let store = VoteStore::open(&votes_path);
    let present = store.get_all().await;
    let missing: BTreeSet<&String> = known.iter().filter(|id| !present.contains_key(*id)).collect();
    info!(catalog = %catalog_path, votes = %votes_path, known = known.len(), missing = missing.len(), "catalog compared");
    for id in &missing {
        println!("missing: {id}");
    }

    if args.dry_run {
        println!("dry run: {} poll(s) would be added", missing.len());
        return Ok(());
    }

    let changed = store.ensure_polls(&known).await?;
    if changed {
        println!("updated {votes_path}: {} poll(s) added", missing.len());
    } else {
        println!("{votes_path} already complete");
    }
    Ok(())
}
