// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # KRMA Admin
//!
//! Entry point for the `krma-admin` binary. Parses CLI arguments,
//! initializes logging, opens the ledger database, and dispatches to the
//! requested operation.
//!
//! The binary supports five subcommands:
//!
//! - `init`    — bootstrap a database: reserves + genesis mint
//! - `verify`  — conservation audit (non-zero exit on violation)
//! - `wallet`  — inspect one wallet and its recent history
//! - `destroy` — administrative wallet destruction
//! - `version` — print build version information

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use krma_ledger::admin::TokenomicsAdmin;
use krma_ledger::config;
use krma_ledger::crystal::CrystallizationEngine;
use krma_ledger::identity::Actor;
use krma_ledger::krma::format_krma;
use krma_ledger::ledger::LedgerService;
use krma_ledger::store::LedgerDb;
use krma_ledger::wallet::WalletKey;

use cli::{Commands, KrmaAdminCli};
use logging::LogFormat;

fn main() -> Result<()> {
    let args = KrmaAdminCli::parse();
    logging::init_logging(
        "krma_admin=info,krma_ledger=info",
        LogFormat::from_str_lossy(&args.log_format),
    );

    match &args.command {
        Commands::Init => init(&args),
        Commands::Verify => verify(&args),
        Commands::Wallet(wallet_args) => inspect_wallet(&args, wallet_args),
        Commands::Destroy(destroy_args) => destroy(&args, destroy_args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn open_db(args: &KrmaAdminCli) -> Result<LedgerDb> {
    LedgerDb::open(&args.data_dir)
        .with_context(|| format!("opening ledger database at {}", args.data_dir.display()))
}

/// Bootstraps the reserves and the genesis supply. Idempotent.
fn init(args: &KrmaAdminCli) -> Result<()> {
    let db = open_db(args)?;
    let admin = TokenomicsAdmin::new(&db);

    let minted = admin.bootstrap_reserves(config::TOTAL_SUPPLY)?;
    if minted {
        info!(
            supply = %format_krma(config::TOTAL_SUPPLY),
            "genesis supply minted into the primary reserve"
        );
    } else {
        info!("ledger already initialized; nothing to do");
    }

    let report = admin.verify_conservation()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    report.ensure()?;
    Ok(())
}

/// Runs the conservation audit and exits non-zero on a violation.
fn verify(args: &KrmaAdminCli) -> Result<()> {
    let db = open_db(args)?;
    let admin = TokenomicsAdmin::new(&db);

    let report = admin.verify_conservation()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_valid {
        bail!(
            "conservation violation: difference of {} against the recorded supply",
            report.difference
        );
    }
    info!(total = %format_krma(report.total), "books balance");
    Ok(())
}

/// Prints one wallet and its recent history as JSON.
fn inspect_wallet(args: &KrmaAdminCli, wallet_args: &cli::WalletArgs) -> Result<()> {
    let key = WalletKey::parse(&wallet_args.key)
        .with_context(|| format!("parsing wallet key {:?}", wallet_args.key))?;

    let db = open_db(args)?;
    let service = LedgerService::new(&db);
    let wallet = service.wallet(&key)?;
    let history = service.transaction_history(&key, wallet_args.history)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "wallet": wallet,
            "history": history,
        }))?
    );
    Ok(())
}

/// Destroys a wallet through the cascade path.
fn destroy(args: &KrmaAdminCli, destroy_args: &cli::DestroyArgs) -> Result<()> {
    let key = WalletKey::parse(&destroy_args.key)
        .with_context(|| format!("parsing wallet key {:?}", destroy_args.key))?;

    let db = open_db(args)?;
    let engine = CrystallizationEngine::new(&db);
    let actor = Actor::admin(destroy_args.admin.clone());

    let report = engine.destroy_wallet(&actor, &key, destroy_args.reason.as_deref())?;
    info!(
        wallet = %report.wallet,
        returned = %format_krma(report.total),
        "wallet destroyed"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    // Destruction must never unbalance the books; fail loudly if it did.
    TokenomicsAdmin::new(&db).verify_conservation()?.ensure()?;
    Ok(())
}

fn print_version() {
    println!("krma-admin {}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_and_verify_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        let admin = TokenomicsAdmin::new(&db);
        assert!(admin.bootstrap_reserves(config::TOTAL_SUPPLY).unwrap());
        let report = admin.verify_conservation().unwrap();
        assert!(report.is_valid);
        assert_eq!(report.total, config::TOTAL_SUPPLY);
    }
}
