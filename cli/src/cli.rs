//! # CLI Interface
//!
//! Defines the command-line argument structure for `krma-admin` using
//! `clap` derive. Supports five subcommands: `init`, `verify`, `wallet`,
//! `destroy`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// KRMA ledger operator tool.
///
/// Bootstraps a ledger database, audits conservation, inspects wallets,
/// and performs administrative wallet destruction. Reports are written to
/// stdout as JSON; logs go to stderr.
#[derive(Parser, Debug)]
#[command(
    name = "krma-admin",
    about = "KRMA ledger operator tool",
    version,
    propagate_version = true
)]
pub struct KrmaAdminCli {
    /// Path to the ledger database directory.
    #[arg(long, short = 'd', env = "KRMA_DATA_DIR", default_value = "./krma-data", global = true)]
    pub data_dir: PathBuf,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "KRMA_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `krma-admin` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a ledger database — creates the reserve wallets and
    /// mints the genesis supply. Safe to re-run; the mint happens once.
    Init,
    /// Audit conservation: sum every wallet against the recorded mint
    /// total. Exits non-zero on a violation.
    Verify,
    /// Inspect one wallet and its recent history.
    Wallet(WalletArgs),
    /// Destroy a wallet, returning its holdings to the reclaim reserve
    /// and cascading deletion of the owner's records.
    Destroy(DestroyArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `wallet` subcommand.
#[derive(Parser, Debug)]
pub struct WalletArgs {
    /// The wallet to inspect, as "<owner-type>:<owner-ref>"
    /// (e.g. "watcher:gm-7f3a").
    pub key: String,

    /// How many recent transactions to include.
    #[arg(long, default_value_t = 20)]
    pub history: usize,
}

/// Arguments for the `destroy` subcommand.
#[derive(Parser, Debug)]
pub struct DestroyArgs {
    /// The wallet to destroy, as "<owner-type>:<owner-ref>".
    pub key: String,

    /// Owner reference of the administrator performing the destruction.
    /// Recorded in the audit trail.
    #[arg(long, env = "KRMA_ADMIN_REF")]
    pub admin: String,

    /// Reason recorded on the audit transaction.
    #[arg(long)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        KrmaAdminCli::command().debug_assert();
    }
}
