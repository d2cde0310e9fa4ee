//! # Economy Configuration & Constants
//!
//! Every magic number in the KRMA economy lives here. If you're hardcoding
//! a constant somewhere else, you're doing it wrong and you owe the team
//! coffee.
//!
//! These values define the shape of the economy. Changing `TOTAL_SUPPLY`
//! after a deployment has minted wallets is somewhere between "difficult"
//! and "career-ending", so choose wisely during development.

use crate::krma::Krma;

// ---------------------------------------------------------------------------
// Supply
// ---------------------------------------------------------------------------

/// The complete KRMA supply: 100 billion tokens, minted once at genesis
/// into the primary reserve. Every wallet balance in existence is a slice
/// of this number; `verify_conservation` checks that the slices still add
/// up to the recorded mint total.
pub const TOTAL_SUPPLY: Krma = 100_000_000_000;

/// Owner reference of the primary reserve wallet. Holds the unallocated
/// supply; signup grants and baseline drops are paid out of it.
pub const PRIMARY_RESERVE_REF: &str = "the-terminal";

/// Owner reference of the reclaim reserve wallet. Destroyed wallets and
/// dissolution remainders are credited here so that value re-enters the
/// system sink instead of vanishing.
pub const RECLAIM_RESERVE_REF: &str = "terminal-reclaim";

// ---------------------------------------------------------------------------
// Allocation Policy
// ---------------------------------------------------------------------------

/// One-time grant paid from the primary reserve when an owner signs up.
pub const SIGNUP_GRANT: Krma = 10_000;

/// Number of months the baseline allocation schedule stays active after
/// signup. Past this window the profile's baseline is deactivated and no
/// further drops are paid.
pub const BASELINE_WINDOW_MONTHS: u32 = 36;

/// Month offset (since signup) at which the baseline drop peaks.
pub const BASELINE_MU_MONTHS: f64 = 6.0;

/// Width of the baseline bell curve, in months.
pub const BASELINE_SIGMA_MONTHS: f64 = 4.0;

/// The drop amount at the peak of the curve.
pub const BASELINE_PEAK_AMOUNT: Krma = 2_000;

/// Drops smaller than this are not paid at all. Saves the ledger from a
/// long tail of single-digit transactions as the curve decays.
pub const BASELINE_CEASE_FLOOR: Krma = 25;

// ---------------------------------------------------------------------------
// Ledger Limits
// ---------------------------------------------------------------------------

/// Maximum transaction description length in bytes. Longer descriptions
/// are truncated at a character boundary when the record is created.
/// Enough for a short sentence, not enough for your novel.
pub const MAX_DESCRIPTION_LENGTH: usize = 512;

/// Retention window for ledger transactions, in days. `prune_transactions`
/// deletes records older than this; it is the only sanctioned way an audit
/// record ever leaves the store outside the destroy cascade.
pub const TX_RETENTION_DAYS: i64 = 365;

// ---------------------------------------------------------------------------
// Fixed-Point Scales
// ---------------------------------------------------------------------------

/// Basis-point scale used for all fixed-point ratios (dissolution returns,
/// world lushness). 10_000 bps = 1.0.
pub const BPS_SCALE: u32 = 10_000;

/// Lushness of a world that had liquid KRMA committed at creation: 1.0.
pub const LUSHNESS_INVESTED_BPS: u32 = 10_000;

/// Lushness of a world created without any investment: 0.1. Barren, but
/// it exists.
pub const LUSHNESS_BARREN_BPS: u32 = 1_000;
