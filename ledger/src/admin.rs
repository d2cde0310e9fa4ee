//! # Tokenomics Administration
//!
//! Bootstrap, allocation policy, administrative correction, and the
//! conservation audit. This is the only module allowed to change the
//! recorded supply — and it does so exactly once, at genesis. Every other
//! operation it performs settles against the primary reserve so that
//! Σ(liquid + crystalized) over all wallets stays pinned to the recorded
//! mint total.
//!
//! ## Allocation Schedule
//!
//! New owners receive a one-time signup grant, then a monthly "baseline
//! drop" that follows a bell curve over the months since signup: small at
//! first, peaking at `mu_months`, decaying until the window closes. The
//! curve evaluation is the one place f64 appears in this crate; the result
//! is floored to an integer KRMA amount before it touches a wallet.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::Transactional;
use thiserror::Error;
use tracing::{info, warn};

use crate::config;
use crate::identity::{self, OwnerProfile};
use crate::krma::{krma_string, signed_krma_string, Krma, SignedKrma};
use crate::ledger::transaction::{LedgerTransaction, TransactionType};
use crate::store::db::{self, DbError, DbResult, LedgerDb};
use crate::wallet::{BalanceKind, OwnerType, Wallet, WalletError, WalletKey};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from administrative operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// A required wallet (usually a reserve) is missing.
    #[error("wallet not found: {0}")]
    WalletNotFound(WalletKey),

    /// No profile exists for the owner.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// The operation would pair the primary reserve with itself.
    #[error("cannot re-seed the primary reserve against itself: {0}")]
    InvalidTarget(WalletKey),

    /// A balance operation failed (reserve drained, overflow).
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// The books don't balance. Surfaced by
    /// [`ConservationReport::ensure`]; never ignored silently.
    #[error("conservation violation: total {total}, expected {expected} (difference {difference})")]
    Conservation {
        /// Sum of every wallet's holdings.
        total: Krma,
        /// Sum of all recorded mint events.
        expected: Krma,
        /// `total - expected`.
        difference: SignedKrma,
    },

    /// The store itself failed.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

// ---------------------------------------------------------------------------
// AllocationSchedule
// ---------------------------------------------------------------------------

/// The time-based allocation policy for new owners.
///
/// Supplied by the deployment; [`AllocationSchedule::default`] carries the
/// values from [`crate::config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSchedule {
    /// One-time grant at signup.
    #[serde(with = "krma_string")]
    pub signup_grant: Krma,
    /// Months after signup during which baseline drops are paid.
    pub window_months: u32,
    /// Month offset of the curve's peak.
    pub mu_months: f64,
    /// Width of the curve.
    pub sigma_months: f64,
    /// The drop amount at the peak.
    #[serde(with = "krma_string")]
    pub peak_amount: Krma,
    /// Drops below this are not paid.
    #[serde(with = "krma_string")]
    pub cease_floor: Krma,
}

impl Default for AllocationSchedule {
    fn default() -> Self {
        Self {
            signup_grant: config::SIGNUP_GRANT,
            window_months: config::BASELINE_WINDOW_MONTHS,
            mu_months: config::BASELINE_MU_MONTHS,
            sigma_months: config::BASELINE_SIGMA_MONTHS,
            peak_amount: config::BASELINE_PEAK_AMOUNT,
            cease_floor: config::BASELINE_CEASE_FLOOR,
        }
    }
}

impl AllocationSchedule {
    /// The baseline drop for month `t` since signup.
    ///
    /// Zero outside `1..=window_months` and below the cease floor;
    /// otherwise `floor(peak * exp(-((t-mu)/sigma)^2 / 2))`.
    pub fn monthly_drop(&self, months_since_signup: u32) -> Krma {
        let t = months_since_signup;
        if t < 1 || t > self.window_months {
            return 0;
        }
        let g = (-0.5 * ((f64::from(t) - self.mu_months) / self.sigma_months).powi(2)).exp();
        let amount = (self.peak_amount as f64 * g).floor() as Krma;
        if amount < self.cease_floor {
            0
        } else {
            amount
        }
    }
}

// ---------------------------------------------------------------------------
// Mint Events
// ---------------------------------------------------------------------------

/// One authorized supply change. The sum of all mint events is the
/// baseline `verify_conservation` checks against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintEvent {
    /// Amount added to the supply.
    #[serde(with = "krma_string")]
    pub amount: Krma,
    /// Why this mint was authorized.
    pub description: String,
    /// When it happened.
    pub created_at: chrono::DateTime<Utc>,
}

const MINT_PREFIX: &str = "mint:";

fn mint_key(seq: u64) -> Vec<u8> {
    let mut key = MINT_PREFIX.as_bytes().to_vec();
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

// ---------------------------------------------------------------------------
// ConservationReport
// ---------------------------------------------------------------------------

/// Result of a conservation audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConservationReport {
    /// Sum of `liquid + crystalized` over every wallet.
    #[serde(with = "krma_string")]
    pub total: Krma,
    /// Sum of all recorded mint events.
    #[serde(with = "krma_string")]
    pub expected: Krma,
    /// `total - expected`. Zero when the books balance.
    #[serde(with = "signed_krma_string")]
    pub difference: SignedKrma,
    /// `difference == 0`.
    pub is_valid: bool,
}

impl ConservationReport {
    /// Turns an invalid report into a hard error for callers that must
    /// not proceed on broken books.
    pub fn ensure(&self) -> Result<(), AdminError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(AdminError::Conservation {
                total: self.total,
                expected: self.expected,
                difference: self.difference,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// TokenomicsAdmin
// ---------------------------------------------------------------------------

/// Bootstrap, signup, correction, and audit operations.
#[derive(Debug, Clone)]
pub struct TokenomicsAdmin {
    db: LedgerDb,
}

impl TokenomicsAdmin {
    pub fn new(db: &LedgerDb) -> Self {
        Self { db: db.clone() }
    }

    // -- Bootstrap ----------------------------------------------------------

    /// Creates the reserve wallets and mints the genesis supply into the
    /// primary reserve. Idempotent: if a genesis mint is already recorded,
    /// nothing happens and `false` is returned.
    pub fn bootstrap_reserves(&self, genesis_supply: Krma) -> Result<bool, AdminError> {
        let primary = WalletKey::primary_reserve();
        let reclaim = WalletKey::reclaim_reserve();
        let primary_bytes = primary.encode().into_bytes();
        let reclaim_bytes = reclaim.encode().into_bytes();
        let genesis_key = mint_key(0);

        let trees = (self.db.wallets_tree(), self.db.metadata_tree());
        let minted = db::flatten_txn(trees.transaction(|(wallets, metadata)| -> sled::transaction::ConflictableTransactionResult<bool, AdminError> {
            if metadata.get(&genesis_key)?.is_some() {
                return Ok(false);
            }

            let mut primary_wallet = Wallet::new(primary.clone());
            primary_wallet
                .credit(BalanceKind::Liquid, genesis_supply)
                .map_err(db::abort)?;
            let reclaim_wallet = Wallet::new(reclaim.clone());

            let event = MintEvent {
                amount: genesis_supply,
                description: "Genesis supply".to_string(),
                created_at: Utc::now(),
            };

            wallets.insert(
                primary_bytes.clone(),
                db::encode(&primary_wallet).map_err(db::abort)?,
            )?;
            wallets.insert(
                reclaim_bytes.clone(),
                db::encode(&reclaim_wallet).map_err(db::abort)?,
            )?;
            metadata.insert(genesis_key.clone(), db::encode(&event).map_err(db::abort)?)?;
            Ok(true)
        }))?;

        if minted {
            info!(supply = %genesis_supply, "genesis supply minted into primary reserve");
        }
        Ok(minted)
    }

    /// All recorded mint events, oldest first.
    pub fn mint_events(&self) -> DbResult<Vec<MintEvent>> {
        let mut events = Vec::new();
        for entry in self.db.metadata_tree().scan_prefix(MINT_PREFIX.as_bytes()) {
            let (_key, value) = entry?;
            events.push(db::decode(&value)?);
        }
        Ok(events)
    }

    /// The supply the books should sum to: Σ mint events.
    pub fn expected_supply(&self) -> DbResult<Krma> {
        Ok(self.mint_events()?.iter().map(|e| e.amount).sum())
    }

    // -- Signup -------------------------------------------------------------

    /// Enrolls a new owner: profile row, wallet, and the signup grant paid
    /// from the primary reserve, all in one store transaction.
    ///
    /// Idempotent: if the owner already has a profile, nothing happens and
    /// `false` is returned.
    ///
    /// # Errors
    ///
    /// [`AdminError::WalletNotFound`] if the primary reserve was never
    /// bootstrapped; [`WalletError::InsufficientFunds`] (via
    /// [`AdminError::Wallet`]) if the reserve can't cover the grant.
    pub fn on_signup(
        &self,
        owner_type: OwnerType,
        owner_ref: &str,
        signup_month: u32,
        schedule: &AllocationSchedule,
    ) -> Result<bool, AdminError> {
        let key = WalletKey::new(owner_type, owner_ref);
        let reserve = WalletKey::primary_reserve();
        if key == reserve {
            return Err(AdminError::InvalidTarget(reserve));
        }
        let key_bytes = key.encode().into_bytes();
        let reserve_bytes = reserve.encode().into_bytes();
        let profile_key = identity::profile_key(owner_ref);
        let grant = schedule.signup_grant;

        let trees = (
            self.db.wallets_tree(),
            self.db.identity_tree(),
            self.db.transactions_tree(),
        );
        let enrolled = db::flatten_txn(trees.transaction(|(wallets, identities, records)| -> sled::transaction::ConflictableTransactionResult<bool, AdminError> {
            if identities.get(&profile_key)?.is_some() {
                return Ok(false);
            }

            let raw_reserve = wallets
                .get(&reserve_bytes)?
                .ok_or_else(|| db::abort(AdminError::WalletNotFound(reserve.clone())))?;
            let mut reserve_wallet: Wallet = db::decode(&raw_reserve).map_err(db::abort)?;

            // The wallet may predate the profile (admin re-seed); credit
            // into it rather than failing.
            let mut wallet = match wallets.get(&key_bytes)? {
                Some(raw) => db::decode(&raw).map_err(db::abort)?,
                None => Wallet::new(key.clone()),
            };

            reserve_wallet
                .debit(BalanceKind::Liquid, grant)
                .map_err(db::abort)?;
            wallet
                .credit(BalanceKind::Liquid, grant)
                .map_err(db::abort)?;

            let profile = OwnerProfile {
                owner_ref: owner_ref.to_string(),
                owner_type,
                signup_month,
                baseline_active: true,
                created_at: Utc::now(),
            };

            let seq = reserve_wallet.tx_count;
            reserve_wallet.tx_count += 1;
            let record = LedgerTransaction::record(
                reserve.clone(),
                TransactionType::Transfer,
                -(grant as SignedKrma),
                reserve_wallet.liquid(),
                "Signup grant",
            )
            .with_counterparty(key.clone());

            wallets.insert(
                reserve_bytes.clone(),
                db::encode(&reserve_wallet).map_err(db::abort)?,
            )?;
            wallets.insert(key_bytes.clone(), db::encode(&wallet).map_err(db::abort)?)?;
            identities.insert(profile_key.clone(), db::encode(&profile).map_err(db::abort)?)?;
            records.insert(
                db::tx_key(&reserve, seq),
                db::encode(&record).map_err(db::abort)?,
            )?;
            Ok(true)
        }))?;

        if enrolled {
            info!(owner = %key, grant = %grant, "owner enrolled");
        }
        Ok(enrolled)
    }

    /// Pays the baseline drop for the current month, if the owner's
    /// schedule is still active. Returns the amount paid (possibly zero).
    ///
    /// Deactivates the baseline once the window has fully elapsed.
    pub fn tick_baseline(
        &self,
        owner_ref: &str,
        current_month: u32,
        schedule: &AllocationSchedule,
    ) -> Result<Krma, AdminError> {
        let profile = identity::IdentityRegistry::new(&self.db)
            .profile(owner_ref)?
            .ok_or_else(|| AdminError::ProfileNotFound(owner_ref.to_string()))?;
        if !profile.baseline_active {
            return Ok(0);
        }

        let months_since = current_month.saturating_sub(profile.signup_month);
        let drop = schedule.monthly_drop(months_since);
        let window_elapsed = months_since >= schedule.window_months;
        if drop == 0 && !window_elapsed {
            return Ok(0);
        }

        let key = WalletKey::new(profile.owner_type, owner_ref);
        let reserve = WalletKey::primary_reserve();
        let key_bytes = key.encode().into_bytes();
        let reserve_bytes = reserve.encode().into_bytes();
        let profile_key = identity::profile_key(owner_ref);

        let trees = (
            self.db.wallets_tree(),
            self.db.identity_tree(),
            self.db.transactions_tree(),
        );
        db::flatten_txn(trees.transaction(|(wallets, identities, records)| -> sled::transaction::ConflictableTransactionResult<(), AdminError> {
            if drop > 0 {
                let raw_reserve = wallets
                    .get(&reserve_bytes)?
                    .ok_or_else(|| db::abort(AdminError::WalletNotFound(reserve.clone())))?;
                let mut reserve_wallet: Wallet = db::decode(&raw_reserve).map_err(db::abort)?;
                let raw_wallet = wallets
                    .get(&key_bytes)?
                    .ok_or_else(|| db::abort(AdminError::WalletNotFound(key.clone())))?;
                let mut wallet: Wallet = db::decode(&raw_wallet).map_err(db::abort)?;

                reserve_wallet
                    .debit(BalanceKind::Liquid, drop)
                    .map_err(db::abort)?;
                wallet.credit(BalanceKind::Liquid, drop).map_err(db::abort)?;

                let seq = reserve_wallet.tx_count;
                reserve_wallet.tx_count += 1;
                let record = LedgerTransaction::record(
                    reserve.clone(),
                    TransactionType::Transfer,
                    -(drop as SignedKrma),
                    reserve_wallet.liquid(),
                    &format!("Baseline drop, month {current_month}"),
                )
                .with_counterparty(key.clone());

                wallets.insert(
                    reserve_bytes.clone(),
                    db::encode(&reserve_wallet).map_err(db::abort)?,
                )?;
                wallets.insert(key_bytes.clone(), db::encode(&wallet).map_err(db::abort)?)?;
                records.insert(
                    db::tx_key(&reserve, seq),
                    db::encode(&record).map_err(db::abort)?,
                )?;
            }

            if window_elapsed {
                let mut closed = profile.clone();
                closed.baseline_active = false;
                identities.insert(profile_key.clone(), db::encode(&closed).map_err(db::abort)?)?;
            }
            Ok(())
        }))?;

        if drop > 0 {
            info!(owner = %owner_ref, month = current_month, amount = %drop, "baseline drop paid");
        }
        Ok(drop)
    }

    // -- Correction ---------------------------------------------------------

    /// Idempotent absolute re-seed: sets a wallet's total holdings to
    /// exactly `target`, settling the difference against the primary
    /// reserve so supply is conserved. The wallet is created if absent.
    ///
    /// When draining, liquid is taken first and crystalized only for the
    /// remainder. Returns the wallet's new total. Calling twice with the
    /// same target is a no-op the second time.
    pub fn initialize_wallet(&self, key: &WalletKey, target: Krma) -> Result<Krma, AdminError> {
        let reserve = WalletKey::primary_reserve();
        if *key == reserve {
            return Err(AdminError::InvalidTarget(reserve));
        }
        let key_bytes = key.encode().into_bytes();
        let reserve_bytes = reserve.encode().into_bytes();

        let trees = (self.db.wallets_tree(), self.db.transactions_tree());
        let new_total = db::flatten_txn(trees.transaction(|(wallets, records)| -> sled::transaction::ConflictableTransactionResult<Krma, AdminError> {
            let mut wallet: Wallet = match wallets.get(&key_bytes)? {
                Some(raw) => db::decode(&raw).map_err(db::abort)?,
                None => Wallet::new(key.clone()),
            };
            let current = wallet.total();
            if current == target {
                // Already there; write the row only if it's new.
                if wallets.get(&key_bytes)?.is_none() {
                    wallets.insert(key_bytes.clone(), db::encode(&wallet).map_err(db::abort)?)?;
                }
                return Ok(current);
            }

            let raw_reserve = wallets
                .get(&reserve_bytes)?
                .ok_or_else(|| db::abort(AdminError::WalletNotFound(reserve.clone())))?;
            let mut reserve_wallet: Wallet = db::decode(&raw_reserve).map_err(db::abort)?;

            let (tx_type, signed) = if target > current {
                let delta = target - current;
                reserve_wallet
                    .debit(BalanceKind::Liquid, delta)
                    .map_err(db::abort)?;
                wallet.credit(BalanceKind::Liquid, delta).map_err(db::abort)?;
                (TransactionType::Deposit, delta as SignedKrma)
            } else {
                let mut delta = current - target;
                let from_liquid = delta.min(wallet.liquid());
                if from_liquid > 0 {
                    wallet.debit(BalanceKind::Liquid, from_liquid).map_err(db::abort)?;
                    delta -= from_liquid;
                }
                if delta > 0 {
                    wallet
                        .debit(BalanceKind::Crystalized, delta)
                        .map_err(db::abort)?;
                }
                reserve_wallet
                    .credit(BalanceKind::Liquid, current - target)
                    .map_err(db::abort)?;
                (TransactionType::Withdrawal, -((current - target) as SignedKrma))
            };

            let seq = wallet.tx_count;
            wallet.tx_count += 1;
            let record = LedgerTransaction::record(
                key.clone(),
                tx_type,
                signed,
                wallet.liquid(),
                &format!("Administrative re-seed to {target} KRMA"),
            )
            .with_counterparty(reserve.clone());

            wallets.insert(key_bytes.clone(), db::encode(&wallet).map_err(db::abort)?)?;
            wallets.insert(
                reserve_bytes.clone(),
                db::encode(&reserve_wallet).map_err(db::abort)?,
            )?;
            records.insert(db::tx_key(key, seq), db::encode(&record).map_err(db::abort)?)?;
            Ok(wallet.total())
        }))?;

        info!(wallet = %key, target = %target, "wallet re-seeded");
        Ok(new_total)
    }

    // -- Audit --------------------------------------------------------------

    /// Sums every wallet's holdings and compares against the recorded mint
    /// total. Side-effect-free; runnable at any time.
    pub fn verify_conservation(&self) -> Result<ConservationReport, AdminError> {
        let mut total: Krma = 0;
        for wallet in self.db.wallets() {
            total += wallet?.total();
        }
        let expected = self.expected_supply()?;
        let difference = total as SignedKrma - expected as SignedKrma;
        let report = ConservationReport {
            total,
            expected,
            difference,
            is_valid: difference == 0,
        };
        if !report.is_valid {
            warn!(
                total = %report.total,
                expected = %report.expected,
                difference = %report.difference,
                "conservation violation detected"
            );
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityRegistry;
    use crate::ledger::service::LedgerService;

    fn setup() -> (LedgerDb, TokenomicsAdmin) {
        let db = LedgerDb::open_temporary().unwrap();
        let admin = TokenomicsAdmin::new(&db);
        admin.bootstrap_reserves(config::TOTAL_SUPPLY).unwrap();
        (db, admin)
    }

    #[test]
    fn schedule_is_zero_outside_window() {
        let schedule = AllocationSchedule::default();
        assert_eq!(schedule.monthly_drop(0), 0);
        assert_eq!(schedule.monthly_drop(schedule.window_months + 1), 0);
    }

    #[test]
    fn schedule_peaks_at_mu() {
        let schedule = AllocationSchedule::default();
        let at_peak = schedule.monthly_drop(schedule.mu_months as u32);
        assert_eq!(at_peak, schedule.peak_amount);

        // Either side of the peak pays less.
        assert!(schedule.monthly_drop(1) < at_peak);
        assert!(schedule.monthly_drop(schedule.mu_months as u32 + 10) < at_peak);
    }

    #[test]
    fn schedule_applies_cease_floor() {
        let schedule = AllocationSchedule {
            cease_floor: 1_999,
            ..AllocationSchedule::default()
        };
        // At the far tail the raw amount is tiny; the floor zeroes it.
        assert_eq!(schedule.monthly_drop(schedule.window_months), 0);
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let (db, admin) = setup();
        assert_eq!(admin.expected_supply().unwrap(), config::TOTAL_SUPPLY);

        let again = admin.bootstrap_reserves(config::TOTAL_SUPPLY).unwrap();
        assert!(!again);
        assert_eq!(admin.expected_supply().unwrap(), config::TOTAL_SUPPLY);
        assert_eq!(db.wallet_count(), 2);

        admin.verify_conservation().unwrap().ensure().unwrap();
    }

    #[test]
    fn signup_grants_from_reserve() {
        let (db, admin) = setup();
        let schedule = AllocationSchedule::default();

        let enrolled = admin
            .on_signup(OwnerType::Watcher, "gm-alice", 1, &schedule)
            .unwrap();
        assert!(enrolled);

        let wallet = db.get_wallet(&WalletKey::watcher("gm-alice")).unwrap().unwrap();
        assert_eq!(wallet.liquid(), schedule.signup_grant);

        let reserve = db.get_wallet(&WalletKey::primary_reserve()).unwrap().unwrap();
        assert_eq!(reserve.liquid(), config::TOTAL_SUPPLY - schedule.signup_grant);

        let profile = IdentityRegistry::new(&db).profile("gm-alice").unwrap().unwrap();
        assert!(profile.baseline_active);
        assert_eq!(profile.signup_month, 1);

        admin.verify_conservation().unwrap().ensure().unwrap();
    }

    #[test]
    fn signup_is_idempotent() {
        let (db, admin) = setup();
        let schedule = AllocationSchedule::default();
        admin
            .on_signup(OwnerType::Watcher, "gm-alice", 1, &schedule)
            .unwrap();
        let again = admin
            .on_signup(OwnerType::Watcher, "gm-alice", 5, &schedule)
            .unwrap();
        assert!(!again);

        // No double grant, and the original signup month stands.
        let wallet = db.get_wallet(&WalletKey::watcher("gm-alice")).unwrap().unwrap();
        assert_eq!(wallet.liquid(), schedule.signup_grant);
        let profile = IdentityRegistry::new(&db).profile("gm-alice").unwrap().unwrap();
        assert_eq!(profile.signup_month, 1);
    }

    #[test]
    fn signup_fails_when_reserve_is_dry() {
        let db = LedgerDb::open_temporary().unwrap();
        let admin = TokenomicsAdmin::new(&db);
        admin.bootstrap_reserves(100).unwrap(); // less than the grant

        let err = admin
            .on_signup(OwnerType::Watcher, "gm-alice", 1, &AllocationSchedule::default())
            .unwrap_err();
        assert!(matches!(
            err,
            AdminError::Wallet(WalletError::InsufficientFunds { .. })
        ));
        assert!(db.get_wallet(&WalletKey::watcher("gm-alice")).unwrap().is_none());
    }

    #[test]
    fn baseline_pays_and_eventually_closes() {
        let (db, admin) = setup();
        let schedule = AllocationSchedule::default();
        admin
            .on_signup(OwnerType::Watcher, "gm-alice", 1, &schedule)
            .unwrap();

        let peak_month = 1 + schedule.mu_months as u32;
        let paid = admin.tick_baseline("gm-alice", peak_month, &schedule).unwrap();
        assert_eq!(paid, schedule.peak_amount);

        let wallet = db.get_wallet(&WalletKey::watcher("gm-alice")).unwrap().unwrap();
        assert_eq!(wallet.liquid(), schedule.signup_grant + schedule.peak_amount);

        // Far past the window: nothing paid, baseline deactivated.
        let paid = admin
            .tick_baseline("gm-alice", 1 + schedule.window_months, &schedule)
            .unwrap();
        assert_eq!(paid, 0);
        let profile = IdentityRegistry::new(&db).profile("gm-alice").unwrap().unwrap();
        assert!(!profile.baseline_active);

        // Subsequent ticks are no-ops even at paying months.
        let paid = admin.tick_baseline("gm-alice", peak_month, &schedule).unwrap();
        assert_eq!(paid, 0);

        admin.verify_conservation().unwrap().ensure().unwrap();
    }

    #[test]
    fn tick_without_profile_fails() {
        let (_db, admin) = setup();
        assert!(matches!(
            admin.tick_baseline("nobody", 3, &AllocationSchedule::default()),
            Err(AdminError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn initialize_wallet_reseeds_in_both_directions() {
        let (db, admin) = setup();
        let key = WalletKey::trailblazer("player-1");

        // Up from nothing.
        assert_eq!(admin.initialize_wallet(&key, 5_000).unwrap(), 5_000);
        assert_eq!(db.get_wallet(&key).unwrap().unwrap().liquid(), 5_000);
        admin.verify_conservation().unwrap().ensure().unwrap();

        // Idempotent.
        assert_eq!(admin.initialize_wallet(&key, 5_000).unwrap(), 5_000);

        // Down.
        assert_eq!(admin.initialize_wallet(&key, 1_200).unwrap(), 1_200);
        assert_eq!(db.get_wallet(&key).unwrap().unwrap().liquid(), 1_200);
        admin.verify_conservation().unwrap().ensure().unwrap();
    }

    #[test]
    fn initialize_drains_liquid_before_crystalized() {
        let (db, admin) = setup();
        let key = WalletKey::watcher("gm-1");
        admin.initialize_wallet(&key, 1_000).unwrap();

        // Bind most of it.
        let mut wallet = db.get_wallet(&key).unwrap().unwrap();
        wallet.debit(BalanceKind::Liquid, 800).unwrap();
        wallet.credit(BalanceKind::Crystalized, 800).unwrap();
        db.put_wallet(&wallet).unwrap();

        // Target below the crystalized holding: liquid goes first.
        admin.initialize_wallet(&key, 500).unwrap();
        let wallet = db.get_wallet(&key).unwrap().unwrap();
        assert_eq!(wallet.liquid(), 0);
        assert_eq!(wallet.crystalized(), 500);
        admin.verify_conservation().unwrap().ensure().unwrap();
    }

    #[test]
    fn reserve_cannot_be_reseeded_against_itself() {
        let (_db, admin) = setup();
        let err = admin
            .initialize_wallet(&WalletKey::primary_reserve(), 0)
            .unwrap_err();
        assert!(matches!(err, AdminError::InvalidTarget(_)));
    }

    #[test]
    fn conservation_detects_tampering() {
        let (db, admin) = setup();
        let service = LedgerService::new(&db);
        admin
            .on_signup(OwnerType::Watcher, "gm-1", 1, &AllocationSchedule::default())
            .unwrap();
        service
            .deposit(&WalletKey::watcher("gm-1"), 1, "out-of-thin-air")
            .unwrap();

        // A deposit without a matching mint event breaks the books.
        let report = admin.verify_conservation().unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.difference, 1);
        assert!(report.ensure().is_err());
    }
}
