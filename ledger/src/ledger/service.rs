//! # Ledger Service
//!
//! The only write path for wallet balances. Every operation here is one
//! serializable store transaction: the balance mutation and its audit
//! record commit together or not at all, and a concurrent operation on the
//! same wallet cannot interleave with the read-check-write sequence.
//!
//! Precondition failures (missing wallet, insufficient funds, zero amount,
//! self-transfer) abort the transaction before any write, so they leave
//! zero partial effects by construction.
//!
//! ## Concurrency Model
//!
//! There is no in-process balance cache and no in-process lock. Requests
//! are short-lived and independent; correctness comes from the store's
//! transactional isolation. Transfers need only pairwise atomicity between
//! the two wallets involved — they never take anything resembling a global
//! lock.

use sled::Transactional;
use thiserror::Error;
use tracing::{debug, info};

use crate::config;
use crate::krma::{Krma, SignedKrma};
use crate::store::db::{self, DbError, LedgerDb};
use crate::wallet::{BalanceKind, Wallet, WalletError, WalletKey};

use super::transaction::{LedgerTransaction, TransactionType};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No wallet exists for the given owner pair.
    #[error("wallet not found: {0}")]
    NotFound(WalletKey),

    /// A wallet already exists for the given owner pair.
    #[error("wallet already exists: {0}")]
    AlreadyExists(WalletKey),

    /// The amount is not a positive integer. Zero-amount operations are
    /// no-ops and almost certainly indicate a bug in the caller.
    #[error("invalid amount: {0}")]
    InvalidAmount(SignedKrma),

    /// The two wallets of a transfer are the same wallet.
    #[error("invalid owner pair: cannot transfer from {from} to {to}")]
    InvalidOwnerPair {
        /// Source wallet.
        from: WalletKey,
        /// Destination wallet.
        to: WalletKey,
    },

    /// A balance operation failed (insufficient funds, overflow).
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// The store itself failed. Not a precondition failure — propagate as
    /// an internal error.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

// ---------------------------------------------------------------------------
// LedgerService
// ---------------------------------------------------------------------------

/// Atomic deposit/withdraw/transfer primitives over the wallet store.
#[derive(Debug, Clone)]
pub struct LedgerService {
    db: LedgerDb,
}

impl LedgerService {
    /// Creates a service over the given store. The handle is cheap to
    /// clone; all clones share the same underlying database.
    pub fn new(db: &LedgerDb) -> Self {
        Self { db: db.clone() }
    }

    /// The underlying store handle.
    pub fn db(&self) -> &LedgerDb {
        &self.db
    }

    // -- Wallet lifecycle ---------------------------------------------------

    /// Creates an empty wallet for the given owner pair.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyExists`] if the owner already has a
    /// wallet — there is exactly one wallet per `(owner_type, owner_ref)`.
    pub fn create_wallet(&self, key: &WalletKey) -> Result<Wallet, LedgerError> {
        let key_bytes = key.encode().into_bytes();
        let wallet = db::flatten_txn(self.db.wallets_tree().transaction(|wallets| -> sled::transaction::ConflictableTransactionResult<Wallet, LedgerError> {
            if wallets.get(&key_bytes)?.is_some() {
                return Err(db::abort(LedgerError::AlreadyExists(key.clone())));
            }
            let wallet = Wallet::new(key.clone());
            wallets.insert(key_bytes.clone(), db::encode(&wallet).map_err(db::abort)?)?;
            Ok(wallet)
        }))?;

        info!(wallet = %key, "wallet created");
        Ok(wallet)
    }

    /// Reads a wallet row.
    pub fn wallet(&self, key: &WalletKey) -> Result<Wallet, LedgerError> {
        self.db
            .get_wallet(key)?
            .ok_or_else(|| LedgerError::NotFound(key.clone()))
    }

    /// Reads one compartment's balance.
    pub fn balance(&self, key: &WalletKey, kind: BalanceKind) -> Result<Krma, LedgerError> {
        Ok(self.wallet(key)?.balance(kind))
    }

    // -- Balance operations -------------------------------------------------

    /// Credits liquid KRMA to a wallet and appends a `DEPOSIT` record.
    /// Returns the new liquid balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`] if `amount` is zero,
    /// [`LedgerError::NotFound`] if the wallet does not exist.
    pub fn deposit(
        &self,
        key: &WalletKey,
        amount: Krma,
        description: &str,
    ) -> Result<Krma, LedgerError> {
        self.apply_single(key, TransactionType::Deposit, amount, description)
    }

    /// Debits liquid KRMA from a wallet and appends a negative-amount
    /// `WITHDRAWAL` record. Returns the new liquid balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`] if `amount` is zero,
    /// [`LedgerError::NotFound`] if the wallet does not exist,
    /// [`WalletError::InsufficientFunds`] (via [`LedgerError::Wallet`]) if
    /// `liquid < amount` — in which case the wallet is untouched.
    pub fn withdraw(
        &self,
        key: &WalletKey,
        amount: Krma,
        description: &str,
    ) -> Result<Krma, LedgerError> {
        self.apply_single(key, TransactionType::Withdrawal, amount, description)
    }

    /// Shared implementation for the two single-wallet operations.
    fn apply_single(
        &self,
        key: &WalletKey,
        tx_type: TransactionType,
        amount: Krma,
        description: &str,
    ) -> Result<Krma, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(0));
        }
        let key_bytes = key.encode().into_bytes();

        let trees = (self.db.wallets_tree(), self.db.transactions_tree());
        let new_balance = db::flatten_txn(trees.transaction(|(wallets, records)| -> sled::transaction::ConflictableTransactionResult<Krma, LedgerError> {
            let raw = wallets
                .get(&key_bytes)?
                .ok_or_else(|| db::abort(LedgerError::NotFound(key.clone())))?;
            let mut wallet: Wallet = db::decode(&raw).map_err(db::abort)?;

            let (signed, balance) = match tx_type {
                TransactionType::Deposit => {
                    let balance = wallet
                        .credit(BalanceKind::Liquid, amount)
                        .map_err(db::abort)?;
                    (amount as SignedKrma, balance)
                }
                _ => {
                    let balance = wallet
                        .debit(BalanceKind::Liquid, amount)
                        .map_err(db::abort)?;
                    (-(amount as SignedKrma), balance)
                }
            };

            let seq = wallet.tx_count;
            wallet.tx_count += 1;

            let record =
                LedgerTransaction::record(key.clone(), tx_type, signed, balance, description);

            wallets.insert(key_bytes.clone(), db::encode(&wallet).map_err(db::abort)?)?;
            records.insert(db::tx_key(key, seq), db::encode(&record).map_err(db::abort)?)?;
            Ok(balance)
        }))?;

        info!(wallet = %key, %tx_type, amount = %amount, balance = %new_balance, "ledger entry");
        Ok(new_balance)
    }

    /// Moves KRMA of the given compartment from one wallet to another.
    ///
    /// All-or-nothing: both rows and the single `TRANSFER` audit record
    /// (filed under the source wallet, referencing the destination as its
    /// counterparty) commit in one store transaction.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidOwnerPair`] if `from == to`,
    /// [`LedgerError::InvalidAmount`] if `amount` is zero,
    /// [`LedgerError::NotFound`] if either wallet is missing,
    /// insufficient funds if the source compartment cannot cover the
    /// amount. On any failure neither wallet changes.
    pub fn transfer(
        &self,
        from: &WalletKey,
        to: &WalletKey,
        amount: Krma,
        kind: BalanceKind,
        description: &str,
    ) -> Result<(), LedgerError> {
        if from == to {
            return Err(LedgerError::InvalidOwnerPair {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(0));
        }

        let from_bytes = from.encode().into_bytes();
        let to_bytes = to.encode().into_bytes();

        let trees = (self.db.wallets_tree(), self.db.transactions_tree());
        db::flatten_txn(trees.transaction(|(wallets, records)| -> sled::transaction::ConflictableTransactionResult<(), LedgerError> {
            let raw_from = wallets
                .get(&from_bytes)?
                .ok_or_else(|| db::abort(LedgerError::NotFound(from.clone())))?;
            let raw_to = wallets
                .get(&to_bytes)?
                .ok_or_else(|| db::abort(LedgerError::NotFound(to.clone())))?;

            let mut from_wallet: Wallet = db::decode(&raw_from).map_err(db::abort)?;
            let mut to_wallet: Wallet = db::decode(&raw_to).map_err(db::abort)?;

            let from_balance = from_wallet.debit(kind, amount).map_err(db::abort)?;
            let to_balance = to_wallet.credit(kind, amount).map_err(db::abort)?;

            let seq = from_wallet.tx_count;
            from_wallet.tx_count += 1;

            let record = LedgerTransaction::record(
                from.clone(),
                TransactionType::Transfer,
                -(amount as SignedKrma),
                from_wallet.liquid(),
                description,
            )
            .with_counterparty(to.clone())
            .with_metadata(serde_json::json!({
                "kind": kind.to_string(),
                "from_balance": from_balance.to_string(),
                "to_balance": to_balance.to_string(),
            }));

            wallets.insert(from_bytes.clone(), db::encode(&from_wallet).map_err(db::abort)?)?;
            wallets.insert(to_bytes.clone(), db::encode(&to_wallet).map_err(db::abort)?)?;
            records.insert(db::tx_key(from, seq), db::encode(&record).map_err(db::abort)?)?;
            Ok(())
        }))?;

        info!(%from, %to, amount = %amount, %kind, "transfer");
        Ok(())
    }

    // -- History ------------------------------------------------------------

    /// A wallet's audit records, newest first, up to `limit`.
    pub fn transaction_history(
        &self,
        key: &WalletKey,
        limit: usize,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        Ok(self.db.transaction_history(key, limit)?)
    }

    /// Deletes audit records older than the configured retention window.
    /// Returns how many were removed.
    pub fn prune_expired_transactions(&self) -> Result<usize, LedgerError> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(config::TX_RETENTION_DAYS);
        let removed = self.db.prune_transactions_before(cutoff)?;
        if removed > 0 {
            debug!(removed, "pruned expired ledger records");
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> LedgerService {
        let db = LedgerDb::open_temporary().unwrap();
        LedgerService::new(&db)
    }

    fn funded(svc: &LedgerService, owner_ref: &str, amount: Krma) -> WalletKey {
        let key = WalletKey::watcher(owner_ref);
        svc.create_wallet(&key).unwrap();
        if amount > 0 {
            svc.deposit(&key, amount, "seed").unwrap();
        }
        key
    }

    #[test]
    fn create_wallet_then_duplicate_fails() {
        let svc = service();
        let key = WalletKey::watcher("gm-1");
        svc.create_wallet(&key).unwrap();
        let err = svc.create_wallet(&key).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(_)));
    }

    #[test]
    fn deposit_credits_and_records() {
        let svc = service();
        let key = funded(&svc, "gm-1", 0);

        let balance = svc.deposit(&key, 5000, "monthly grant").unwrap();
        assert_eq!(balance, 5000);

        let history = svc.transaction_history(&key, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tx_type, TransactionType::Deposit);
        assert_eq!(history[0].amount, 5000);
        assert_eq!(history[0].balance, 5000);
        assert_eq!(history[0].description, "monthly grant");
    }

    #[test]
    fn deposit_to_missing_wallet_fails() {
        let svc = service();
        let err = svc
            .deposit(&WalletKey::watcher("nobody"), 100, "x")
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn zero_amount_rejected() {
        let svc = service();
        let key = funded(&svc, "gm-1", 100);
        assert!(matches!(
            svc.deposit(&key, 0, "x"),
            Err(LedgerError::InvalidAmount(0))
        ));
        assert!(matches!(
            svc.withdraw(&key, 0, "x"),
            Err(LedgerError::InvalidAmount(0))
        ));
    }

    #[test]
    fn withdraw_appends_negative_record() {
        let svc = service();
        let key = funded(&svc, "gm-1", 1000);

        let balance = svc.withdraw(&key, 300, "spend").unwrap();
        assert_eq!(balance, 700);

        let history = svc.transaction_history(&key, 1).unwrap();
        assert_eq!(history[0].tx_type, TransactionType::Withdrawal);
        assert_eq!(history[0].amount, -300);
        assert_eq!(history[0].balance, 700);
    }

    #[test]
    fn overdraw_fails_and_leaves_state_unchanged() {
        let svc = service();
        let key = funded(&svc, "gm-1", 100);
        let records_before = svc.db().transaction_count();

        let err = svc.withdraw(&key, 150, "too much").unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Wallet(WalletError::InsufficientFunds { .. })
        ));

        // Balance untouched, no orphaned audit record.
        assert_eq!(svc.balance(&key, BalanceKind::Liquid).unwrap(), 100);
        assert_eq!(svc.db().transaction_count(), records_before);
    }

    #[test]
    fn transfer_moves_liquid_with_one_record() {
        let svc = service();
        let a = funded(&svc, "alice", 100);
        let b = funded(&svc, "bob", 0);
        let records_before = svc.db().transaction_count();

        svc.transfer(&a, &b, 40, BalanceKind::Liquid, "payment").unwrap();

        assert_eq!(svc.balance(&a, BalanceKind::Liquid).unwrap(), 60);
        assert_eq!(svc.balance(&b, BalanceKind::Liquid).unwrap(), 40);

        // Exactly one audit record for the whole transfer, referencing
        // both wallets.
        assert_eq!(svc.db().transaction_count(), records_before + 1);
        let history = svc.transaction_history(&a, 1).unwrap();
        assert_eq!(history[0].tx_type, TransactionType::Transfer);
        assert_eq!(history[0].amount, -40);
        assert_eq!(history[0].counterparty.as_ref(), Some(&b));
    }

    #[test]
    fn transfer_crystalized_compartment() {
        let svc = service();
        let a = funded(&svc, "alice", 0);
        let b = funded(&svc, "bob", 0);

        // Hand-place crystalized balance; only admin paths normally do this.
        let mut wallet = svc.wallet(&a).unwrap();
        wallet.credit(BalanceKind::Crystalized, 50).unwrap();
        svc.db().put_wallet(&wallet).unwrap();

        svc.transfer(&a, &b, 20, BalanceKind::Crystalized, "soul transfer")
            .unwrap();
        assert_eq!(svc.balance(&a, BalanceKind::Crystalized).unwrap(), 30);
        assert_eq!(svc.balance(&b, BalanceKind::Crystalized).unwrap(), 20);
        // Liquid untouched on both sides.
        assert_eq!(svc.balance(&a, BalanceKind::Liquid).unwrap(), 0);
        assert_eq!(svc.balance(&b, BalanceKind::Liquid).unwrap(), 0);
    }

    #[test]
    fn self_transfer_rejected() {
        let svc = service();
        let a = funded(&svc, "alice", 100);
        let err = svc
            .transfer(&a, &a, 10, BalanceKind::Liquid, "loop")
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidOwnerPair { .. }));
        assert_eq!(svc.balance(&a, BalanceKind::Liquid).unwrap(), 100);
    }

    #[test]
    fn transfer_to_missing_wallet_is_all_or_nothing() {
        let svc = service();
        let a = funded(&svc, "alice", 100);
        let ghost = WalletKey::watcher("ghost");
        let records_before = svc.db().transaction_count();

        let err = svc
            .transfer(&a, &ghost, 40, BalanceKind::Liquid, "void")
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        // Sender must be untouched even though its debit "happened" inside
        // the aborted transaction.
        assert_eq!(svc.balance(&a, BalanceKind::Liquid).unwrap(), 100);
        assert_eq!(svc.db().transaction_count(), records_before);
    }

    #[test]
    fn insufficient_transfer_rejected() {
        let svc = service();
        let a = funded(&svc, "alice", 30);
        let b = funded(&svc, "bob", 0);

        let err = svc
            .transfer(&a, &b, 40, BalanceKind::Liquid, "overreach")
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Wallet(WalletError::InsufficientFunds { .. })
        ));
        assert_eq!(svc.balance(&a, BalanceKind::Liquid).unwrap(), 30);
        assert_eq!(svc.balance(&b, BalanceKind::Liquid).unwrap(), 0);
    }

    #[test]
    fn history_is_newest_first() {
        let svc = service();
        let key = funded(&svc, "gm-1", 0);
        svc.deposit(&key, 10, "first").unwrap();
        svc.deposit(&key, 20, "second").unwrap();
        svc.withdraw(&key, 5, "third").unwrap();

        let history = svc.transaction_history(&key, 10).unwrap();
        let descriptions: Vec<&str> =
            history.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(descriptions, vec!["third", "second", "first"]);
    }

    #[test]
    fn conservation_across_transfers() {
        let svc = service();
        let a = funded(&svc, "alice", 1000);
        let b = funded(&svc, "bob", 500);

        svc.transfer(&a, &b, 250, BalanceKind::Liquid, "1").unwrap();
        svc.transfer(&b, &a, 100, BalanceKind::Liquid, "2").unwrap();
        svc.transfer(&a, &b, 1, BalanceKind::Liquid, "3").unwrap();

        let total: Krma = svc
            .db()
            .wallets()
            .map(|w| w.unwrap().total())
            .sum();
        assert_eq!(total, 1500);
    }
}
