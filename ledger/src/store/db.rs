//! # LedgerDb — Persistent Storage Engine
//!
//! The persistence layer for the KRMA ledger, built on sled's embedded
//! key-value store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! sled organizes data into named "trees" (analogous to column families in
//! RocksDB or tables in SQL). Each tree is an independent B+ tree with its
//! own keyspace:
//!
//! | Tree           | Key                                | Value                         |
//! |----------------|------------------------------------|-------------------------------|
//! | `wallets`      | wallet key (`"<tag>:<ref>"`)       | `bincode(Wallet)`             |
//! | `transactions` | wallet key + `0x00` + seq (8B BE)  | `bincode(LedgerTransaction)`  |
//! | `assets`       | campaign id + `0x00` + asset uuid  | `bincode(CrystallizedAsset)`  |
//! | `worlds`       | campaign id + `0x00` + world uuid  | `bincode(World)`              |
//! | `identity`     | `profile:`/`sessions:`/`credentials:` + ref | bincode records      |
//! | `metadata`     | `mint:` + seq (8B BE), misc keys   | `bincode(MintEvent)`, bytes   |
//!
//! Transaction sequence numbers are stored big-endian so sled's
//! lexicographic ordering matches numeric ordering — a wallet's history is
//! one contiguous prefix range, scanned forward for audits and backward for
//! "latest first" queries. The same trick scopes assets and worlds to their
//! campaign.
//!
//! ## Atomicity
//!
//! Compound ledger operations (withdraw-and-record, transfer, crystallize,
//! the destroy cascade) run as serializable multi-tree transactions via
//! [`sled::Transactional`]. Either every write in the closure lands or none
//! does, and two transactions touching the same keys cannot interleave.
//! The service modules own those closures; this module provides the tree
//! handles, the key derivations, and the encode/decode plumbing they share.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use std::path::Path;

use crate::ledger::transaction::LedgerTransaction;
use crate::wallet::{Wallet, WalletKey};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Serializes a value for storage.
pub(crate) fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

/// Deserializes a stored value.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

/// Wraps a domain error for return from inside a transaction closure.
pub(crate) fn abort<E1, E2>(err: E1) -> ConflictableTransactionError<E2>
where
    E2: From<E1>,
{
    ConflictableTransactionError::Abort(err.into())
}

/// Collapses sled's two-layer transaction result into the domain error:
/// aborts carry the domain error through, storage failures become
/// [`DbError::Sled`].
pub(crate) fn flatten_txn<T, E>(result: Result<T, TransactionError<E>>) -> Result<T, E>
where
    E: From<DbError>,
{
    result.map_err(|e| match e {
        TransactionError::Abort(domain) => domain,
        TransactionError::Storage(sled) => E::from(DbError::Sled(sled)),
    })
}

// ---------------------------------------------------------------------------
// Key Derivation
// ---------------------------------------------------------------------------

/// Separator between a scope prefix and the record id within it. Owner
/// references and campaign ids must not contain NUL.
const SCOPE_SEPARATOR: u8 = 0x00;

/// History key for one transaction: wallet key, separator, sequence number.
pub(crate) fn tx_key(wallet: &WalletKey, seq: u64) -> Vec<u8> {
    let encoded = wallet.encode();
    let mut key = Vec::with_capacity(encoded.len() + 9);
    key.extend_from_slice(encoded.as_bytes());
    key.push(SCOPE_SEPARATOR);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Prefix covering a wallet's entire history.
pub(crate) fn tx_prefix(wallet: &WalletKey) -> Vec<u8> {
    let encoded = wallet.encode();
    let mut prefix = Vec::with_capacity(encoded.len() + 1);
    prefix.extend_from_slice(encoded.as_bytes());
    prefix.push(SCOPE_SEPARATOR);
    prefix
}

/// Key for a campaign-scoped record (asset, world): campaign id,
/// separator, record id.
pub(crate) fn scoped_key(campaign_id: &str, record_id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(campaign_id.len() + 1 + record_id.len());
    key.extend_from_slice(campaign_id.as_bytes());
    key.push(SCOPE_SEPARATOR);
    key.extend_from_slice(record_id);
    key
}

/// Prefix covering every record of one campaign.
pub(crate) fn scope_prefix(campaign_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(campaign_id.len() + 1);
    prefix.extend_from_slice(campaign_id.as_bytes());
    prefix.push(SCOPE_SEPARATOR);
    prefix
}

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Persistent storage engine for the KRMA ledger.
///
/// Wraps a sled `Db` instance and exposes typed accessors for wallets and
/// transaction history, plus tree handles for the higher-level record
/// families (assets, worlds, identity, metadata). All serialization uses
/// bincode for compactness and speed.
///
/// # Thread Safety
///
/// sled is inherently thread-safe — all trees support lock-free concurrent
/// reads and serialized writes. `LedgerDb` clones share the same underlying
/// database and can be handed to services freely.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    /// The underlying sled database handle.
    db: Db,
    /// Wallet rows indexed by encoded wallet key.
    wallets: Tree,
    /// Append-only audit records, scoped per wallet.
    transactions: Tree,
    /// Crystallized assets, scoped per campaign.
    assets: Tree,
    /// World records, scoped per campaign.
    worlds: Tree,
    /// Owner identity records (profiles, sessions, credentials).
    identity: Tree,
    /// Mint events and miscellaneous metadata.
    metadata: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that lives in memory and is cleaned up
    /// automatically when dropped.
    ///
    /// Ideal for unit tests — no filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let wallets = db.open_tree("wallets")?;
        let transactions = db.open_tree("transactions")?;
        let assets = db.open_tree("assets")?;
        let worlds = db.open_tree("worlds")?;
        let identity = db.open_tree("identity")?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            wallets,
            transactions,
            assets,
            worlds,
            identity,
            metadata,
        })
    }

    /// Open a named sled tree from the underlying database.
    ///
    /// Used by higher layers (e.g. the valuation cache) that need dedicated
    /// key-value storage within the same database instance. The tree is
    /// created if it doesn't exist.
    pub fn open_tree(&self, name: &str) -> DbResult<Tree> {
        Ok(self.db.open_tree(name)?)
    }

    // -- Tree handles for service-owned transactions ------------------------

    pub(crate) fn wallets_tree(&self) -> &Tree {
        &self.wallets
    }

    pub(crate) fn transactions_tree(&self) -> &Tree {
        &self.transactions
    }

    pub(crate) fn assets_tree(&self) -> &Tree {
        &self.assets
    }

    pub(crate) fn worlds_tree(&self) -> &Tree {
        &self.worlds
    }

    pub(crate) fn identity_tree(&self) -> &Tree {
        &self.identity
    }

    pub(crate) fn metadata_tree(&self) -> &Tree {
        &self.metadata
    }

    // -- Wallet operations --------------------------------------------------

    /// Persist a wallet row outside any compound operation.
    ///
    /// Compound mutations go through the service transactions; this is for
    /// bootstrap and tests.
    pub fn put_wallet(&self, wallet: &Wallet) -> DbResult<()> {
        let bytes = encode(wallet)?;
        self.wallets.insert(wallet.key.encode().as_bytes(), bytes)?;
        Ok(())
    }

    /// Retrieve a wallet, or `None` if the owner has never had one.
    pub fn get_wallet(&self, key: &WalletKey) -> DbResult<Option<Wallet>> {
        match self.wallets.get(key.encode().as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Retrieve a wallet, failing with [`DbError::NotFound`] if absent.
    pub fn expect_wallet(&self, key: &WalletKey) -> DbResult<Wallet> {
        self.get_wallet(key)?
            .ok_or_else(|| DbError::NotFound(key.encode()))
    }

    /// Iterate over every wallet in the store.
    ///
    /// Used by the conservation audit. Ordering follows the encoded key.
    pub fn wallets(&self) -> impl Iterator<Item = DbResult<Wallet>> {
        self.wallets.iter().map(|entry| {
            let (_key, value) = entry?;
            decode(&value)
        })
    }

    /// Number of wallets in the store.
    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    // -- Transaction history ------------------------------------------------

    /// A wallet's audit records, newest first, up to `limit`.
    pub fn transaction_history(
        &self,
        wallet: &WalletKey,
        limit: usize,
    ) -> DbResult<Vec<LedgerTransaction>> {
        let mut records = Vec::new();
        for entry in self.transactions.scan_prefix(tx_prefix(wallet)).rev() {
            if records.len() >= limit {
                break;
            }
            let (_key, value) = entry?;
            records.push(decode(&value)?);
        }
        Ok(records)
    }

    /// Raw history keys for a wallet, oldest first. The destroy cascade
    /// collects these immediately before its transaction.
    pub(crate) fn tx_keys(&self, wallet: &WalletKey) -> DbResult<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        for entry in self.transactions.scan_prefix(tx_prefix(wallet)) {
            let (key, _value) = entry?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    /// Total number of audit records in the store.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Delete audit records created before `cutoff`. Returns how many were
    /// removed. This is retention cleanup, not an undo mechanism — balances
    /// are untouched.
    pub fn prune_transactions_before(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> DbResult<usize> {
        let mut expired = Vec::new();
        for entry in self.transactions.iter() {
            let (key, value) = entry?;
            let record: LedgerTransaction = decode(&value)?;
            if record.created_at < cutoff {
                expired.push(key);
            }
        }
        for key in &expired {
            self.transactions.remove(key)?;
        }
        Ok(expired.len())
    }

    // -- Utility ------------------------------------------------------------

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transaction::{LedgerTransaction, TransactionType};
    use crate::wallet::{BalanceKind, Wallet};
    use chrono::{Duration, Utc};

    fn test_wallet(owner_ref: &str, liquid: u128) -> Wallet {
        let mut w = Wallet::new(WalletKey::watcher(owner_ref));
        w.credit(BalanceKind::Liquid, liquid).unwrap();
        w
    }

    #[test]
    fn open_temporary_database() {
        let db = LedgerDb::open_temporary().expect("should create temp db");
        assert_eq!(db.wallet_count(), 0);
        assert_eq!(db.transaction_count(), 0);
    }

    #[test]
    fn open_persistent_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = LedgerDb::open(dir.path()).expect("should open db");
        db.put_wallet(&test_wallet("gm-1", 500)).unwrap();
        db.flush().unwrap();
        drop(db);

        let db2 = LedgerDb::open(dir.path()).expect("should reopen db");
        let wallet = db2.get_wallet(&WalletKey::watcher("gm-1")).unwrap().unwrap();
        assert_eq!(wallet.liquid(), 500);
    }

    #[test]
    fn wallet_crud() {
        let db = LedgerDb::open_temporary().unwrap();
        let key = WalletKey::watcher("gm-alice");

        assert!(db.get_wallet(&key).unwrap().is_none());

        db.put_wallet(&test_wallet("gm-alice", 1000)).unwrap();
        let retrieved = db.get_wallet(&key).unwrap().expect("should exist");
        assert_eq!(retrieved.liquid(), 1000);
        assert_eq!(db.wallet_count(), 1);

        // Overwrite with an updated row.
        db.put_wallet(&test_wallet("gm-alice", 250)).unwrap();
        assert_eq!(db.get_wallet(&key).unwrap().unwrap().liquid(), 250);
        assert_eq!(db.wallet_count(), 1);
    }

    #[test]
    fn expect_wallet_not_found() {
        let db = LedgerDb::open_temporary().unwrap();
        let err = db.expect_wallet(&WalletKey::watcher("nobody")).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn one_wallet_per_owner_pair() {
        let db = LedgerDb::open_temporary().unwrap();
        // Same ref, different owner types — distinct wallets.
        let mut a = Wallet::new(WalletKey::watcher("dual"));
        a.credit(BalanceKind::Liquid, 1).unwrap();
        let mut b = Wallet::new(WalletKey::trailblazer("dual"));
        b.credit(BalanceKind::Liquid, 2).unwrap();
        db.put_wallet(&a).unwrap();
        db.put_wallet(&b).unwrap();

        assert_eq!(db.wallet_count(), 2);
        assert_eq!(db.get_wallet(&a.key).unwrap().unwrap().liquid(), 1);
        assert_eq!(db.get_wallet(&b.key).unwrap().unwrap().liquid(), 2);
    }

    #[test]
    fn history_keys_sort_by_sequence() {
        let key = WalletKey::watcher("gm-1");
        let k1 = tx_key(&key, 1);
        let k2 = tx_key(&key, 2);
        let k10 = tx_key(&key, 10);
        assert!(k1 < k2);
        assert!(k2 < k10); // big-endian keeps numeric order
    }

    #[test]
    fn history_scan_is_scoped_to_one_wallet() {
        let db = LedgerDb::open_temporary().unwrap();
        let alice = WalletKey::watcher("alice");
        let bob = WalletKey::watcher("bob");

        for (wallet, seq) in [(&alice, 0u64), (&alice, 1), (&bob, 0)] {
            let record = LedgerTransaction::record(
                wallet.clone(),
                TransactionType::Deposit,
                10,
                10,
                "seed",
            );
            db.transactions_tree()
                .insert(tx_key(wallet, seq), encode(&record).unwrap())
                .unwrap();
        }

        assert_eq!(db.transaction_history(&alice, 100).unwrap().len(), 2);
        assert_eq!(db.transaction_history(&bob, 100).unwrap().len(), 1);
        assert_eq!(db.tx_keys(&alice).unwrap().len(), 2);
    }

    #[test]
    fn history_returns_newest_first_and_respects_limit() {
        let db = LedgerDb::open_temporary().unwrap();
        let key = WalletKey::watcher("gm-1");
        for seq in 0..5u64 {
            let record = LedgerTransaction::record(
                key.clone(),
                TransactionType::Deposit,
                seq as i128,
                seq as u128,
                "n",
            );
            db.transactions_tree()
                .insert(tx_key(&key, seq), encode(&record).unwrap())
                .unwrap();
        }

        let history = db.transaction_history(&key, 3).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].amount, 4); // newest first
        assert_eq!(history[2].amount, 2);
    }

    #[test]
    fn prune_removes_only_expired_records() {
        let db = LedgerDb::open_temporary().unwrap();
        let key = WalletKey::watcher("gm-1");

        let mut old = LedgerTransaction::record(key.clone(), TransactionType::Deposit, 1, 1, "old");
        old.created_at = Utc::now() - Duration::days(400);
        let fresh = LedgerTransaction::record(key.clone(), TransactionType::Deposit, 2, 3, "new");

        db.transactions_tree()
            .insert(tx_key(&key, 0), encode(&old).unwrap())
            .unwrap();
        db.transactions_tree()
            .insert(tx_key(&key, 1), encode(&fresh).unwrap())
            .unwrap();

        let removed = db
            .prune_transactions_before(Utc::now() - Duration::days(365))
            .unwrap();
        assert_eq!(removed, 1);
        let remaining = db.transaction_history(&key, 10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].description, "new");
    }

    #[test]
    fn scoped_keys_isolate_campaigns() {
        let a = scoped_key("camp-a", b"asset-1");
        let b = scoped_key("camp-ab", b"asset-1");
        let prefix = scope_prefix("camp-a");
        assert!(a.starts_with(&prefix));
        // "camp-ab" must not match the "camp-a" prefix: the NUL separator
        // terminates the campaign id.
        assert!(!b.starts_with(&prefix));
    }

    #[test]
    fn concurrent_reads_do_not_block() {
        use std::sync::Arc;
        use std::thread;

        let db = Arc::new(LedgerDb::open_temporary().unwrap());
        for i in 0..10u32 {
            db.put_wallet(&test_wallet(&format!("gm-{i}"), u128::from(i) * 100))
                .unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    for i in 0..10u32 {
                        let key = WalletKey::watcher(format!("gm-{i}"));
                        let wallet = db.get_wallet(&key).unwrap().unwrap();
                        assert_eq!(wallet.liquid(), u128::from(i) * 100);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("reader thread should not panic");
        }
    }
}
