//! # Crystallization Engine
//!
//! Converts liquid KRMA into permanent campaign assets and back.
//!
//! Crystallization is an intra-wallet move: the amount leaves the owner's
//! liquid compartment and lands in the crystalized compartment, with the
//! asset record binding it to a name. Global conservation is therefore
//! untouched by crystallize and dissolve — value only changes wallets at
//! transfers and admin redistribution.
//!
//! The other half of this module is the administrative destroy path: a
//! wallet's entire holdings (liquid + crystalized) are returned to the
//! reclaim reserve, and every identity record and audit row belonging to
//! the owner goes down with it — one store transaction, full cascade or
//! nothing.

use sled::Transactional;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config;
use crate::identity::{self, Actor};
use crate::krma::{krma_string, Krma, SignedKrma};
use crate::ledger::transaction::{LedgerTransaction, TransactionType};
use crate::store::db::{self, DbError, DbResult, LedgerDb};
use crate::wallet::{BalanceKind, Wallet, WalletError, WalletKey};

use super::asset::{CrystallizationRequest, CrystallizedAsset, UnknownCrystallizationType};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from crystallization and asset administration.
#[derive(Debug, Error)]
pub enum CrystalError {
    /// The owner has no wallet.
    #[error("wallet not found: {0}")]
    WalletNotFound(WalletKey),

    /// Crystallization requires a positive amount.
    #[error("invalid amount: crystallization requires a positive KRMA amount")]
    InvalidAmount,

    /// A balance operation failed (insufficient liquid, overflow).
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// A boundary string named no known asset type.
    #[error(transparent)]
    InvalidEnum(#[from] UnknownCrystallizationType),

    /// No asset with the given id exists.
    #[error("asset not found: {0}")]
    AssetNotFound(Uuid),

    /// The asset was already dissolved.
    #[error("asset already dissolved: {0}")]
    AlreadyDissolved(Uuid),

    /// Dissolution return fraction outside `0..=10_000` basis points.
    #[error("invalid return fraction: {0} basis points")]
    InvalidReturnFraction(u32),

    /// Destructive operations never touch system reserves.
    #[error("cannot destroy protected reserve wallet: {0}")]
    ProtectedReserve(WalletKey),

    /// The actor lacks the authority for this operation.
    #[error("actor {actor:?} is not authorized to {action}")]
    Forbidden {
        /// The calling actor's owner reference.
        actor: String,
        /// What was attempted.
        action: &'static str,
    },

    /// The destroy cascade lost its optimistic race too many times in a
    /// row. The wallet is still intact; retry once the ledger activity on
    /// it quiets down.
    #[error("destroy of {0} kept conflicting with concurrent ledger activity")]
    CascadeContention(WalletKey),

    /// The store itself failed.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

/// How many optimistic attempts the destroy cascade makes before giving up.
const MAX_CASCADE_ATTEMPTS: usize = 32;

// ---------------------------------------------------------------------------
// DestroyedWallet
// ---------------------------------------------------------------------------

/// Report returned by a successful wallet destruction: the prior balances
/// and where the value went.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DestroyedWallet {
    /// The wallet that was removed.
    pub wallet: WalletKey,
    /// Its liquid balance at destruction time.
    #[serde(with = "krma_string")]
    pub liquid: Krma,
    /// Its crystalized balance at destruction time.
    #[serde(with = "krma_string")]
    pub crystalized: Krma,
    /// `liquid + crystalized`, credited to the recipient.
    #[serde(with = "krma_string")]
    pub total: Krma,
    /// The reserve wallet that received the value.
    pub recipient: WalletKey,
    /// How many audit records were removed with the wallet.
    pub history_records_removed: usize,
}

// ---------------------------------------------------------------------------
// CrystallizationEngine
// ---------------------------------------------------------------------------

/// Crystallize, query, dissolve, and destroy — the asset-side write paths.
#[derive(Debug, Clone)]
pub struct CrystallizationEngine {
    db: LedgerDb,
}

impl CrystallizationEngine {
    pub fn new(db: &LedgerDb) -> Self {
        Self { db: db.clone() }
    }

    // -- Crystallize --------------------------------------------------------

    /// Binds liquid KRMA from `owner` into a new campaign asset.
    ///
    /// Atomically: debits liquid, credits crystalized, creates the asset
    /// row, and appends a `PAYMENT` audit record.
    ///
    /// # Errors
    ///
    /// [`CrystalError::InvalidAmount`] for a zero amount,
    /// [`CrystalError::WalletNotFound`] if the owner has no wallet,
    /// insufficient liquid funds via [`CrystalError::Wallet`].
    pub fn crystallize(
        &self,
        owner: &WalletKey,
        request: &CrystallizationRequest,
    ) -> Result<CrystallizedAsset, CrystalError> {
        if request.krma_amount == 0 {
            return Err(CrystalError::InvalidAmount);
        }

        let asset_id = Uuid::new_v4();
        let owner_bytes = owner.encode().into_bytes();
        let asset_key = db::scoped_key(&request.campaign_id, asset_id.as_bytes());

        let trees = (
            self.db.wallets_tree(),
            self.db.assets_tree(),
            self.db.transactions_tree(),
        );
        let asset = db::flatten_txn(trees.transaction(|(wallets, assets, records)| -> sled::transaction::ConflictableTransactionResult<CrystallizedAsset, CrystalError> {
            let raw = wallets
                .get(&owner_bytes)?
                .ok_or_else(|| db::abort(CrystalError::WalletNotFound(owner.clone())))?;
            let mut wallet: Wallet = db::decode(&raw).map_err(db::abort)?;

            let liquid_after = wallet
                .debit(BalanceKind::Liquid, request.krma_amount)
                .map_err(db::abort)?;
            wallet
                .credit(BalanceKind::Crystalized, request.krma_amount)
                .map_err(db::abort)?;

            let asset = CrystallizedAsset {
                id: asset_id,
                campaign_id: request.campaign_id.clone(),
                owner: owner.clone(),
                asset_type: request.asset_type,
                name: request.name.clone(),
                description: request.description.clone(),
                krma_value: request.krma_amount,
                is_active: true,
                metadata: request.metadata.clone(),
                created_at: chrono::Utc::now(),
            };

            let seq = wallet.tx_count;
            wallet.tx_count += 1;
            let record = LedgerTransaction::record(
                owner.clone(),
                TransactionType::Payment,
                -(request.krma_amount as SignedKrma),
                liquid_after,
                &format!("Crystallized into {}: {}", request.asset_type, request.name),
            )
            .with_metadata(serde_json::json!({
                "campaign_id": request.campaign_id.clone(),
                "asset_id": asset_id.to_string(),
                "crystallization_type": request.asset_type.tag(),
                "crystalized_balance": wallet.crystalized().to_string(),
            }));

            wallets.insert(owner_bytes.clone(), db::encode(&wallet).map_err(db::abort)?)?;
            assets.insert(asset_key.clone(), db::encode(&asset).map_err(db::abort)?)?;
            records.insert(db::tx_key(owner, seq), db::encode(&record).map_err(db::abort)?)?;
            Ok(asset)
        }))?;

        info!(
            owner = %owner,
            campaign = %request.campaign_id,
            asset = %asset_id,
            amount = %request.krma_amount,
            "crystallized"
        );
        Ok(asset)
    }

    // -- Queries ------------------------------------------------------------

    /// Lazy, restartable iterator over a campaign's active assets.
    ///
    /// Each call starts a fresh scan; consuming one iterator does not
    /// affect the next.
    pub fn campaign_assets(&self, campaign_id: &str) -> CampaignAssets {
        CampaignAssets {
            inner: self
                .db
                .assets_tree()
                .scan_prefix(db::scope_prefix(campaign_id)),
        }
    }

    /// Total KRMA bound into a campaign's active assets.
    pub fn campaign_krma_value(&self, campaign_id: &str) -> DbResult<Krma> {
        let mut total: Krma = 0;
        for asset in self.campaign_assets(campaign_id) {
            total += asset?.krma_value;
        }
        Ok(total)
    }

    /// Finds an asset by id, scanning across campaigns. Returns inactive
    /// assets too — callers decide whether dissolved counts.
    pub fn find_asset(&self, asset_id: Uuid) -> DbResult<Option<CrystallizedAsset>> {
        for entry in self.db.assets_tree().iter() {
            let (_key, value) = entry?;
            let asset: CrystallizedAsset = db::decode(&value)?;
            if asset.id == asset_id {
                return Ok(Some(asset));
            }
        }
        Ok(None)
    }

    // -- Dissolve -----------------------------------------------------------

    /// Dissolves an asset back into circulation.
    ///
    /// `return_bps`/10_000 of the bound value returns to the owner's
    /// liquid balance; the remainder is routed to the reclaim reserve.
    /// The asset row is deactivated, not deleted, so the audit trail keeps
    /// its shape. One store transaction.
    pub fn dissolve(
        &self,
        asset_id: Uuid,
        return_bps: u32,
    ) -> Result<Krma, CrystalError> {
        if return_bps > config::BPS_SCALE {
            return Err(CrystalError::InvalidReturnFraction(return_bps));
        }

        let asset = self
            .find_asset(asset_id)?
            .ok_or(CrystalError::AssetNotFound(asset_id))?;
        if !asset.is_active {
            return Err(CrystalError::AlreadyDissolved(asset_id));
        }

        let owner = asset.owner.clone();
        let reclaim = WalletKey::reclaim_reserve();
        let owner_bytes = owner.encode().into_bytes();
        let reclaim_bytes = reclaim.encode().into_bytes();
        let asset_key = db::scoped_key(&asset.campaign_id, asset.id.as_bytes());

        let returned = asset.krma_value * Krma::from(return_bps) / Krma::from(config::BPS_SCALE);
        let remainder = asset.krma_value - returned;

        let trees = (
            self.db.wallets_tree(),
            self.db.assets_tree(),
            self.db.transactions_tree(),
        );
        db::flatten_txn(trees.transaction(|(wallets, assets, records)| -> sled::transaction::ConflictableTransactionResult<(), CrystalError> {
            let raw_asset = assets
                .get(&asset_key)?
                .ok_or_else(|| db::abort(CrystalError::AssetNotFound(asset_id)))?;
            let mut stored: CrystallizedAsset = db::decode(&raw_asset).map_err(db::abort)?;
            if !stored.is_active {
                return Err(db::abort(CrystalError::AlreadyDissolved(asset_id)));
            }

            let raw_owner = wallets
                .get(&owner_bytes)?
                .ok_or_else(|| db::abort(CrystalError::WalletNotFound(owner.clone())))?;
            let mut owner_wallet: Wallet = db::decode(&raw_owner).map_err(db::abort)?;

            // Unbind the full value, then split it.
            owner_wallet
                .debit(BalanceKind::Crystalized, stored.krma_value)
                .map_err(db::abort)?;
            let liquid_after = owner_wallet
                .credit(BalanceKind::Liquid, returned)
                .map_err(db::abort)?;

            if remainder > 0 {
                if owner == reclaim {
                    // The reserve dissolving its own asset keeps the
                    // remainder; don't load the same row twice.
                    owner_wallet
                        .credit(BalanceKind::Liquid, remainder)
                        .map_err(db::abort)?;
                } else {
                    let raw_reclaim = wallets
                        .get(&reclaim_bytes)?
                        .ok_or_else(|| db::abort(CrystalError::WalletNotFound(reclaim.clone())))?;
                    let mut reclaim_wallet: Wallet = db::decode(&raw_reclaim).map_err(db::abort)?;
                    reclaim_wallet
                        .credit(BalanceKind::Liquid, remainder)
                        .map_err(db::abort)?;
                    wallets.insert(
                        reclaim_bytes.clone(),
                        db::encode(&reclaim_wallet).map_err(db::abort)?,
                    )?;
                }
            }

            stored.is_active = false;

            let seq = owner_wallet.tx_count;
            owner_wallet.tx_count += 1;
            let record = LedgerTransaction::record(
                owner.clone(),
                TransactionType::Deposit,
                returned as SignedKrma,
                liquid_after,
                &format!(
                    "Dissolved {}: {} ({} bps return)",
                    stored.asset_type, stored.name, return_bps
                ),
            )
            .with_metadata(serde_json::json!({
                "campaign_id": stored.campaign_id.clone(),
                "asset_id": asset_id.to_string(),
                "krma_returned": returned.to_string(),
                "krma_reclaimed": remainder.to_string(),
            }));

            wallets.insert(owner_bytes.clone(), db::encode(&owner_wallet).map_err(db::abort)?)?;
            assets.insert(asset_key.clone(), db::encode(&stored).map_err(db::abort)?)?;
            records.insert(db::tx_key(&owner, seq), db::encode(&record).map_err(db::abort)?)?;
            Ok(())
        }))?;

        info!(asset = %asset_id, owner = %owner, returned = %returned, reclaimed = %remainder, "dissolved");
        Ok(returned)
    }

    // -- Destroy ------------------------------------------------------------

    /// Destroys a wallet and everything that hangs off it.
    ///
    /// Admin only. The wallet's full holdings are credited to the reclaim
    /// reserve, the owner's identity records (profile, sessions,
    /// credentials) and transaction history are deleted, the wallet row is
    /// removed, and one audit record is filed under the reserve capturing
    /// the prior balances. The entire cascade commits in one store
    /// transaction.
    ///
    /// History keys are collected immediately before the transaction; the
    /// wallet row read inside the transaction doubles as the optimistic
    /// lock. If any ledger operation commits on this wallet between the
    /// collection and the cascade, the stored bytes no longer match the
    /// snapshot, the attempt aborts, and the cascade re-collects and
    /// retries.
    pub fn destroy_wallet(
        &self,
        actor: &Actor,
        key: &WalletKey,
        reason: Option<&str>,
    ) -> Result<DestroyedWallet, CrystalError> {
        if !actor.admin {
            return Err(CrystalError::Forbidden {
                actor: actor.owner_ref.clone(),
                action: "destroy wallets",
            });
        }
        if key.is_reserve() {
            return Err(CrystalError::ProtectedReserve(key.clone()));
        }

        let reclaim = WalletKey::reclaim_reserve();
        let key_bytes = key.encode().into_bytes();
        let reclaim_bytes = reclaim.encode().into_bytes();
        let profile_key = identity::profile_key(&key.owner_ref);
        let sessions_key = identity::sessions_key(&key.owner_ref);
        let credentials_key = identity::credentials_key(&key.owner_ref);

        for _ in 0..MAX_CASCADE_ATTEMPTS {
            // Phase 1: snapshot the wallet row and collect its history keys.
            let snapshot = self
                .db
                .wallets_tree()
                .get(&key_bytes)
                .map_err(DbError::from)?
                .ok_or_else(|| CrystalError::WalletNotFound(key.clone()))?;
            let history_keys = self.db.tx_keys(key)?;

            let wallet: Wallet = db::decode(&snapshot)?;
            let liquid = wallet.liquid();
            let crystalized = wallet.crystalized();
            let total = wallet.total();

            let description = reason.map(str::to_string).unwrap_or_else(|| {
                format!("Wallet destroyed: {total} KRMA returned to {reclaim}")
            });

            // Phase 2: the cascade itself, guarded by the snapshot check.
            let trees = (
                self.db.wallets_tree(),
                self.db.transactions_tree(),
                self.db.identity_tree(),
            );
            let outcome = db::flatten_txn(trees.transaction(|(wallets, records, identities)| -> sled::transaction::ConflictableTransactionResult<(), CrystalError> {
                let current = wallets
                    .get(&key_bytes)?
                    .ok_or_else(|| db::abort(CrystalError::WalletNotFound(key.clone())))?;
                if current != snapshot {
                    return Err(db::abort(CrystalError::CascadeContention(key.clone())));
                }

                let raw_reclaim = wallets
                    .get(&reclaim_bytes)?
                    .ok_or_else(|| db::abort(CrystalError::WalletNotFound(reclaim.clone())))?;
                let mut reclaim_wallet: Wallet = db::decode(&raw_reclaim).map_err(db::abort)?;

                if total > 0 {
                    reclaim_wallet
                        .credit(BalanceKind::Liquid, total)
                        .map_err(db::abort)?;
                }

                // Wallet row, identity records, and history all go.
                wallets.remove(key_bytes.clone())?;
                identities.remove(profile_key.clone())?;
                identities.remove(sessions_key.clone())?;
                identities.remove(credentials_key.clone())?;
                for history_key in &history_keys {
                    records.remove(history_key.clone())?;
                }

                let seq = reclaim_wallet.tx_count;
                reclaim_wallet.tx_count += 1;
                let record = LedgerTransaction::record(
                    reclaim.clone(),
                    TransactionType::Deposit,
                    total as SignedKrma,
                    reclaim_wallet.liquid(),
                    &description,
                )
                .with_metadata(serde_json::json!({
                    "destroyed_wallet": {
                        "key": key.encode(),
                        "liquid": liquid.to_string(),
                        "crystalized": crystalized.to_string(),
                        "total": total.to_string(),
                    },
                    "admin": actor.owner_ref.clone(),
                }));

                wallets.insert(
                    reclaim_bytes.clone(),
                    db::encode(&reclaim_wallet).map_err(db::abort)?,
                )?;
                records.insert(
                    db::tx_key(&reclaim, seq),
                    db::encode(&record).map_err(db::abort)?,
                )?;
                Ok(())
            }));

            match outcome {
                Ok(()) => {
                    info!(wallet = %key, total = %total, admin = %actor.owner_ref, "wallet destroyed");
                    return Ok(DestroyedWallet {
                        wallet: key.clone(),
                        liquid,
                        crystalized,
                        total,
                        recipient: reclaim.clone(),
                        history_records_removed: history_keys.len(),
                    });
                }
                Err(CrystalError::CascadeContention(_)) => {
                    warn!(wallet = %key, "destroy raced a concurrent write; retrying cascade");
                    continue;
                }
                Err(other) => return Err(other),
            }
        }

        Err(CrystalError::CascadeContention(key.clone()))
    }
}

// ---------------------------------------------------------------------------
// CampaignAssets iterator
// ---------------------------------------------------------------------------

/// Lazy scan over one campaign's active assets.
pub struct CampaignAssets {
    inner: sled::Iter,
}

impl Iterator for CampaignAssets {
    type Item = DbResult<CrystallizedAsset>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = self.inner.next()?;
            match entry {
                Ok((_key, value)) => match db::decode::<CrystallizedAsset>(&value) {
                    Ok(asset) if asset.is_active => return Some(Ok(asset)),
                    Ok(_) => continue, // dissolved; skip
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(DbError::Sled(e))),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crystal::asset::CrystallizationType;
    use crate::identity::{CredentialRecord, IdentityRegistry, OwnerProfile, SessionRecord};
    use crate::ledger::service::LedgerService;
    use crate::wallet::OwnerType;

    struct Fixture {
        db: LedgerDb,
        service: LedgerService,
        engine: CrystallizationEngine,
    }

    fn fixture() -> Fixture {
        let db = LedgerDb::open_temporary().unwrap();
        let service = LedgerService::new(&db);
        let engine = CrystallizationEngine::new(&db);
        // Reserves exist in every deployed store; tests mirror that.
        service.create_wallet(&WalletKey::primary_reserve()).unwrap();
        service.create_wallet(&WalletKey::reclaim_reserve()).unwrap();
        Fixture { db, service, engine }
    }

    fn funded_gm(f: &Fixture, owner_ref: &str, liquid: Krma) -> WalletKey {
        let key = WalletKey::watcher(owner_ref);
        f.service.create_wallet(&key).unwrap();
        f.service.deposit(&key, liquid, "seed").unwrap();
        key
    }

    fn request(campaign: &str, amount: Krma) -> CrystallizationRequest {
        CrystallizationRequest {
            campaign_id: campaign.into(),
            asset_type: CrystallizationType::Npc,
            name: "Vex the Broker".into(),
            description: Some("information dealer".into()),
            krma_amount: amount,
            metadata: serde_json::Value::Null,
        }
    }

    fn total_supply(db: &LedgerDb) -> Krma {
        db.wallets().map(|w| w.unwrap().total()).sum()
    }

    #[test]
    fn crystallize_binds_value() {
        let f = fixture();
        let gm = funded_gm(&f, "gm-1", 1000);

        let asset = f.engine.crystallize(&gm, &request("camp-1", 300)).unwrap();
        assert_eq!(asset.krma_value, 300);
        assert!(asset.is_active);

        let wallet = f.service.wallet(&gm).unwrap();
        assert_eq!(wallet.liquid(), 700);
        assert_eq!(wallet.crystalized(), 300);
        assert_eq!(wallet.total(), 1000); // intra-wallet move

        let history = f.service.transaction_history(&gm, 1).unwrap();
        assert_eq!(history[0].tx_type, TransactionType::Payment);
        assert_eq!(history[0].amount, -300);
    }

    #[test]
    fn crystallize_zero_amount_rejected() {
        let f = fixture();
        let gm = funded_gm(&f, "gm-1", 1000);
        assert!(matches!(
            f.engine.crystallize(&gm, &request("camp-1", 0)),
            Err(CrystalError::InvalidAmount)
        ));
    }

    #[test]
    fn crystallize_insufficient_liquid_leaves_state_unchanged() {
        let f = fixture();
        let gm = funded_gm(&f, "gm-1", 100);
        let records_before = f.db.transaction_count();

        let err = f.engine.crystallize(&gm, &request("camp-1", 500)).unwrap_err();
        assert!(matches!(
            err,
            CrystalError::Wallet(WalletError::InsufficientFunds { .. })
        ));

        let wallet = f.service.wallet(&gm).unwrap();
        assert_eq!(wallet.liquid(), 100);
        assert_eq!(wallet.crystalized(), 0);
        assert_eq!(f.db.transaction_count(), records_before);
        assert!(f.engine.campaign_assets("camp-1").next().is_none());
    }

    #[test]
    fn crystallize_without_wallet_fails() {
        let f = fixture();
        let ghost = WalletKey::watcher("ghost");
        assert!(matches!(
            f.engine.crystallize(&ghost, &request("camp-1", 10)),
            Err(CrystalError::WalletNotFound(_))
        ));
    }

    #[test]
    fn campaign_assets_scoped_and_restartable() {
        let f = fixture();
        let gm = funded_gm(&f, "gm-1", 1000);
        f.engine.crystallize(&gm, &request("camp-1", 100)).unwrap();
        f.engine.crystallize(&gm, &request("camp-1", 200)).unwrap();
        f.engine.crystallize(&gm, &request("camp-2", 400)).unwrap();

        let first_pass: Vec<_> = f
            .engine
            .campaign_assets("camp-1")
            .map(|a| a.unwrap())
            .collect();
        assert_eq!(first_pass.len(), 2);

        // A second scan starts from the beginning.
        let second_pass: Vec<_> = f
            .engine
            .campaign_assets("camp-1")
            .map(|a| a.unwrap())
            .collect();
        assert_eq!(second_pass.len(), 2);

        assert_eq!(f.engine.campaign_krma_value("camp-1").unwrap(), 300);
        assert_eq!(f.engine.campaign_krma_value("camp-2").unwrap(), 400);
        assert_eq!(f.engine.campaign_krma_value("camp-none").unwrap(), 0);
    }

    #[test]
    fn dissolve_full_return() {
        let f = fixture();
        let gm = funded_gm(&f, "gm-1", 1000);
        let asset = f.engine.crystallize(&gm, &request("camp-1", 400)).unwrap();

        let returned = f.engine.dissolve(asset.id, config::BPS_SCALE).unwrap();
        assert_eq!(returned, 400);

        let wallet = f.service.wallet(&gm).unwrap();
        assert_eq!(wallet.liquid(), 1000);
        assert_eq!(wallet.crystalized(), 0);

        // Dissolved assets drop out of scans and sums but the row remains.
        assert_eq!(f.engine.campaign_krma_value("camp-1").unwrap(), 0);
        assert!(f.engine.campaign_assets("camp-1").next().is_none());
        assert!(!f.engine.find_asset(asset.id).unwrap().unwrap().is_active);
    }

    #[test]
    fn dissolve_partial_routes_remainder_to_reclaim() {
        let f = fixture();
        let gm = funded_gm(&f, "gm-1", 1000);
        let asset = f.engine.crystallize(&gm, &request("camp-1", 400)).unwrap();
        let supply_before = total_supply(&f.db);

        let returned = f.engine.dissolve(asset.id, 7_500).unwrap(); // 75%
        assert_eq!(returned, 300);

        let wallet = f.service.wallet(&gm).unwrap();
        assert_eq!(wallet.liquid(), 900);
        assert_eq!(wallet.crystalized(), 0);

        let reclaim = f.service.wallet(&WalletKey::reclaim_reserve()).unwrap();
        assert_eq!(reclaim.liquid(), 100);

        // Nothing created or lost.
        assert_eq!(total_supply(&f.db), supply_before);
    }

    #[test]
    fn dissolve_twice_rejected() {
        let f = fixture();
        let gm = funded_gm(&f, "gm-1", 1000);
        let asset = f.engine.crystallize(&gm, &request("camp-1", 100)).unwrap();
        f.engine.dissolve(asset.id, config::BPS_SCALE).unwrap();

        assert!(matches!(
            f.engine.dissolve(asset.id, config::BPS_SCALE),
            Err(CrystalError::AlreadyDissolved(_))
        ));
    }

    #[test]
    fn dissolve_rejects_bad_fraction_and_unknown_asset() {
        let f = fixture();
        assert!(matches!(
            f.engine.dissolve(Uuid::new_v4(), 10_001),
            Err(CrystalError::InvalidReturnFraction(10_001))
        ));
        assert!(matches!(
            f.engine.dissolve(Uuid::new_v4(), 5_000),
            Err(CrystalError::AssetNotFound(_))
        ));
    }

    #[test]
    fn destroy_requires_admin() {
        let f = fixture();
        let gm = funded_gm(&f, "gm-1", 100);
        let err = f
            .engine
            .destroy_wallet(&Actor::user("gm-1"), &gm, None)
            .unwrap_err();
        assert!(matches!(err, CrystalError::Forbidden { .. }));
        assert!(f.service.wallet(&gm).is_ok());
    }

    #[test]
    fn destroy_rejects_reserves() {
        let f = fixture();
        let err = f
            .engine
            .destroy_wallet(&Actor::admin("root"), &WalletKey::primary_reserve(), None)
            .unwrap_err();
        assert!(matches!(err, CrystalError::ProtectedReserve(_)));
    }

    #[test]
    fn destroy_cascades_and_conserves() {
        let f = fixture();
        let registry = IdentityRegistry::new(&f.db);
        let gm = funded_gm(&f, "gm-1", 500);
        f.engine.crystallize(&gm, &request("camp-1", 200)).unwrap();

        registry
            .put_profile(&OwnerProfile {
                owner_ref: "gm-1".into(),
                owner_type: OwnerType::Watcher,
                signup_month: 1,
                baseline_active: true,
                created_at: chrono::Utc::now(),
            })
            .unwrap();
        registry
            .add_session(
                "gm-1",
                SessionRecord {
                    id: Uuid::new_v4(),
                    created_at: chrono::Utc::now(),
                    expires_at: chrono::Utc::now(),
                },
            )
            .unwrap();
        registry
            .add_credential(
                "gm-1",
                CredentialRecord {
                    id: Uuid::new_v4(),
                    kind: "password".into(),
                    created_at: chrono::Utc::now(),
                },
            )
            .unwrap();

        let supply_before = total_supply(&f.db);
        let report = f
            .engine
            .destroy_wallet(&Actor::admin("root"), &gm, Some("cleanup"))
            .unwrap();

        assert_eq!(report.liquid, 300);
        assert_eq!(report.crystalized, 200);
        assert_eq!(report.total, 500);
        assert_eq!(report.recipient, WalletKey::reclaim_reserve());
        assert!(report.history_records_removed >= 2); // seed + crystallize

        // Wallet and identity gone; history gone.
        assert!(f.db.get_wallet(&gm).unwrap().is_none());
        assert!(registry.profile("gm-1").unwrap().is_none());
        assert!(registry.sessions("gm-1").unwrap().is_empty());
        assert!(registry.credentials("gm-1").unwrap().is_empty());
        assert!(f.db.transaction_history(&gm, 10).unwrap().is_empty());

        // The value landed in the reclaim reserve; supply unchanged.
        let reclaim = f.service.wallet(&WalletKey::reclaim_reserve()).unwrap();
        assert_eq!(reclaim.liquid(), 500);
        assert_eq!(total_supply(&f.db), supply_before);

        // One audit record on the reserve side captures the prior balances.
        let audit = f
            .service
            .transaction_history(&WalletKey::reclaim_reserve(), 1)
            .unwrap();
        assert_eq!(audit[0].description, "cleanup");
        assert_eq!(
            audit[0].metadata["destroyed_wallet"]["liquid"],
            serde_json::json!("300")
        );
    }

    #[test]
    fn crystallize_then_destroy_roundtrip() {
        // Binding 50 KRMA and then destroying the holder must return
        // exactly 50 to the reserve; nothing created or lost.
        let f = fixture();
        let gm = funded_gm(&f, "gm-1", 50);
        f.engine.crystallize(&gm, &request("camp-1", 50)).unwrap();

        let report = f
            .engine
            .destroy_wallet(&Actor::admin("root"), &gm, None)
            .unwrap();
        assert_eq!(report.total, 50);
        assert_eq!(
            f.service
                .wallet(&WalletKey::reclaim_reserve())
                .unwrap()
                .liquid(),
            50
        );
    }

    #[test]
    fn destroy_missing_wallet_fails() {
        let f = fixture();
        assert!(matches!(
            f.engine
                .destroy_wallet(&Actor::admin("root"), &WalletKey::watcher("nobody"), None),
            Err(CrystalError::WalletNotFound(_))
        ));
    }
}
