//! # Worlds
//!
//! A world (a plane, a setting) comes into existence when an owner commits
//! KRMA to it. The committed amount is debited from the owner's liquid
//! balance as a `PAYMENT` and tracked on the world record; the "lushness"
//! of the world — how vivid and generative the setting is allowed to be —
//! derives from whether real value was invested.
//!
//! Lushness is stored as fixed-point basis points, never floating point:
//! 10_000 bps (1.0) for a funded world, 1_000 bps (0.1) for one spoken
//! into existence with empty pockets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;
use tracing::info;
use uuid::Uuid;

use crate::config;
use crate::krma::{krma_string, Krma, SignedKrma};
use crate::ledger::service::LedgerError;
use crate::ledger::transaction::{LedgerTransaction, TransactionType};
use crate::store::db::{self, DbError, DbResult, LedgerDb};
use crate::wallet::{BalanceKind, Wallet, WalletKey};

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// A campaign setting with KRMA committed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    /// Unique world id.
    pub id: Uuid,
    /// The campaign this world belongs to.
    pub campaign_id: String,
    /// Display name.
    pub name: String,
    /// Optional flavor text.
    pub description: Option<String>,
    /// Liquid KRMA committed at creation.
    #[serde(with = "krma_string")]
    pub liquid_krma_invested: Krma,
    /// Total KRMA ever committed (creation plus later enrichment).
    #[serde(with = "krma_string")]
    pub total_krma_invested: Krma,
    /// Derived vitality scalar in basis points (10_000 = 1.0).
    pub lushness_bps: u32,
    /// `false` once retired.
    pub is_active: bool,
    /// When the world was created.
    pub created_at: DateTime<Utc>,
}

impl World {
    /// Lushness as a display string, e.g. `"1.0"` or `"0.1"`.
    pub fn lushness_display(&self) -> String {
        let whole = self.lushness_bps / config::BPS_SCALE;
        let frac = (self.lushness_bps % config::BPS_SCALE) / (config::BPS_SCALE / 10);
        format!("{whole}.{frac}")
    }
}

/// Derives the lushness scalar from the invested amount.
fn lushness_for(invested: Krma) -> u32 {
    if invested > 0 {
        config::LUSHNESS_INVESTED_BPS
    } else {
        config::LUSHNESS_BARREN_BPS
    }
}

// ---------------------------------------------------------------------------
// WorldService
// ---------------------------------------------------------------------------

/// Creates and lists worlds, settling their KRMA cost against the owner's
/// wallet.
#[derive(Debug, Clone)]
pub struct WorldService {
    db: LedgerDb,
}

impl WorldService {
    pub fn new(db: &LedgerDb) -> Self {
        Self { db: db.clone() }
    }

    /// Creates a world, debiting `invest` liquid KRMA from the owner.
    ///
    /// `invest` may be zero — the world is then created barren, with no
    /// wallet touched and no audit record. A positive investment runs as
    /// one store transaction: debit, world row, `PAYMENT` record.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if the investing owner has no wallet,
    /// insufficient liquid funds via [`LedgerError::Wallet`].
    pub fn create_world(
        &self,
        owner: &WalletKey,
        campaign_id: &str,
        name: &str,
        description: Option<String>,
        invest: Krma,
    ) -> Result<World, LedgerError> {
        let world = World {
            id: Uuid::new_v4(),
            campaign_id: campaign_id.to_string(),
            name: name.to_string(),
            description,
            liquid_krma_invested: invest,
            total_krma_invested: invest,
            lushness_bps: lushness_for(invest),
            is_active: true,
            created_at: Utc::now(),
        };
        let world_key = db::scoped_key(campaign_id, world.id.as_bytes());

        if invest == 0 {
            self.db
                .worlds_tree()
                .insert(world_key, db::encode(&world)?)
                .map_err(DbError::from)?;
            info!(campaign = %campaign_id, world = %world.id, "barren world created");
            return Ok(world);
        }

        let owner_bytes = owner.encode().into_bytes();
        let trees = (
            self.db.wallets_tree(),
            self.db.worlds_tree(),
            self.db.transactions_tree(),
        );
        db::flatten_txn(trees.transaction(|(wallets, worlds, records)| -> sled::transaction::ConflictableTransactionResult<(), LedgerError> {
            let raw = wallets
                .get(&owner_bytes)?
                .ok_or_else(|| db::abort(LedgerError::NotFound(owner.clone())))?;
            let mut wallet: Wallet = db::decode(&raw).map_err(db::abort)?;

            let balance = wallet
                .debit(BalanceKind::Liquid, invest)
                .map_err(db::abort)?;

            let seq = wallet.tx_count;
            wallet.tx_count += 1;
            let record = LedgerTransaction::record(
                owner.clone(),
                TransactionType::Payment,
                -(invest as SignedKrma),
                balance,
                &format!("World creation: {name}"),
            )
            .with_metadata(serde_json::json!({
                "campaign_id": campaign_id,
                "world_id": world.id.to_string(),
                "world_name": name,
            }));

            wallets.insert(owner_bytes.clone(), db::encode(&wallet).map_err(db::abort)?)?;
            worlds.insert(world_key.clone(), db::encode(&world).map_err(db::abort)?)?;
            records.insert(db::tx_key(owner, seq), db::encode(&record).map_err(db::abort)?)?;
            Ok(())
        }))?;

        info!(
            owner = %owner,
            campaign = %campaign_id,
            world = %world.id,
            invested = %invest,
            "world created"
        );
        Ok(world)
    }

    /// Active worlds of one campaign.
    pub fn campaign_worlds(&self, campaign_id: &str) -> DbResult<Vec<World>> {
        let mut worlds = Vec::new();
        for entry in self
            .db
            .worlds_tree()
            .scan_prefix(db::scope_prefix(campaign_id))
        {
            let (_key, value) = entry?;
            let world: World = db::decode(&value)?;
            if world.is_active {
                worlds.push(world);
            }
        }
        Ok(worlds)
    }

    /// Total KRMA committed to a campaign's active worlds.
    pub fn campaign_world_investment(&self, campaign_id: &str) -> DbResult<Krma> {
        Ok(self
            .campaign_worlds(campaign_id)?
            .iter()
            .map(|w| w.total_krma_invested)
            .sum())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
