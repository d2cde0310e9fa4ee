//! # Campaign Budget Manager
//!
//! Enforces the economic contract of a campaign: everything the owner has
//! placed in the world — character valuations plus crystallized asset
//! values — must fit inside the owner's total holdings.
//!
//! Character sheets are owned by the campaign-storage collaborator and
//! reach this module read-only through the [`CharacterSource`] trait. The
//! manager recomputes valuations from sheets on every validation and keeps
//! a non-authoritative cache of the results in the store; healing adjusts
//! that cache and reports the per-character targets back to the caller,
//! which owns applying them to the sheets themselves.
//!
//! Validation and healing are deliberately two separate calls. An edit can
//! land between them, so callers re-validate after healing rather than
//! trusting the heal report as the final word.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use krma_ledger::crystal::CrystallizationEngine;
use krma_ledger::krma::{krma_string, signed_krma_string, Krma, SignedKrma};
use krma_ledger::store::{DbError, LedgerDb};
use krma_ledger::wallet::WalletKey;

use crate::sheet::CharacterSheet;
use crate::tkv::{TkvBreakdown, TkvCalculator};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from budget validation and healing.
#[derive(Debug, Error)]
pub enum BudgetError {
    /// The store itself failed.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),

    /// The valuation cache could not be read or written.
    #[error("valuation cache error: {0}")]
    Cache(String),
}

// ---------------------------------------------------------------------------
// Collaborator Trait
// ---------------------------------------------------------------------------

/// One character as supplied by campaign storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    /// The collaborator's character id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// The raw sheet document.
    pub sheet: serde_json::Value,
}

/// Read-only access to the campaign subsystem's character documents.
pub trait CharacterSource {
    /// Every character currently in the campaign.
    fn characters_in_campaign(&self, campaign_id: &str) -> Vec<CharacterRecord>;
}

// ---------------------------------------------------------------------------
// Cached valuations
// ---------------------------------------------------------------------------

/// Cached, non-authoritative valuation for one character. Recomputed from
/// the sheet on every budget validation; adjusted by healing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterKrmaRecord {
    /// The collaborator's character id.
    pub character_id: String,
    /// Display name at the time of calculation.
    pub name: String,
    /// Full component breakdown.
    pub breakdown: TkvBreakdown,
    /// When this cache entry was written.
    pub last_calculated: DateTime<Utc>,
}

/// Name of the tree holding [`CharacterKrmaRecord`] rows.
const VALUATIONS_TREE: &str = "valuations";

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One character's cost inside a budget validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterCost {
    /// The collaborator's character id.
    pub character_id: String,
    /// Display name.
    pub name: String,
    /// The character's total valuation.
    #[serde(with = "signed_krma_string")]
    pub krma_value: SignedKrma,
    /// Full component breakdown.
    pub breakdown: TkvBreakdown,
}

/// The full picture of a campaign against its owner's holdings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetValidation {
    /// Over budget nowhere and no violations.
    pub is_valid: bool,
    /// The owner's `liquid + crystalized`.
    #[serde(with = "krma_string")]
    pub owner_total: Krma,
    /// Σ character TKV + Σ world-asset value.
    #[serde(with = "signed_krma_string")]
    pub allocated: SignedKrma,
    /// `owner_total - allocated`. Negative when over budget.
    #[serde(with = "signed_krma_string")]
    pub liquid_remainder: SignedKrma,
    /// `max(0, allocated - owner_total)`.
    #[serde(with = "krma_string")]
    pub over_budget: Krma,
    /// Per-character costs.
    pub characters: Vec<CharacterCost>,
    /// Total value of the campaign's crystallized assets.
    #[serde(with = "krma_string")]
    pub world_assets: Krma,
    /// Human-readable problems found during validation.
    pub violations: Vec<String>,
}

/// Result of a draft-character affordability check. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationCheck {
    /// The draft fits the remaining budget.
    pub can_create: bool,
    /// The draft's computed TKV.
    #[serde(with = "signed_krma_string")]
    pub required: SignedKrma,
    /// `owner_total - currently allocated`.
    #[serde(with = "signed_krma_string")]
    pub available: SignedKrma,
}

/// Healing strategy. Only proportional scaling is implemented; the enum
/// exists so the boundary can name the strategy explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealStrategy {
    /// Scale every character's TKV by `owner_total / allocated`, floored.
    Proportional,
}

/// One character successfully scaled down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealAdjustment {
    /// The collaborator's character id.
    pub character_id: String,
    /// Display name.
    pub name: String,
    /// Valuation before healing.
    #[serde(with = "signed_krma_string")]
    pub old_krma: SignedKrma,
    /// Valuation after healing.
    #[serde(with = "signed_krma_string")]
    pub new_krma: SignedKrma,
}

/// One character that could not be healed, and why. Failures are
/// per-character — one stubborn sheet never hides the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealFailure {
    /// The collaborator's character id.
    pub character_id: String,
    /// Why this character was skipped.
    pub reason: String,
}

/// Outcome of an auto-heal pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealReport {
    /// The campaign now fits the budget and nothing failed.
    pub healed: bool,
    /// Characters that were scaled.
    pub adjustments: Vec<HealAdjustment>,
    /// Characters that could not be scaled.
    pub failures: Vec<HealFailure>,
    /// Over-budget amount remaining after healing. Non-zero when the
    /// unscalable portion (world assets, negative valuations) exceeds the
    /// budget on its own.
    #[serde(with = "krma_string")]
    pub remaining_over_budget: Krma,
}

// ---------------------------------------------------------------------------
// Reduction policy
// ---------------------------------------------------------------------------

/// Reduces a breakdown to `target`, returning the adjusted copy.
///
/// The reduction drains components in a fixed order, each fully before the
/// next is touched: the externally-appraised and pool components first
/// (items, nectars, seeds, roots, branches, frequency), then earned
/// progression (skills, attributes, fate die), and only as a last resort
/// the curved commitments (wealth, tech, health), which represent flat
/// narrative facts about the character. Negative components are never
/// adjusted. Deterministic by construction.
pub fn reduce_to_target(
    breakdown: &TkvBreakdown,
    target: SignedKrma,
) -> Result<TkvBreakdown, String> {
    let mut out = breakdown.clone();
    let mut remaining = breakdown.total - target;
    if remaining <= 0 {
        return Ok(out);
    }

    let order: [fn(&mut TkvBreakdown) -> &mut SignedKrma; 12] = [
        |b| &mut b.items,
        |b| &mut b.nectars,
        |b| &mut b.seeds,
        |b| &mut b.roots,
        |b| &mut b.branches,
        |b| &mut b.frequency,
        |b| &mut b.skills,
        |b| &mut b.attributes,
        |b| &mut b.fate_die,
        |b| &mut b.wealth_level,
        |b| &mut b.tech_level,
        |b| &mut b.health_level,
    ];

    for accessor in order {
        if remaining == 0 {
            break;
        }
        let slot = accessor(&mut out);
        if *slot > 0 {
            let cut = (*slot).min(remaining);
            *slot -= cut;
            remaining -= cut;
        }
    }

    if remaining > 0 {
        return Err(format!(
            "cannot reduce below the unscalable floor: {remaining} KRMA short of target {target}"
        ));
    }
    out.total = out.component_sum();
    Ok(out)
}

// ---------------------------------------------------------------------------
// BudgetManager
// ---------------------------------------------------------------------------

/// Validates campaign allocations against the owner's wallet and heals
/// over-budget campaigns.
#[derive(Debug, Clone)]
pub struct BudgetManager {
    db: LedgerDb,
    valuations: sled::Tree,
    engine: CrystallizationEngine,
}

impl BudgetManager {
    pub fn new(db: &LedgerDb) -> Result<Self, BudgetError> {
        Ok(Self {
            db: db.clone(),
            valuations: db.open_tree(VALUATIONS_TREE)?,
            engine: CrystallizationEngine::new(db),
        })
    }

    /// Validates a campaign's total allocation against the owning wallet.
    ///
    /// Recomputes every character's TKV from its sheet (updating the
    /// cache), sums in the campaign's crystallized assets, and reports the
    /// scalars plus per-character breakdowns. Per-character sheet problems
    /// become violations, never hard failures.
    ///
    /// Pure read against the ledger; the only write is the valuation
    /// cache.
    pub fn validate_campaign_budget(
        &self,
        campaign_id: &str,
        owner: &WalletKey,
        source: &dyn CharacterSource,
    ) -> Result<BudgetValidation, BudgetError> {
        self.validate_internal(campaign_id, owner, source, true)
    }

    fn validate_internal(
        &self,
        campaign_id: &str,
        owner: &WalletKey,
        source: &dyn CharacterSource,
        update_cache: bool,
    ) -> Result<BudgetValidation, BudgetError> {
        let mut violations = Vec::new();

        let owner_total = match self.db.get_wallet(owner)? {
            Some(wallet) => wallet.total(),
            None => {
                violations.push(format!("owner wallet {owner} does not exist"));
                0
            }
        };

        let mut characters = Vec::new();
        for record in source.characters_in_campaign(campaign_id) {
            let sheet = CharacterSheet::new(record.sheet.clone());
            let breakdown = TkvCalculator::calculate(&sheet);
            let validation = TkvCalculator::validate(&sheet, &breakdown);
            for error in validation.errors {
                violations.push(format!("character \"{}\": {error}", record.name));
            }
            if update_cache {
                self.write_cache(&record.id, &record.name, &breakdown)?;
            }
            characters.push(CharacterCost {
                character_id: record.id,
                name: record.name,
                krma_value: breakdown.total,
                breakdown,
            });
        }

        let world_assets = self.engine.campaign_krma_value(campaign_id)?;
        let character_total: SignedKrma = characters.iter().map(|c| c.krma_value).sum();
        let allocated = character_total + world_assets as SignedKrma;
        let liquid_remainder = owner_total as SignedKrma - allocated;
        let over_budget = if liquid_remainder < 0 {
            liquid_remainder.unsigned_abs()
        } else {
            0
        };

        if over_budget > 0 {
            violations.push(format!(
                "campaign exceeds owner budget by {over_budget} KRMA"
            ));
        }

        Ok(BudgetValidation {
            is_valid: over_budget == 0 && violations.is_empty(),
            owner_total,
            allocated,
            liquid_remainder,
            over_budget,
            characters,
            world_assets,
            violations,
        })
    }

    /// Checks whether a draft character fits the remaining budget.
    ///
    /// The draft's TKV is computed without persisting anything — no cache
    /// write, no sheet write, no wallet change.
    pub fn validate_character_creation(
        &self,
        campaign_id: &str,
        draft_sheet: &serde_json::Value,
        owner: &WalletKey,
        source: &dyn CharacterSource,
    ) -> Result<CreationCheck, BudgetError> {
        let budget = self.validate_internal(campaign_id, owner, source, false)?;
        let required = TkvCalculator::calculate(&CharacterSheet::new(draft_sheet.clone())).total;
        let available = budget.liquid_remainder;
        Ok(CreationCheck {
            can_create: required <= available,
            required,
            available,
        })
    }

    /// Scales an over-budget campaign's characters back inside the budget.
    ///
    /// With [`HealStrategy::Proportional`], each character's new target is
    /// `⌊old × owner_total / allocated⌋`, so the healed sum fits within
    /// the owner's holdings (world assets are never scaled — if they alone
    /// exceed the budget, the report says so via
    /// [`HealReport::remaining_over_budget`]). Adjustments land in the
    /// valuation cache and are reported per character; failures are also
    /// per character. Callers re-validate afterwards — an edit may have
    /// raced the heal.
    pub fn auto_heal(
        &self,
        campaign_id: &str,
        owner: &WalletKey,
        source: &dyn CharacterSource,
        strategy: HealStrategy,
    ) -> Result<HealReport, BudgetError> {
        let HealStrategy::Proportional = strategy;

        let validation = self.validate_campaign_budget(campaign_id, owner, source)?;
        if validation.over_budget == 0 {
            return Ok(HealReport {
                healed: true,
                adjustments: Vec::new(),
                failures: Vec::new(),
                remaining_over_budget: 0,
            });
        }

        let owner_total = validation.owner_total as SignedKrma;
        let allocated = validation.allocated;
        let mut adjustments = Vec::new();
        let mut failures = Vec::new();
        let mut healed_character_total: SignedKrma = 0;

        for cost in &validation.characters {
            let old = cost.krma_value;
            if old < 0 {
                healed_character_total += old;
                failures.push(HealFailure {
                    character_id: cost.character_id.clone(),
                    reason: format!("negative valuation {old} cannot be scaled"),
                });
                continue;
            }
            if old == 0 {
                continue;
            }

            // Both operands are positive, so truncating division is the
            // floor the policy calls for.
            let target = old * owner_total / allocated;
            match reduce_to_target(&cost.breakdown, target) {
                Ok(new_breakdown) => {
                    let new_total = new_breakdown.total;
                    self.write_cache(&cost.character_id, &cost.name, &new_breakdown)?;
                    healed_character_total += new_total;
                    adjustments.push(HealAdjustment {
                        character_id: cost.character_id.clone(),
                        name: cost.name.clone(),
                        old_krma: old,
                        new_krma: new_total,
                    });
                }
                Err(reason) => {
                    healed_character_total += old;
                    failures.push(HealFailure {
                        character_id: cost.character_id.clone(),
                        reason,
                    });
                }
            }
        }

        let new_allocated = healed_character_total + validation.world_assets as SignedKrma;
        let remaining_over_budget = if new_allocated > owner_total {
            (new_allocated - owner_total).unsigned_abs()
        } else {
            0
        };
        let healed = failures.is_empty() && remaining_over_budget == 0;

        info!(
            campaign = %campaign_id,
            owner = %owner,
            adjusted = adjustments.len(),
            failed = failures.len(),
            remaining = %remaining_over_budget,
            "auto-heal pass"
        );

        Ok(HealReport {
            healed,
            adjustments,
            failures,
            remaining_over_budget,
        })
    }

    /// The cached valuation for a character, if one has been computed.
    pub fn cached_valuation(
        &self,
        character_id: &str,
    ) -> Result<Option<CharacterKrmaRecord>, BudgetError> {
        match self
            .valuations
            .get(character_id.as_bytes())
            .map_err(DbError::from)?
        {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| BudgetError::Cache(e.to_string())),
            None => Ok(None),
        }
    }

    fn write_cache(
        &self,
        character_id: &str,
        name: &str,
        breakdown: &TkvBreakdown,
    ) -> Result<(), BudgetError> {
        let record = CharacterKrmaRecord {
            character_id: character_id.to_string(),
            name: name.to_string(),
            breakdown: breakdown.clone(),
            last_calculated: Utc::now(),
        };
        let bytes =
            bincode::serialize(&record).map_err(|e| BudgetError::Cache(e.to_string()))?;
        self.valuations
            .insert(character_id.as_bytes(), bytes)
            .map_err(DbError::from)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
