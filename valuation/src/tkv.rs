//! # Total Karmic Value Calculator
//!
//! The deterministic mapping from character-sheet data to a KRMA
//! valuation. Pure by construction: no store access, no clock, no
//! randomness — the same sheet always prices out to the same breakdown.
//!
//! ## Pricing Model
//!
//! - 1 attribute level = 1 KRMA, across the nine attributes.
//! - 1 point of the current frequency pool = 1 KRMA, counted separately
//!   from the frequency attribute's level.
//! - 1 skill level = 1 KRMA, over every freeform skill.
//! - Wealth and tech levels are curved: `level² × 10`. Health is curved
//!   on its own cheaper track: `level² × 5`.
//! - The fate die has a fixed price table; unknown die sizes fall back to
//!   the raw size.
//! - Items, nectars, thorns, seeds, roots, and branches are appraised
//!   externally and read verbatim from the sheet, signs included.
//!
//! The total is the plain sum of all components — no clamping, no
//! independent subtraction. Validation reports problems; it never edits.

use serde::{Deserialize, Serialize};

use krma_ledger::krma::{signed_krma_string, SignedKrma};

use crate::sheet::CharacterSheet;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// The nine attributes, each worth 1 KRMA per level.
pub const ATTRIBUTE_NAMES: [&str; 9] = [
    "clout",
    "celerity",
    "constitution",
    "focus",
    "frequency",
    "flow",
    "willpower",
    "wisdom",
    "wit",
];

/// Externally-appraised components read from the sheet.
pub const APPRAISED_COMPONENTS: [&str; 6] =
    ["items", "nectars", "thorns", "seeds", "roots", "branches"];

/// Curve multiplier for wealth and tech levels.
const WEALTH_TECH_FACTOR: i64 = 10;

/// Curve multiplier for health levels. Cheaper than wealth/tech.
const HEALTH_FACTOR: i64 = 5;

// ---------------------------------------------------------------------------
// TkvBreakdown
// ---------------------------------------------------------------------------

/// A character's valuation, component by component.
///
/// Components carry the signs the sheet supplied; `total` is their plain
/// sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TkvBreakdown {
    /// Sum of the nine attribute levels.
    #[serde(with = "signed_krma_string")]
    pub attributes: SignedKrma,
    /// Sum of all skill levels.
    #[serde(with = "signed_krma_string")]
    pub skills: SignedKrma,
    /// Current frequency pool value.
    #[serde(with = "signed_krma_string")]
    pub frequency: SignedKrma,
    /// Curved wealth-level cost.
    #[serde(with = "signed_krma_string")]
    pub wealth_level: SignedKrma,
    /// Curved tech-level cost.
    #[serde(with = "signed_krma_string")]
    pub tech_level: SignedKrma,
    /// Curved health-level cost.
    #[serde(with = "signed_krma_string")]
    pub health_level: SignedKrma,
    /// Fate-die cost from the fixed table.
    #[serde(with = "signed_krma_string")]
    pub fate_die: SignedKrma,
    /// Appraised equipment value.
    #[serde(with = "signed_krma_string")]
    pub items: SignedKrma,
    /// Appraised nectar (advantage) value.
    #[serde(with = "signed_krma_string")]
    pub nectars: SignedKrma,
    /// Appraised thorn (disadvantage) value.
    #[serde(with = "signed_krma_string")]
    pub thorns: SignedKrma,
    /// Character-creation seeds.
    #[serde(with = "signed_krma_string")]
    pub seeds: SignedKrma,
    /// Character-creation roots.
    #[serde(with = "signed_krma_string")]
    pub roots: SignedKrma,
    /// Character-creation branches.
    #[serde(with = "signed_krma_string")]
    pub branches: SignedKrma,
    /// Sum of every component above.
    #[serde(with = "signed_krma_string")]
    pub total: SignedKrma,
}

impl TkvBreakdown {
    /// Recomputes the sum of the thirteen components. Equal to `total`
    /// for any breakdown the calculator produced.
    pub fn component_sum(&self) -> SignedKrma {
        self.attributes
            + self.skills
            + self.frequency
            + self.wealth_level
            + self.tech_level
            + self.health_level
            + self.fate_die
            + self.items
            + self.nectars
            + self.thorns
            + self.seeds
            + self.roots
            + self.branches
    }
}

// ---------------------------------------------------------------------------
// TkvValidation
// ---------------------------------------------------------------------------

/// Result of checking a breakdown against its sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TkvValidation {
    /// No errors found.
    pub is_valid: bool,
    /// The total the sheet declared for itself, if any.
    pub sheet_tkv: Option<SignedKrma>,
    /// `calculated - declared`, when a declared total exists.
    pub difference: Option<SignedKrma>,
    /// One message per violation. Empty when valid.
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// TkvCalculator
// ---------------------------------------------------------------------------

/// The pure valuation function.
pub struct TkvCalculator;

impl TkvCalculator {
    /// Prices a character sheet into a full breakdown.
    pub fn calculate(sheet: &CharacterSheet) -> TkvBreakdown {
        let mut breakdown = TkvBreakdown {
            attributes: ATTRIBUTE_NAMES
                .iter()
                .map(|name| SignedKrma::from(sheet.attribute_level(name)))
                .sum(),
            skills: sheet
                .skill_levels()
                .iter()
                .map(|&level| SignedKrma::from(level))
                .sum(),
            frequency: SignedKrma::from(sheet.frequency_pool()),
            wealth_level: wealth_level_cost(sheet.numeric_field("wealthLevel")),
            tech_level: tech_level_cost(sheet.numeric_field("techLevel")),
            health_level: health_level_cost(sheet.numeric_field("healthLevel")),
            fate_die: fate_die_cost(sheet.numeric_field("fateDie")),
            items: sheet.appraised_value("items"),
            nectars: sheet.appraised_value("nectars"),
            thorns: sheet.appraised_value("thorns"),
            seeds: sheet.appraised_value("seeds"),
            roots: sheet.appraised_value("roots"),
            branches: sheet.appraised_value("branches"),
            total: 0,
        };
        breakdown.total = breakdown.component_sum();
        breakdown
    }

    /// Checks a calculated breakdown against the sheet it came from.
    ///
    /// If the sheet declares its own total, the check is a straight
    /// comparison with a signed difference reported on mismatch — no
    /// auto-correction. Otherwise a pair of sanity checks applies: the
    /// total must be non-negative, and a character with neither attributes
    /// nor skills is probably an empty import.
    pub fn validate(sheet: &CharacterSheet, breakdown: &TkvBreakdown) -> TkvValidation {
        let mut errors = Vec::new();

        if let Some(declared) = sheet.declared_total() {
            let difference = breakdown.total - declared;
            if difference != 0 {
                errors.push(format!(
                    "TKV mismatch: calculated {}, sheet declares {declared}",
                    breakdown.total
                ));
            }
            return TkvValidation {
                is_valid: difference == 0,
                sheet_tkv: Some(declared),
                difference: Some(difference),
                errors,
            };
        }

        if breakdown.total < 0 {
            errors.push("negative total karmic value".to_string());
        }
        if breakdown.attributes == 0 && breakdown.skills == 0 {
            errors.push("no attributes or skills found; character may be empty".to_string());
        }

        TkvValidation {
            is_valid: errors.is_empty(),
            sheet_tkv: None,
            difference: None,
            errors,
        }
    }
}

// ---------------------------------------------------------------------------
// Cost curves
// ---------------------------------------------------------------------------

/// Wealth-level cost: `level² × 10`. Level 1 = 10, level 5 = 250,
/// level 10 = 1000. Non-positive levels cost nothing.
pub fn wealth_level_cost(level: i64) -> SignedKrma {
    if level <= 0 {
        return 0;
    }
    SignedKrma::from(level * level * WEALTH_TECH_FACTOR)
}

/// Tech-level cost: same curve as wealth.
pub fn tech_level_cost(level: i64) -> SignedKrma {
    if level <= 0 {
        return 0;
    }
    SignedKrma::from(level * level * WEALTH_TECH_FACTOR)
}

/// Health-level cost: `level² × 5`.
pub fn health_level_cost(level: i64) -> SignedKrma {
    if level <= 0 {
        return 0;
    }
    SignedKrma::from(level * level * HEALTH_FACTOR)
}

/// Fate-die cost. Standard dice have fixed prices; anything else is
/// priced at its raw size so homebrew dice don't break valuation.
pub fn fate_die_cost(die_size: i64) -> SignedKrma {
    if die_size <= 0 {
        return 0;
    }
    let cost = match die_size {
        4 => 10,
        6 => 15,
        8 => 20,
        10 => 25,
        12 => 30,
        20 => 50,
        other => other,
    };
    SignedKrma::from(cost)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
