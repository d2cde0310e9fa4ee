//! # Character Sheet Accessor
//!
//! Character sheets arrive as loosely-typed JSON documents from the
//! campaign-storage collaborator: hand-edited, synced from spreadsheets,
//! and shaped by years of template drift. Nothing about them can be
//! trusted to exist.
//!
//! [`CharacterSheet`] wraps the raw document behind capability accessors
//! with documented defaults — a missing field is a zero, a string where a
//! number should be is parsed if possible and a zero otherwise, and no
//! accessor ever fails. The valuation layer stays pure because this layer
//! absorbs the mess.

use serde_json::Value;

use krma_ledger::krma::SignedKrma;

/// A loosely-typed character-sheet document.
///
/// All accessors are total: absent or malformed fields yield the
/// documented default rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterSheet {
    doc: Value,
}

impl CharacterSheet {
    /// Wraps a raw sheet document.
    pub fn new(doc: Value) -> Self {
        Self { doc }
    }

    /// The underlying document.
    pub fn raw(&self) -> &Value {
        &self.doc
    }

    /// The level of one named attribute (`attributes.<name>.level`).
    /// Default 0.
    pub fn attribute_level(&self, name: &str) -> i64 {
        self.doc
            .get("attributes")
            .and_then(|a| a.get(name))
            .and_then(|attr| attr.get("level"))
            .and_then(as_i64)
            .unwrap_or(0)
    }

    /// The current frequency pool (`attributes.frequency.current`).
    /// Counted separately from the frequency attribute's level. Default 0.
    pub fn frequency_pool(&self) -> i64 {
        self.doc
            .get("attributes")
            .and_then(|a| a.get("frequency"))
            .and_then(|f| f.get("current"))
            .and_then(as_i64)
            .unwrap_or(0)
    }

    /// The levels of every freeform skill (`skills.*.level`), in the
    /// document's own order. Empty if no skills object exists.
    pub fn skill_levels(&self) -> Vec<i64> {
        match self.doc.get("skills").and_then(Value::as_object) {
            Some(skills) => skills
                .values()
                .map(|skill| skill.get("level").and_then(as_i64).unwrap_or(0))
                .collect(),
            None => Vec::new(),
        }
    }

    /// A top-level numeric field (`wealthLevel`, `techLevel`, ...).
    /// Default 0.
    pub fn numeric_field(&self, name: &str) -> i64 {
        self.doc.get(name).and_then(as_i64).unwrap_or(0)
    }

    /// The externally-appraised value of a component (items, nectars,
    /// thorns, seeds, roots, branches).
    ///
    /// Read verbatim from the `krmaValues` map; falls back to a
    /// `<component>_tkv` field; defaults to 0. Signs pass through
    /// untouched — a thorn appraised at -20 stays -20.
    pub fn appraised_value(&self, component: &str) -> SignedKrma {
        if let Some(value) = self
            .doc
            .get("krmaValues")
            .and_then(|map| map.get(component))
            .and_then(as_signed_krma)
        {
            return value;
        }
        self.doc
            .get(format!("{component}_tkv"))
            .and_then(as_signed_krma)
            .unwrap_or(0)
    }

    /// The total the sheet declares for itself (`totalKarmicValue`, `tkv`,
    /// or `TKV`), if any. Sheets that carry one are validated against it.
    pub fn declared_total(&self) -> Option<SignedKrma> {
        ["totalKarmicValue", "tkv", "TKV"]
            .iter()
            .find_map(|field| self.doc.get(*field).and_then(as_signed_krma))
    }
}

/// Numeric coercion: integer, float (truncated), or decimal string.
fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Wide coercion for KRMA amounts, which cross the boundary as decimal
/// strings.
fn as_signed_krma(value: &Value) -> Option<SignedKrma> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        _ => as_i64(value).map(SignedKrma::from),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_sheet_defaults_to_zero_everywhere() {
        let sheet = CharacterSheet::new(json!({}));
        assert_eq!(sheet.attribute_level("clout"), 0);
        assert_eq!(sheet.frequency_pool(), 0);
        assert!(sheet.skill_levels().is_empty());
        assert_eq!(sheet.numeric_field("wealthLevel"), 0);
        assert_eq!(sheet.appraised_value("items"), 0);
        assert!(sheet.declared_total().is_none());
    }

    #[test]
    fn attribute_levels_and_frequency_pool() {
        let sheet = CharacterSheet::new(json!({
            "attributes": {
                "clout": {"level": 3},
                "frequency": {"level": 2, "current": 7},
            }
        }));
        assert_eq!(sheet.attribute_level("clout"), 3);
        assert_eq!(sheet.attribute_level("frequency"), 2);
        // The pool is distinct from the attribute's level.
        assert_eq!(sheet.frequency_pool(), 7);
        assert_eq!(sheet.attribute_level("wit"), 0);
    }

    #[test]
    fn skill_levels_tolerate_partial_entries() {
        let sheet = CharacterSheet::new(json!({
            "skills": {
                "stealth": {"level": 4},
                "lore": {"notes": "no level recorded"},
                "smithing": {"level": 2},
            }
        }));
        let mut levels = sheet.skill_levels();
        levels.sort_unstable();
        assert_eq!(levels, vec![0, 2, 4]);
    }

    #[test]
    fn appraised_values_prefer_krma_values_map() {
        let sheet = CharacterSheet::new(json!({
            "krmaValues": {"items": 25, "thorns": -20},
            "items_tkv": 999,
            "seeds_tkv": 5,
        }));
        assert_eq!(sheet.appraised_value("items"), 25); // map wins
        assert_eq!(sheet.appraised_value("thorns"), -20); // sign preserved
        assert_eq!(sheet.appraised_value("seeds"), 5); // fallback field
        assert_eq!(sheet.appraised_value("roots"), 0); // default
    }

    #[test]
    fn numbers_arrive_as_strings_too() {
        let sheet = CharacterSheet::new(json!({
            "wealthLevel": "3",
            "krmaValues": {"items": "120"},
            "attributes": {"clout": {"level": "5"}},
        }));
        assert_eq!(sheet.numeric_field("wealthLevel"), 3);
        assert_eq!(sheet.appraised_value("items"), 120);
        assert_eq!(sheet.attribute_level("clout"), 5);
    }

    #[test]
    fn floats_truncate() {
        let sheet = CharacterSheet::new(json!({"wealthLevel": 2.9}));
        assert_eq!(sheet.numeric_field("wealthLevel"), 2);
    }

    #[test]
    fn declared_total_checks_all_spellings() {
        for field in ["totalKarmicValue", "tkv", "TKV"] {
            let sheet = CharacterSheet::new(json!({field: 150}));
            assert_eq!(sheet.declared_total(), Some(150));
        }
    }

    #[test]
    fn garbage_fields_are_ignored() {
        let sheet = CharacterSheet::new(json!({
            "wealthLevel": {"nested": true},
            "krmaValues": {"items": [1, 2, 3]},
        }));
        assert_eq!(sheet.numeric_field("wealthLevel"), 0);
        assert_eq!(sheet.appraised_value("items"), 0);
    }
}
