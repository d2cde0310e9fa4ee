//! Crystallized-asset record types.
//!
//! A [`CrystallizedAsset`] is what liquid KRMA becomes when a game master
//! spends it on something permanent: the value is debited from the wallet
//! and bound into the asset record for as long as the asset is active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::krma::{krma_string, Krma};
use crate::wallet::WalletKey;

// ---------------------------------------------------------------------------
// CrystallizationType
// ---------------------------------------------------------------------------

/// What kind of game thing an asset is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CrystallizationType {
    Npc,
    Item,
    Location,
    Environment,
    Quest,
    Artifact,
}

/// Error returned when a boundary string names no known asset type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown crystallization type: {0:?}")]
pub struct UnknownCrystallizationType(pub String);

impl CrystallizationType {
    /// Canonical uppercase tag used at the boundary.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Npc => "NPC",
            Self::Item => "ITEM",
            Self::Location => "LOCATION",
            Self::Environment => "ENVIRONMENT",
            Self::Quest => "QUEST",
            Self::Artifact => "ARTIFACT",
        }
    }

    /// Parses a boundary tag, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, UnknownCrystallizationType> {
        match s.to_ascii_uppercase().as_str() {
            "NPC" => Ok(Self::Npc),
            "ITEM" => Ok(Self::Item),
            "LOCATION" => Ok(Self::Location),
            "ENVIRONMENT" => Ok(Self::Environment),
            "QUEST" => Ok(Self::Quest),
            "ARTIFACT" => Ok(Self::Artifact),
            _ => Err(UnknownCrystallizationType(s.to_string())),
        }
    }
}

impl fmt::Display for CrystallizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl std::str::FromStr for CrystallizationType {
    type Err = UnknownCrystallizationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// CrystallizationRequest
// ---------------------------------------------------------------------------

/// Everything the engine needs to crystallize liquid KRMA into an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrystallizationRequest {
    /// The campaign the asset belongs to.
    pub campaign_id: String,
    /// What kind of asset to create.
    pub asset_type: CrystallizationType,
    /// Display name of the asset.
    pub name: String,
    /// Optional flavor text.
    pub description: Option<String>,
    /// How much liquid KRMA to bind. Must be positive.
    #[serde(with = "krma_string")]
    pub krma_amount: Krma,
    /// Free-form application metadata carried on the asset.
    pub metadata: serde_json::Value,
}

impl CrystallizationRequest {
    /// Builds a request from boundary inputs, where the asset type arrives
    /// as a string tag.
    pub fn from_boundary(
        campaign_id: impl Into<String>,
        type_tag: &str,
        name: impl Into<String>,
        description: Option<String>,
        krma_amount: Krma,
        metadata: serde_json::Value,
    ) -> Result<Self, UnknownCrystallizationType> {
        Ok(Self {
            campaign_id: campaign_id.into(),
            asset_type: CrystallizationType::parse(type_tag)?,
            name: name.into(),
            description,
            krma_amount,
            metadata,
        })
    }
}

// ---------------------------------------------------------------------------
// CrystallizedAsset
// ---------------------------------------------------------------------------

/// A permanent game asset holding bound KRMA.
///
/// `krma_value` is the amount debited at creation; it never changes while
/// the asset lives. Dissolution deactivates the record (the row stays for
/// audit) and routes the value back into circulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrystallizedAsset {
    /// Unique asset id.
    pub id: Uuid,
    /// The campaign this asset is scoped to.
    pub campaign_id: String,
    /// The wallet whose liquid KRMA was bound.
    pub owner: WalletKey,
    /// What kind of asset this is.
    pub asset_type: CrystallizationType,
    /// Display name.
    pub name: String,
    /// Optional flavor text.
    pub description: Option<String>,
    /// The permanently bound amount.
    #[serde(with = "krma_string")]
    pub krma_value: Krma,
    /// `false` once dissolved. Inactive assets are skipped by campaign
    /// scans and sums.
    pub is_active: bool,
    /// Free-form application metadata.
    pub metadata: serde_json::Value,
    /// When the asset was created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip() {
        for ty in [
            CrystallizationType::Npc,
            CrystallizationType::Item,
            CrystallizationType::Location,
            CrystallizationType::Environment,
            CrystallizationType::Quest,
            CrystallizationType::Artifact,
        ] {
            assert_eq!(CrystallizationType::parse(ty.tag()).unwrap(), ty);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            CrystallizationType::parse("npc").unwrap(),
            CrystallizationType::Npc
        );
    }

    #[test]
    fn parse_rejects_unknown_tags() {
        let err = CrystallizationType::parse("DRAGON").unwrap_err();
        assert_eq!(err.0, "DRAGON");
    }

    #[test]
    fn serde_uses_uppercase_tags() {
        let json = serde_json::to_string(&CrystallizationType::Artifact).unwrap();
        assert_eq!(json, r#""ARTIFACT""#);
    }

    #[test]
    fn boundary_request_rejects_unknown_type() {
        let result = CrystallizationRequest::from_boundary(
            "camp-1",
            "DRAGON",
            "Smaug",
            None,
            100,
            serde_json::Value::Null,
        );
        assert!(result.is_err());
    }

    #[test]
    fn request_amount_serializes_as_string() {
        let request = CrystallizationRequest {
            campaign_id: "camp-1".into(),
            asset_type: CrystallizationType::Item,
            name: "Sunblade".into(),
            description: None,
            krma_amount: 750,
            metadata: serde_json::Value::Null,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""krma_amount":"750""#));
    }
}
