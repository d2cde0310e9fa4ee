//! # Wallet Ownership
//!
//! Every wallet belongs to exactly one owner, identified by the pair of
//! an [`OwnerType`] (what kind of actor holds it) and an owner reference
//! (who, within that kind). The pair is the wallet's identity -- there is
//! never more than one wallet per `(owner_type, owner_ref)`.
//!
//! [`WalletKey`] encodes the pair canonically as `"<tag>:<ref>"`, which is
//! also the on-disk key in the wallet tree. The tag strings are part of the
//! storage format and must never change once a database exists.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config;

// ---------------------------------------------------------------------------
// OwnerType
// ---------------------------------------------------------------------------

/// Classification of a wallet's holder.
///
/// The type determines which rules apply: `Terminal` wallets are system
/// reserves and are protected from destruction; the other three are
/// participant wallets whose owners also have identity records subject to
/// the destroy cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    /// System reserve. Supply sink and source; never owned by a person.
    Terminal,
    /// An AI agent participating in the economy.
    Godhead,
    /// A player account.
    Trailblazer,
    /// A game-master account.
    Watcher,
}

/// Error returned when a boundary string names no known owner type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown owner type: {0:?}")]
pub struct UnknownOwnerType(pub String);

impl OwnerType {
    /// Canonical lowercase tag, used in wallet keys and boundary JSON.
    /// Part of the storage format -- append-only, never rename.
    pub fn tag(&self) -> &'static str {
        match self {
            OwnerType::Terminal => "terminal",
            OwnerType::Godhead => "godhead",
            OwnerType::Trailblazer => "trailblazer",
            OwnerType::Watcher => "watcher",
        }
    }

    /// Parses a canonical tag. Case-insensitive at the boundary because
    /// upstream transport has historically shouted these in caps.
    pub fn parse(s: &str) -> Result<Self, UnknownOwnerType> {
        match s.to_ascii_lowercase().as_str() {
            "terminal" => Ok(OwnerType::Terminal),
            "godhead" => Ok(OwnerType::Godhead),
            "trailblazer" => Ok(OwnerType::Trailblazer),
            "watcher" => Ok(OwnerType::Watcher),
            _ => Err(UnknownOwnerType(s.to_string())),
        }
    }

    /// Returns `true` for system reserve wallets.
    pub fn is_reserve(&self) -> bool {
        matches!(self, OwnerType::Terminal)
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl std::str::FromStr for OwnerType {
    type Err = UnknownOwnerType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// WalletKey
// ---------------------------------------------------------------------------

/// The unique identity of a wallet: `(owner_type, owner_ref)`.
///
/// Encodes to `"<tag>:<ref>"`, e.g. `"watcher:gm-7f3a"` or
/// `"terminal:the-terminal"`. The encoded form is the sled key for the
/// wallet row and the prefix for the wallet's transaction history, so the
/// owner reference must not contain a NUL byte (the history key separator).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletKey {
    /// What kind of actor holds this wallet.
    pub owner_type: OwnerType,
    /// Owner identifier within that kind (user id, reserve name, agent id).
    pub owner_ref: String,
}

impl WalletKey {
    /// Creates a key from its parts.
    pub fn new(owner_type: OwnerType, owner_ref: impl Into<String>) -> Self {
        Self {
            owner_type,
            owner_ref: owner_ref.into(),
        }
    }

    /// Key of a system reserve wallet.
    pub fn terminal(owner_ref: impl Into<String>) -> Self {
        Self::new(OwnerType::Terminal, owner_ref)
    }

    /// Key of a game-master wallet.
    pub fn watcher(owner_ref: impl Into<String>) -> Self {
        Self::new(OwnerType::Watcher, owner_ref)
    }

    /// Key of a player wallet.
    pub fn trailblazer(owner_ref: impl Into<String>) -> Self {
        Self::new(OwnerType::Trailblazer, owner_ref)
    }

    /// Key of an AI-agent wallet.
    pub fn godhead(owner_ref: impl Into<String>) -> Self {
        Self::new(OwnerType::Godhead, owner_ref)
    }

    /// The primary reserve: holds the unallocated supply.
    pub fn primary_reserve() -> Self {
        Self::terminal(config::PRIMARY_RESERVE_REF)
    }

    /// The reclaim reserve: receives destroyed and dissolved value.
    pub fn reclaim_reserve() -> Self {
        Self::terminal(config::RECLAIM_RESERVE_REF)
    }

    /// Canonical string encoding, `"<tag>:<ref>"`.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.owner_type.tag(), self.owner_ref)
    }

    /// Parses the canonical encoding produced by [`encode`](Self::encode).
    pub fn parse(s: &str) -> Result<Self, UnknownOwnerType> {
        let (tag, owner_ref) = s.split_once(':').ok_or_else(|| UnknownOwnerType(s.to_string()))?;
        Ok(Self::new(OwnerType::parse(tag)?, owner_ref))
    }

    /// Returns `true` if this key names a protected system reserve.
    pub fn is_reserve(&self) -> bool {
        self.owner_type.is_reserve()
    }
}

impl fmt::Display for WalletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Logs and error messages show the same form as the on-disk key.
        write!(f, "{}", self.encode())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
