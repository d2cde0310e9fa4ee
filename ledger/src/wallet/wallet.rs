//! # Wallet Record
//!
//! A [`Wallet`] holds an owner's KRMA in two compartments:
//!
//! - **liquid** -- uncommitted balance, available for spending, transfers,
//!   and crystallization.
//! - **crystalized** -- KRMA permanently bound into game assets. It still
//!   counts toward the owner's total (and toward global conservation), but
//!   only admin paths move it.
//!
//! The struct itself is a plain value: credit and debit are checked,
//! in-memory mutations. Atomicity and durability are the store's job --
//! the ledger service reads a wallet inside a store transaction, mutates
//! it here, and writes it back in the same transaction.
//!
//! ## Persistence
//!
//! The whole struct derives `Serialize`/`Deserialize` and is stored in the
//! wallet tree as a single key-value pair (key = [`WalletKey`] encoding,
//! value = bincode blob).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::owner::WalletKey;
use crate::krma::{krma_string, Krma};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from in-memory balance arithmetic.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Attempted to debit more than the available balance.
    #[error("insufficient {kind} balance: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Which compartment was being debited.
        kind: BalanceKind,
        /// The current balance.
        available: Krma,
        /// The amount that was requested.
        requested: Krma,
    },

    /// Arithmetic overflow during a credit operation.
    ///
    /// Reaching this with a 10^11 supply means a bug upstream, not a rich
    /// user.
    #[error("balance overflow: current {current}, credit {credit}")]
    Overflow {
        /// The balance before the failed credit.
        current: Krma,
        /// The amount that caused the overflow.
        credit: Krma,
    },
}

// ---------------------------------------------------------------------------
// BalanceKind
// ---------------------------------------------------------------------------

/// Selects which compartment of a wallet an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceKind {
    /// Spendable balance.
    Liquid,
    /// Balance bound into assets.
    Crystalized,
}

impl std::fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceKind::Liquid => write!(f, "liquid"),
            BalanceKind::Crystalized => write!(f, "crystalized"),
        }
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// Arbitrary key-value metadata attached to a wallet.
///
/// Application-layer data: display name, compliance flags, etc. The ledger
/// doesn't interpret these -- it just stores them.
pub type WalletMetadata = HashMap<String, String>;

/// A single owner's KRMA holdings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// The `(owner_type, owner_ref)` pair this wallet belongs to.
    pub key: WalletKey,

    /// Uncommitted, spendable KRMA.
    #[serde(with = "krma_string")]
    liquid: Krma,

    /// KRMA bound into crystallized assets.
    #[serde(with = "krma_string")]
    crystalized: Krma,

    /// Number of ledger transactions ever recorded against this wallet.
    ///
    /// Doubles as the sequence source for history keys, and -- because it
    /// changes on every committed write -- as the optimistic-lock token
    /// for the destroy cascade.
    pub tx_count: u64,

    /// Timestamp when this wallet was created.
    pub created_at: DateTime<Utc>,

    /// Application-layer metadata.
    pub metadata: WalletMetadata,
}

impl Wallet {
    /// Creates a new empty wallet for the given owner.
    pub fn new(key: WalletKey) -> Self {
        Self {
            key,
            liquid: 0,
            crystalized: 0,
            tx_count: 0,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Returns the balance of one compartment.
    pub fn balance(&self, kind: BalanceKind) -> Krma {
        match kind {
            BalanceKind::Liquid => self.liquid,
            BalanceKind::Crystalized => self.crystalized,
        }
    }

    /// Spendable balance.
    pub fn liquid(&self) -> Krma {
        self.liquid
    }

    /// Asset-bound balance.
    pub fn crystalized(&self) -> Krma {
        self.crystalized
    }

    /// Total holdings: `liquid + crystalized`. Both compartments are
    /// bounded by the supply, so the sum cannot overflow.
    pub fn total(&self) -> Krma {
        self.liquid + self.crystalized
    }

    /// Credits (adds) funds to a compartment, returning the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Overflow`] if the credit would exceed
    /// `u128::MAX`.
    pub fn credit(&mut self, kind: BalanceKind, amount: Krma) -> Result<Krma, WalletError> {
        let slot = self.slot_mut(kind);
        let updated = slot.checked_add(amount).ok_or(WalletError::Overflow {
            current: *slot,
            credit: amount,
        })?;
        *slot = updated;
        Ok(updated)
    }

    /// Debits (subtracts) funds from a compartment, returning the new
    /// balance.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InsufficientFunds`] if the debit exceeds the
    /// current balance. The wallet is left unchanged on failure.
    pub fn debit(&mut self, kind: BalanceKind, amount: Krma) -> Result<Krma, WalletError> {
        let slot = self.slot_mut(kind);
        if *slot < amount {
            return Err(WalletError::InsufficientFunds {
                kind,
                available: *slot,
                requested: amount,
            });
        }
        *slot -= amount;
        Ok(*slot)
    }

    fn slot_mut(&mut self, kind: BalanceKind) -> &mut Krma {
        match kind {
            BalanceKind::Liquid => &mut self.liquid,
            BalanceKind::Crystalized => &mut self.crystalized,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
