//! Audit-trail record types for the ledger.
//!
//! Every balance-changing operation appends exactly one
//! [`LedgerTransaction`]. Records are append-only: they are never mutated,
//! and they are deleted only by time-based retention cleanup or by the
//! destroy cascade taking an owner's whole history with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config;
use crate::krma::{krma_string, signed_krma_string, Krma, SignedKrma};
use crate::wallet::WalletKey;

// ---------------------------------------------------------------------------
// TransactionType
// ---------------------------------------------------------------------------

/// Discriminant for the operation a ledger record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Funds credited to a wallet from outside it (grant, dissolution
    /// return, admin re-seed).
    Deposit,
    /// Funds debited from a wallet without a receiving wallet in this
    /// record.
    Withdrawal,
    /// A pairwise move between two wallets. One record covers both sides.
    Transfer,
    /// Funds spent on something: crystallization, world investment.
    Payment,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit => write!(f, "DEPOSIT"),
            Self::Withdrawal => write!(f, "WITHDRAWAL"),
            Self::Transfer => write!(f, "TRANSFER"),
            Self::Payment => write!(f, "PAYMENT"),
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerTransaction
// ---------------------------------------------------------------------------

/// One immutable entry in a wallet's audit trail.
///
/// The `amount` is signed from the primary wallet's perspective: deposits
/// are positive, withdrawals and payments negative. `balance` snapshots the
/// primary wallet's liquid balance immediately after the operation, so the
/// history can be audited without replaying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Unique record id.
    pub id: Uuid,

    /// The wallet this record is filed under.
    pub wallet: WalletKey,

    /// What kind of operation produced this record.
    pub tx_type: TransactionType,

    /// Signed delta applied to the primary wallet's balance.
    #[serde(with = "signed_krma_string")]
    pub amount: SignedKrma,

    /// The primary wallet's liquid balance after the operation.
    #[serde(with = "krma_string")]
    pub balance: Krma,

    /// The other wallet involved, for transfers. `None` for single-wallet
    /// operations.
    pub counterparty: Option<WalletKey>,

    /// Human-readable description, truncated to
    /// [`config::MAX_DESCRIPTION_LENGTH`].
    pub description: String,

    /// Structured metadata: asset ids, campaign ids, destroyed-wallet
    /// snapshots. Free-form JSON; amounts inside are decimal strings.
    pub metadata: serde_json::Value,

    /// When the record was created (UTC).
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Creates a new audit record with a fresh id and timestamp.
    ///
    /// Descriptions beyond the configured limit are truncated at a
    /// character boundary rather than rejected -- an oversized description
    /// must never be the reason a balance change fails.
    pub fn record(
        wallet: WalletKey,
        tx_type: TransactionType,
        amount: SignedKrma,
        balance: Krma,
        description: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet,
            tx_type,
            amount,
            balance,
            counterparty: None,
            description: truncate(description, config::MAX_DESCRIPTION_LENGTH),
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Attaches the second wallet of a transfer.
    pub fn with_counterparty(mut self, counterparty: WalletKey) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    /// Attaches structured metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Truncates at a character boundary at or below `max_bytes`.
fn truncate(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
