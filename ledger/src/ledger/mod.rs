//! # Ledger Module — Balance Mutations & Audit Trail
//!
//! ```text
//! transaction.rs — TransactionType and the append-only LedgerTransaction
//! service.rs     — LedgerService: atomic deposit / withdraw / transfer
//! ```
//!
//! The rule that makes everything else auditable: no balance changes
//! without a record, no record without a balance change. Both halves of
//! that rule are enforced by running them in one store transaction.

pub mod service;
pub mod transaction;

pub use service::{LedgerError, LedgerService};
pub use transaction::{LedgerTransaction, TransactionType};
