//! # Store Module — Persistence
//!
//! Everything durable goes through [`LedgerDb`]. The service modules build
//! their compound operations as serializable multi-tree transactions on
//! the handles this module exposes; nothing above this layer holds mutable
//! ledger state in memory between requests.

pub mod db;

pub use db::{DbError, DbResult, LedgerDb};
