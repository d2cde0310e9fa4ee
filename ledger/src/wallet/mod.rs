//! # Wallet Module — Ownership & Balances
//!
//! The wallet is where KRMA lives. Every balance in the economy is held by
//! exactly one wallet, and every wallet is identified by its owner pair.
//!
//! ```text
//! owner.rs   — OwnerType and WalletKey: who holds a wallet
//! wallet.rs  — Wallet: liquid/crystalized compartments, checked arithmetic
//! ```
//!
//! Wallet structs are plain values; all durability and atomicity comes from
//! the store layer (see [`crate::store`]), which reads, mutates, and writes
//! them inside serializable transactions.

pub mod owner;
pub mod wallet;

pub use owner::{OwnerType, UnknownOwnerType, WalletKey};
pub use wallet::{BalanceKind, Wallet, WalletError, WalletMetadata};
