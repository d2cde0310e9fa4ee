// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # KRMA Ledger — Core Library
//!
//! The conserved-value engine underneath a campaign-management application:
//! a fixed supply of KRMA, tracked across owner wallets, spent into
//! permanent game assets, and audited down to the last token.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! token economy:
//!
//! - **krma** — The amount types. Integers only; strings at the boundary.
//! - **config** — Supply, reserves, and allocation constants. Every magic
//!   number lives here.
//! - **wallet** — Ownership and balances: who holds what.
//! - **ledger** — The write path: atomic deposit/withdraw/transfer with an
//!   append-only audit trail.
//! - **crystal** — Crystallization: liquid KRMA becomes named assets, and
//!   the admin destroy path takes whole wallets down.
//! - **identity** — Actor authorization and the owner records the destroy
//!   cascade must reach.
//! - **world** — Campaign settings with KRMA committed to them.
//! - **admin** — Bootstrap, allocation policy, correction, and the
//!   conservation audit.
//! - **store** — Persistent storage over sled. Serializable transactions,
//!   no in-process state.
//!
//! ## Design Philosophy
//!
//! 1. Conservation is not a feature, it's an invariant. Every operation
//!    either preserves Σ(liquid + crystalized) or records why it didn't.
//! 2. No balance change without an audit record, and no record without a
//!    balance change — enforced by running both in one store transaction.
//! 3. Precondition failures are typed, synchronous, and leave zero partial
//!    effects.
//! 4. If it touches money, it has tests. Plural.

pub mod admin;
pub mod config;
pub mod crystal;
pub mod identity;
pub mod krma;
pub mod ledger;
pub mod store;
pub mod wallet;
pub mod world;
