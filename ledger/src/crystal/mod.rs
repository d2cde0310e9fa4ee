//! # Crystal Module — Permanent Assets
//!
//! ```text
//! asset.rs  — CrystallizationType, requests, and the asset record
//! engine.rs — crystallize / dissolve / destroy over the store
//! ```
//!
//! Crystallization binds liquid KRMA into named campaign assets; the value
//! stays inside the owner's wallet (in the crystalized compartment) so the
//! global supply never moves. The destroy path is the one place the module
//! reaches beyond assets: it tears down a whole wallet and the identity
//! records behind it, returning the value to the reclaim reserve.

pub mod asset;
pub mod engine;

pub use asset::{
    CrystallizationRequest, CrystallizationType, CrystallizedAsset, UnknownCrystallizationType,
};
pub use engine::{CampaignAssets, CrystalError, CrystallizationEngine, DestroyedWallet};
