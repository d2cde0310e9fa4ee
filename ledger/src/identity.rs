//! # Identity Registry
//!
//! The ledger does no authentication. An upstream collaborator verifies
//! the session and hands every call an [`Actor`]; the ledger only answers
//! the authorization questions it owns: "does this wallet belong to this
//! actor" and "is this actor an admin".
//!
//! The registry itself holds the minimal owner-identity records the
//! economy needs to exist at all — a profile row per owner plus the
//! session and credential lists that the destroy cascade must take down
//! with the wallet. Everything richer (emails, invitations, OAuth blobs)
//! belongs to the application layer, not here.
//!
//! All three record families live in one `identity` tree under prefixed
//! keys, so the cascade can remove an owner's entire identity with three
//! known-key deletes inside the same store transaction that removes the
//! wallet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::db::{self, DbResult, LedgerDb};
use crate::wallet::{OwnerType, WalletKey};

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// An authenticated caller, as supplied by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The caller's owner reference.
    pub owner_ref: String,
    /// Whether the caller holds administrative authority.
    pub admin: bool,
}

impl Actor {
    /// A regular participant.
    pub fn user(owner_ref: impl Into<String>) -> Self {
        Self {
            owner_ref: owner_ref.into(),
            admin: false,
        }
    }

    /// An administrator.
    pub fn admin(owner_ref: impl Into<String>) -> Self {
        Self {
            owner_ref: owner_ref.into(),
            admin: true,
        }
    }

    /// Does this actor own the given wallet? Admins are not implicitly
    /// owners — admin paths check [`Self::admin`] explicitly instead.
    pub fn owns(&self, wallet: &WalletKey) -> bool {
        self.owner_ref == wallet.owner_ref
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Per-owner profile row, created at signup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerProfile {
    /// Owner identifier.
    pub owner_ref: String,
    /// What kind of wallet this owner holds.
    pub owner_type: OwnerType,
    /// Month index of signup; the allocation schedule is evaluated
    /// relative to this.
    pub signup_month: u32,
    /// Whether the baseline allocation schedule is still paying out.
    pub baseline_active: bool,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
}

/// One login session for an owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session id.
    pub id: Uuid,
    /// When the session was opened.
    pub created_at: DateTime<Utc>,
    /// When it stops being honored.
    pub expires_at: DateTime<Utc>,
}

/// One stored credential for an owner (password hash handle, OAuth link).
/// The ledger never inspects `kind` — it only deletes these on destroy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Credential id.
    pub id: Uuid,
    /// Free-form credential kind tag.
    pub kind: String,
    /// When the credential was registered.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

pub(crate) fn profile_key(owner_ref: &str) -> Vec<u8> {
    format!("profile:{owner_ref}").into_bytes()
}

pub(crate) fn sessions_key(owner_ref: &str) -> Vec<u8> {
    format!("sessions:{owner_ref}").into_bytes()
}

pub(crate) fn credentials_key(owner_ref: &str) -> Vec<u8> {
    format!("credentials:{owner_ref}").into_bytes()
}

// ---------------------------------------------------------------------------
// IdentityRegistry
// ---------------------------------------------------------------------------

/// Typed access to the `identity` tree.
#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    db: LedgerDb,
}

impl IdentityRegistry {
    pub fn new(db: &LedgerDb) -> Self {
        Self { db: db.clone() }
    }

    /// Reads an owner's profile, if one exists.
    pub fn profile(&self, owner_ref: &str) -> DbResult<Option<OwnerProfile>> {
        match self.db.identity_tree().get(profile_key(owner_ref))? {
            Some(bytes) => Ok(Some(db::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes an owner's profile row.
    pub fn put_profile(&self, profile: &OwnerProfile) -> DbResult<()> {
        self.db
            .identity_tree()
            .insert(profile_key(&profile.owner_ref), db::encode(profile)?)?;
        Ok(())
    }

    /// An owner's open sessions. Empty if none were ever recorded.
    pub fn sessions(&self, owner_ref: &str) -> DbResult<Vec<SessionRecord>> {
        match self.db.identity_tree().get(sessions_key(owner_ref))? {
            Some(bytes) => db::decode(&bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Appends a session to an owner's session list.
    pub fn add_session(&self, owner_ref: &str, session: SessionRecord) -> DbResult<()> {
        let mut sessions = self.sessions(owner_ref)?;
        sessions.push(session);
        self.db
            .identity_tree()
            .insert(sessions_key(owner_ref), db::encode(&sessions)?)?;
        Ok(())
    }

    /// An owner's registered credentials.
    pub fn credentials(&self, owner_ref: &str) -> DbResult<Vec<CredentialRecord>> {
        match self.db.identity_tree().get(credentials_key(owner_ref))? {
            Some(bytes) => db::decode(&bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Appends a credential to an owner's credential list.
    pub fn add_credential(&self, owner_ref: &str, credential: CredentialRecord) -> DbResult<()> {
        let mut credentials = self.credentials(owner_ref)?;
        credentials.push(credential);
        self.db
            .identity_tree()
            .insert(credentials_key(owner_ref), db::encode(&credentials)?)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
