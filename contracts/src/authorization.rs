//! # Authorization Registry
//!
//! The leaf of the accounting core. Knows exactly two things: who owns the
//! registry, and which identities may act as verifiers. Every other
//! component asks it before doing anything privileged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bluecarbon_protocol::Identity;

use crate::error::{LedgerError, LedgerResult};
use crate::events::{EventLog, LedgerEvent};

/// Owner and verifier roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRegistry {
    owner: Identity,
    /// Identity -> "is authorized". Revoked verifiers stay in the map as `false`.
    verifiers: BTreeMap<Identity, bool>,
}

impl AuthorizationRegistry {
    /// Creates a registry owned by `owner` with no verifiers.
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            verifiers: BTreeMap::new(),
        }
    }

    /// Rebuilds a registry from persisted parts.
    pub fn from_parts(owner: Identity, verifiers: BTreeMap<Identity, bool>) -> Self {
        Self { owner, verifiers }
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    /// Fails with [`LedgerError::NotOwner`] unless `caller` owns the registry.
    pub fn ensure_owner(&self, caller: &Identity) -> LedgerResult<()> {
        if caller != &self.owner {
            tracing::warn!(%caller, "rejected owner-only call");
            return Err(LedgerError::NotOwner {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    /// Grants or revokes verifier status. Owner-only; idempotent.
    ///
    /// The status-change notification is emitted on every successful call,
    /// even when the status did not actually change.
    pub fn set_verifier_status(
        &mut self,
        caller: &Identity,
        verifier: &Identity,
        authorized: bool,
        events: &mut EventLog,
    ) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        if verifier.is_null() {
            return Err(LedgerError::InvalidInput(
                "verifier identity must not be null".into(),
            ));
        }

        self.verifiers.insert(verifier.clone(), authorized);
        events.emit(LedgerEvent::VerifierStatusChanged {
            verifier: verifier.clone(),
            authorized,
        });
        Ok(())
    }

    /// Pure lookup. Unknown identities are simply not authorized.
    pub fn is_authorized(&self, identity: &Identity) -> bool {
        self.verifiers.get(identity).copied().unwrap_or(false)
    }

    /// Currently authorized verifiers, sorted.
    pub fn authorized_verifiers(&self) -> Vec<Identity> {
        self.verifiers
            .iter()
            .filter(|(_, authorized)| **authorized)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Full roster including revoked entries, for persistence.
    pub fn verifier_entries(&self) -> &BTreeMap<Identity, bool> {
        &self.verifiers
    }

    /// Hands ownership to `new_owner`. Owner-only.
    pub fn transfer_ownership(
        &mut self,
        caller: &Identity,
        new_owner: Identity,
        events: &mut EventLog,
    ) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        if new_owner.is_null() {
            return Err(LedgerError::InvalidInput(
                "new owner must not be the null identity".into(),
            ));
        }

        let previous = std::mem::replace(&mut self.owner, new_owner.clone());
        events.emit(LedgerEvent::OwnershipTransferred {
            previous,
            new_owner,
        });
        Ok(())
    }
}
