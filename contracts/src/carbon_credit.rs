//! # Carbon Credit Ledger
//!
//! The fungible balance store for Blue Carbon Credits. Supply only grows
//! through verification: [`CreditLedger::mint`] is crate-private and the
//! single caller is the verification workflow's approval step. Holders move
//! credits between themselves with [`CreditLedger::transfer`].
//!
//! ## Security Model
//!
//! - **Mint gating**: no public mint. A credit exists only because a
//!   project was verified.
//! - **Pause switch**: the registry owner can halt mint and transfer.
//!   Reads keep working so balances stay auditable during an incident.
//! - **Supply tracking**: total supply and per-holder balances move
//!   together. Overflow is checked on every operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bluecarbon_protocol::Identity;

use crate::authorization::AuthorizationRegistry;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{EventLog, LedgerEvent};

/// Per-holder balances plus total supply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreditLedger {
    balances: BTreeMap<Identity, u64>,
    total_supply: u64,
    paused: bool,
}

impl CreditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the ledger from persisted balances.
    ///
    /// Total supply is recomputed from the balances rather than trusted.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the balances sum past `u64::MAX`.
    pub fn from_balances(balances: BTreeMap<Identity, u64>, paused: bool) -> LedgerResult<Self> {
        let total_supply = balances
            .values()
            .try_fold(0u64, |acc, b| acc.checked_add(*b))
            .ok_or(LedgerError::Overflow)?;
        Ok(Self {
            balances,
            total_supply,
            paused,
        })
    }

    /// Checks every failure mode of [`mint`](Self::mint) without mutating.
    ///
    /// The verification workflow calls this before touching any state so
    /// that a doomed mint never leaves a half-verified project behind.
    pub(crate) fn ensure_mintable(&self, to: &Identity, amount: u64) -> LedgerResult<()> {
        if self.paused {
            return Err(LedgerError::Paused);
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        self.total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Issues `amount` new credits to `to`.
    pub(crate) fn mint(
        &mut self,
        to: &Identity,
        amount: u64,
        events: &mut EventLog,
    ) -> LedgerResult<()> {
        self.ensure_mintable(to, amount)?;

        self.total_supply += amount;
        *self.balances.entry(to.clone()).or_insert(0) += amount;

        tracing::info!(%to, amount, total_supply = self.total_supply, "credits minted");
        events.emit(LedgerEvent::CreditsMinted {
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    /// Moves `amount` credits from `from` (the calling holder) to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Paused`] while paused,
    /// [`LedgerError::InvalidAmount`] for zero,
    /// [`LedgerError::InvalidInput`] for a null recipient, and
    /// [`LedgerError::InsufficientBalance`] if `from` holds less than `amount`.
    pub fn transfer(
        &mut self,
        from: &Identity,
        to: &Identity,
        amount: u64,
        events: &mut EventLog,
    ) -> LedgerResult<()> {
        if self.paused {
            return Err(LedgerError::Paused);
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        if to.is_null() {
            return Err(LedgerError::InvalidInput(
                "transfer recipient must not be the null identity".into(),
            ));
        }

        let balance = self.balance_of(from);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                balance,
                requested: amount,
            });
        }

        if from != to {
            let credited = self
                .balance_of(to)
                .checked_add(amount)
                .ok_or(LedgerError::Overflow)?;

            let remaining = balance - amount;
            if remaining == 0 {
                self.balances.remove(from);
            } else {
                self.balances.insert(from.clone(), remaining);
            }
            self.balances.insert(to.clone(), credited);
        }

        events.emit(LedgerEvent::CreditsTransferred {
            from: from.clone(),
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    /// Balance of `holder`, or 0.
    pub fn balance_of(&self, holder: &Identity) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Non-zero balances, sorted by holder.
    pub fn holders(&self) -> &BTreeMap<Identity, u64> {
        &self.balances
    }

    /// Suspends mint and transfer. Owner-only.
    pub fn pause(
        &mut self,
        auth: &AuthorizationRegistry,
        caller: &Identity,
        events: &mut EventLog,
    ) -> LedgerResult<()> {
        auth.ensure_owner(caller)?;
        self.paused = true;
        events.emit(LedgerEvent::LedgerPaused { by: caller.clone() });
        Ok(())
    }

    /// Resumes mint and transfer. Owner-only.
    pub fn unpause(
        &mut self,
        auth: &AuthorizationRegistry,
        caller: &Identity,
        events: &mut EventLog,
    ) -> LedgerResult<()> {
        auth.ensure_owner(caller)?;
        self.paused = false;
        events.emit(LedgerEvent::LedgerUnpaused { by: caller.clone() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(holder: &str, amount: u64) -> (CreditLedger, EventLog) {
        let mut ledger = CreditLedger::new();
        let mut events = EventLog::new();
        ledger.mint(&holder.into(), amount, &mut events).unwrap();
        (ledger, events)
    }

    #[test]
    fn mint_increases_supply_and_balance() {
        let (ledger, events) = funded("alice", 1_000_000);
        assert_eq!(ledger.total_supply(), 1_000_000);
        assert_eq!(ledger.balance_of(&"alice".into()), 1_000_000);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn mint_zero_rejected() {
        let mut ledger = CreditLedger::new();
        let result = ledger.mint(&"alice".into(), 0, &mut EventLog::new());
        assert!(matches!(result, Err(LedgerError::InvalidAmount { amount: 0 })));
    }

    #[test]
    fn mint_overflow_rejected() {
        let (mut ledger, mut events) = funded("alice", u64::MAX);
        let result = ledger.mint(&"bob".into(), 1, &mut events);
        assert!(matches!(result, Err(LedgerError::Overflow)));
        assert_eq!(ledger.balance_of(&"bob".into()), 0);
    }

    #[test]
    fn transfer_moves_balance() {
        let (mut ledger, mut events) = funded("alice", 100);
        ledger
            .transfer(&"alice".into(), &"bob".into(), 40, &mut events)
            .unwrap();
        assert_eq!(ledger.balance_of(&"alice".into()), 60);
        assert_eq!(ledger.balance_of(&"bob".into()), 40);
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn transfer_more_than_balance_rejected() {
        let (mut ledger, mut events) = funded("alice", 100);
        let result = ledger.transfer(&"alice".into(), &"bob".into(), 200, &mut events);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance {
                balance: 100,
                requested: 200
            })
        ));
        assert_eq!(ledger.balance_of(&"alice".into()), 100);
    }

    #[test]
    fn full_transfer_drops_empty_holder() {
        let (mut ledger, mut events) = funded("alice", 100);
        ledger
            .transfer(&"alice".into(), &"bob".into(), 100, &mut events)
            .unwrap();
        assert!(!ledger.holders().contains_key(&Identity::new("alice")));
    }

    #[test]
    fn self_transfer_is_a_no_op() {
        let (mut ledger, mut events) = funded("alice", 100);
        ledger
            .transfer(&"alice".into(), &"alice".into(), 30, &mut events)
            .unwrap();
        assert_eq!(ledger.balance_of(&"alice".into()), 100);
    }

    #[test]
    fn transfer_to_null_rejected() {
        let (mut ledger, mut events) = funded("alice", 100);
        let result = ledger.transfer(&"alice".into(), &Identity::null(), 10, &mut events);
        assert!(matches!(result, Err(LedgerError::InvalidInput(_))));
    }

    #[test]
    fn pause_blocks_mint_and_transfer_but_not_reads() {
        let auth = AuthorizationRegistry::new("owner".into());
        let (mut ledger, mut events) = funded("alice", 100);

        ledger.pause(&auth, &"owner".into(), &mut events).unwrap();
        assert!(matches!(
            ledger.transfer(&"alice".into(), &"bob".into(), 1, &mut events),
            Err(LedgerError::Paused)
        ));
        assert!(matches!(
            ledger.mint(&"alice".into(), 1, &mut events),
            Err(LedgerError::Paused)
        ));
        assert_eq!(ledger.balance_of(&"alice".into()), 100);
        assert_eq!(ledger.total_supply(), 100);

        ledger.unpause(&auth, &"owner".into(), &mut events).unwrap();
        ledger
            .transfer(&"alice".into(), &"bob".into(), 1, &mut events)
            .unwrap();
    }

    #[test]
    fn pause_is_owner_only() {
        let auth = AuthorizationRegistry::new("owner".into());
        let mut ledger = CreditLedger::new();
        let result = ledger.pause(&auth, &"alice".into(), &mut EventLog::new());
        assert!(matches!(result, Err(LedgerError::NotOwner { .. })));
        assert!(!ledger.is_paused());
    }

    #[test]
    fn from_balances_recomputes_supply() {
        let mut balances = BTreeMap::new();
        balances.insert(Identity::new("a"), 5);
        balances.insert(Identity::new("b"), 7);
        let ledger = CreditLedger::from_balances(balances, true).unwrap();
        assert_eq!(ledger.total_supply(), 12);
        assert!(ledger.is_paused());
    }
}
