//! # Revenue Distribution Engine
//!
//! Splits resale revenue for a project among three fixed stakeholders
//! (NGO, community, government) by a basis-point table that always sums to
//! exactly 10 000, and keeps an audit trail of every payout.
//!
//! ## Arithmetic
//!
//! Each pass pays `floor(available * bps / 10_000)` to each stakeholder, in
//! the fixed order NGO → community → government. Truncation leaves at most
//! two units behind per pass. `distributed_amount` advances only by what was
//! actually paid, so the remainder stays available for the next pass. Dust
//! that never grows large enough to split is only reconciled by
//! [`RevenueDistributionEngine::emergency_withdraw`].
//!
//! ## Sequencing
//!
//! A distribution runs in two phases around the external payout:
//!
//! 1. [`begin_distribution`](RevenueDistributionEngine::begin_distribution)
//!    computes the records, reserves their ids, and marks the share in
//!    flight. The records travel in the returned ticket.
//! 2. The [`PayoutRail`] moves the money.
//! 3. [`finish_distribution`](RevenueDistributionEngine::finish_distribution)
//!    clears the flag and, only if the rail succeeded, commits the records,
//!    `distributed_amount` and the held balance together.
//!
//! A second distribution for a share that is still in flight is refused, so
//! a payout that calls back into the engine cannot pay the same revenue
//! twice. Readers during the payout see the state before the distribution,
//! never a pass that may still fail. Emergency withdrawals follow the same
//! shape. A rail that panics is reported as a failed payout.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bluecarbon_protocol::config::{
    BPS_DENOMINATOR, COMMUNITY_SHARE_LABEL, GOVERNMENT_SHARE_LABEL, MAX_SHARE_BPS,
    NGO_SHARE_LABEL,
};
use bluecarbon_protocol::Identity;

use crate::authorization::AuthorizationRegistry;
use crate::error::{EntityKind, LedgerError, LedgerResult};
use crate::events::{EventLog, LedgerEvent};
use crate::payout::{pay_guarded, Payout, PayoutError, PayoutRail};
use crate::project_registry::ProjectId;

pub type RevenueShareId = u64;
pub type DistributionId = u64;
pub type WithdrawalId = u64;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The three stakeholder categories, in payout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeholderCategory {
    Ngo,
    Community,
    Government,
}

impl StakeholderCategory {
    /// Fixed payout order. Rounding is deterministic because of it.
    pub const PAYOUT_ORDER: [StakeholderCategory; 3] = [
        StakeholderCategory::Ngo,
        StakeholderCategory::Community,
        StakeholderCategory::Government,
    ];

    /// The label recorded on distribution records.
    pub fn label(self) -> &'static str {
        match self {
            StakeholderCategory::Ngo => NGO_SHARE_LABEL,
            StakeholderCategory::Community => COMMUNITY_SHARE_LABEL,
            StakeholderCategory::Government => GOVERNMENT_SHARE_LABEL,
        }
    }
}

impl fmt::Display for StakeholderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Payout addresses for one revenue share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakeholders {
    pub ngo: Identity,
    pub community: Identity,
    pub government: Identity,
}

impl Stakeholders {
    pub fn recipient(&self, category: StakeholderCategory) -> &Identity {
        match category {
            StakeholderCategory::Ngo => &self.ngo,
            StakeholderCategory::Community => &self.community,
            StakeholderCategory::Government => &self.government,
        }
    }
}

/// A three-way basis-point split. Valid only when it sums to 10 000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSplit {
    pub ngo_bps: u16,
    pub community_bps: u16,
    pub government_bps: u16,
}

impl ShareSplit {
    pub fn new(ngo_bps: u16, community_bps: u16, government_bps: u16) -> Self {
        Self {
            ngo_bps,
            community_bps,
            government_bps,
        }
    }

    pub fn sum(&self) -> u32 {
        self.ngo_bps as u32 + self.community_bps as u32 + self.government_bps as u32
    }

    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidShares`] unless every component is at
    /// most 10 000 and the three sum to exactly 10 000.
    pub fn validate(&self) -> LedgerResult<()> {
        let within_bounds = [self.ngo_bps, self.community_bps, self.government_bps]
            .iter()
            .all(|bps| *bps <= MAX_SHARE_BPS);
        if !within_bounds || self.sum() != BPS_DENOMINATOR {
            return Err(LedgerError::InvalidShares { sum: self.sum() });
        }
        Ok(())
    }

    pub fn bps(&self, category: StakeholderCategory) -> u16 {
        match category {
            StakeholderCategory::Ngo => self.ngo_bps,
            StakeholderCategory::Community => self.community_bps,
            StakeholderCategory::Government => self.government_bps,
        }
    }

    /// Floor-rounded per-stakeholder amounts for `available`.
    pub fn apply(&self, available: u64) -> PendingDistribution {
        let part = |bps: u16| -> u64 {
            // bps <= 10_000, so the quotient never exceeds `available`.
            ((available as u128 * bps as u128) / BPS_DENOMINATOR as u128) as u64
        };
        PendingDistribution {
            ngo: part(self.ngo_bps),
            community: part(self.community_bps),
            government: part(self.government_bps),
        }
    }
}

/// A configured split of a project's proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueShare {
    pub id: RevenueShareId,
    pub project_id: ProjectId,
    pub stakeholders: Stakeholders,
    pub split: ShareSplit,
    /// Everything ever recorded through `add_revenue`. Never decreases.
    pub total_revenue: u64,
    /// Sum of this share's distribution records. Never decreases.
    pub distributed_amount: u64,
    /// Undistributed revenue written off by emergency withdrawals.
    pub swept_amount: u64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RevenueShare {
    /// Revenue recorded but neither distributed nor swept.
    pub fn available(&self) -> u64 {
        self.total_revenue
            .saturating_sub(self.distributed_amount)
            .saturating_sub(self.swept_amount)
    }
}

/// One payout to one stakeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub id: DistributionId,
    pub revenue_share_id: RevenueShareId,
    pub recipient: Identity,
    /// Always positive.
    pub amount: u64,
    pub timestamp: DateTime<Utc>,
    pub category: StakeholderCategory,
}

impl DistributionRecord {
    pub fn description(&self) -> &'static str {
        self.category.label()
    }
}

/// An administrative sweep of the engine's held balance to the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    pub id: WithdrawalId,
    pub recipient: Identity,
    pub amount: u64,
    pub timestamp: DateTime<Utc>,
}

/// Preview of what each stakeholder would receive right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDistribution {
    pub ngo: u64,
    pub community: u64,
    pub government: u64,
}

impl PendingDistribution {
    pub fn amount_for(&self, category: StakeholderCategory) -> u64 {
        match category {
            StakeholderCategory::Ngo => self.ngo,
            StakeholderCategory::Community => self.community,
            StakeholderCategory::Government => self.government,
        }
    }

    pub fn total(&self) -> u64 {
        // Each part is a floor of a fraction of the same u64; the sum cannot
        // exceed that u64.
        self.ngo + self.community + self.government
    }
}

/// A distribution prepared by `begin_distribution`, awaiting the payout
/// result. Its records are not visible in the engine until
/// `finish_distribution` commits them.
#[derive(Debug)]
#[must_use = "a distribution ticket must be passed to finish_distribution"]
pub struct DistributionTicket {
    share_id: RevenueShareId,
    payouts: Vec<Payout>,
    records: Vec<DistributionRecord>,
    paid: u64,
}

impl DistributionTicket {
    pub fn share_id(&self) -> RevenueShareId {
        self.share_id
    }

    pub fn payouts(&self) -> &[Payout] {
        &self.payouts
    }
}

/// Outcome of a committed distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionReceipt {
    pub share_id: RevenueShareId,
    pub records: Vec<DistributionRecord>,
    pub total_paid: u64,
    /// Still available on the share after this pass (rounding remainder).
    pub remaining: u64,
}

/// A sweep prepared by `begin_withdrawal`, awaiting the payout result.
#[derive(Debug)]
#[must_use = "a withdrawal ticket must be passed to finish_withdrawal"]
pub struct WithdrawalTicket {
    record: WithdrawalRecord,
    payout: Payout,
    /// Share id -> amount swept from that share.
    sweeps: Vec<(RevenueShareId, u64)>,
}

impl WithdrawalTicket {
    pub fn payout(&self) -> &Payout {
        &self.payout
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns revenue shares, distribution records, and withdrawal records.
#[derive(Debug, Clone)]
pub struct RevenueDistributionEngine {
    shares: BTreeMap<RevenueShareId, RevenueShare>,
    distributions: BTreeMap<DistributionId, DistributionRecord>,
    withdrawals: Vec<WithdrawalRecord>,
    /// Funds the engine holds: the sum of every share's `available()`.
    held_balance: u64,
    next_share_id: RevenueShareId,
    next_distribution_id: DistributionId,
    next_withdrawal_id: WithdrawalId,
    in_flight: BTreeSet<RevenueShareId>,
    withdrawal_in_flight: bool,
}

/// Persisted counters for [`RevenueDistributionEngine::from_records`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCounters {
    pub next_share_id: RevenueShareId,
    pub next_distribution_id: DistributionId,
    pub next_withdrawal_id: WithdrawalId,
}

impl RevenueDistributionEngine {
    pub fn new() -> Self {
        Self {
            shares: BTreeMap::new(),
            distributions: BTreeMap::new(),
            withdrawals: Vec::new(),
            held_balance: 0,
            next_share_id: 1,
            next_distribution_id: 1,
            next_withdrawal_id: 1,
            in_flight: BTreeSet::new(),
            withdrawal_in_flight: false,
        }
    }

    /// Rebuilds the engine from persisted records.
    ///
    /// The held balance is recomputed from the shares.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the shares' available amounts sum
    /// past `u64::MAX`.
    pub fn from_records(
        shares: impl IntoIterator<Item = RevenueShare>,
        distributions: impl IntoIterator<Item = DistributionRecord>,
        withdrawals: Vec<WithdrawalRecord>,
        counters: EngineCounters,
    ) -> LedgerResult<Self> {
        let mut engine = Self::new();
        engine.shares = shares.into_iter().map(|s| (s.id, s)).collect();
        engine.distributions = distributions.into_iter().map(|d| (d.id, d)).collect();
        engine.held_balance = engine
            .shares
            .values()
            .try_fold(0u64, |acc, s| acc.checked_add(s.available()))
            .ok_or(LedgerError::Overflow)?;

        let next_after = |highest: Option<u64>| highest.map_or(1, |h| h + 1);
        engine.next_share_id = counters
            .next_share_id
            .max(next_after(engine.shares.keys().next_back().copied()));
        engine.next_distribution_id = counters
            .next_distribution_id
            .max(next_after(engine.distributions.keys().next_back().copied()));
        engine.next_withdrawal_id = counters
            .next_withdrawal_id
            .max(next_after(withdrawals.iter().map(|w| w.id).max()));
        engine.withdrawals = withdrawals;
        Ok(engine)
    }

    /// Configures a new split for `project_id`. Owner-only.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotOwner`], [`LedgerError::InvalidShares`] unless the
    /// split sums to 10 000, [`LedgerError::InvalidInput`] for a null
    /// stakeholder.
    pub fn create_revenue_share(
        &mut self,
        auth: &AuthorizationRegistry,
        caller: &Identity,
        project_id: ProjectId,
        stakeholders: Stakeholders,
        split: ShareSplit,
        events: &mut EventLog,
    ) -> LedgerResult<RevenueShareId> {
        auth.ensure_owner(caller)?;
        split.validate()?;
        for category in StakeholderCategory::PAYOUT_ORDER {
            if stakeholders.recipient(category).is_null() {
                return Err(LedgerError::InvalidInput(format!(
                    "{} recipient must not be the null identity",
                    category
                )));
            }
        }

        let id = self.next_share_id;
        let now = Utc::now();
        self.shares.insert(
            id,
            RevenueShare {
                id,
                project_id,
                stakeholders,
                split,
                total_revenue: 0,
                distributed_amount: 0,
                swept_amount: 0,
                active: true,
                created_at: now,
                updated_at: now,
            },
        );
        self.next_share_id += 1;

        events.emit(LedgerEvent::RevenueShareCreated {
            share_id: id,
            project_id,
        });
        Ok(id)
    }

    /// Replaces the percentages of an active share. Totals are untouched.
    pub fn update_revenue_share(
        &mut self,
        auth: &AuthorizationRegistry,
        caller: &Identity,
        share_id: RevenueShareId,
        split: ShareSplit,
        events: &mut EventLog,
    ) -> LedgerResult<()> {
        auth.ensure_owner(caller)?;
        split.validate()?;
        let share = self.active_share_mut(share_id)?;
        share.split = split;
        share.updated_at = Utc::now();

        events.emit(LedgerEvent::RevenueShareUpdated {
            share_id,
            ngo_bps: split.ngo_bps,
            community_bps: split.community_bps,
            government_bps: split.government_bps,
        });
        Ok(())
    }

    /// Activates or deactivates a share. Owner-only; idempotent.
    ///
    /// An inactive share keeps its totals and records but accepts neither
    /// revenue nor distributions.
    pub fn set_share_active(
        &mut self,
        auth: &AuthorizationRegistry,
        caller: &Identity,
        share_id: RevenueShareId,
        active: bool,
        events: &mut EventLog,
    ) -> LedgerResult<()> {
        auth.ensure_owner(caller)?;
        let share = self.share_mut(share_id)?;
        share.active = active;
        share.updated_at = Utc::now();
        events.emit(LedgerEvent::RevenueShareStatusChanged { share_id, active });
        Ok(())
    }

    /// Records revenue from an external sale. Owner-only.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotOwner`], [`LedgerError::InvalidAmount`] for zero,
    /// [`LedgerError::NotFound`], [`LedgerError::Inactive`],
    /// [`LedgerError::Overflow`].
    pub fn add_revenue(
        &mut self,
        auth: &AuthorizationRegistry,
        caller: &Identity,
        share_id: RevenueShareId,
        amount: u64,
        events: &mut EventLog,
    ) -> LedgerResult<()> {
        auth.ensure_owner(caller)?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        let held = self
            .held_balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        let share = self.active_share_mut(share_id)?;
        share.total_revenue = share
            .total_revenue
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        share.updated_at = Utc::now();
        let total_revenue = share.total_revenue;
        self.held_balance = held;

        tracing::info!(share_id, amount, total_revenue, "revenue recorded");
        events.emit(LedgerEvent::RevenueAdded {
            share_id,
            amount,
            total_revenue,
        });
        Ok(())
    }

    /// Commits the bookkeeping for a distribution pass and returns the
    /// payouts the rail must execute. Owner-only.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotOwner`], [`LedgerError::NotFound`],
    /// [`LedgerError::Inactive`], [`LedgerError::ReentrantDistribution`],
    /// [`LedgerError::WithdrawalInFlight`], and
    /// [`LedgerError::NothingToDistribute`] when nothing is available or
    /// every stakeholder's share rounds down to zero.
    pub fn begin_distribution(
        &mut self,
        auth: &AuthorizationRegistry,
        caller: &Identity,
        share_id: RevenueShareId,
    ) -> LedgerResult<DistributionTicket> {
        auth.ensure_owner(caller)?;
        if self.withdrawal_in_flight {
            return Err(LedgerError::WithdrawalInFlight);
        }
        if self.in_flight.contains(&share_id) {
            tracing::warn!(share_id, "re-entrant distribution rejected");
            return Err(LedgerError::ReentrantDistribution { share_id });
        }

        let first_id = self.next_distribution_id;
        let share = self.active_share_mut(share_id)?;
        let available = share.available();
        if available == 0 {
            return Err(LedgerError::NothingToDistribute { share_id });
        }
        let pending = share.split.apply(available);
        if pending.total() == 0 {
            return Err(LedgerError::NothingToDistribute { share_id });
        }

        let now = Utc::now();
        let mut records = Vec::with_capacity(3);
        for category in StakeholderCategory::PAYOUT_ORDER {
            let amount = pending.amount_for(category);
            if amount == 0 {
                continue;
            }
            records.push(DistributionRecord {
                id: first_id + records.len() as u64,
                revenue_share_id: share_id,
                recipient: share.stakeholders.recipient(category).clone(),
                amount,
                timestamp: now,
                category,
            });
        }

        let paid = pending.total();
        self.next_distribution_id += records.len() as u64;
        self.in_flight.insert(share_id);

        let payouts = records
            .iter()
            .map(|r| Payout {
                recipient: r.recipient.clone(),
                amount: r.amount,
                category: Some(r.category),
            })
            .collect();

        Ok(DistributionTicket {
            share_id,
            payouts,
            records,
            paid,
        })
    }

    /// Finalizes a distribution once the rail has reported back.
    ///
    /// On success the records, `distributed_amount` and the held balance
    /// are committed together. On rail failure nothing is committed, the
    /// in-flight marker is cleared and [`LedgerError::PayoutFailed`] is
    /// returned.
    pub fn finish_distribution(
        &mut self,
        ticket: DistributionTicket,
        outcome: Result<(), PayoutError>,
        events: &mut EventLog,
    ) -> LedgerResult<DistributionReceipt> {
        let share_id = ticket.share_id;
        self.in_flight.remove(&share_id);

        if let Err(err) = outcome {
            tracing::warn!(share_id, error = %err, "payout failed, distribution discarded");
            return Err(LedgerError::PayoutFailed {
                reason: err.to_string(),
            });
        }

        let share = self.shares.get_mut(&share_id).ok_or(LedgerError::NotFound {
            kind: EntityKind::RevenueShare,
            id: share_id,
        })?;
        // Nothing can shrink the share's available revenue while it is in
        // flight, so `paid` still fits.
        share.distributed_amount += ticket.paid;
        share.updated_at = Utc::now();
        self.held_balance -= ticket.paid;

        let records = ticket.records;
        for record in &records {
            self.distributions.insert(record.id, record.clone());
        }
        for record in &records {
            events.emit(LedgerEvent::RevenueDistributed {
                share_id,
                distribution_id: record.id,
                recipient: record.recipient.clone(),
                category: record.category,
                amount: record.amount,
            });
        }

        let remaining = self.get_revenue_share(share_id)?.available();
        tracing::info!(share_id, paid = ticket.paid, remaining, "revenue distributed");
        Ok(DistributionReceipt {
            share_id,
            records,
            total_paid: ticket.paid,
            remaining,
        })
    }

    /// Pays out everything currently available on a share. Owner-only.
    ///
    /// The share is guarded while `rail` runs and the bookkeeping commits
    /// only if it succeeds; see the module docs.
    pub fn distribute_revenue(
        &mut self,
        auth: &AuthorizationRegistry,
        caller: &Identity,
        share_id: RevenueShareId,
        rail: &mut dyn PayoutRail,
        events: &mut EventLog,
    ) -> LedgerResult<DistributionReceipt> {
        let ticket = self.begin_distribution(auth, caller, share_id)?;
        let outcome = pay_guarded(rail, ticket.payouts());
        self.finish_distribution(ticket, outcome, events)
    }

    /// What [`distribute_revenue`](Self::distribute_revenue) would pay right now.
    pub fn get_pending_distribution(
        &self,
        share_id: RevenueShareId,
    ) -> LedgerResult<PendingDistribution> {
        let share = self.get_revenue_share(share_id)?;
        let pending = share.split.apply(share.available());
        tracing::debug!(share_id, ?pending, "pending distribution preview");
        Ok(pending)
    }

    /// Commits an emergency sweep of the held balance to the owner.
    ///
    /// Returns `None` when there is nothing to sweep.
    pub fn begin_withdrawal(
        &mut self,
        auth: &AuthorizationRegistry,
        caller: &Identity,
    ) -> LedgerResult<Option<WithdrawalTicket>> {
        auth.ensure_owner(caller)?;
        if self.withdrawal_in_flight {
            return Err(LedgerError::WithdrawalInFlight);
        }
        if let Some(share_id) = self.in_flight.iter().next().copied() {
            return Err(LedgerError::ReentrantDistribution { share_id });
        }
        if self.held_balance == 0 {
            return Ok(None);
        }

        let amount = self.held_balance;
        let sweeps = self
            .shares
            .values()
            .filter(|share| share.available() > 0)
            .map(|share| (share.id, share.available()))
            .collect();

        let record = WithdrawalRecord {
            id: self.next_withdrawal_id,
            recipient: caller.clone(),
            amount,
            timestamp: Utc::now(),
        };
        self.next_withdrawal_id += 1;
        self.withdrawal_in_flight = true;

        Ok(Some(WithdrawalTicket {
            record,
            payout: Payout {
                recipient: caller.clone(),
                amount,
                category: None,
            },
            sweeps,
        }))
    }

    /// Finalizes an emergency sweep. Nothing is committed if the rail failed.
    pub fn finish_withdrawal(
        &mut self,
        ticket: WithdrawalTicket,
        outcome: Result<(), PayoutError>,
        events: &mut EventLog,
    ) -> LedgerResult<u64> {
        self.withdrawal_in_flight = false;
        let amount = ticket.payout.amount;

        if let Err(err) = outcome {
            tracing::warn!(error = %err, "emergency withdrawal failed, nothing swept");
            return Err(LedgerError::PayoutFailed {
                reason: err.to_string(),
            });
        }

        // Revenue may have arrived during the payout; only what was swept
        // leaves the shares.
        for (share_id, swept) in &ticket.sweeps {
            if let Some(share) = self.shares.get_mut(share_id) {
                share.swept_amount += swept;
            }
        }
        self.held_balance -= amount;
        let withdrawal_id = ticket.record.id;
        self.withdrawals.push(ticket.record);

        tracing::warn!(amount, to = %ticket.payout.recipient, "emergency withdrawal executed");
        events.emit(LedgerEvent::EmergencyWithdrawal {
            withdrawal_id,
            to: ticket.payout.recipient,
            amount,
        });
        Ok(amount)
    }

    /// Sweeps every undistributed unit, rounding dust included, to the
    /// owner. Owner-only. Returns the amount swept (0 if nothing was held).
    pub fn emergency_withdraw(
        &mut self,
        auth: &AuthorizationRegistry,
        caller: &Identity,
        rail: &mut dyn PayoutRail,
        events: &mut EventLog,
    ) -> LedgerResult<u64> {
        match self.begin_withdrawal(auth, caller)? {
            Some(ticket) => {
                let outcome = pay_guarded(rail, std::slice::from_ref(ticket.payout()));
                self.finish_withdrawal(ticket, outcome, events)
            }
            None => Ok(0),
        }
    }

    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if no share has this id.
    pub fn get_revenue_share(&self, share_id: RevenueShareId) -> LedgerResult<&RevenueShare> {
        self.shares.get(&share_id).ok_or(LedgerError::NotFound {
            kind: EntityKind::RevenueShare,
            id: share_id,
        })
    }

    pub fn shares(&self) -> impl Iterator<Item = &RevenueShare> {
        self.shares.values()
    }

    /// Distribution records of one share, oldest first.
    pub fn distributions_for(&self, share_id: RevenueShareId) -> Vec<&DistributionRecord> {
        self.distributions
            .values()
            .filter(|d| d.revenue_share_id == share_id)
            .collect()
    }

    pub fn distributions(&self) -> impl Iterator<Item = &DistributionRecord> {
        self.distributions.values()
    }

    pub fn withdrawals(&self) -> &[WithdrawalRecord] {
        &self.withdrawals
    }

    pub fn held_balance(&self) -> u64 {
        self.held_balance
    }

    pub fn counters(&self) -> EngineCounters {
        EngineCounters {
            next_share_id: self.next_share_id,
            next_distribution_id: self.next_distribution_id,
            next_withdrawal_id: self.next_withdrawal_id,
        }
    }

    fn share_mut(&mut self, share_id: RevenueShareId) -> LedgerResult<&mut RevenueShare> {
        self.shares.get_mut(&share_id).ok_or(LedgerError::NotFound {
            kind: EntityKind::RevenueShare,
            id: share_id,
        })
    }

    fn active_share_mut(&mut self, share_id: RevenueShareId) -> LedgerResult<&mut RevenueShare> {
        let share = self.share_mut(share_id)?;
        if !share.active {
            return Err(LedgerError::Inactive { share_id });
        }
        Ok(share)
    }
}

impl Default for RevenueDistributionEngine {
    fn default() -> Self {
        Self::new()
    }
}
