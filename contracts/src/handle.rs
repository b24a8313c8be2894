//! # Shared Ledger Handle
//!
//! A cheaply cloneable, thread-safe handle to one [`CarbonLedger`]. Every
//! call takes the ledger's mutex for its whole duration, so each operation
//! is a single serialized transaction.
//!
//! Payouts are the exception. [`LedgerHandle::distribute_revenue`] and
//! [`LedgerHandle::emergency_withdraw`] mark the share in flight under the
//! lock, release it while the [`PayoutRail`] runs, and take it again to
//! commit. A rail that calls back into the handle therefore sees the state
//! from before the payout and an in-flight marker instead of a deadlock, and
//! any attempt to pay the same share again is refused. A panicking rail
//! still releases the marker.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use bluecarbon_protocol::Identity;

use crate::error::LedgerResult;
use crate::events::EventEnvelope;
use crate::ledger::{CarbonLedger, LedgerSnapshot};
use crate::payout::{pay_guarded, PayoutRail};
use crate::revenue_distribution::{DistributionReceipt, RevenueShareId};

#[derive(Debug, Clone)]
pub struct LedgerHandle {
    inner: Arc<Mutex<CarbonLedger>>,
}

impl LedgerHandle {
    pub fn new(ledger: CarbonLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    /// Runs `f` with exclusive access to the ledger.
    pub fn with<R>(&self, f: impl FnOnce(&mut CarbonLedger) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Direct access to the guard. Do not hold it across a payout.
    pub fn lock(&self) -> MutexGuard<'_, CarbonLedger> {
        self.inner.lock()
    }

    /// Distributes a share's available revenue without holding the lock
    /// while `rail` pays.
    pub fn distribute_revenue(
        &self,
        caller: &Identity,
        share_id: RevenueShareId,
        rail: &mut dyn PayoutRail,
    ) -> LedgerResult<DistributionReceipt> {
        let ticket = self.inner.lock().begin_distribution(caller, share_id)?;
        tracing::debug!(share_id, payouts = ticket.payouts().len(), "paying out with ledger unlocked");
        let outcome = pay_guarded(rail, ticket.payouts());
        self.inner.lock().finish_distribution(ticket, outcome)
    }

    /// Emergency sweep without holding the lock while `rail` pays.
    pub fn emergency_withdraw(
        &self,
        caller: &Identity,
        rail: &mut dyn PayoutRail,
    ) -> LedgerResult<u64> {
        let ticket = match self.inner.lock().begin_withdrawal(caller)? {
            Some(ticket) => ticket,
            None => return Ok(0),
        };
        let outcome = pay_guarded(rail, std::slice::from_ref(ticket.payout()));
        self.inner.lock().finish_withdrawal(ticket, outcome)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn drain_events(&self) -> Vec<EventEnvelope> {
        self.inner.lock().drain_events()
    }
}

impl From<CarbonLedger> for LedgerHandle {
    fn from(ledger: CarbonLedger) -> Self {
        Self::new(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::payout::{InMemoryRail, Payout, PayoutError};
    use crate::revenue_distribution::{ShareSplit, Stakeholders};

    /// Pays through an inner rail, but first tries to distribute again.
    struct ReentrantRail {
        handle: LedgerHandle,
        share_id: RevenueShareId,
        inner: InMemoryRail,
        reentry: Option<LedgerResult<DistributionReceipt>>,
    }

    impl PayoutRail for ReentrantRail {
        fn pay(&mut self, payouts: &[Payout]) -> Result<(), PayoutError> {
            if self.reentry.is_none() {
                let mut nested = InMemoryRail::new();
                self.reentry = Some(self.handle.distribute_revenue(
                    &"owner".into(),
                    self.share_id,
                    &mut nested,
                ));
            }
            self.inner.pay(payouts)
        }
    }

    fn funded_share() -> (LedgerHandle, RevenueShareId) {
        let handle = LedgerHandle::new(CarbonLedger::new("owner".into()));
        let share_id = handle.with(|ledger| {
            let id = ledger
                .create_revenue_share(
                    &"owner".into(),
                    1,
                    Stakeholders {
                        ngo: "ngo".into(),
                        community: "community".into(),
                        government: "gov".into(),
                    },
                    ShareSplit::new(4_000, 4_000, 2_000),
                )
                .unwrap();
            ledger.add_revenue(&"owner".into(), id, 1_000).unwrap();
            id
        });
        (handle, share_id)
    }

    #[test]
    fn reentrant_payout_is_rejected_not_deadlocked() {
        let (handle, share_id) = funded_share();
        let mut rail = ReentrantRail {
            handle: handle.clone(),
            share_id,
            inner: InMemoryRail::new(),
            reentry: None,
        };

        let receipt = handle
            .distribute_revenue(&"owner".into(), share_id, &mut rail)
            .unwrap();
        assert_eq!(receipt.total_paid, 1_000);
        assert_eq!(
            rail.reentry,
            Some(Err(LedgerError::ReentrantDistribution { share_id }))
        );
        assert_eq!(rail.inner.received(&"ngo".into()), 400);

        let distributed = handle.with(|l| l.get_revenue_share(share_id).unwrap().distributed_amount);
        assert_eq!(distributed, 1_000);
    }

    #[test]
    fn handle_withdraw_sweeps_to_owner() {
        let (handle, _) = funded_share();
        let mut rail = InMemoryRail::new();
        assert_eq!(handle.emergency_withdraw(&"owner".into(), &mut rail).unwrap(), 1_000);
        assert_eq!(rail.received(&"owner".into()), 1_000);
        assert_eq!(handle.emergency_withdraw(&"owner".into(), &mut rail).unwrap(), 0);
    }

    #[test]
    fn clones_share_state_across_threads() {
        let (handle, share_id) = funded_share();
        let worker = handle.clone();
        std::thread::spawn(move || {
            worker.with(|l| l.add_revenue(&"owner".into(), share_id, 500).unwrap());
        })
        .join()
        .unwrap();
        let total = handle.with(|l| l.get_revenue_share(share_id).unwrap().total_revenue);
        assert_eq!(total, 1_500);
    }
}
