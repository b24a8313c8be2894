//! # Ledger-Only Payout Rail
//!
//! The operator binary does not move money. It records the payouts the
//! registry has committed to and leaves settlement to whoever reads the log
//! (or the `--log-format json` stream). Every batch succeeds.
//!
//! Accepting a batch only queues it. The "payout instructed" lines are
//! written by [`QueuedRail::settle`], which the binary calls after the new
//! ledger state is safely on disk. A failed commit therefore announces
//! nothing, and the next run cannot pay the same revenue twice.

use bluecarbon_contracts::{Payout, PayoutError, PayoutRail};

/// Rail that holds accepted payouts until the ledger state is committed.
#[derive(Debug, Default)]
pub struct QueuedRail {
    queued: Vec<Payout>,
}

impl QueuedRail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payouts accepted but not yet announced, in order.
    pub fn queued(&self) -> &[Payout] {
        &self.queued
    }

    /// Announces every queued payout through `tracing` and empties the queue.
    /// Returns how many were announced.
    pub fn settle(&mut self) -> usize {
        for payout in &self.queued {
            let category = payout
                .category
                .map(|c| c.label())
                .unwrap_or("Emergency Withdrawal");
            tracing::info!(
                recipient = %payout.recipient,
                amount = payout.amount,
                category,
                "payout instructed"
            );
        }
        let settled = self.queued.len();
        self.queued.clear();
        settled
    }

    /// Drops queued payouts without announcing them.
    pub fn discard(&mut self) -> usize {
        let dropped = self.queued.len();
        if dropped > 0 {
            tracing::warn!(payouts = dropped, "ledger not committed, queued payouts discarded");
        }
        self.queued.clear();
        dropped
    }
}

impl PayoutRail for QueuedRail {
    fn pay(&mut self, payouts: &[Payout]) -> Result<(), PayoutError> {
        tracing::debug!(payouts = payouts.len(), "payout batch queued");
        self.queued.extend_from_slice(payouts);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluecarbon_contracts::StakeholderCategory;

    fn batch() -> Vec<Payout> {
        vec![
            Payout {
                recipient: "ngo".into(),
                amount: 400,
                category: Some(StakeholderCategory::Ngo),
            },
            Payout {
                recipient: "owner".into(),
                amount: 2,
                category: None,
            },
        ]
    }

    #[test]
    fn pay_only_queues() {
        let mut rail = QueuedRail::new();
        rail.pay(&batch()).unwrap();
        assert_eq!(rail.queued().len(), 2);
        assert_eq!(rail.queued()[0].amount, 400);

        assert_eq!(rail.settle(), 2);
        assert!(rail.queued().is_empty());
        assert_eq!(rail.settle(), 0);
    }

    #[test]
    fn discard_announces_nothing() {
        let mut rail = QueuedRail::new();
        rail.pay(&batch()).unwrap();
        assert_eq!(rail.discard(), 2);
        assert_eq!(rail.settle(), 0);
    }
}
