//! # Payout Rails
//!
//! The registry decides *how much* each stakeholder receives and in what
//! order. Moving the money is somebody else's job: a [`PayoutRail`] is the
//! external payable-transfer primitive the revenue engine hands each batch
//! to.
//!
//! A rail must treat a batch as all-or-nothing. If it returns an error, the
//! engine assumes nothing was paid and commits nothing. A rail that panics
//! is treated as one that failed; see [`pay_guarded`].

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bluecarbon_protocol::Identity;

use crate::revenue_distribution::StakeholderCategory;

/// Why a rail refused a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutError {
    /// The rail rejected a specific recipient.
    #[error("payout to {recipient} rejected: {reason}")]
    Rejected {
        recipient: Identity,
        reason: String,
    },

    /// The rail itself is unavailable.
    #[error("payout rail unavailable: {0}")]
    Unavailable(String),
}

/// Who gets paid what. `category` is `None` for administrative withdrawals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub recipient: Identity,
    pub amount: u64,
    pub category: Option<StakeholderCategory>,
}

/// An external payable-transfer primitive.
pub trait PayoutRail {
    /// Pays every entry in `payouts`, or none of them.
    fn pay(&mut self, payouts: &[Payout]) -> Result<(), PayoutError>;
}

/// Runs `rail.pay`, turning a panic inside the rail into
/// [`PayoutError::Unavailable`] so the caller can still finish the
/// distribution or withdrawal it started.
pub fn pay_guarded(rail: &mut dyn PayoutRail, payouts: &[Payout]) -> Result<(), PayoutError> {
    panic::catch_unwind(AssertUnwindSafe(|| rail.pay(payouts))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_owned());
        tracing::error!(%reason, "payout rail panicked");
        Err(PayoutError::Unavailable(format!("rail panicked: {reason}")))
    })
}

/// Rail that credits an in-memory account per recipient.
///
/// Good enough for tests and dry runs; also the reference for what a real
/// rail must guarantee (atomic batches, overflow-safe totals).
#[derive(Debug, Clone, Default)]
pub struct InMemoryRail {
    received: BTreeMap<Identity, u64>,
    batches: usize,
    offline: bool,
}

impl InMemoryRail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total received by `recipient` across all batches.
    pub fn received(&self, recipient: &Identity) -> u64 {
        self.received.get(recipient).copied().unwrap_or(0)
    }

    /// Number of batches successfully paid.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Takes the rail offline; every batch fails until brought back.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }
}

impl PayoutRail for InMemoryRail {
    fn pay(&mut self, payouts: &[Payout]) -> Result<(), PayoutError> {
        if self.offline {
            return Err(PayoutError::Unavailable("rail is offline".into()));
        }

        // Stage into a copy so a failure midway leaves nothing paid.
        let mut staged = self.received.clone();
        for payout in payouts {
            let entry = staged.entry(payout.recipient.clone()).or_insert(0);
            *entry = entry
                .checked_add(payout.amount)
                .ok_or_else(|| PayoutError::Rejected {
                    recipient: payout.recipient.clone(),
                    reason: "recipient balance overflow".into(),
                })?;
        }

        self.received = staged;
        self.batches += 1;
        Ok(())
    }
}
