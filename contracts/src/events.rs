//! # Ledger Notifications
//!
//! Components announce committed state changes by appending a
//! [`LedgerEvent`] to the shared [`EventLog`]. Events are only emitted after
//! an operation has fully committed, so a subscriber never sees a
//! notification for a change that was rolled back.
//!
//! The log is a journal, not a bus: callers drain it when convenient
//! (the node binary drains after every command and feeds metrics).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bluecarbon_protocol::{EcosystemType, Identity};

use crate::revenue_distribution::StakeholderCategory;

/// A committed state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    VerifierStatusChanged {
        verifier: Identity,
        authorized: bool,
    },
    OwnershipTransferred {
        previous: Identity,
        new_owner: Identity,
    },
    ProjectCreated {
        project_id: u64,
        name: String,
        owner: Identity,
        ecosystem: EcosystemType,
    },
    VerificationSubmitted {
        verification_id: u64,
        project_id: u64,
        verifier: Identity,
        credits_claimed: u64,
    },
    ProjectVerified {
        project_id: u64,
        verification_id: u64,
        credits_issued: u64,
    },
    CreditsMinted {
        to: Identity,
        amount: u64,
    },
    CreditsTransferred {
        from: Identity,
        to: Identity,
        amount: u64,
    },
    LedgerPaused {
        by: Identity,
    },
    LedgerUnpaused {
        by: Identity,
    },
    RevenueShareCreated {
        share_id: u64,
        project_id: u64,
    },
    RevenueShareUpdated {
        share_id: u64,
        ngo_bps: u16,
        community_bps: u16,
        government_bps: u16,
    },
    RevenueShareStatusChanged {
        share_id: u64,
        active: bool,
    },
    RevenueAdded {
        share_id: u64,
        amount: u64,
        total_revenue: u64,
    },
    RevenueDistributed {
        share_id: u64,
        distribution_id: u64,
        recipient: Identity,
        category: StakeholderCategory,
        amount: u64,
    },
    EmergencyWithdrawal {
        withdrawal_id: u64,
        to: Identity,
        amount: u64,
    },
}

impl LedgerEvent {
    /// Stable snake_case name, identical to the serde `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::VerifierStatusChanged { .. } => "verifier_status_changed",
            LedgerEvent::OwnershipTransferred { .. } => "ownership_transferred",
            LedgerEvent::ProjectCreated { .. } => "project_created",
            LedgerEvent::VerificationSubmitted { .. } => "verification_submitted",
            LedgerEvent::ProjectVerified { .. } => "project_verified",
            LedgerEvent::CreditsMinted { .. } => "credits_minted",
            LedgerEvent::CreditsTransferred { .. } => "credits_transferred",
            LedgerEvent::LedgerPaused { .. } => "ledger_paused",
            LedgerEvent::LedgerUnpaused { .. } => "ledger_unpaused",
            LedgerEvent::RevenueShareCreated { .. } => "revenue_share_created",
            LedgerEvent::RevenueShareUpdated { .. } => "revenue_share_updated",
            LedgerEvent::RevenueShareStatusChanged { .. } => "revenue_share_status_changed",
            LedgerEvent::RevenueAdded { .. } => "revenue_added",
            LedgerEvent::RevenueDistributed { .. } => "revenue_distributed",
            LedgerEvent::EmergencyWithdrawal { .. } => "emergency_withdrawal",
        }
    }
}

/// A journaled event with its position and commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub sequence: u64,
    pub at: DateTime<Utc>,
    pub event: LedgerEvent,
}

/// Append-only journal of committed notifications.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    next_sequence: u64,
    entries: Vec<EventEnvelope>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and mirrors it to the tracing pipeline.
    pub fn emit(&mut self, event: LedgerEvent) {
        tracing::info!(sequence = self.next_sequence, event = ?event, "ledger event");
        self.entries.push(EventEnvelope {
            sequence: self.next_sequence,
            at: Utc::now(),
            event,
        });
        self.next_sequence += 1;
    }

    /// Events not yet drained, oldest first.
    pub fn pending(&self) -> &[EventEnvelope] {
        &self.entries
    }

    /// Removes and returns all pending events. Sequence numbers keep counting.
    pub fn drain(&mut self) -> Vec<EventEnvelope> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_survives_drain() {
        let mut log = EventLog::new();
        log.emit(LedgerEvent::LedgerPaused { by: "owner".into() });
        log.emit(LedgerEvent::LedgerUnpaused { by: "owner".into() });
        let first = log.drain();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].sequence, 1);
        assert!(log.is_empty());

        log.emit(LedgerEvent::LedgerPaused { by: "owner".into() });
        assert_eq!(log.pending()[0].sequence, 2);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(LedgerEvent::CreditsMinted {
            to: "alice".into(),
            amount: 10,
        })
        .unwrap();
        assert_eq!(json["type"], "credits_minted");
        assert_eq!(json["amount"], 10);
    }

    #[test]
    fn kind_matches_type_tag() {
        let events = [
            LedgerEvent::LedgerPaused { by: "owner".into() },
            LedgerEvent::RevenueShareStatusChanged {
                share_id: 1,
                active: false,
            },
            LedgerEvent::EmergencyWithdrawal {
                withdrawal_id: 1,
                to: "owner".into(),
                amount: 2,
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.kind());
        }
    }
}
