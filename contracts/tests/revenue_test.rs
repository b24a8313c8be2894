//! Integration tests for revenue sharing.
//!
//! Covers the documented split scenarios, conservation of revenue across
//! repeated passes, rollback when the payout rail fails, re-entrancy through
//! the shared handle, and the emergency sweep.

use bluecarbon_contracts::{
    CarbonLedger, InMemoryRail, LedgerError, LedgerHandle, Payout, PayoutError, PayoutRail,
    PendingDistribution, RevenueShareId, ShareSplit, StakeholderCategory, Stakeholders,
};
use bluecarbon_protocol::Identity;

fn owner() -> Identity {
    "registry-owner".into()
}

fn stakeholders() -> Stakeholders {
    Stakeholders {
        ngo: "mangrove-trust".into(),
        community: "fisherfolk-coop".into(),
        government: "coastal-authority".into(),
    }
}

fn ledger_with_share(split: ShareSplit) -> (CarbonLedger, RevenueShareId) {
    let mut ledger = CarbonLedger::new(owner());
    let id = ledger
        .create_revenue_share(&owner(), 1, stakeholders(), split)
        .unwrap();
    (ledger, id)
}

/// distributed + swept never exceeds total, and the records add up.
fn assert_invariants(ledger: &CarbonLedger) {
    let engine = ledger.revenue_engine();
    let mut held = 0;
    for share in engine.shares() {
        assert_eq!(share.split.sum(), 10_000);
        assert!(share.distributed_amount + share.swept_amount <= share.total_revenue);
        let recorded: u64 = engine
            .distributions_for(share.id)
            .iter()
            .map(|d| d.amount)
            .sum();
        assert_eq!(recorded, share.distributed_amount);
        held += share.available();
    }
    assert_eq!(held, engine.held_balance());
}

// ---------------------------------------------------------------------------
// Split scenarios
// ---------------------------------------------------------------------------

#[test]
fn forty_forty_twenty_split_of_one_thousand() {
    let (mut ledger, id) = ledger_with_share(ShareSplit::new(4_000, 4_000, 2_000));
    ledger.add_revenue(&owner(), id, 1_000).unwrap();
    assert_eq!(
        ledger.get_pending_distribution(id).unwrap(),
        PendingDistribution {
            ngo: 400,
            community: 400,
            government: 200
        }
    );

    let mut rail = InMemoryRail::new();
    let receipt = ledger.distribute_revenue(&owner(), id, &mut rail).unwrap();
    assert_eq!(receipt.total_paid, 1_000);
    assert_eq!(rail.received(&"mangrove-trust".into()), 400);
    assert_eq!(rail.received(&"fisherfolk-coop".into()), 400);
    assert_eq!(rail.received(&"coastal-authority".into()), 200);

    let categories: Vec<StakeholderCategory> = receipt.records.iter().map(|r| r.category).collect();
    assert_eq!(categories, StakeholderCategory::PAYOUT_ORDER.to_vec());
    assert_invariants(&ledger);
}

#[test]
fn seven_units_pay_two_two_one() {
    let (mut ledger, id) = ledger_with_share(ShareSplit::new(4_000, 4_000, 2_000));
    ledger.add_revenue(&owner(), id, 7).unwrap();
    let receipt = ledger
        .distribute_revenue(&owner(), id, &mut InMemoryRail::new())
        .unwrap();

    let amounts: Vec<u64> = receipt.records.iter().map(|r| r.amount).collect();
    assert_eq!(amounts, vec![2, 2, 1]);
    assert_eq!(ledger.get_revenue_share(id).unwrap().distributed_amount, 5);
    assert_eq!(ledger.get_revenue_share(id).unwrap().available(), 2);
    assert_invariants(&ledger);
}

#[test]
fn split_must_total_ten_thousand() {
    let mut ledger = CarbonLedger::new(owner());
    assert_eq!(
        ledger.create_revenue_share(&owner(), 1, stakeholders(), ShareSplit::new(4_000, 4_000, 1_999)),
        Err(LedgerError::InvalidShares { sum: 9_999 })
    );
    assert_eq!(
        ledger.create_revenue_share(&owner(), 1, stakeholders(), ShareSplit::new(5_000, 5_000, 1)),
        Err(LedgerError::InvalidShares { sum: 10_001 })
    );
    assert_eq!(ledger.revenue_engine().shares().count(), 0);
}

#[test]
fn repeated_distribution_is_idempotent() {
    let (mut ledger, id) = ledger_with_share(ShareSplit::new(3_333, 3_333, 3_334));
    let mut rail = InMemoryRail::new();
    ledger.add_revenue(&owner(), id, 10_000).unwrap();
    ledger.distribute_revenue(&owner(), id, &mut rail).unwrap();

    let records = ledger.revenue_engine().distributions().count();
    let paid = rail.batches();
    for _ in 0..3 {
        assert!(matches!(
            ledger.distribute_revenue(&owner(), id, &mut rail),
            Err(LedgerError::NothingToDistribute { .. })
        ));
    }
    assert_eq!(ledger.revenue_engine().distributions().count(), records);
    assert_eq!(rail.batches(), paid);
    assert_invariants(&ledger);
}

#[test]
fn many_small_additions_conserve_revenue() {
    let (mut ledger, id) = ledger_with_share(ShareSplit::new(4_500, 3_500, 2_000));
    let mut rail = InMemoryRail::new();
    let mut added = 0;
    for amount in [3u64, 17, 1, 250, 9, 1_001, 42] {
        ledger.add_revenue(&owner(), id, amount).unwrap();
        added += amount;
        // Ignore passes where everything rounds away.
        let _ = ledger.distribute_revenue(&owner(), id, &mut rail);
        assert_invariants(&ledger);
    }

    let share = ledger.get_revenue_share(id).unwrap();
    let received: u64 = ["mangrove-trust", "fisherfolk-coop", "coastal-authority"]
        .iter()
        .map(|who| rail.received(&(*who).into()))
        .sum();
    assert_eq!(share.total_revenue, added);
    assert_eq!(received, share.distributed_amount);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn deactivated_share_keeps_history() {
    let (mut ledger, id) = ledger_with_share(ShareSplit::new(4_000, 4_000, 2_000));
    ledger.add_revenue(&owner(), id, 100).unwrap();
    ledger.set_share_active(&owner(), id, false).unwrap();

    assert_eq!(
        ledger.distribute_revenue(&owner(), id, &mut InMemoryRail::new()),
        Err(LedgerError::Inactive { share_id: id })
    );
    assert_eq!(ledger.get_revenue_share(id).unwrap().total_revenue, 100);
    // Preview still works on an inactive share.
    assert_eq!(ledger.get_pending_distribution(id).unwrap().total(), 100);

    ledger.set_share_active(&owner(), id, true).unwrap();
    ledger
        .distribute_revenue(&owner(), id, &mut InMemoryRail::new())
        .unwrap();
}

// ---------------------------------------------------------------------------
// Payout failures and re-entrancy
// ---------------------------------------------------------------------------

/// Rejects any batch containing a payout to `blocked`.
struct BlockingRail {
    blocked: Identity,
}

impl PayoutRail for BlockingRail {
    fn pay(&mut self, payouts: &[Payout]) -> Result<(), PayoutError> {
        match payouts.iter().find(|p| p.recipient == self.blocked) {
            Some(p) => Err(PayoutError::Rejected {
                recipient: p.recipient.clone(),
                reason: "account frozen".into(),
            }),
            None => Ok(()),
        }
    }
}

#[test]
fn rejected_payout_rolls_back() {
    let (mut ledger, id) = ledger_with_share(ShareSplit::new(4_000, 4_000, 2_000));
    ledger.add_revenue(&owner(), id, 1_000).unwrap();
    ledger.drain_events();

    let mut rail = BlockingRail {
        blocked: "coastal-authority".into(),
    };
    let err = ledger.distribute_revenue(&owner(), id, &mut rail).unwrap_err();
    assert_eq!(err.code(), "PayoutFailed");
    assert!(err.to_string().contains("account frozen"));

    let share = ledger.get_revenue_share(id).unwrap();
    assert_eq!(share.distributed_amount, 0);
    assert_eq!(share.available(), 1_000);
    assert_eq!(ledger.revenue_engine().distributions().count(), 0);
    assert!(ledger.pending_events().is_empty());
    assert_invariants(&ledger);
}

/// Calls back into the handle from inside the payout.
struct CallbackRail {
    handle: LedgerHandle,
    share_id: RevenueShareId,
    nested: Vec<Result<u64, LedgerError>>,
}

impl PayoutRail for CallbackRail {
    fn pay(&mut self, _payouts: &[Payout]) -> Result<(), PayoutError> {
        let mut inner = InMemoryRail::new();
        self.nested.push(
            self.handle
                .distribute_revenue(&owner(), self.share_id, &mut inner)
                .map(|r| r.total_paid),
        );
        self.nested
            .push(self.handle.emergency_withdraw(&owner(), &mut inner));
        Ok(())
    }
}

#[test]
fn callback_during_payout_cannot_double_pay() {
    let (ledger, id) = ledger_with_share(ShareSplit::new(4_000, 4_000, 2_000));
    let handle = LedgerHandle::new(ledger);
    handle.with(|l| l.add_revenue(&owner(), id, 1_000)).unwrap();

    let mut rail = CallbackRail {
        handle: handle.clone(),
        share_id: id,
        nested: Vec::new(),
    };
    let receipt = handle.distribute_revenue(&owner(), id, &mut rail).unwrap();
    assert_eq!(receipt.total_paid, 1_000);
    assert_eq!(
        rail.nested,
        vec![
            Err(LedgerError::ReentrantDistribution { share_id: id }),
            Err(LedgerError::ReentrantDistribution { share_id: id }),
        ]
    );
    handle.with(|l| assert_invariants(l));
}

/// Panics instead of paying.
struct PanickingRail;

impl PayoutRail for PanickingRail {
    fn pay(&mut self, _payouts: &[Payout]) -> Result<(), PayoutError> {
        panic!("settlement service crashed")
    }
}

#[test]
fn panicking_rail_does_not_wedge_the_share() {
    let (ledger, id) = ledger_with_share(ShareSplit::new(4_000, 4_000, 2_000));
    let handle = LedgerHandle::new(ledger);
    handle.with(|l| l.add_revenue(&owner(), id, 1_000)).unwrap();

    let err = handle
        .distribute_revenue(&owner(), id, &mut PanickingRail)
        .unwrap_err();
    assert_eq!(err.code(), "PayoutFailed");
    assert!(err.to_string().contains("settlement service crashed"));
    handle.with(|l| {
        assert_eq!(l.get_revenue_share(id).unwrap().distributed_amount, 0);
        assert_eq!(l.revenue_engine().distributions().count(), 0);
        assert_invariants(l);
    });

    // The share is not left in flight: later passes and sweeps still work.
    handle.with(|l| l.add_revenue(&owner(), id, 500)).unwrap();
    let mut rail = InMemoryRail::new();
    let receipt = handle.distribute_revenue(&owner(), id, &mut rail).unwrap();
    assert_eq!(receipt.total_paid, 1_500);
    assert_eq!(rail.received(&"mangrove-trust".into()), 600);

    handle.with(|l| l.add_revenue(&owner(), id, 9)).unwrap();
    assert!(handle
        .emergency_withdraw(&owner(), &mut PanickingRail)
        .is_err());
    handle.with(|l| {
        assert!(l.revenue_engine().withdrawals().is_empty());
        assert_eq!(l.revenue_engine().held_balance(), 9);
    });
    assert_eq!(handle.emergency_withdraw(&owner(), &mut rail).unwrap(), 9);
    handle.with(|l| assert_invariants(l));
}

/// Reads the ledger from inside the payout, then fails or pays.
struct ObservingRail {
    handle: LedgerHandle,
    fail: bool,
    seen: Option<(usize, u64, u64)>,
}

impl PayoutRail for ObservingRail {
    fn pay(&mut self, _payouts: &[Payout]) -> Result<(), PayoutError> {
        let snapshot = self.handle.snapshot();
        let distributed = snapshot
            .revenue_shares
            .iter()
            .map(|s| s.distributed_amount)
            .sum();
        let held = self.handle.with(|l| l.revenue_engine().held_balance());
        self.seen = Some((snapshot.distributions.len(), distributed, held));
        if self.fail {
            Err(PayoutError::Unavailable("bank holiday".into()))
        } else {
            Ok(())
        }
    }
}

#[test]
fn readers_during_payout_see_only_committed_state() {
    let (ledger, id) = ledger_with_share(ShareSplit::new(4_000, 4_000, 2_000));
    let handle = LedgerHandle::new(ledger);
    handle.with(|l| l.add_revenue(&owner(), id, 1_000)).unwrap();

    let mut failing = ObservingRail {
        handle: handle.clone(),
        fail: true,
        seen: None,
    };
    assert!(handle.distribute_revenue(&owner(), id, &mut failing).is_err());
    assert_eq!(failing.seen, Some((0, 0, 1_000)));
    assert_eq!(handle.snapshot().distributions.len(), 0);

    let mut paying = ObservingRail {
        handle: handle.clone(),
        fail: false,
        seen: None,
    };
    handle.distribute_revenue(&owner(), id, &mut paying).unwrap();
    assert_eq!(paying.seen, Some((0, 0, 1_000)));
    let after = handle.snapshot();
    assert_eq!(after.distributions.len(), 3);
    assert_eq!(after.revenue_shares[0].distributed_amount, 1_000);
    handle.with(|l| assert_invariants(l));
}

// ---------------------------------------------------------------------------
// Emergency withdrawal
// ---------------------------------------------------------------------------

#[test]
fn emergency_withdraw_reconciles_dust_across_shares() {
    let mut ledger = CarbonLedger::new(owner());
    let mut rail = InMemoryRail::new();
    let mut ids = Vec::new();
    for project_id in 1..=3 {
        let id = ledger
            .create_revenue_share(&owner(), project_id, stakeholders(), ShareSplit::new(4_000, 4_000, 2_000))
            .unwrap();
        ledger.add_revenue(&owner(), id, 7).unwrap();
        ledger.distribute_revenue(&owner(), id, &mut rail).unwrap();
        ids.push(id);
    }
    // One share left entirely undistributed.
    let untouched = ledger
        .create_revenue_share(&owner(), 4, stakeholders(), ShareSplit::new(4_000, 4_000, 2_000))
        .unwrap();
    ledger.add_revenue(&owner(), untouched, 50).unwrap();

    assert_eq!(ledger.revenue_engine().held_balance(), 3 * 2 + 50);
    let swept = ledger.emergency_withdraw(&owner(), &mut rail).unwrap();
    assert_eq!(swept, 56);
    assert_eq!(rail.received(&owner()), 56);
    assert_eq!(ledger.revenue_engine().held_balance(), 0);
    assert_eq!(ledger.get_revenue_share(untouched).unwrap().swept_amount, 50);
    for id in ids {
        assert_eq!(ledger.get_revenue_share(id).unwrap().available(), 0);
    }
    assert_eq!(ledger.revenue_engine().withdrawals().len(), 1);
    assert_invariants(&ledger);

    // New revenue after a sweep distributes normally.
    ledger.add_revenue(&owner(), untouched, 10).unwrap();
    let receipt = ledger.distribute_revenue(&owner(), untouched, &mut rail).unwrap();
    assert_eq!(receipt.total_paid, 10);
    assert_invariants(&ledger);
}

#[test]
fn emergency_withdraw_is_owner_only() {
    let (mut ledger, id) = ledger_with_share(ShareSplit::new(4_000, 4_000, 2_000));
    ledger.add_revenue(&owner(), id, 10).unwrap();
    assert!(matches!(
        ledger.emergency_withdraw(&"mangrove-trust".into(), &mut InMemoryRail::new()),
        Err(LedgerError::NotOwner { .. })
    ));
    assert_eq!(ledger.revenue_engine().held_balance(), 10);
}
