//! # Carbon Ledger
//!
//! The composition root of the accounting core. [`CarbonLedger`] owns one
//! instance of each component plus the event journal, and exposes every
//! operation with the calling identity as the first argument.
//!
//! Components never reach for one another on their own. The ledger lends
//! each one exactly the others it needs for a given call (the verification
//! workflow borrows the project registry and credit ledger, the revenue
//! engine borrows the authorization registry), which keeps the data flow of
//! every operation visible in one place.
//!
//! All persistent state round-trips through [`LedgerSnapshot`]. In-flight
//! payout markers are runtime-only and are never captured.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use bluecarbon_protocol::{EcosystemType, Identity};

use crate::authorization::AuthorizationRegistry;
use crate::carbon_credit::CreditLedger;
use crate::error::LedgerResult;
use crate::events::{EventEnvelope, EventLog};
use crate::payout::{PayoutError, PayoutRail};
use crate::project_registry::{NewProject, Project, ProjectId, ProjectRegistry};
use crate::revenue_distribution::{
    DistributionReceipt, DistributionRecord, DistributionTicket, EngineCounters,
    PendingDistribution, RevenueDistributionEngine, RevenueShare, RevenueShareId, ShareSplit,
    Stakeholders, WithdrawalRecord, WithdrawalTicket,
};
use crate::verification::{
    ApprovalPolicy, SingleVerifierApproval, VerificationContext, VerificationId,
    VerificationRecord, VerificationState, VerificationSubmission, VerificationWorkflow,
};

/// Every piece of persistent ledger state, in a serde-friendly shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub owner: Identity,
    pub verifiers: BTreeMap<Identity, bool>,
    pub projects: Vec<Project>,
    pub next_project_id: ProjectId,
    pub verifications: Vec<VerificationRecord>,
    pub next_verification_id: VerificationId,
    pub balances: BTreeMap<Identity, u64>,
    pub paused: bool,
    pub revenue_shares: Vec<RevenueShare>,
    pub distributions: Vec<DistributionRecord>,
    pub withdrawals: Vec<WithdrawalRecord>,
    pub engine_counters: EngineCounters,
}

/// The Blue Carbon registry: authorization, projects, verification,
/// credits, and revenue distribution behind one API.
#[derive(Debug, Clone)]
pub struct CarbonLedger {
    auth: AuthorizationRegistry,
    projects: ProjectRegistry,
    verifications: VerificationWorkflow,
    credits: CreditLedger,
    revenue: RevenueDistributionEngine,
    events: EventLog,
    policy: Arc<dyn ApprovalPolicy>,
}

impl CarbonLedger {
    /// An empty registry owned by `owner`, using single-verifier approval.
    pub fn new(owner: Identity) -> Self {
        Self::with_policy(owner, Arc::new(SingleVerifierApproval))
    }

    pub fn with_policy(owner: Identity, policy: Arc<dyn ApprovalPolicy>) -> Self {
        Self {
            auth: AuthorizationRegistry::new(owner),
            projects: ProjectRegistry::new(),
            verifications: VerificationWorkflow::new(),
            credits: CreditLedger::new(),
            revenue: RevenueDistributionEngine::new(),
            events: EventLog::new(),
            policy,
        }
    }

    /// Rebuilds a ledger from a snapshot, using single-verifier approval.
    ///
    /// Derived figures (total supply, held balance, owner indexes) are
    /// recomputed from the records.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`](crate::LedgerError::Overflow) if the
    /// snapshot's balances or revenue cannot be summed in a `u64`.
    pub fn restore(snapshot: LedgerSnapshot) -> LedgerResult<Self> {
        Self::restore_with_policy(snapshot, Arc::new(SingleVerifierApproval))
    }

    pub fn restore_with_policy(
        snapshot: LedgerSnapshot,
        policy: Arc<dyn ApprovalPolicy>,
    ) -> LedgerResult<Self> {
        let ledger = Self {
            auth: AuthorizationRegistry::from_parts(snapshot.owner, snapshot.verifiers),
            projects: ProjectRegistry::from_records(snapshot.projects, snapshot.next_project_id),
            verifications: VerificationWorkflow::from_records(
                snapshot.verifications,
                snapshot.next_verification_id,
            ),
            credits: CreditLedger::from_balances(snapshot.balances, snapshot.paused)?,
            revenue: RevenueDistributionEngine::from_records(
                snapshot.revenue_shares,
                snapshot.distributions,
                snapshot.withdrawals,
                snapshot.engine_counters,
            )?,
            events: EventLog::new(),
            policy,
        };
        tracing::debug!(
            projects = ledger.projects.project_count(),
            total_supply = ledger.credits.total_supply(),
            held_balance = ledger.revenue.held_balance(),
            "ledger restored"
        );
        Ok(ledger)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            owner: self.auth.owner().clone(),
            verifiers: self.auth.verifier_entries().clone(),
            projects: self.projects.projects().cloned().collect(),
            next_project_id: self.projects.next_id(),
            verifications: self.verifications.records().cloned().collect(),
            next_verification_id: self.verifications.next_id(),
            balances: self.credits.holders().clone(),
            paused: self.credits.is_paused(),
            revenue_shares: self.revenue.shares().cloned().collect(),
            distributions: self.revenue.distributions().cloned().collect(),
            withdrawals: self.revenue.withdrawals().to_vec(),
            engine_counters: self.revenue.counters(),
        }
    }

    pub fn set_policy(&mut self, policy: Arc<dyn ApprovalPolicy>) {
        self.policy = policy;
    }

    // -----------------------------------------------------------------------
    // Authorization
    // -----------------------------------------------------------------------

    pub fn set_verifier_status(
        &mut self,
        caller: &Identity,
        verifier: &Identity,
        authorized: bool,
    ) -> LedgerResult<()> {
        self.auth
            .set_verifier_status(caller, verifier, authorized, &mut self.events)
    }

    pub fn is_authorized(&self, identity: &Identity) -> bool {
        self.auth.is_authorized(identity)
    }

    pub fn transfer_ownership(&mut self, caller: &Identity, new_owner: &Identity) -> LedgerResult<()> {
        self.auth
            .transfer_ownership(caller, new_owner.clone(), &mut self.events)
    }

    pub fn owner(&self) -> &Identity {
        self.auth.owner()
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    pub fn create_project(&mut self, caller: &Identity, request: NewProject) -> LedgerResult<ProjectId> {
        self.projects.create_project(caller, request, &mut self.events)
    }

    pub fn get_project(&self, project_id: ProjectId) -> LedgerResult<&Project> {
        self.projects.get_project(project_id)
    }

    pub fn list_projects_by_owner(&self, owner: &Identity) -> Vec<ProjectId> {
        self.projects.list_projects_by_owner(owner)
    }

    // -----------------------------------------------------------------------
    // Verification
    // -----------------------------------------------------------------------

    /// Submits a claim and, if the approval policy agrees, verifies the
    /// project and mints credits to its owner in the same call.
    pub fn submit_verification(
        &mut self,
        caller: &Identity,
        submission: VerificationSubmission,
    ) -> LedgerResult<VerificationId> {
        let ctx = VerificationContext {
            auth: &self.auth,
            projects: &mut self.projects,
            credits: &mut self.credits,
            events: &mut self.events,
        };
        self.verifications
            .submit_verification(caller, submission, self.policy.as_ref(), ctx)
    }

    pub fn approve_pending(
        &mut self,
        caller: &Identity,
        verification_id: VerificationId,
    ) -> LedgerResult<bool> {
        let ctx = VerificationContext {
            auth: &self.auth,
            projects: &mut self.projects,
            credits: &mut self.credits,
            events: &mut self.events,
        };
        self.verifications
            .approve_pending(caller, verification_id, self.policy.as_ref(), ctx)
    }

    pub fn get_verification(&self, id: VerificationId) -> LedgerResult<&VerificationRecord> {
        self.verifications.get_verification(id)
    }

    pub fn verification_state(&self, project_id: ProjectId) -> LedgerResult<VerificationState> {
        self.verifications
            .verification_state(&self.projects, project_id)
    }

    pub fn estimate_credits(&self, area_m2: u64, ecosystem: EcosystemType) -> u64 {
        crate::verification::estimate_credits(area_m2, ecosystem)
    }

    // -----------------------------------------------------------------------
    // Credits
    // -----------------------------------------------------------------------

    /// Moves credits from the caller to `to`.
    pub fn transfer(&mut self, caller: &Identity, to: &Identity, amount: u64) -> LedgerResult<()> {
        self.credits.transfer(caller, to, amount, &mut self.events)
    }

    pub fn balance_of(&self, holder: &Identity) -> u64 {
        self.credits.balance_of(holder)
    }

    pub fn total_supply(&self) -> u64 {
        self.credits.total_supply()
    }

    pub fn pause(&mut self, caller: &Identity) -> LedgerResult<()> {
        self.credits.pause(&self.auth, caller, &mut self.events)
    }

    pub fn unpause(&mut self, caller: &Identity) -> LedgerResult<()> {
        self.credits.unpause(&self.auth, caller, &mut self.events)
    }

    pub fn is_paused(&self) -> bool {
        self.credits.is_paused()
    }

    // -----------------------------------------------------------------------
    // Revenue
    // -----------------------------------------------------------------------

    pub fn create_revenue_share(
        &mut self,
        caller: &Identity,
        project_id: ProjectId,
        stakeholders: Stakeholders,
        split: ShareSplit,
    ) -> LedgerResult<RevenueShareId> {
        self.revenue.create_revenue_share(
            &self.auth,
            caller,
            project_id,
            stakeholders,
            split,
            &mut self.events,
        )
    }

    pub fn update_revenue_share(
        &mut self,
        caller: &Identity,
        share_id: RevenueShareId,
        split: ShareSplit,
    ) -> LedgerResult<()> {
        self.revenue
            .update_revenue_share(&self.auth, caller, share_id, split, &mut self.events)
    }

    pub fn set_share_active(
        &mut self,
        caller: &Identity,
        share_id: RevenueShareId,
        active: bool,
    ) -> LedgerResult<()> {
        self.revenue
            .set_share_active(&self.auth, caller, share_id, active, &mut self.events)
    }

    pub fn add_revenue(
        &mut self,
        caller: &Identity,
        share_id: RevenueShareId,
        amount: u64,
    ) -> LedgerResult<()> {
        self.revenue
            .add_revenue(&self.auth, caller, share_id, amount, &mut self.events)
    }

    /// Distributes everything available on a share through `rail`.
    ///
    /// The rail runs while `self` is mutably borrowed, so it cannot call
    /// back into this ledger. Use [`LedgerHandle`](crate::LedgerHandle) when
    /// the rail needs access to the registry.
    pub fn distribute_revenue(
        &mut self,
        caller: &Identity,
        share_id: RevenueShareId,
        rail: &mut dyn PayoutRail,
    ) -> LedgerResult<DistributionReceipt> {
        self.revenue
            .distribute_revenue(&self.auth, caller, share_id, rail, &mut self.events)
    }

    pub fn begin_distribution(
        &mut self,
        caller: &Identity,
        share_id: RevenueShareId,
    ) -> LedgerResult<DistributionTicket> {
        self.revenue.begin_distribution(&self.auth, caller, share_id)
    }

    pub fn finish_distribution(
        &mut self,
        ticket: DistributionTicket,
        outcome: Result<(), PayoutError>,
    ) -> LedgerResult<DistributionReceipt> {
        self.revenue
            .finish_distribution(ticket, outcome, &mut self.events)
    }

    pub fn get_pending_distribution(
        &self,
        share_id: RevenueShareId,
    ) -> LedgerResult<PendingDistribution> {
        self.revenue.get_pending_distribution(share_id)
    }

    pub fn emergency_withdraw(
        &mut self,
        caller: &Identity,
        rail: &mut dyn PayoutRail,
    ) -> LedgerResult<u64> {
        self.revenue
            .emergency_withdraw(&self.auth, caller, rail, &mut self.events)
    }

    pub fn begin_withdrawal(&mut self, caller: &Identity) -> LedgerResult<Option<WithdrawalTicket>> {
        self.revenue.begin_withdrawal(&self.auth, caller)
    }

    pub fn finish_withdrawal(
        &mut self,
        ticket: WithdrawalTicket,
        outcome: Result<(), PayoutError>,
    ) -> LedgerResult<u64> {
        self.revenue
            .finish_withdrawal(ticket, outcome, &mut self.events)
    }

    pub fn get_revenue_share(&self, share_id: RevenueShareId) -> LedgerResult<&RevenueShare> {
        self.revenue.get_revenue_share(share_id)
    }

    // -----------------------------------------------------------------------
    // Components and events
    // -----------------------------------------------------------------------

    pub fn authorization(&self) -> &AuthorizationRegistry {
        &self.auth
    }

    pub fn project_registry(&self) -> &ProjectRegistry {
        &self.projects
    }

    pub fn verification_workflow(&self) -> &VerificationWorkflow {
        &self.verifications
    }

    pub fn credit_ledger(&self) -> &CreditLedger {
        &self.credits
    }

    pub fn revenue_engine(&self) -> &RevenueDistributionEngine {
        &self.revenue
    }

    /// Events emitted since the last drain.
    pub fn pending_events(&self) -> &[EventEnvelope] {
        self.events.pending()
    }

    pub fn drain_events(&mut self) -> Vec<EventEnvelope> {
        self.events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::events::LedgerEvent;
    use crate::payout::InMemoryRail;

    fn owner() -> Identity {
        "registry-owner".into()
    }

    fn mangrove(area: u64) -> NewProject {
        NewProject {
            name: "Mangrove Restoration Alpha".into(),
            location: "Sundarbans, Bangladesh".into(),
            total_area_m2: area,
            ecosystem: EcosystemType::Mangrove,
            metadata_ref: "bafy-project-docs".into(),
        }
    }

    #[test]
    fn verified_project_mints_to_owner() {
        let mut ledger = CarbonLedger::new(owner());
        ledger
            .set_verifier_status(&owner(), &"verifier".into(), true)
            .unwrap();
        let project_id = ledger.create_project(&"alice".into(), mangrove(5_000)).unwrap();
        let estimate = ledger.estimate_credits(5_000, EcosystemType::Mangrove);

        ledger
            .submit_verification(
                &"verifier".into(),
                VerificationSubmission {
                    project_id,
                    credits_claimed: estimate,
                    evidence_ref: "bafy-evidence".into(),
                },
            )
            .unwrap();

        assert_eq!(ledger.balance_of(&"alice".into()), 10_000);
        assert_eq!(ledger.total_supply(), 10_000);
        assert_eq!(
            ledger.verification_state(project_id).unwrap(),
            VerificationState::Verified
        );

        let kinds: Vec<&LedgerEvent> = ledger.pending_events().iter().map(|e| &e.event).collect();
        assert!(kinds
            .iter()
            .any(|e| matches!(e, LedgerEvent::ProjectVerified { credits_issued: 10_000, .. })));
    }

    #[test]
    fn failed_operations_emit_nothing() {
        let mut ledger = CarbonLedger::new(owner());
        ledger.drain_events();
        assert!(matches!(
            ledger.pause(&"alice".into()),
            Err(LedgerError::NotOwner { .. })
        ));
        assert!(ledger
            .create_project(&"alice".into(), mangrove(0))
            .is_err());
        assert!(ledger.pending_events().is_empty());
    }

    #[test]
    fn snapshot_restores_everything_persistent() {
        let mut ledger = CarbonLedger::new(owner());
        ledger
            .set_verifier_status(&owner(), &"verifier".into(), true)
            .unwrap();
        let project_id = ledger.create_project(&"alice".into(), mangrove(100)).unwrap();
        ledger
            .submit_verification(
                &"verifier".into(),
                VerificationSubmission {
                    project_id,
                    credits_claimed: 200,
                    evidence_ref: "ev".into(),
                },
            )
            .unwrap();
        let share_id = ledger
            .create_revenue_share(
                &owner(),
                project_id,
                Stakeholders {
                    ngo: "ngo".into(),
                    community: "community".into(),
                    government: "gov".into(),
                },
                ShareSplit::new(4_000, 4_000, 2_000),
            )
            .unwrap();
        ledger.add_revenue(&owner(), share_id, 7).unwrap();
        ledger
            .distribute_revenue(&owner(), share_id, &mut InMemoryRail::new())
            .unwrap();

        let snapshot = ledger.snapshot();
        let restored = CarbonLedger::restore(snapshot.clone()).unwrap();
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.total_supply(), 200);
        assert_eq!(restored.revenue_engine().held_balance(), 2);
        assert!(restored.is_authorized(&"verifier".into()));
        assert_eq!(restored.list_projects_by_owner(&"alice".into()), vec![project_id]);
        assert!(restored.pending_events().is_empty());
    }

    #[test]
    fn restored_ledger_continues_id_sequences() {
        let mut ledger = CarbonLedger::new(owner());
        ledger.create_project(&"alice".into(), mangrove(10)).unwrap();
        let mut restored = CarbonLedger::restore(ledger.snapshot()).unwrap();
        let next = restored.create_project(&"bob".into(), mangrove(10)).unwrap();
        assert_eq!(next, 2);
    }
}
