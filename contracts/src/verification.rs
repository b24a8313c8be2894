//! # Verification Workflow
//!
//! Turns a verifier's claim about a project into issued credits. Each
//! project moves through a one-way state machine:
//!
//! ```text
//! Unverified ──submit──▶ PendingApproval ──approve──▶ Verified (terminal)
//! ```
//!
//! ## Approval
//!
//! Whether a submitted claim is approved is decided by an
//! [`ApprovalPolicy`]. The default, [`SingleVerifierApproval`], approves on
//! the first submission from any authorized verifier, so submit and approve
//! happen in the same call. That is a weak trust model: one compromised
//! verifier identity can mint whatever it claims. A policy that wants more
//! confirmations leaves the record pending until
//! [`VerificationWorkflow::approve_pending`] collects them; nothing else in
//! the workflow changes.
//!
//! ## Atomicity
//!
//! Every precondition, including whether the credit ledger will accept the
//! mint, is checked before the first write. A call either verifies the
//! project, records the claim, and mints, or it leaves everything untouched.
//!
//! ## Trust boundary
//!
//! Claimed credits are asserted by the verifier, not derived from the
//! project. [`estimate_credits`] exists so callers can sanity-check a claim
//! before submitting it; the workflow never enforces it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bluecarbon_protocol::{EcosystemType, Identity};

use crate::authorization::AuthorizationRegistry;
use crate::carbon_credit::CreditLedger;
use crate::error::{EntityKind, LedgerError, LedgerResult};
use crate::events::{EventLog, LedgerEvent};
use crate::project_registry::{ProjectId, ProjectRegistry};

/// Unique, sequential verification identifier.
pub type VerificationId = u64;

/// Where a project stands in the verification lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationState {
    /// No claim has been submitted yet (or none is outstanding).
    Unverified,
    /// A claim was submitted but the approval policy has not signed off.
    PendingApproval,
    /// Credits have been issued. Terminal.
    Verified,
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationState::Unverified => write!(f, "Unverified"),
            VerificationState::PendingApproval => write!(f, "PendingApproval"),
            VerificationState::Verified => write!(f, "Verified"),
        }
    }
}

/// A verifier's claim about a project's sequestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: VerificationId,
    pub project_id: ProjectId,
    /// The verifier who submitted the claim.
    pub verifier: Identity,
    pub credits_claimed: u64,
    pub submitted_at: DateTime<Utc>,
    /// Content address of the externally stored evidence bundle.
    pub evidence_ref: String,
    pub approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    /// Verifiers who have signed off, submitter first.
    pub confirmations: Vec<Identity>,
}

/// Caller-supplied fields for [`VerificationWorkflow::submit_verification`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSubmission {
    pub project_id: ProjectId,
    pub credits_claimed: u64,
    pub evidence_ref: String,
}

/// Decides whether a pending claim has enough sign-off to mint.
pub trait ApprovalPolicy: fmt::Debug + Send + Sync {
    fn approves(&self, record: &VerificationRecord, auth: &AuthorizationRegistry) -> bool;
}

/// Approves any claim confirmed by at least one currently authorized verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleVerifierApproval;

impl ApprovalPolicy for SingleVerifierApproval {
    fn approves(&self, record: &VerificationRecord, auth: &AuthorizationRegistry) -> bool {
        record
            .confirmations
            .iter()
            .any(|verifier| auth.is_authorized(verifier))
    }
}

/// Mutable views of the components an approval touches.
pub struct VerificationContext<'a> {
    pub auth: &'a AuthorizationRegistry,
    pub projects: &'a mut ProjectRegistry,
    pub credits: &'a mut CreditLedger,
    pub events: &'a mut EventLog,
}

/// Credits a caller should expect for `area_m2` of `ecosystem`.
///
/// Mangrove ×2, seagrass ×1, salt marsh ×1 per square meter.
pub fn estimate_credits(area_m2: u64, ecosystem: EcosystemType) -> u64 {
    ecosystem.estimate_credits(area_m2)
}

/// Owns every verification record and is the only writer of a project's
/// verified flag and credit count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationWorkflow {
    records: BTreeMap<VerificationId, VerificationRecord>,
    by_project: HashMap<ProjectId, Vec<VerificationId>>,
    next_id: VerificationId,
}

impl VerificationWorkflow {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            by_project: HashMap::new(),
            next_id: 1,
        }
    }

    /// Rebuilds the workflow from persisted records.
    pub fn from_records(
        records: impl IntoIterator<Item = VerificationRecord>,
        next_id: VerificationId,
    ) -> Self {
        let mut workflow = Self::new();
        for record in records {
            workflow
                .by_project
                .entry(record.project_id)
                .or_default()
                .push(record.id);
            workflow.records.insert(record.id, record);
        }
        let highest = workflow.records.keys().next_back().copied().unwrap_or(0);
        workflow.next_id = next_id.max(highest + 1);
        workflow
    }

    /// Records a verifier's claim and runs the approval step.
    ///
    /// Preconditions, in order: the caller is an authorized verifier, the
    /// project exists, it is not yet verified, and the claim is positive.
    /// A project that already has a claim awaiting approval rejects new ones.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`], [`LedgerError::NotFound`],
    /// [`LedgerError::AlreadyVerified`], [`LedgerError::InvalidInput`], or
    /// any mint failure ([`LedgerError::Paused`], [`LedgerError::Overflow`]).
    pub fn submit_verification(
        &mut self,
        caller: &Identity,
        submission: VerificationSubmission,
        policy: &dyn ApprovalPolicy,
        ctx: VerificationContext<'_>,
    ) -> LedgerResult<VerificationId> {
        if !ctx.auth.is_authorized(caller) {
            tracing::warn!(%caller, project_id = submission.project_id, "unauthorized verification attempt");
            return Err(LedgerError::Unauthorized {
                caller: caller.clone(),
            });
        }

        let project = ctx.projects.get_project(submission.project_id)?;
        if project.verified {
            return Err(LedgerError::AlreadyVerified {
                project_id: project.id,
            });
        }
        if submission.credits_claimed == 0 {
            return Err(LedgerError::InvalidInput(
                "claimed credits must be greater than zero".into(),
            ));
        }
        if self.pending_for(project.id).is_some() {
            return Err(LedgerError::InvalidInput(format!(
                "project {} already has a verification awaiting approval",
                project.id
            )));
        }

        let now = Utc::now();
        let record = VerificationRecord {
            id: self.next_id,
            project_id: project.id,
            verifier: caller.clone(),
            credits_claimed: submission.credits_claimed,
            submitted_at: now,
            evidence_ref: submission.evidence_ref,
            approved: false,
            approved_at: None,
            confirmations: vec![caller.clone()],
        };

        let approved = policy.approves(&record, ctx.auth);
        if approved {
            ctx.credits
                .ensure_mintable(&project.owner, record.credits_claimed)?;
        }

        let id = record.id;
        ctx.events.emit(LedgerEvent::VerificationSubmitted {
            verification_id: id,
            project_id: record.project_id,
            verifier: caller.clone(),
            credits_claimed: record.credits_claimed,
        });
        self.insert(record);
        self.next_id += 1;

        if approved {
            self.approve(id, ctx)?;
        } else {
            tracing::info!(verification_id = id, "verification pending further approval");
        }
        Ok(id)
    }

    /// Adds `caller`'s confirmation to a pending claim and re-runs the policy.
    ///
    /// Returns `true` once the claim is approved. Idempotent: confirming an
    /// already-approved claim is a no-op that returns `true`.
    pub fn approve_pending(
        &mut self,
        caller: &Identity,
        verification_id: VerificationId,
        policy: &dyn ApprovalPolicy,
        ctx: VerificationContext<'_>,
    ) -> LedgerResult<bool> {
        if !ctx.auth.is_authorized(caller) {
            return Err(LedgerError::Unauthorized {
                caller: caller.clone(),
            });
        }
        let record = self.get_verification(verification_id)?;
        if record.approved {
            return Ok(true);
        }

        let mut confirmed = record.clone();
        if !confirmed.confirmations.contains(caller) {
            confirmed.confirmations.push(caller.clone());
        }
        let approved = policy.approves(&confirmed, ctx.auth);
        if approved {
            let owner = ctx.projects.get_project(confirmed.project_id)?.owner.clone();
            ctx.credits
                .ensure_mintable(&owner, confirmed.credits_claimed)?;
        }

        self.records.insert(verification_id, confirmed);
        if approved {
            self.approve(verification_id, ctx)?;
        }
        Ok(approved)
    }

    /// The approval step: verify the project, fix its credits, and mint.
    ///
    /// Idempotent on the record. Callers have already run every mint check.
    fn approve(
        &mut self,
        verification_id: VerificationId,
        ctx: VerificationContext<'_>,
    ) -> LedgerResult<()> {
        let record = self.get_verification(verification_id)?;
        if record.approved {
            return Ok(());
        }
        let project_id = record.project_id;
        let credits = record.credits_claimed;

        let project = ctx.projects.get_project(project_id)?;
        if project.verified {
            return Err(LedgerError::AlreadyVerified { project_id });
        }
        let owner = project.owner.clone();
        ctx.credits.ensure_mintable(&owner, credits)?;

        let now = Utc::now();
        ctx.projects.mark_verified(project_id, credits, now)?;
        ctx.credits.mint(&owner, credits, ctx.events)?;

        if let Some(record) = self.records.get_mut(&verification_id) {
            record.approved = true;
            record.approved_at = Some(now);
        }

        tracing::info!(project_id, verification_id, credits, %owner, "project verified");
        ctx.events.emit(LedgerEvent::ProjectVerified {
            project_id,
            verification_id,
            credits_issued: credits,
        });
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if no record has this id.
    pub fn get_verification(&self, id: VerificationId) -> LedgerResult<&VerificationRecord> {
        self.records.get(&id).ok_or(LedgerError::NotFound {
            kind: EntityKind::Verification,
            id,
        })
    }

    /// All claims ever submitted for a project, oldest first.
    pub fn verifications_for_project(&self, project_id: ProjectId) -> Vec<&VerificationRecord> {
        self.by_project
            .get(&project_id)
            .map(|ids| ids.iter().filter_map(|id| self.records.get(id)).collect())
            .unwrap_or_default()
    }

    /// Current lifecycle state of a project.
    pub fn verification_state(
        &self,
        projects: &ProjectRegistry,
        project_id: ProjectId,
    ) -> LedgerResult<VerificationState> {
        let project = projects.get_project(project_id)?;
        if project.verified {
            return Ok(VerificationState::Verified);
        }
        Ok(match self.pending_for(project_id) {
            Some(_) => VerificationState::PendingApproval,
            None => VerificationState::Unverified,
        })
    }

    /// All records in id order.
    pub fn records(&self) -> impl Iterator<Item = &VerificationRecord> {
        self.records.values()
    }

    pub fn next_id(&self) -> VerificationId {
        self.next_id
    }

    fn pending_for(&self, project_id: ProjectId) -> Option<&VerificationRecord> {
        self.verifications_for_project(project_id)
            .into_iter()
            .find(|record| !record.approved)
    }

    fn insert(&mut self, record: VerificationRecord) {
        self.by_project
            .entry(record.project_id)
            .or_default()
            .push(record.id);
        self.records.insert(record.id, record);
    }
}

impl Default for VerificationWorkflow {
    fn default() -> Self {
        Self::new()
    }
}
