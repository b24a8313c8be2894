// Copyright (c) 2026 Blue Carbon Registry Contributors. MIT License.
// See LICENSE for details.

//! # Blue Carbon Registry Accounting Core
//!
//! Ledger logic for coastal-ecosystem restoration projects. These components
//! turn verified restoration work into tradeable credits and route the
//! resale revenue back to the people doing the work:
//!
//! - **Authorization Registry**: the registry owner and the verifier roster.
//! - **Project Registry**: mangrove, seagrass, and salt-marsh restoration
//!   sites with their area and ownership.
//! - **Verification Workflow**: a verifier's claim becomes a verified
//!   project and freshly minted credits, in one atomic step.
//! - **Credit Ledger**: fungible balances, holder transfers, and a pause
//!   switch.
//! - **Revenue Distribution Engine**: basis-point splits of project revenue
//!   between an NGO, the local community, and the government.
//!
//! [`CarbonLedger`] composes all five; [`LedgerHandle`] shares one across
//! threads.
//!
//! ## Design Principles
//!
//! 1. Every amount is a `u64` and every addition is checked. Overflow is an
//!    error, not a wrap.
//! 2. No operation partially commits. Preconditions are checked before the
//!    first write, and a distribution or withdrawal commits only after its
//!    payout succeeds.
//! 3. Credits are only ever minted by the verification approval step.
//! 4. Every persistent type is serde-serializable for storage and export.

pub mod authorization;
pub mod carbon_credit;
pub mod error;
pub mod events;
pub mod handle;
pub mod ledger;
pub mod payout;
pub mod project_registry;
pub mod revenue_distribution;
pub mod verification;

pub use authorization::AuthorizationRegistry;
pub use carbon_credit::CreditLedger;
pub use error::{EntityKind, LedgerError, LedgerResult};
pub use events::{EventEnvelope, EventLog, LedgerEvent};
pub use handle::LedgerHandle;
pub use ledger::{CarbonLedger, LedgerSnapshot};
pub use payout::{pay_guarded, InMemoryRail, Payout, PayoutError, PayoutRail};
pub use project_registry::{NewProject, Project, ProjectId, ProjectRegistry};
pub use revenue_distribution::{
    DistributionReceipt, DistributionRecord, PendingDistribution, RevenueDistributionEngine,
    RevenueShare, RevenueShareId, ShareSplit, StakeholderCategory, Stakeholders,
    WithdrawalRecord,
};
pub use verification::{
    ApprovalPolicy, SingleVerifierApproval, VerificationId, VerificationRecord,
    VerificationState, VerificationSubmission, VerificationWorkflow,
};
