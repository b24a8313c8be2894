//! # Ledger Errors
//!
//! One error type for the whole accounting core. Every variant is a rejected
//! operation, never a crash: the call failed, state is exactly as it was
//! before, and the caller decides whether to surface it or retry.

use bluecarbon_protocol::Identity;
use thiserror::Error;

/// The kind of record a [`LedgerError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Verification,
    RevenueShare,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Project => write!(f, "project"),
            EntityKind::Verification => write!(f, "verification"),
            EntityKind::RevenueShare => write!(f, "revenue share"),
        }
    }
}

/// Errors returned by every operation in the accounting core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The caller is not the registry owner.
    #[error("not owner: {caller} is not the registry owner")]
    NotOwner {
        /// The identity that attempted the privileged call.
        caller: Identity,
    },

    /// The caller is not an authorized verifier.
    #[error("unauthorized: {caller} is not an authorized verifier")]
    Unauthorized {
        /// The identity that attempted the verification.
        caller: Identity,
    },

    /// The referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Which table was searched.
        kind: EntityKind,
        /// The id that was looked up.
        id: u64,
    },

    /// A required field was missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An amount that must be positive was zero.
    #[error("invalid amount: {amount} (must be greater than zero)")]
    InvalidAmount {
        /// The rejected amount.
        amount: u64,
    },

    /// Basis-point shares did not sum to exactly 10 000.
    #[error("invalid shares: basis points sum to {sum}, expected 10000")]
    InvalidShares {
        /// The sum that was supplied.
        sum: u32,
    },

    /// The project has already been verified and credited.
    #[error("project {project_id} is already verified")]
    AlreadyVerified {
        /// The project that was targeted.
        project_id: u64,
    },

    /// The revenue share has been deactivated.
    #[error("revenue share {share_id} is inactive")]
    Inactive {
        /// The deactivated share.
        share_id: u64,
    },

    /// The sender does not hold enough credits.
    #[error("insufficient balance: account has {balance}, tried to move {requested}")]
    InsufficientBalance {
        /// Current balance of the sender.
        balance: u64,
        /// Amount the sender tried to move.
        requested: u64,
    },

    /// The credit ledger is paused; mint and transfer are suspended.
    #[error("credit ledger is paused")]
    Paused,

    /// Nothing is available to pay out for this share.
    #[error("nothing to distribute for revenue share {share_id}")]
    NothingToDistribute {
        /// The share that was targeted.
        share_id: u64,
    },

    /// An amount would exceed `u64::MAX`.
    #[error("amount overflow: operation would exceed u64::MAX")]
    Overflow,

    /// A distribution for this share is already waiting on its payout rail.
    #[error("revenue share {share_id} already has a distribution in flight")]
    ReentrantDistribution {
        /// The share with an in-flight payout.
        share_id: u64,
    },

    /// An emergency withdrawal is waiting on its payout rail.
    #[error("an emergency withdrawal is already in flight")]
    WithdrawalInFlight,

    /// The external payout rail rejected the batch. Nothing was committed.
    #[error("payout failed: {reason}")]
    PayoutFailed {
        /// The rail's explanation.
        reason: String,
    },
}

impl LedgerError {
    /// Stable machine-readable code, suitable for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotOwner { .. } => "NotOwner",
            LedgerError::Unauthorized { .. } => "Unauthorized",
            LedgerError::NotFound { .. } => "NotFound",
            LedgerError::InvalidInput(_) => "InvalidInput",
            LedgerError::InvalidAmount { .. } => "InvalidAmount",
            LedgerError::InvalidShares { .. } => "InvalidShares",
            LedgerError::AlreadyVerified { .. } => "AlreadyVerified",
            LedgerError::Inactive { .. } => "Inactive",
            LedgerError::InsufficientBalance { .. } => "InsufficientBalance",
            LedgerError::Paused => "Paused",
            LedgerError::NothingToDistribute { .. } => "NothingToDistribute",
            LedgerError::Overflow => "Overflow",
            LedgerError::ReentrantDistribution { .. } => "ReentrantDistribution",
            LedgerError::WithdrawalInFlight => "WithdrawalInFlight",
            LedgerError::PayoutFailed { .. } => "PayoutFailed",
        }
    }
}

/// Shorthand used throughout the crate.
pub type LedgerResult<T> = Result<T, LedgerError>;
