//! # CLI Interface
//!
//! Defines the command-line argument structure for `bluecarbon` using
//! `clap` derive. Every command operates on the registry stored under
//! `--data-dir` and acts as the identity given by `--as`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use bluecarbon_protocol::config::DEFAULT_DATA_DIR;
use bluecarbon_protocol::{EcosystemType, Identity};

use crate::logging::LogFormat;

/// Blue Carbon registry operator.
///
/// Registers coastal restoration projects, records verifications that mint
/// Blue Carbon Credits, and distributes project revenue to NGO, community,
/// and government stakeholders.
#[derive(Parser, Debug)]
#[command(
    name = "bluecarbon",
    about = "Blue Carbon registry operator",
    version,
    propagate_version = true
)]
pub struct BlueCarbonCli {
    /// Directory holding the registry database.
    #[arg(long, short = 'd', env = "BLUECARBON_DATA_DIR", default_value = DEFAULT_DATA_DIR, global = true)]
    pub data_dir: PathBuf,

    /// Identity to act as. Required for every command that changes state.
    #[arg(
        long = "as",
        env = "BLUECARBON_IDENTITY",
        global = true,
        value_parser = Identity::from_str
    )]
    pub caller: Option<Identity>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, default_value = "bluecarbon=info,bluecarbon_contracts=info", global = true)]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new, empty registry in the data directory.
    Init(InitArgs),
    /// Register and inspect restoration projects.
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Grant or revoke verifier status (owner only).
    #[command(subcommand)]
    Verifier(VerifierCommand),
    /// Submit and inspect verifications.
    #[command(subcommand)]
    Verify(VerifyCommand),
    /// Estimate credits (and optionally CO2e) for a site without touching the registry.
    Estimate(EstimateArgs),
    /// Credit balances, transfers, and the pause switch.
    #[command(subcommand)]
    Credits(CreditsCommand),
    /// Revenue shares and distributions.
    #[command(subcommand)]
    Revenue(RevenueCommand),
    /// Sweep all undistributed revenue to the owner (owner only).
    Withdraw,
    /// Print a summary of the registry.
    Status,
    /// Print registry metrics in Prometheus text format.
    Metrics,
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Registry owner. Defaults to the `--as` identity.
    #[arg(long, value_parser = Identity::from_str)]
    pub owner: Option<Identity>,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Register a new project owned by the caller.
    Create(ProjectCreateArgs),
    /// Show one project as JSON.
    Show {
        project_id: u64,
    },
    /// List project ids owned by an identity (default: the caller).
    List {
        #[arg(long, value_parser = Identity::from_str)]
        owner: Option<Identity>,
    },
}

#[derive(Args, Debug)]
pub struct ProjectCreateArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub location: String,

    /// Restored area in square meters.
    #[arg(long)]
    pub area: u64,

    /// mangrove, seagrass, or salt-marsh.
    #[arg(long)]
    pub ecosystem: EcosystemType,

    /// Content address of the project documents.
    #[arg(long, default_value = "")]
    pub metadata: String,
}

#[derive(Subcommand, Debug)]
pub enum VerifierCommand {
    /// Authorize a verifier, or revoke with `--revoke`.
    Set {
        #[arg(value_parser = Identity::from_str)]
        verifier: Identity,

        #[arg(long)]
        revoke: bool,
    },
    /// List currently authorized verifiers.
    List,
}

#[derive(Subcommand, Debug)]
pub enum VerifyCommand {
    /// Submit a verification claim for a project.
    Submit {
        project_id: u64,

        /// Credits to issue to the project owner.
        #[arg(long)]
        credits: u64,

        /// Content address of the evidence bundle.
        #[arg(long, default_value = "")]
        evidence: String,
    },
    /// Confirm a claim that is still awaiting approval.
    Approve {
        verification_id: u64,
    },
    /// Show one verification record as JSON.
    Show {
        verification_id: u64,
    },
}

#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Area in square meters.
    #[arg(long)]
    pub area: u64,

    #[arg(long)]
    pub ecosystem: EcosystemType,

    /// Measured biomass density in kg/m², for a CO2e estimate.
    #[arg(long)]
    pub biomass: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum CreditsCommand {
    /// Balance of an identity (default: the caller).
    Balance {
        #[arg(value_parser = Identity::from_str)]
        holder: Option<Identity>,
    },
    /// Send credits from the caller to another holder.
    Transfer {
        #[arg(value_parser = Identity::from_str)]
        to: Identity,
        amount: u64,
    },
    /// Suspend mint and transfer (owner only).
    Pause,
    /// Resume mint and transfer (owner only).
    Unpause,
}

/// Basis-point split. Must sum to 10000.
#[derive(Args, Debug, Clone, Copy)]
pub struct SplitArgs {
    #[arg(long)]
    pub ngo_bps: u16,

    #[arg(long)]
    pub community_bps: u16,

    #[arg(long)]
    pub government_bps: u16,
}

#[derive(Subcommand, Debug)]
pub enum RevenueCommand {
    /// Configure a revenue share for a project (owner only).
    Create {
        project_id: u64,

        #[arg(long, value_parser = Identity::from_str)]
        ngo: Identity,

        #[arg(long, value_parser = Identity::from_str)]
        community: Identity,

        #[arg(long, value_parser = Identity::from_str)]
        government: Identity,

        #[command(flatten)]
        split: SplitArgs,
    },
    /// Change a share's percentages (owner only).
    Update {
        share_id: u64,

        #[command(flatten)]
        split: SplitArgs,
    },
    /// Re-enable a deactivated share (owner only).
    Activate {
        share_id: u64,
    },
    /// Stop a share from accepting revenue or distributing (owner only).
    Deactivate {
        share_id: u64,
    },
    /// Record revenue from a sale (owner only).
    Add {
        share_id: u64,
        amount: u64,
    },
    /// Pay out everything available on a share (owner only).
    Distribute {
        share_id: u64,
    },
    /// Show what a distribution would pay right now.
    Preview {
        share_id: u64,
    },
    /// Show a share and its distribution history as JSON.
    Show {
        share_id: u64,
    },
}
