// Copyright (c) 2026 Blue Carbon Registry Contributors. MIT License.
// See LICENSE for details.

//! # Blue Carbon Registry Operator
//!
//! Entry point for the `bluecarbon` binary. Parses CLI arguments,
//! initializes logging, loads the registry from its sled store, runs one
//! command against it, and commits the result atomically.
//!
//! Each invocation is one transaction: the command either succeeds and its
//! full effect is committed, or it fails and nothing on disk changes.
//! Payouts are announced only after the commit lands.

mod cli;
mod logging;
mod metrics;
mod rail;
mod store;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use bluecarbon_contracts::{
    CarbonLedger, NewProject, ShareSplit, Stakeholders, VerificationSubmission,
};
use bluecarbon_protocol::config::{CREDIT_NAME, CREDIT_SYMBOL, PROTOCOL_VERSION};
use bluecarbon_protocol::{CarbonEstimate, Identity};

use cli::{
    BlueCarbonCli, Commands, CreditsCommand, EstimateArgs, InitArgs, ProjectCommand,
    RevenueCommand, SplitArgs, VerifierCommand, VerifyCommand,
};
use metrics::LedgerMetrics;
use rail::QueuedRail;
use store::LedgerStore;

fn main() -> Result<()> {
    let BlueCarbonCli {
        data_dir,
        caller,
        log_format,
        log_level,
        command,
    } = BlueCarbonCli::parse();

    logging::init_logging(&log_level, log_format)?;

    match command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Estimate(args) => estimate(args),
        Commands::Init(args) => init_registry(&data_dir, caller, args),
        command => run_command(&data_dir, caller.as_ref(), command),
    }
}

/// Opens the store under `data_dir`, creating the directory if needed.
fn open_store(data_dir: &Path) -> Result<LedgerStore> {
    let db_path: PathBuf = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let store = LedgerStore::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database opened");
    Ok(store)
}

/// Creates an empty registry owned by `--owner` (or the caller).
fn init_registry(data_dir: &Path, caller: Option<Identity>, args: InitArgs) -> Result<()> {
    let owner = args
        .owner
        .or(caller)
        .ok_or_else(|| anyhow!("no owner given; pass --owner or --as"))?;
    if owner.is_null() {
        return Err(anyhow!("the registry owner must not be the null identity"));
    }

    let store = open_store(data_dir)?;
    store
        .initialize(owner.clone())
        .with_context(|| format!("failed to initialize registry in {}", data_dir.display()))?;

    tracing::info!(%owner, data_dir = %data_dir.display(), "registry initialized");
    println!("Registry initialized.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Owner          : {}", owner);
    Ok(())
}

/// Loads the registry, runs `command`, and commits if anything changed.
fn run_command(data_dir: &Path, caller: Option<&Identity>, command: Commands) -> Result<()> {
    let store = open_store(data_dir)?;
    let mut ledger = store
        .load_ledger()
        .with_context(|| format!("failed to load registry from {}", data_dir.display()))?;

    if let Commands::Metrics = command {
        return print_metrics(&store, &ledger);
    }

    let mut rail = QueuedRail::new();
    let changed = match execute(&mut ledger, caller, command, &mut rail) {
        Ok(changed) => changed,
        Err(err) => {
            rail.discard();
            return Err(err);
        }
    };
    if changed {
        if let Err(err) = store.commit(&ledger.snapshot(), ledger.pending_events()) {
            rail.discard();
            return Err(anyhow::Error::new(err).context("failed to commit registry state"));
        }
    }

    let payouts = rail.settle();
    let events = ledger.drain_events();
    tracing::debug!(events = events.len(), payouts, committed = changed, "command finished");
    Ok(())
}

fn print_metrics(store: &LedgerStore, ledger: &CarbonLedger) -> Result<()> {
    let metrics = LedgerMetrics::new().context("failed to create metrics registry")?;
    metrics.observe(ledger);
    metrics.observe_event_counts(&store.event_counts().context("failed to read event counts")?);
    print!("{}", metrics.encode().context("failed to encode metrics")?);
    Ok(())
}

fn require_caller(caller: Option<&Identity>) -> Result<&Identity> {
    caller.ok_or_else(|| anyhow!("this command needs a caller identity; pass --as or set BLUECARBON_IDENTITY"))
}

fn split(args: SplitArgs) -> ShareSplit {
    ShareSplit::new(args.ngo_bps, args.community_bps, args.government_bps)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Runs one command. Returns whether the ledger changed.
fn execute(
    ledger: &mut CarbonLedger,
    caller: Option<&Identity>,
    command: Commands,
    rail: &mut QueuedRail,
) -> Result<bool> {
    match command {
        Commands::Project(ProjectCommand::Create(args)) => {
            let caller = require_caller(caller)?;
            let id = ledger
                .create_project(
                    caller,
                    NewProject {
                        name: args.name,
                        location: args.location,
                        total_area_m2: args.area,
                        ecosystem: args.ecosystem,
                        metadata_ref: args.metadata,
                    },
                )
                .context("project create failed")?;
            println!("{}", id);
            Ok(true)
        }
        Commands::Project(ProjectCommand::Show { project_id }) => {
            print_json(ledger.get_project(project_id)?)?;
            Ok(false)
        }
        Commands::Project(ProjectCommand::List { owner }) => {
            let owner = match owner {
                Some(owner) => owner,
                None => require_caller(caller)?.clone(),
            };
            for id in ledger.list_projects_by_owner(&owner) {
                println!("{}", id);
            }
            Ok(false)
        }

        Commands::Verifier(VerifierCommand::Set { verifier, revoke }) => {
            let caller = require_caller(caller)?;
            ledger
                .set_verifier_status(caller, &verifier, !revoke)
                .context("verifier update failed")?;
            println!("{} {}", verifier, if revoke { "revoked" } else { "authorized" });
            Ok(true)
        }
        Commands::Verifier(VerifierCommand::List) => {
            for verifier in ledger.authorization().authorized_verifiers() {
                println!("{}", verifier);
            }
            Ok(false)
        }

        Commands::Verify(VerifyCommand::Submit {
            project_id,
            credits,
            evidence,
        }) => {
            let caller = require_caller(caller)?;
            let id = ledger
                .submit_verification(
                    caller,
                    VerificationSubmission {
                        project_id,
                        credits_claimed: credits,
                        evidence_ref: evidence,
                    },
                )
                .context("verification submit failed")?;
            println!(
                "verification {} recorded; project {} is {}",
                id,
                project_id,
                ledger.verification_state(project_id)?
            );
            Ok(true)
        }
        Commands::Verify(VerifyCommand::Approve { verification_id }) => {
            let caller = require_caller(caller)?;
            let approved = ledger
                .approve_pending(caller, verification_id)
                .context("verification approve failed")?;
            println!(
                "verification {} {}",
                verification_id,
                if approved { "approved" } else { "still pending" }
            );
            Ok(true)
        }
        Commands::Verify(VerifyCommand::Show { verification_id }) => {
            print_json(ledger.get_verification(verification_id)?)?;
            Ok(false)
        }

        Commands::Credits(CreditsCommand::Balance { holder }) => {
            let holder = match holder {
                Some(holder) => holder,
                None => require_caller(caller)?.clone(),
            };
            println!("{} {}", ledger.balance_of(&holder), CREDIT_SYMBOL);
            Ok(false)
        }
        Commands::Credits(CreditsCommand::Transfer { to, amount }) => {
            let caller = require_caller(caller)?;
            ledger
                .transfer(caller, &to, amount)
                .context("credit transfer failed")?;
            println!("sent {} {} to {}", amount, CREDIT_SYMBOL, to);
            Ok(true)
        }
        Commands::Credits(CreditsCommand::Pause) => {
            ledger.pause(require_caller(caller)?).context("pause failed")?;
            println!("credit ledger paused");
            Ok(true)
        }
        Commands::Credits(CreditsCommand::Unpause) => {
            ledger
                .unpause(require_caller(caller)?)
                .context("unpause failed")?;
            println!("credit ledger resumed");
            Ok(true)
        }

        Commands::Revenue(command) => revenue(ledger, require_caller(caller), command, rail),

        Commands::Withdraw => {
            let caller = require_caller(caller)?;
            let swept = ledger
                .emergency_withdraw(caller, &mut *rail)
                .context("emergency withdrawal failed")?;
            println!("swept {} to {}", swept, caller);
            Ok(swept > 0)
        }

        Commands::Status => {
            print_status(ledger);
            Ok(false)
        }

        // Handled by `main` and `run_command` before this point.
        Commands::Metrics | Commands::Init(_) | Commands::Estimate(_) | Commands::Version => {
            Ok(false)
        }
    }
}

fn revenue(
    ledger: &mut CarbonLedger,
    caller: Result<&Identity>,
    command: RevenueCommand,
    rail: &mut QueuedRail,
) -> Result<bool> {
    match command {
        RevenueCommand::Create {
            project_id,
            ngo,
            community,
            government,
            split: args,
        } => {
            let id = ledger
                .create_revenue_share(
                    caller?,
                    project_id,
                    Stakeholders {
                        ngo,
                        community,
                        government,
                    },
                    split(args),
                )
                .context("revenue share create failed")?;
            println!("{}", id);
            Ok(true)
        }
        RevenueCommand::Update {
            share_id,
            split: args,
        } => {
            ledger
                .update_revenue_share(caller?, share_id, split(args))
                .context("revenue share update failed")?;
            println!("revenue share {} updated", share_id);
            Ok(true)
        }
        RevenueCommand::Activate { share_id } => {
            ledger
                .set_share_active(caller?, share_id, true)
                .context("revenue share activate failed")?;
            println!("revenue share {} active", share_id);
            Ok(true)
        }
        RevenueCommand::Deactivate { share_id } => {
            ledger
                .set_share_active(caller?, share_id, false)
                .context("revenue share deactivate failed")?;
            println!("revenue share {} inactive", share_id);
            Ok(true)
        }
        RevenueCommand::Add { share_id, amount } => {
            ledger
                .add_revenue(caller?, share_id, amount)
                .context("add revenue failed")?;
            let share = ledger.get_revenue_share(share_id)?;
            println!(
                "revenue share {}: total {}, available {}",
                share_id,
                share.total_revenue,
                share.available()
            );
            Ok(true)
        }
        RevenueCommand::Distribute { share_id } => {
            let receipt = ledger
                .distribute_revenue(caller?, share_id, &mut *rail)
                .context("distribution failed")?;
            for record in &receipt.records {
                println!("{:<17} {:>20} {}", record.description(), record.amount, record.recipient);
            }
            println!("paid {}, remaining {}", receipt.total_paid, receipt.remaining);
            tracing::debug!(share_id, queued = rail.queued().len(), "distribution recorded");
            Ok(true)
        }
        RevenueCommand::Preview { share_id } => {
            print_json(&ledger.get_pending_distribution(share_id)?)?;
            Ok(false)
        }
        RevenueCommand::Show { share_id } => {
            let share = ledger.get_revenue_share(share_id)?;
            let distributions = ledger.revenue_engine().distributions_for(share_id);
            print_json(&serde_json::json!({
                "share": share,
                "available": share.available(),
                "distributions": distributions,
            }))?;
            Ok(false)
        }
    }
}

fn estimate(args: EstimateArgs) -> Result<()> {
    let credits = args.ecosystem.estimate_credits(args.area);
    println!(
        "{} m² of {} -> {} {}",
        args.area, args.ecosystem, credits, CREDIT_SYMBOL
    );
    if let Some(density) = args.biomass {
        let carbon = CarbonEstimate::from_biomass(density, args.area);
        println!("  biomass : {:.1} kg", carbon.biomass_kg);
        println!("  carbon  : {:.1} kg", carbon.carbon_kg);
        println!("  CO2e    : {:.1} kg ({} t)", carbon.co2e_kg, carbon.co2e_tonnes());
    }
    Ok(())
}

fn print_status(ledger: &CarbonLedger) {
    let projects = ledger.project_registry();
    let engine = ledger.revenue_engine();
    println!("owner              : {}", ledger.owner());
    println!(
        "projects           : {} ({} verified)",
        projects.project_count(),
        projects.projects().filter(|p| p.verified).count()
    );
    println!(
        "verifiers          : {}",
        ledger.authorization().authorized_verifiers().len()
    );
    println!(
        "credit supply      : {} {}{}",
        ledger.total_supply(),
        CREDIT_SYMBOL,
        if ledger.is_paused() { " (paused)" } else { "" }
    );
    println!("revenue shares     : {}", engine.shares().count());
    println!("revenue held       : {}", engine.held_balance());
    println!("distributions      : {}", engine.distributions().count());
    println!("withdrawals        : {}", engine.withdrawals().len());
}

/// Prints version information to stdout.
fn print_version() {
    println!("bluecarbon {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", PROTOCOL_VERSION);
    println!("credit     {} ({})", CREDIT_NAME, CREDIT_SYMBOL);
}
