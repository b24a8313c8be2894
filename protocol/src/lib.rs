// Copyright (c) 2026 Blue Carbon Registry Contributors. MIT License.
// See LICENSE for details.

//! # Blue Carbon Protocol: Shared Foundations
//!
//! The small set of types every other crate in the workspace agrees on:
//!
//! - **config**: Registry constants: basis-point denominators, credit
//!   multipliers per ecosystem, carbon conversion factors.
//! - **identity**: The opaque, comparable caller identity.
//! - **ecosystem**: The fixed restoration-site classification and the
//!   arithmetic that turns area or biomass into credits and CO₂e.
//!
//! Nothing in here mutates ledger state. The accounting core lives in
//! `bluecarbon-contracts`.

pub mod config;
pub mod ecosystem;
pub mod identity;

pub use ecosystem::{CarbonEstimate, EcosystemType};
pub use identity::Identity;
