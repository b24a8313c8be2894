//! # Coastal Ecosystem Classification
//!
//! Every project restores exactly one kind of blue-carbon ecosystem. The
//! classification drives the credit multiplier callers use to sanity-check
//! a verifier's claim before it is submitted.
//!
//! The carbon arithmetic here mirrors the field-analysis pipeline: dry
//! biomass density is converted to carbon content (47%), and carbon to CO₂
//! equivalent (×3.67).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{
    BIOMASS_CARBON_FRACTION, CO2_PER_CARBON, MANGROVE_CREDITS_PER_M2, SALT_MARSH_CREDITS_PER_M2,
    SEAGRASS_CREDITS_PER_M2,
};

/// Returned when an ecosystem name is not one of the three supported kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown ecosystem type: {0} (expected mangrove, seagrass, or salt-marsh)")]
pub struct UnknownEcosystem(pub String);

/// The restoration-site classification. Fixed; there is no "other".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EcosystemType {
    Mangrove,
    Seagrass,
    SaltMarsh,
}

impl EcosystemType {
    /// All supported ecosystems, in declaration order.
    pub const ALL: [EcosystemType; 3] = [
        EcosystemType::Mangrove,
        EcosystemType::Seagrass,
        EcosystemType::SaltMarsh,
    ];

    /// Credits issued per square meter of restored area.
    pub fn credits_per_m2(self) -> u64 {
        match self {
            EcosystemType::Mangrove => MANGROVE_CREDITS_PER_M2,
            EcosystemType::Seagrass => SEAGRASS_CREDITS_PER_M2,
            EcosystemType::SaltMarsh => SALT_MARSH_CREDITS_PER_M2,
        }
    }

    /// Credits a project of `area_m2` would be expected to claim.
    ///
    /// Saturates at `u64::MAX` rather than wrapping; an area that large is
    /// nonsense anyway and will be rejected by the verifier.
    pub fn estimate_credits(self, area_m2: u64) -> u64 {
        area_m2.saturating_mul(self.credits_per_m2())
    }
}

impl fmt::Display for EcosystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcosystemType::Mangrove => write!(f, "mangrove"),
            EcosystemType::Seagrass => write!(f, "seagrass"),
            EcosystemType::SaltMarsh => write!(f, "salt-marsh"),
        }
    }
}

impl FromStr for EcosystemType {
    type Err = UnknownEcosystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "mangrove" => Ok(EcosystemType::Mangrove),
            "seagrass" => Ok(EcosystemType::Seagrass),
            "salt-marsh" | "saltmarsh" => Ok(EcosystemType::SaltMarsh),
            _ => Err(UnknownEcosystem(s.to_string())),
        }
    }
}

/// Carbon stock derived from a biomass density reading over an area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarbonEstimate {
    /// Total dry biomass over the area, in kilograms.
    pub biomass_kg: f64,
    /// Carbon content of that biomass, in kilograms.
    pub carbon_kg: f64,
    /// CO₂ equivalent of the carbon content, in kilograms.
    pub co2e_kg: f64,
}

impl CarbonEstimate {
    /// Scales a per-square-meter biomass density to the whole site.
    ///
    /// Negative or non-finite densities are treated as zero.
    pub fn from_biomass(biomass_kg_per_m2: f64, area_m2: u64) -> Self {
        let density = if biomass_kg_per_m2.is_finite() && biomass_kg_per_m2 > 0.0 {
            biomass_kg_per_m2
        } else {
            0.0
        };
        let biomass_kg = density * area_m2 as f64;
        let carbon_kg = biomass_kg * BIOMASS_CARBON_FRACTION;
        Self {
            biomass_kg,
            carbon_kg,
            co2e_kg: carbon_kg * CO2_PER_CARBON,
        }
    }

    /// CO₂ equivalent in whole metric tonnes, rounded down.
    pub fn co2e_tonnes(&self) -> u64 {
        (self.co2e_kg / 1_000.0).floor() as u64
    }
}
