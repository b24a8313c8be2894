//! # Registry Configuration & Constants
//!
//! Every fixed number the registry relies on lives here. Changing any of
//! them changes how credits are estimated or how revenue is split, so treat
//! edits as protocol changes, not tuning.

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Registry protocol version reported by the node binary.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Ticker for the fungible credit unit issued against verified projects.
pub const CREDIT_SYMBOL: &str = "BCC";

/// Human-readable name of the credit unit.
pub const CREDIT_NAME: &str = "Blue Carbon Credit";

// ---------------------------------------------------------------------------
// Revenue Splits
// ---------------------------------------------------------------------------

/// Basis points in a whole. 10_000 bp = 100%.
///
/// Every revenue share must split to exactly this value. Not 9_999,
/// not 10_001.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Upper bound for any single stakeholder's share.
pub const MAX_SHARE_BPS: u16 = 10_000;

/// Distribution record labels, one per stakeholder category.
pub const NGO_SHARE_LABEL: &str = "NGO Share";
pub const COMMUNITY_SHARE_LABEL: &str = "Community Share";
pub const GOVERNMENT_SHARE_LABEL: &str = "Government Share";

// ---------------------------------------------------------------------------
// Credit Estimation
// ---------------------------------------------------------------------------

/// Credits per square meter of restored mangrove forest.
///
/// Mangroves store roughly twice the carbon of the other coastal
/// ecosystems per unit area, hence the doubled multiplier.
pub const MANGROVE_CREDITS_PER_M2: u64 = 2;

/// Credits per square meter of seagrass meadow.
pub const SEAGRASS_CREDITS_PER_M2: u64 = 1;

/// Credits per square meter of salt marsh.
pub const SALT_MARSH_CREDITS_PER_M2: u64 = 1;

// ---------------------------------------------------------------------------
// Carbon Conversion
// ---------------------------------------------------------------------------

/// Fraction of dry biomass that is carbon. Field literature puts it at
/// 45–50%; 0.47 is the working value.
pub const BIOMASS_CARBON_FRACTION: f64 = 0.47;

/// Molecular weight ratio CO₂ / C (44 / 12).
pub const CO2_PER_CARBON: f64 = 3.67;

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Optional prefix accepted on hex-style identities (`0x…`).
pub const HEX_IDENTITY_PREFIX: &str = "0x";

/// Default on-disk location for the node's ledger database.
pub const DEFAULT_DATA_DIR: &str = ".bluecarbon";
