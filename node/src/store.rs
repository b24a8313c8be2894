//! # LedgerStore: Persistent Registry State
//!
//! The on-disk home of a [`CarbonLedger`], built on sled's embedded
//! key-value store.
//!
//! ## Key Layout
//!
//! Everything lives in one sled tree, `ledger`, split into tables by key
//! prefix:
//!
//! | Prefix           | Key suffix           | Value                        |
//! |------------------|----------------------|------------------------------|
//! | `project/`       | id (8B BE)           | `bincode(Project)`           |
//! | `verification/`  | id (8B BE)           | `bincode(VerificationRecord)`|
//! | `revenue_share/` | id (8B BE)           | `bincode(RevenueShare)`      |
//! | `distribution/`  | id (8B BE)           | `bincode(DistributionRecord)`|
//! | `withdrawal/`    | id (8B BE)           | `bincode(WithdrawalRecord)`  |
//! | `balance/`       | identity (UTF-8)     | `bincode(u64)`               |
//! | `verifier/`      | identity (UTF-8)     | `bincode(bool)`              |
//! | `meta/`          | name (UTF-8)         | see `META_*` keys            |
//!
//! Ids are big-endian so that sled's lexicographic order is numeric order.
//! `meta/event_counts` keeps a running count of committed events per kind,
//! which `bluecarbon metrics` exports.
//!
//! ## Atomicity
//!
//! A commit writes the full snapshot, and clears rows that no longer exist,
//! in a single `Batch` on a single tree. Either the whole ledger state lands
//! on disk or none of it does.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::{Batch, Db, Tree};

use bluecarbon_contracts::revenue_distribution::EngineCounters;
use bluecarbon_contracts::{CarbonLedger, EventEnvelope, LedgerError, LedgerSnapshot};
use bluecarbon_protocol::Identity;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur while reading or writing the ledger store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("ledger rejected stored state: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store already initialized")]
    AlreadyInitialized,

    #[error("store not initialized (run `bluecarbon init` first)")]
    NotInitialized,
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

const TREE_NAME: &str = "ledger";

const PROJECT: &[u8] = b"project/";
const VERIFICATION: &[u8] = b"verification/";
const REVENUE_SHARE: &[u8] = b"revenue_share/";
const DISTRIBUTION: &[u8] = b"distribution/";
const WITHDRAWAL: &[u8] = b"withdrawal/";
const BALANCE: &[u8] = b"balance/";
const VERIFIER: &[u8] = b"verifier/";

const META_OWNER: &[u8] = b"meta/owner";
const META_PAUSED: &[u8] = b"meta/paused";
const META_COUNTERS: &[u8] = b"meta/counters";
const META_TOTAL_SUPPLY: &[u8] = b"meta/total_supply";
const META_HELD_BALANCE: &[u8] = b"meta/held_balance";
const META_EVENT_COUNTS: &[u8] = b"meta/event_counts";

/// Every row-table prefix. Commits clear these before rewriting them.
const TABLES: [&[u8]; 7] = [
    PROJECT,
    VERIFICATION,
    REVENUE_SHARE,
    DISTRIBUTION,
    WITHDRAWAL,
    BALANCE,
    VERIFIER,
];

fn id_key(prefix: &[u8], id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 8);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn identity_key(prefix: &[u8], identity: &Identity) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + identity.as_str().len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(identity.as_str().as_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Id sequences that cannot be derived from the rows alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Counters {
    next_project_id: u64,
    next_verification_id: u64,
    engine: EngineCounters,
}

// ---------------------------------------------------------------------------
// LedgerStore
// ---------------------------------------------------------------------------

/// Persistent storage for one registry.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    db: Db,
    ledger: Tree,
}

impl LedgerStore {
    /// Open or create a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store that disappears when dropped. For tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let ledger = db.open_tree(TREE_NAME)?;
        Ok(Self { db, ledger })
    }

    /// Whether `init` has ever committed a ledger here.
    pub fn is_initialized(&self) -> StoreResult<bool> {
        Ok(self.ledger.contains_key(META_OWNER)?)
    }

    /// Creates and persists an empty registry owned by `owner`.
    pub fn initialize(&self, owner: Identity) -> StoreResult<CarbonLedger> {
        if self.is_initialized()? {
            return Err(StoreError::AlreadyInitialized);
        }
        let mut ledger = CarbonLedger::new(owner);
        self.commit(&ledger.snapshot(), ledger.pending_events())?;
        ledger.drain_events();
        Ok(ledger)
    }

    /// Loads and restores the stored registry.
    pub fn load_ledger(&self) -> StoreResult<CarbonLedger> {
        let snapshot = self.load()?.ok_or(StoreError::NotInitialized)?;
        let ledger = CarbonLedger::restore(snapshot)?;
        self.check_derived(&ledger)?;
        Ok(ledger)
    }

    /// Reads every table back into a snapshot. `None` on an empty store.
    pub fn load(&self) -> StoreResult<Option<LedgerSnapshot>> {
        let owner: Identity = match self.ledger.get(META_OWNER)? {
            Some(bytes) => decode(&bytes)?,
            None => return Ok(None),
        };
        let paused: bool = self.get_meta(META_PAUSED)?.unwrap_or(false);
        let counters: Counters = self
            .get_meta(META_COUNTERS)?
            .ok_or_else(|| StoreError::Corrupt("missing counters".into()))?;

        let mut balances = BTreeMap::new();
        for (holder, amount) in self.scan_identities::<u64>(BALANCE)? {
            balances.insert(holder, amount);
        }
        let mut verifiers = BTreeMap::new();
        for (verifier, authorized) in self.scan_identities::<bool>(VERIFIER)? {
            verifiers.insert(verifier, authorized);
        }

        Ok(Some(LedgerSnapshot {
            owner,
            verifiers,
            projects: self.scan_rows(PROJECT)?,
            next_project_id: counters.next_project_id,
            verifications: self.scan_rows(VERIFICATION)?,
            next_verification_id: counters.next_verification_id,
            balances,
            paused,
            revenue_shares: self.scan_rows(REVENUE_SHARE)?,
            distributions: self.scan_rows(DISTRIBUTION)?,
            withdrawals: self.scan_rows(WITHDRAWAL)?,
            engine_counters: counters.engine,
        }))
    }

    /// Writes the full snapshot, and the counts of the `events` that
    /// produced it, in one atomic batch.
    pub fn commit(&self, snapshot: &LedgerSnapshot, events: &[EventEnvelope]) -> StoreResult<()> {
        let mut batch = Batch::default();

        for prefix in TABLES {
            for key in self.ledger.scan_prefix(prefix).keys() {
                batch.remove(key?);
            }
        }

        for project in &snapshot.projects {
            batch.insert(id_key(PROJECT, project.id), encode(project)?);
        }
        for record in &snapshot.verifications {
            batch.insert(id_key(VERIFICATION, record.id), encode(record)?);
        }
        for share in &snapshot.revenue_shares {
            batch.insert(id_key(REVENUE_SHARE, share.id), encode(share)?);
        }
        for record in &snapshot.distributions {
            batch.insert(id_key(DISTRIBUTION, record.id), encode(record)?);
        }
        for record in &snapshot.withdrawals {
            batch.insert(id_key(WITHDRAWAL, record.id), encode(record)?);
        }
        for (holder, amount) in &snapshot.balances {
            batch.insert(identity_key(BALANCE, holder), encode(amount)?);
        }
        for (verifier, authorized) in &snapshot.verifiers {
            batch.insert(identity_key(VERIFIER, verifier), encode(authorized)?);
        }

        let total_supply: u64 = snapshot.balances.values().sum();
        let held_balance: u64 = snapshot.revenue_shares.iter().map(|s| s.available()).sum();
        let counters = Counters {
            next_project_id: snapshot.next_project_id,
            next_verification_id: snapshot.next_verification_id,
            engine: snapshot.engine_counters,
        };
        batch.insert(META_OWNER, encode(&snapshot.owner)?);
        batch.insert(META_PAUSED, encode(&snapshot.paused)?);
        batch.insert(META_COUNTERS, encode(&counters)?);
        batch.insert(META_TOTAL_SUPPLY, encode(&total_supply)?);
        batch.insert(META_HELD_BALANCE, encode(&held_balance)?);
        if !events.is_empty() {
            let mut counts = self.event_counts()?;
            for envelope in events {
                *counts.entry(envelope.event.kind().to_owned()).or_insert(0) += 1;
            }
            batch.insert(META_EVENT_COUNTS, encode(&counts)?);
        }

        self.ledger.apply_batch(batch)?;
        self.db.flush()?;

        tracing::debug!(
            projects = snapshot.projects.len(),
            distributions = snapshot.distributions.len(),
            total_supply,
            held_balance,
            events = events.len(),
            "ledger committed"
        );
        Ok(())
    }

    /// Committed events per kind, over the life of the store.
    pub fn event_counts(&self) -> StoreResult<BTreeMap<String, u64>> {
        Ok(self.get_meta(META_EVENT_COUNTS)?.unwrap_or_default())
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Cross-checks recomputed totals against the stored summaries.
    fn check_derived(&self, ledger: &CarbonLedger) -> StoreResult<()> {
        let supply: Option<u64> = self.get_meta(META_TOTAL_SUPPLY)?;
        if let Some(stored) = supply {
            if stored != ledger.total_supply() {
                return Err(StoreError::Corrupt(format!(
                    "total supply {} does not match balances ({})",
                    stored,
                    ledger.total_supply()
                )));
            }
        }
        let held: Option<u64> = self.get_meta(META_HELD_BALANCE)?;
        if let Some(stored) = held {
            if stored != ledger.revenue_engine().held_balance() {
                return Err(StoreError::Corrupt(format!(
                    "held balance {} does not match revenue shares ({})",
                    stored,
                    ledger.revenue_engine().held_balance()
                )));
            }
        }
        Ok(())
    }

    fn get_meta<T: DeserializeOwned>(&self, key: &[u8]) -> StoreResult<Option<T>> {
        match self.ledger.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Rows of an id-keyed table, in id order.
    fn scan_rows<T: DeserializeOwned>(&self, prefix: &[u8]) -> StoreResult<Vec<T>> {
        let mut rows = Vec::new();
        for entry in self.ledger.scan_prefix(prefix) {
            let (_key, value) = entry?;
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }

    fn scan_identities<T: DeserializeOwned>(&self, prefix: &[u8]) -> StoreResult<Vec<(Identity, T)>> {
        let mut rows = Vec::new();
        for entry in self.ledger.scan_prefix(prefix) {
            let (key, value) = entry?;
            let raw = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|e| StoreError::Corrupt(format!("identity key is not UTF-8: {}", e)))?;
            rows.push((Identity::new(raw), decode(&value)?));
        }
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
