//! # Prometheus Metrics
//!
//! Registry gauges derived from ledger state, plus a per-kind counter of
//! every event the store has committed. Printed by `bluecarbon metrics` in
//! the Prometheus text exposition format, ready for a textfile collector.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use std::collections::BTreeMap;

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use bluecarbon_contracts::CarbonLedger;

/// Holds all Prometheus metric handles for the registry.
#[derive(Clone)]
pub struct LedgerMetrics {
    registry: Registry,
    /// Registered projects.
    pub projects_total: IntGauge,
    /// Projects with issued credits.
    pub projects_verified: IntGauge,
    /// Identities currently authorized to verify.
    pub verifiers_authorized: IntGauge,
    /// Credits in circulation.
    pub credit_supply: IntGauge,
    /// Distinct credit holders.
    pub credit_holders: IntGauge,
    /// 1 while the credit ledger is paused.
    pub ledger_paused: IntGauge,
    /// Revenue shares accepting revenue.
    pub revenue_shares_active: IntGauge,
    /// Revenue recorded but not yet distributed or swept.
    pub revenue_held: IntGauge,
    /// Sum of all distribution records.
    pub revenue_distributed: IntGauge,
    /// Events committed over the life of the store, by kind.
    pub events_total: IntCounterVec,
}

impl LedgerMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("bluecarbon".into()), None)?;

        let gauge = |name: &str, help: &str| -> prometheus::Result<IntGauge> {
            let g = IntGauge::new(name, help)?;
            registry.register(Box::new(g.clone()))?;
            Ok(g)
        };

        let projects_total = gauge("projects_total", "Number of registered restoration projects")?;
        let projects_verified = gauge("projects_verified", "Number of projects with issued credits")?;
        let verifiers_authorized =
            gauge("verifiers_authorized", "Number of currently authorized verifiers")?;
        let credit_supply = gauge("credit_supply", "Total Blue Carbon Credits in circulation")?;
        let credit_holders = gauge("credit_holders", "Number of identities holding credits")?;
        let ledger_paused = gauge("ledger_paused", "1 if mint and transfer are paused")?;
        let revenue_shares_active =
            gauge("revenue_shares_active", "Number of active revenue shares")?;
        let revenue_held = gauge(
            "revenue_held",
            "Revenue recorded but neither distributed nor swept",
        )?;
        let revenue_distributed = gauge(
            "revenue_distributed",
            "Total revenue paid out to stakeholders",
        )?;

        let events_total = IntCounterVec::new(
            Opts::new("events_total", "Ledger events committed, by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        Ok(Self {
            registry,
            projects_total,
            projects_verified,
            verifiers_authorized,
            credit_supply,
            credit_holders,
            ledger_paused,
            revenue_shares_active,
            revenue_held,
            revenue_distributed,
            events_total,
        })
    }

    /// Refreshes every gauge from the current ledger state.
    pub fn observe(&self, ledger: &CarbonLedger) {
        let projects = ledger.project_registry();
        let engine = ledger.revenue_engine();

        self.projects_total.set(projects.project_count() as i64);
        self.projects_verified
            .set(projects.projects().filter(|p| p.verified).count() as i64);
        self.verifiers_authorized
            .set(ledger.authorization().authorized_verifiers().len() as i64);
        self.credit_supply.set(saturating_i64(ledger.total_supply()));
        self.credit_holders
            .set(ledger.credit_ledger().holders().len() as i64);
        self.ledger_paused.set(i64::from(ledger.is_paused()));
        self.revenue_shares_active
            .set(engine.shares().filter(|s| s.active).count() as i64);
        self.revenue_held.set(saturating_i64(engine.held_balance()));
        self.revenue_distributed.set(saturating_i64(
            engine
                .distributions()
                .fold(0u64, |acc, d| acc.saturating_add(d.amount)),
        ));
    }

    /// Loads the persisted per-kind event counts into `events_total`.
    /// Call once on a fresh `LedgerMetrics`.
    pub fn observe_event_counts(&self, counts: &BTreeMap<String, u64>) {
        for (kind, count) in counts {
            self.events_total
                .with_label_values(&[kind.as_str()])
                .inc_by(*count);
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Gauges are signed; supplies above `i64::MAX` are clamped.
fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluecarbon_contracts::{NewProject, VerificationSubmission};
    use bluecarbon_protocol::EcosystemType;

    #[test]
    fn gauges_reflect_ledger_state() {
        let owner = "owner".into();
        let mut ledger = CarbonLedger::new(owner);
        ledger
            .set_verifier_status(&"owner".into(), &"verifier".into(), true)
            .unwrap();
        let project_id = ledger
            .create_project(
                &"developer".into(),
                NewProject {
                    name: "Seagrass Meadow".into(),
                    location: "Posidonia Bay".into(),
                    total_area_m2: 250,
                    ecosystem: EcosystemType::Seagrass,
                    metadata_ref: String::new(),
                },
            )
            .unwrap();
        ledger
            .submit_verification(
                &"verifier".into(),
                VerificationSubmission {
                    project_id,
                    credits_claimed: 250,
                    evidence_ref: String::new(),
                },
            )
            .unwrap();

        let mut counts = BTreeMap::new();
        for envelope in ledger.drain_events() {
            *counts.entry(envelope.event.kind().to_owned()).or_insert(0) += 1;
        }

        let metrics = LedgerMetrics::new().unwrap();
        metrics.observe(&ledger);
        metrics.observe_event_counts(&counts);

        assert_eq!(metrics.projects_total.get(), 1);
        assert_eq!(metrics.projects_verified.get(), 1);
        assert_eq!(metrics.credit_supply.get(), 250);
        assert_eq!(
            metrics
                .events_total
                .with_label_values(&["credits_minted"])
                .get(),
            1
        );

        let text = metrics.encode().unwrap();
        assert!(text.contains("bluecarbon_credit_supply 250"));
        assert!(text.contains("bluecarbon_events_total{kind=\"project_created\"} 1"));
    }

    #[test]
    fn huge_supply_is_clamped() {
        assert_eq!(saturating_i64(u64::MAX), i64::MAX);
        assert_eq!(saturating_i64(42), 42);
    }
}
