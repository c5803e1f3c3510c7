//! Anomaly scanner
//!
//! One tick snapshots the active tourists, runs the configured detection
//! strategy over their inactivity and opens an anomaly per finding. Each
//! finding is written in its own transaction; a failure is logged and the
//! tick moves on to the next tourist.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::dedup::AlertDeduper;
use crate::detection::{DetectionStrategy, Finding, InactivitySample};
use crate::model::{Alert, AlertType, Anomaly};
use crate::store::SafetyStore;
use crate::Result;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub strategy: &'static str,
    pub active_tourists: usize,
    /// True when too few active tourists were present to run the strategy
    pub skipped: bool,
    pub findings: usize,
    pub created: Vec<Anomaly>,
    /// Findings that matched an open anomaly in the dedup window
    pub suppressed: usize,
    /// Findings dropped because the tourist reported in after the snapshot
    pub stale: usize,
    pub failures: usize,
}

enum FindingResult {
    Created(Anomaly),
    Suppressed,
    Stale,
}

pub struct AnomalyScanner {
    store: Arc<dyn SafetyStore>,
    strategy: Box<dyn DetectionStrategy>,
    deduper: AlertDeduper,
}

impl AnomalyScanner {
    pub fn new(store: Arc<dyn SafetyStore>, strategy: Box<dyn DetectionStrategy>, deduper: AlertDeduper) -> Self {
        Self {
            store,
            strategy,
            deduper,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn tick(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        let tourists = self.store.list_active_tourists(now)?;
        let mut report = ScanReport {
            strategy: self.strategy.name(),
            active_tourists: tourists.len(),
            ..Default::default()
        };

        if tourists.len() < self.strategy.min_samples() {
            debug!(
                strategy = report.strategy,
                active = tourists.len(),
                "anomaly scan skipped"
            );
            report.skipped = true;
            return Ok(report);
        }

        let samples: Vec<InactivitySample> = tourists
            .iter()
            .map(|t| InactivitySample::from_tourist(t, now))
            .collect();
        let findings = self.strategy.detect(&samples);
        report.findings = findings.len();

        for finding in &findings {
            match self.record(finding, now) {
                Ok(FindingResult::Created(anomaly)) => report.created.push(anomaly),
                Ok(FindingResult::Suppressed) => report.suppressed += 1,
                Ok(FindingResult::Stale) => report.stale += 1,
                Err(e) => {
                    error!(tourist = %finding.sample.tourist_id, "anomaly write failed: {}", e);
                    report.failures += 1;
                }
            }
        }

        info!(
            strategy = report.strategy,
            active = report.active_tourists,
            findings = report.findings,
            created = report.created.len(),
            suppressed = report.suppressed,
            failures = report.failures,
            "anomaly scan complete"
        );

        Ok(report)
    }

    fn record(&self, finding: &Finding, now: DateTime<Utc>) -> Result<FindingResult> {
        let mut tx = self.store.begin(finding.sample.tourist_id)?;

        // A location update between snapshot and lock supersedes the finding
        if tx.tourist().last_updated_at != finding.sample.observed_update {
            return Ok(FindingResult::Stale);
        }
        if !self.deduper.should_open_anomaly(&*tx, finding.kind, now)? {
            return Ok(FindingResult::Suppressed);
        }

        let anomaly = Anomaly::new(
            finding.sample.tourist_id,
            finding.kind,
            finding.description.clone(),
            now,
        );
        tx.save_anomaly(anomaly.clone())?;

        let alert = Alert::new(tx.tourist(), AlertType::Anomaly(finding.kind), now);
        self.deduper.emit(&mut *tx, alert)?;
        tx.commit()?;

        warn!(
            tourist = %anomaly.tourist_id,
            kind = %anomaly.anomaly_type,
            inactivity_secs = finding.sample.inactivity_secs,
            "anomaly opened"
        );

        Ok(FindingResult::Created(anomaly))
    }
}
