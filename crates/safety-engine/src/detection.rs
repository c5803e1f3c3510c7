//! Inactivity detection strategies
//!
//! Both detectors consume the same per-tourist inactivity samples and return
//! findings; the scanner does not know which one it runs.
//!
//! | Strategy | Minimum samples | Anomaly |
//! |----------|-----------------|---------|
//! | [`ThresholdDetector`] | 1 | Warning / Critical Inactivity |
//! | [`OutlierDetector`] | 2 | Prolonged Inactivity |

use chrono::{DateTime, Utc};

use crate::config::{DetectionKind, EngineConfig};
use crate::model::{AnomalyKind, Tourist, TouristId};

#[derive(Debug, Clone, PartialEq)]
pub struct InactivitySample {
    pub tourist_id: TouristId,
    pub inactivity_secs: i64,
    /// `last_updated_at` when the sample was taken
    pub observed_update: Option<DateTime<Utc>>,
}

impl InactivitySample {
    pub fn from_tourist(tourist: &Tourist, now: DateTime<Utc>) -> Self {
        Self {
            tourist_id: tourist.id,
            inactivity_secs: tourist.inactivity_secs(now),
            observed_update: tourist.last_updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub sample: InactivitySample,
    pub kind: AnomalyKind,
    pub description: String,
}

pub trait DetectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ticks with fewer active tourists are skipped
    fn min_samples(&self) -> usize;

    fn detect(&self, samples: &[InactivitySample]) -> Vec<Finding>;
}

/// Build the detector selected by `config`
pub fn from_config(config: &EngineConfig) -> Box<dyn DetectionStrategy> {
    match config.detection {
        DetectionKind::Threshold => Box::new(ThresholdDetector::new(
            config.warning_inactivity_secs,
            config.critical_inactivity_secs,
        )),
        DetectionKind::Statistical => Box::new(OutlierDetector::new(config.contamination)),
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdDetector {
    warning_secs: i64,
    critical_secs: i64,
}

impl ThresholdDetector {
    pub fn new(warning_secs: i64, critical_secs: i64) -> Self {
        Self {
            warning_secs,
            critical_secs,
        }
    }
}

impl DetectionStrategy for ThresholdDetector {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn min_samples(&self) -> usize {
        1
    }

    fn detect(&self, samples: &[InactivitySample]) -> Vec<Finding> {
        samples
            .iter()
            .filter_map(|s| {
                let (kind, threshold) = if s.inactivity_secs > self.critical_secs {
                    (AnomalyKind::CriticalInactivity, self.critical_secs)
                } else if s.inactivity_secs > self.warning_secs {
                    (AnomalyKind::WarningInactivity, self.warning_secs)
                } else {
                    return None;
                };
                Some(Finding {
                    sample: s.clone(),
                    kind,
                    description: format!(
                        "No location update for {}s (threshold {}s)",
                        s.inactivity_secs, threshold
                    ),
                })
            })
            .collect()
    }
}

/// One-dimensional outlier detector over inactivity durations.
///
/// Samples are ranked by how far they sit above the median; the top
/// `floor(contamination * n)` (at least one) are flagged. Samples at or below
/// the median are never flagged, and a sample set with no spread flags
/// nothing.
#[derive(Debug, Clone)]
pub struct OutlierDetector {
    contamination: f64,
}

impl OutlierDetector {
    pub fn new(contamination: f64) -> Self {
        Self { contamination }
    }

    fn median(sorted: &[i64]) -> f64 {
        let n = sorted.len();
        if n % 2 == 1 {
            sorted[n / 2] as f64
        } else {
            (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
        }
    }
}

impl DetectionStrategy for OutlierDetector {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn min_samples(&self) -> usize {
        2
    }

    fn detect(&self, samples: &[InactivitySample]) -> Vec<Finding> {
        if samples.len() < self.min_samples() {
            return Vec::new();
        }

        let mut values: Vec<i64> = samples.iter().map(|s| s.inactivity_secs).collect();
        values.sort_unstable();
        let median = Self::median(&values);

        let mut candidates: Vec<(&InactivitySample, f64)> = samples
            .iter()
            .map(|s| (s, s.inactivity_secs as f64 - median))
            .filter(|(_, deviation)| *deviation > 0.0)
            .collect();
        candidates.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.tourist_id.cmp(&b.0.tourist_id))
        });

        let budget = ((self.contamination * samples.len() as f64).floor() as usize).max(1);

        candidates
            .into_iter()
            .take(budget)
            .map(|(s, _)| Finding {
                sample: s.clone(),
                kind: AnomalyKind::ProlongedInactivity,
                description: format!(
                    "Inactivity of {}s is an outlier among {} active tourists (median {:.0}s)",
                    s.inactivity_secs,
                    samples.len(),
                    median
                ),
            })
            .collect()
    }
}
