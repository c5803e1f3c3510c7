//! Score engine
//!
//! A location update resolves the tourist's open anomalies, records the new
//! position, raises geo-fence breach alerts for every dangerous zone that
//! contains the point and moves the safety score according to the configured
//! [`ScorePolicy`]. All of it is staged in one transaction.

use chrono::{DateTime, Utc};
use safety_zones::{GeoPoint, ZoneIndex};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{ScorePolicy, BREACH_THRESHOLD, RECOVERY_THRESHOLD};
use crate::dedup::AlertDeduper;
use crate::model::{Alert, AlertType, Anomaly, TouristId, MAX_SAFETY_SCORE};
use crate::store::StoreTx;
use crate::Result;

/// Zone score assumed for unmapped areas by the smoothing policy
pub const NEUTRAL_ZONE_SCORE: u8 = 70;

/// Smoothing keeps 9/10 of the previous score
const SMOOTHING_RETAIN_TENTHS: u32 = 9;

impl ScorePolicy {
    /// Next score given the current one and the worst containing zone
    /// (`None` = neutral area)
    pub fn next_score(&self, current: u8, zone_score: Option<u8>) -> u8 {
        let current = current.min(MAX_SAFETY_SCORE);
        match self {
            ScorePolicy::SnapRecover => match zone_score {
                None => current,
                Some(z) if z < current => z,
                Some(z) if z > RECOVERY_THRESHOLD && current < MAX_SAFETY_SCORE => current + 1,
                Some(_) => current,
            },
            ScorePolicy::Smoothing => {
                let z = zone_score.unwrap_or(NEUTRAL_ZONE_SCORE).min(MAX_SAFETY_SCORE) as u32;
                // Integer tenths, rounded half up
                let blended = SMOOTHING_RETAIN_TENTHS * current as u32
                    + (10 - SMOOTHING_RETAIN_TENTHS) * z;
                ((blended + 5) / 10) as u8
            }
        }
    }
}

/// Result of one location update
#[derive(Debug, Clone, Serialize)]
pub struct LocationOutcome {
    pub tourist_id: TouristId,
    pub previous_score: u8,
    pub safety_score: u8,
    /// Names of every zone containing the point, in index order
    pub zones: Vec<String>,
    pub issued_alerts: Vec<Alert>,
    pub resolved_anomalies: Vec<Anomaly>,
}

pub struct ScoreEngine {
    zones: Arc<ZoneIndex>,
    policy: ScorePolicy,
    deduper: AlertDeduper,
}

impl ScoreEngine {
    pub fn new(zones: Arc<ZoneIndex>, policy: ScorePolicy, deduper: AlertDeduper) -> Self {
        Self {
            zones,
            policy,
            deduper,
        }
    }

    pub fn policy(&self) -> ScorePolicy {
        self.policy
    }

    pub fn update_location(
        &self,
        tx: &mut dyn StoreTx,
        point: GeoPoint,
        now: DateTime<Utc>,
    ) -> Result<LocationOutcome> {
        let resolved_anomalies = tx.resolve_anomalies(now)?;

        let tourist = tx.tourist_mut();
        let tourist_id = tourist.id;
        let previous_score = tourist.safety_score;
        tourist.last_known_location = Some(point);
        tourist.last_updated_at = Some(now);

        let containing = self.zones.zones_containing(&point);
        let zone_score = containing.iter().map(|z| z.regional_score).min();

        let mut issued_alerts = Vec::new();
        for zone in containing.iter().filter(|z| z.regional_score < BREACH_THRESHOLD) {
            let alert = Alert::new(tx.tourist(), AlertType::GeoFenceBreach(zone.name.clone()), now);
            if self.deduper.emit(tx, alert.clone())? {
                warn!(
                    tourist = %tourist_id,
                    zone = %zone.name,
                    regional_score = zone.regional_score,
                    "geo-fence breach"
                );
                issued_alerts.push(alert);
            }
        }

        let safety_score = self.policy.next_score(previous_score, zone_score);
        tx.tourist_mut().safety_score = safety_score;

        debug!(
            tourist = %tourist_id,
            previous_score,
            safety_score,
            zone_score = ?zone_score,
            resolved = resolved_anomalies.len(),
            "location scored"
        );

        Ok(LocationOutcome {
            tourist_id,
            previous_score,
            safety_score,
            zones: containing.iter().map(|z| z.name.clone()).collect(),
            issued_alerts,
            resolved_anomalies,
        })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig { max_global_rejects: 10_000, ..ProptestConfig::with_cases(5000) })]

        #[test]
        fn snap_down_is_exact(s in 0u8..=100, z in 0u8..=100) {
            prop_assume!(z < s);
            prop_assert_eq!(ScorePolicy::SnapRecover.next_score(s, Some(z)), z);
        }

        #[test]
        fn recovery_is_one_step(s in 0u8..100, z in 81u8..=100) {
            prop_assume!(z >= s);
            prop_assert_eq!(ScorePolicy::SnapRecover.next_score(s, Some(z)), s + 1);
        }

        #[test]
        fn mid_band_is_stable(s in 0u8..=100, z in 40u8..=80) {
            prop_assume!(z >= s);
            prop_assert_eq!(ScorePolicy::SnapRecover.next_score(s, Some(z)), s);
        }

        #[test]
        fn scores_stay_in_range(s in 0u8..=100, z in proptest::option::of(0u8..=100)) {
            prop_assert!(ScorePolicy::SnapRecover.next_score(s, z) <= 100);
            prop_assert!(ScorePolicy::Smoothing.next_score(s, z) <= 100);
        }
    }
}
