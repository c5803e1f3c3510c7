//! Time-windowed alert and anomaly suppression
//!
//! Checks run against the caller's open [`StoreTx`], which holds the
//! tourist's lock, so check-then-insert cannot interleave with another
//! update of the same tourist.

use chrono::{DateTime, Duration, Utc};

use crate::model::{Alert, AlertType, AnomalyKind};
use crate::store::StoreTx;
use crate::{Result, SafetyError};

#[derive(Debug, Clone, Copy)]
pub struct AlertDeduper {
    window: Duration,
}

impl AlertDeduper {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn window_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_sub_signed(self.window).ok_or_else(|| {
            SafetyError::InvalidConfig(format!(
                "dedup window of {}s reaches before the earliest timestamp",
                self.window.num_seconds()
            ))
        })
    }

    /// False when an alert of the same type was recorded within the window
    pub fn should_emit(&self, tx: &dyn StoreTx, alert_type: &AlertType, now: DateTime<Utc>) -> Result<bool> {
        Ok(tx.find_recent_alert(alert_type, self.window_start(now)?)?.is_none())
    }

    /// Stages `alert` unless suppressed; returns whether it was stored
    pub fn emit(&self, tx: &mut dyn StoreTx, alert: Alert) -> Result<bool> {
        if !self.should_emit(tx, &alert.alert_type, alert.timestamp)? {
            return Ok(false);
        }
        tx.save_alert(alert)?;
        Ok(true)
    }

    /// False while an unresolved anomaly of `kind` exists within the window
    pub fn should_open_anomaly(&self, tx: &dyn StoreTx, kind: AnomalyKind, now: DateTime<Utc>) -> Result<bool> {
        Ok(tx.find_active_anomaly(kind, self.window_start(now)?)?.is_none())
    }
}

impl Default for AlertDeduper {
    fn default() -> Self {
        Self::new(Duration::seconds(crate::config::DEDUP_WINDOW_SECS))
    }
}
