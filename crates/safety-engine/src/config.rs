//! Engine configuration and strategy selection

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Result, SafetyError};

/// Zones scoring strictly below this raise a geo-fence breach alert
pub const BREACH_THRESHOLD: u8 = 40;

/// Zones scoring strictly above this allow score recovery
pub const RECOVERY_THRESHOLD: u8 = 80;

/// Alert and anomaly dedup window (10 minutes)
pub const DEDUP_WINDOW_SECS: i64 = 600;

/// Upper bound on the dedup window (30 days)
pub const MAX_DEDUP_WINDOW_SECS: i64 = 30 * 24 * 3600;

pub const WARNING_INACTIVITY_SECS: i64 = 300;
pub const CRITICAL_INACTIVITY_SECS: i64 = 600;

/// Fraction of samples the outlier detector treats as anomalous
pub const DEFAULT_CONTAMINATION: f64 = 0.5;

/// Flat penalty applied per panic press
pub const PANIC_PENALTY: u8 = 20;

/// How a location update moves the safety score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScorePolicy {
    /// Snap down to a worse zone, recover +1 per update in safe zones
    #[default]
    SnapRecover,
    /// 0.9 * old + 0.1 * zone, neutral areas count as 70
    Smoothing,
}

/// Score penalty applied on a panic press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanicPolicy {
    #[default]
    FlatPenalty,
    HardReset,
}

/// Which inactivity detector the scanner runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionKind {
    #[default]
    Threshold,
    Statistical,
}

macro_rules! kebab_from_str {
    ($ty:ty, $( $text:literal => $variant:expr ),+ $(,)?) => {
        impl FromStr for $ty {
            type Err = SafetyError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_lowercase().as_str() {
                    $( $text => Ok($variant), )+
                    other => Err(SafetyError::InvalidConfig(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

kebab_from_str!(ScorePolicy, "snap-recover" => ScorePolicy::SnapRecover, "smoothing" => ScorePolicy::Smoothing);
kebab_from_str!(PanicPolicy, "flat-penalty" => PanicPolicy::FlatPenalty, "hard-reset" => PanicPolicy::HardReset);
kebab_from_str!(DetectionKind, "threshold" => DetectionKind::Threshold, "statistical" => DetectionKind::Statistical);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub score_policy: ScorePolicy,
    pub panic_policy: PanicPolicy,
    pub detection: DetectionKind,
    pub warning_inactivity_secs: i64,
    pub critical_inactivity_secs: i64,
    pub contamination: f64,
    pub dedup_window_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            score_policy: ScorePolicy::default(),
            panic_policy: PanicPolicy::default(),
            detection: DetectionKind::default(),
            warning_inactivity_secs: WARNING_INACTIVITY_SECS,
            critical_inactivity_secs: CRITICAL_INACTIVITY_SECS,
            contamination: DEFAULT_CONTAMINATION,
            dedup_window_secs: DEDUP_WINDOW_SECS,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.warning_inactivity_secs <= 0 {
            return Err(SafetyError::InvalidConfig(
                "warning inactivity threshold must be positive".to_string(),
            ));
        }
        if self.critical_inactivity_secs <= self.warning_inactivity_secs {
            return Err(SafetyError::InvalidConfig(format!(
                "critical threshold {}s must exceed warning threshold {}s",
                self.critical_inactivity_secs, self.warning_inactivity_secs
            )));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(SafetyError::InvalidConfig(format!(
                "contamination {} must be in (0, 0.5]",
                self.contamination
            )));
        }
        if self.dedup_window_secs <= 0 || self.dedup_window_secs > MAX_DEDUP_WINDOW_SECS {
            return Err(SafetyError::InvalidConfig(format!(
                "dedup window {}s must be in (0, {}]",
                self.dedup_window_secs, MAX_DEDUP_WINDOW_SECS
            )));
        }
        Ok(())
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::seconds(self.dedup_window_secs)
    }
}
