//! Panic button handling
//!
//! Every press is recorded. There is no dedup window here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::{PanicPolicy, PANIC_PENALTY};
use crate::model::{Alert, AlertType};
use crate::store::StoreTx;
use crate::Result;

impl PanicPolicy {
    pub fn next_score(&self, current: u8) -> u8 {
        match self {
            PanicPolicy::FlatPenalty => current.saturating_sub(PANIC_PENALTY),
            PanicPolicy::HardReset => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PanicOutcome {
    pub alert: Alert,
    pub previous_score: u8,
    pub safety_score: u8,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PanicHandler {
    policy: PanicPolicy,
}

impl PanicHandler {
    pub fn new(policy: PanicPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PanicPolicy {
        self.policy
    }

    pub fn trigger(&self, tx: &mut dyn StoreTx, now: DateTime<Utc>) -> Result<PanicOutcome> {
        let alert = Alert::new(tx.tourist(), AlertType::PanicButton, now);
        tx.save_alert(alert.clone())?;

        let tourist = tx.tourist_mut();
        let previous_score = tourist.safety_score;
        tourist.safety_score = self.policy.next_score(previous_score);

        info!(
            tourist = %tourist.id,
            name = %tourist.name,
            location = %alert.location,
            previous_score,
            safety_score = tourist.safety_score,
            "PANIC ALERT"
        );

        Ok(PanicOutcome {
            previous_score,
            safety_score: tourist.safety_score,
            alert,
        })
    }
}
