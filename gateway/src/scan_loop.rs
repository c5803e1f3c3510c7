//! Periodic anomaly scan
//!
//! Drives [`SafetyService::run_scan`] on a fixed interval on the blocking
//! pool and sweeps expired sessions on the same tick. A failed scan is logged
//! and the loop keeps going.

use chrono::Utc;
use safety_engine::SafetyService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::sessions::SessionStore;

pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;

pub fn start_background_scan(
    service: Arc<SafetyService>,
    sessions: Arc<SessionStore>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let now = Utc::now();

            // Ticks take per-tourist locks; keep them off the async workers
            let scanner = service.clone();
            match tokio::task::spawn_blocking(move || scanner.run_scan(now)).await {
                Ok(Ok(report)) if report.failures > 0 => {
                    error!(failures = report.failures, "anomaly scan finished with failures");
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!("Anomaly scan failed: {}", e),
                Err(e) => error!("Anomaly scan task aborted: {}", e),
            }

            let purged = sessions.purge_expired(now);
            if purged > 0 {
                debug!(purged, "expired sessions removed");
            }
        }
    })
}
