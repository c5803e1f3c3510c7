//! In-process store
//!
//! One mutex per tourist record. The outer map lock is only held to look up
//! or insert records, so transactions on different tourists never contend.

use chrono::{DateTime, Utc};
use parking_lot::{ArcMutexGuard, Mutex, RawMutex, RwLock};
use safety_zones::{SafetyZone, ZoneIndex};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{SafetyStore, StoreTx};
use crate::model::{Alert, AlertType, Anomaly, AnomalyKind, NewTourist, Tourist, TouristId};
use crate::{Result, SafetyError};

#[derive(Debug)]
struct TouristRecord {
    tourist: Tourist,
    alerts: Vec<Alert>,
    anomalies: Vec<Anomaly>,
}

pub struct MemoryStore {
    zones: Vec<SafetyZone>,
    records: RwLock<BTreeMap<TouristId, Arc<Mutex<TouristRecord>>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new(zones: &ZoneIndex) -> Self {
        Self {
            zones: zones.zones().to_vec(),
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_seed_zones() -> Self {
        Self::new(&ZoneIndex::with_seed_zones())
    }

    fn record(&self, id: TouristId) -> Result<Arc<Mutex<TouristRecord>>> {
        self.records
            .read()
            .get(&id)
            .cloned()
            .ok_or(SafetyError::TouristNotFound(id))
    }

    /// Snapshot of every record, each taken under its own lock
    fn collect<T>(&self, mut f: impl FnMut(&TouristRecord, &mut Vec<T>)) -> Vec<T> {
        let records: Vec<_> = self.records.read().values().cloned().collect();
        let mut out = Vec::new();
        for record in records {
            f(&record.lock(), &mut out);
        }
        out
    }
}

impl SafetyStore for MemoryStore {
    fn insert_tourist(&self, new: NewTourist) -> Result<Tourist> {
        let mut records = self.records.write();

        let duplicate = records.values().any(|r| {
            let r = r.lock();
            r.tourist.phone == new.phone || r.tourist.kyc_id == new.kyc_id
        });
        if duplicate {
            return Err(SafetyError::AlreadyRegistered);
        }

        let id = TouristId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let tourist = Tourist::from_new(id, new);
        records.insert(
            id,
            Arc::new(Mutex::new(TouristRecord {
                tourist: tourist.clone(),
                alerts: Vec::new(),
                anomalies: Vec::new(),
            })),
        );
        debug!(tourist = %id, "tourist inserted");

        Ok(tourist)
    }

    fn get_tourist(&self, id: TouristId) -> Result<Tourist> {
        Ok(self.record(id)?.lock().tourist.clone())
    }

    fn find_tourist_by_phone(&self, phone: &str) -> Result<Option<Tourist>> {
        Ok(self
            .collect(|r, out| {
                if r.tourist.phone == phone {
                    out.push(r.tourist.clone());
                }
            })
            .into_iter()
            .next())
    }

    fn list_tourists(&self) -> Result<Vec<Tourist>> {
        Ok(self.collect(|r, out| out.push(r.tourist.clone())))
    }

    fn list_active_tourists(&self, now: DateTime<Utc>) -> Result<Vec<Tourist>> {
        Ok(self.collect(|r, out| {
            if r.tourist.is_active(now) {
                out.push(r.tourist.clone());
            }
        }))
    }

    fn list_zones(&self) -> Result<Vec<SafetyZone>> {
        Ok(self.zones.clone())
    }

    fn list_alerts(&self, limit: usize) -> Result<Vec<Alert>> {
        let mut alerts = self.collect(|r, out| out.extend(r.alerts.iter().cloned()));
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts.truncate(limit);
        Ok(alerts)
    }

    fn list_anomalies(&self, active_only: bool, limit: usize) -> Result<Vec<Anomaly>> {
        let mut anomalies = self.collect(|r, out| {
            out.extend(
                r.anomalies
                    .iter()
                    .filter(|a| !active_only || a.is_active())
                    .cloned(),
            )
        });
        anomalies.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        anomalies.truncate(limit);
        Ok(anomalies)
    }

    fn anomaly_owner(&self, anomaly_id: Uuid) -> Result<Option<TouristId>> {
        Ok(self
            .collect(|r, out| {
                if r.anomalies.iter().any(|a| a.id == anomaly_id) {
                    out.push(r.tourist.id);
                }
            })
            .into_iter()
            .next())
    }

    fn begin(&self, id: TouristId) -> Result<Box<dyn StoreTx + '_>> {
        let guard = self.record(id)?.lock_arc();
        Ok(Box::new(MemoryTx {
            tourist: guard.tourist.clone(),
            guard,
            alerts: Vec::new(),
            anomalies: Vec::new(),
            resolutions: Vec::new(),
        }))
    }
}

/// Staged writes over a locked tourist record
struct MemoryTx {
    guard: ArcMutexGuard<RawMutex, TouristRecord>,
    tourist: Tourist,
    alerts: Vec<Alert>,
    anomalies: Vec<Anomaly>,
    /// Resolutions of already committed anomalies
    resolutions: Vec<(Uuid, DateTime<Utc>)>,
}

impl MemoryTx {
    fn resolution_staged(&self, id: Uuid) -> bool {
        self.resolutions.iter().any(|(r, _)| *r == id)
    }
}

impl StoreTx for MemoryTx {
    fn tourist(&self) -> &Tourist {
        &self.tourist
    }

    fn tourist_mut(&mut self) -> &mut Tourist {
        &mut self.tourist
    }

    fn find_recent_alert(&self, alert_type: &AlertType, since: DateTime<Utc>) -> Result<Option<Alert>> {
        Ok(self
            .guard
            .alerts
            .iter()
            .chain(self.alerts.iter())
            .filter(|a| &a.alert_type == alert_type && a.timestamp > since)
            .max_by_key(|a| a.timestamp)
            .cloned())
    }

    fn save_alert(&mut self, alert: Alert) -> Result<()> {
        self.alerts.push(alert);
        Ok(())
    }

    fn find_active_anomaly(&self, kind: AnomalyKind, since: DateTime<Utc>) -> Result<Option<Anomaly>> {
        let committed = self
            .guard
            .anomalies
            .iter()
            .filter(|a| !self.resolution_staged(a.id));
        Ok(committed
            .chain(self.anomalies.iter())
            .filter(|a| a.is_active() && a.anomaly_type == kind && a.timestamp > since)
            .max_by_key(|a| a.timestamp)
            .cloned())
    }

    fn save_anomaly(&mut self, anomaly: Anomaly) -> Result<()> {
        self.anomalies.push(anomaly);
        Ok(())
    }

    fn resolve_anomalies(&mut self, at: DateTime<Utc>) -> Result<Vec<Anomaly>> {
        let mut resolved = Vec::new();

        let pending: Vec<Anomaly> = self
            .guard
            .anomalies
            .iter()
            .filter(|a| a.is_active() && !self.resolution_staged(a.id))
            .cloned()
            .collect();
        for mut anomaly in pending {
            self.resolutions.push((anomaly.id, at));
            anomaly.resolve(at);
            resolved.push(anomaly);
        }

        for anomaly in self.anomalies.iter_mut().filter(|a| a.is_active()) {
            anomaly.resolve(at);
            resolved.push(anomaly.clone());
        }

        Ok(resolved)
    }

    fn resolve_anomaly(&mut self, anomaly_id: Uuid, at: DateTime<Utc>) -> Result<Option<Anomaly>> {
        if let Some(anomaly) = self.anomalies.iter_mut().find(|a| a.id == anomaly_id) {
            if anomaly.is_active() {
                anomaly.resolve(at);
            }
            return Ok(Some(anomaly.clone()));
        }

        let Some(mut anomaly) = self.guard.anomalies.iter().find(|a| a.id == anomaly_id).cloned() else {
            return Ok(None);
        };
        if let Some((_, staged_at)) = self.resolutions.iter().find(|(id, _)| *id == anomaly_id) {
            anomaly.resolve(*staged_at);
        } else if anomaly.is_active() {
            self.resolutions.push((anomaly_id, at));
            anomaly.resolve(at);
        }
        Ok(Some(anomaly))
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            mut guard,
            tourist,
            alerts,
            anomalies,
            resolutions,
        } = *self;

        for (id, at) in resolutions {
            if let Some(anomaly) = guard.anomalies.iter_mut().find(|a| a.id == id) {
                anomaly.resolve(at);
            }
        }
        guard.tourist = tourist;
        guard.alerts.extend(alerts);
        guard.anomalies.extend(anomalies);

        Ok(())
    }
}
