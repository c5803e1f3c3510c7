//! Engine facade used by the inbound and dashboard layers
//!
//! Each inbound operation opens one transaction on the tourist, runs the
//! relevant component and commits. An error anywhere before the commit drops
//! the transaction and nothing is written.

use chrono::{DateTime, Utc};
use safety_zones::{GeoPoint, SafetyZone, ZoneError, ZoneIndex};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dedup::AlertDeduper;
use crate::detection;
use crate::model::{Anomaly, NewTourist, Registration, Tourist, TouristId};
use crate::panic::{PanicHandler, PanicOutcome};
use crate::scanner::{AnomalyScanner, ScanReport};
use crate::scoring::{LocationOutcome, ScoreEngine};
use crate::store::SafetyStore;
use crate::views::{AlertView, AnomalyView, NameIndex, TouristView};
use crate::{Result, SafetyError};

pub struct SafetyService {
    store: Arc<dyn SafetyStore>,
    zones: Arc<ZoneIndex>,
    scoring: ScoreEngine,
    panic: PanicHandler,
    scanner: AnomalyScanner,
    config: EngineConfig,
}

impl SafetyService {
    pub fn new(store: Arc<dyn SafetyStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let zones = Arc::new(ZoneIndex::new(store.list_zones()?)?);
        let deduper = AlertDeduper::new(config.dedup_window());
        let scoring = ScoreEngine::new(zones.clone(), config.score_policy, deduper);
        let panic = PanicHandler::new(config.panic_policy);
        let scanner = AnomalyScanner::new(store.clone(), detection::from_config(&config), deduper);

        info!(
            zones = zones.len(),
            score_policy = ?config.score_policy,
            panic_policy = ?config.panic_policy,
            detection = scanner.strategy_name(),
            "safety engine ready"
        );

        Ok(Self {
            store,
            zones,
            scoring,
            panic,
            scanner,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn register_tourist(&self, registration: Registration, now: DateTime<Utc>) -> Result<Tourist> {
        let registration = registration
            .normalized()
            .map_err(SafetyError::InvalidRegistration)?;
        let tourist = self
            .store
            .insert_tourist(NewTourist::from_registration(registration, now))?;

        info!(tourist = %tourist.id, digital_id = %tourist.digital_id, "tourist registered");
        Ok(tourist)
    }

    pub fn tourist_by_phone(&self, phone: &str) -> Result<Tourist> {
        self.store
            .find_tourist_by_phone(phone.trim())?
            .ok_or_else(|| SafetyError::PhoneNotFound(phone.trim().to_string()))
    }

    pub fn tourist(&self, id: TouristId) -> Result<Tourist> {
        self.store.get_tourist(id)
    }

    pub fn update_location(&self, id: TouristId, lat: f64, lon: f64, now: DateTime<Utc>) -> Result<LocationOutcome> {
        let point = GeoPoint::new(lat, lon).map_err(|e| match e {
            ZoneError::InvalidCoordinates(msg) => SafetyError::InvalidCoordinates(msg),
            other => SafetyError::Zone(other),
        })?;

        let mut tx = self.store.begin(id)?;
        let outcome = self.scoring.update_location(&mut *tx, point, now)?;
        tx.commit()?;

        Ok(outcome)
    }

    pub fn trigger_panic(&self, id: TouristId, now: DateTime<Utc>) -> Result<PanicOutcome> {
        let mut tx = self.store.begin(id)?;
        let outcome = self.panic.trigger(&mut *tx, now)?;
        tx.commit()?;

        Ok(outcome)
    }

    /// Authority-side resolution of a single anomaly
    pub fn resolve_anomaly(&self, anomaly_id: Uuid, now: DateTime<Utc>) -> Result<Anomaly> {
        let owner = self
            .store
            .anomaly_owner(anomaly_id)?
            .ok_or(SafetyError::AnomalyNotFound(anomaly_id))?;

        let mut tx = self.store.begin(owner)?;
        let anomaly = tx
            .resolve_anomaly(anomaly_id, now)?
            .ok_or(SafetyError::AnomalyNotFound(anomaly_id))?;
        tx.commit()?;

        info!(anomaly = %anomaly_id, tourist = %owner, "anomaly resolved");
        Ok(anomaly)
    }

    pub fn run_scan(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        self.scanner.tick(now)
    }

    pub fn list_zones(&self) -> Vec<SafetyZone> {
        self.zones.zones().to_vec()
    }

    pub fn list_tourists(&self) -> Result<Vec<TouristView>> {
        Ok(self.store.list_tourists()?.iter().map(TouristView::from).collect())
    }

    pub fn list_alerts(&self, limit: usize) -> Result<Vec<AlertView>> {
        let names = NameIndex::new(&self.store.list_tourists()?);
        Ok(self
            .store
            .list_alerts(limit)?
            .iter()
            .map(|a| names.alert(a))
            .collect())
    }

    pub fn list_anomalies(&self, active_only: bool, limit: usize) -> Result<Vec<AnomalyView>> {
        let names = NameIndex::new(&self.store.list_tourists()?);
        Ok(self
            .store
            .list_anomalies(active_only, limit)?
            .iter()
            .map(|a| names.anomaly(a))
            .collect())
    }
}
