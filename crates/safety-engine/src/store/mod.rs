//! Data-access interface consumed by the engine
//!
//! [`SafetyStore`] covers reads that span tourists and the creation of new
//! tourists. [`StoreTx`] is a unit of work scoped to one tourist: reads see
//! staged writes, nothing is visible to other readers until [`StoreTx::commit`],
//! and dropping an uncommitted transaction discards every staged write.

use chrono::{DateTime, Utc};
use safety_zones::SafetyZone;
use uuid::Uuid;

use crate::model::{Alert, AlertType, Anomaly, AnomalyKind, NewTourist, Tourist, TouristId};
use crate::Result;

pub mod memory;

pub trait SafetyStore: Send + Sync {
    /// Fails with `AlreadyRegistered` on a duplicate phone or KYC id
    fn insert_tourist(&self, new: NewTourist) -> Result<Tourist>;

    fn get_tourist(&self, id: TouristId) -> Result<Tourist>;

    fn find_tourist_by_phone(&self, phone: &str) -> Result<Option<Tourist>>;

    fn list_tourists(&self) -> Result<Vec<Tourist>>;

    /// Tourists whose visit ends after `now`
    fn list_active_tourists(&self, now: DateTime<Utc>) -> Result<Vec<Tourist>>;

    fn list_zones(&self) -> Result<Vec<SafetyZone>>;

    /// Newest first
    fn list_alerts(&self, limit: usize) -> Result<Vec<Alert>>;

    /// Newest first
    fn list_anomalies(&self, active_only: bool, limit: usize) -> Result<Vec<Anomaly>>;

    fn anomaly_owner(&self, anomaly_id: Uuid) -> Result<Option<TouristId>>;

    /// Opens a transaction holding exclusive access to one tourist
    fn begin(&self, id: TouristId) -> Result<Box<dyn StoreTx + '_>>;
}

pub trait StoreTx {
    fn tourist(&self) -> &Tourist;

    fn tourist_mut(&mut self) -> &mut Tourist;

    /// Most recent alert of `alert_type` with a timestamp strictly after `since`
    fn find_recent_alert(&self, alert_type: &AlertType, since: DateTime<Utc>) -> Result<Option<Alert>>;

    fn save_alert(&mut self, alert: Alert) -> Result<()>;

    /// Unresolved anomaly of `kind` with a timestamp strictly after `since`
    fn find_active_anomaly(&self, kind: AnomalyKind, since: DateTime<Utc>) -> Result<Option<Anomaly>>;

    fn save_anomaly(&mut self, anomaly: Anomaly) -> Result<()>;

    /// Marks every active anomaly of the tourist resolved, returns them
    fn resolve_anomalies(&mut self, at: DateTime<Utc>) -> Result<Vec<Anomaly>>;

    /// Resolves one anomaly; `None` if the tourist has no such anomaly
    fn resolve_anomaly(&mut self, anomaly_id: Uuid, at: DateTime<Utc>) -> Result<Option<Anomaly>>;

    fn commit(self: Box<Self>) -> Result<()>;
}
