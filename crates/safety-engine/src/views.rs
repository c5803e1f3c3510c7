//! Denormalized read views for the dashboard

use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::model::{Alert, Anomaly, AnomalyStatus, Tourist, TouristId};

/// Dashboard timestamp format, e.g. `10-May-2026 12:00:00`
pub const TIMESTAMP_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

const UNKNOWN_TOURIST: &str = "Unknown";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TouristView {
    pub id: TouristId,
    pub name: String,
    pub phone: String,
    pub safety_score: u8,
    pub last_known_location: String,
}

impl From<&Tourist> for TouristView {
    fn from(t: &Tourist) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            phone: t.phone.clone(),
            safety_score: t.safety_score,
            last_known_location: t.location_label(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlertView {
    pub id: Uuid,
    pub tourist_id: TouristId,
    pub tourist_name: String,
    pub alert_type: String,
    pub location: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnomalyView {
    pub id: Uuid,
    pub tourist_id: TouristId,
    pub tourist_name: String,
    pub anomaly_type: String,
    pub description: String,
    pub status: AnomalyStatus,
    pub timestamp: String,
}

/// Tourist id to name lookup used to join views
pub struct NameIndex(HashMap<TouristId, String>);

impl NameIndex {
    pub fn new(tourists: &[Tourist]) -> Self {
        Self(tourists.iter().map(|t| (t.id, t.name.clone())).collect())
    }

    fn name(&self, id: TouristId) -> String {
        self.0
            .get(&id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_TOURIST.to_string())
    }

    pub fn alert(&self, alert: &Alert) -> AlertView {
        AlertView {
            id: alert.id,
            tourist_id: alert.tourist_id,
            tourist_name: self.name(alert.tourist_id),
            alert_type: alert.alert_type.to_string(),
            location: alert.location.clone(),
            timestamp: alert.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    pub fn anomaly(&self, anomaly: &Anomaly) -> AnomalyView {
        AnomalyView {
            id: anomaly.id,
            tourist_id: anomaly.tourist_id,
            tourist_name: self.name(anomaly.tourist_id),
            anomaly_type: anomaly.anomaly_type.to_string(),
            description: anomaly.description.clone(),
            status: anomaly.status,
            timestamp: anomaly.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertType, NewTourist, Registration};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_alert_view_joins_name() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        let reg = Registration {
            name: "Noor".into(),
            phone: "1".into(),
            kyc_id: "K".into(),
            kyc_type: "Passport".into(),
            visit_duration_days: 1,
        };
        let tourist = Tourist::from_new(TouristId(9), NewTourist::from_registration(reg, now));
        let names = NameIndex::new(std::slice::from_ref(&tourist));

        let alert = Alert::new(&tourist, AlertType::PanicButton, now);
        let view = names.alert(&alert);
        assert_eq!(view.tourist_name, "Noor");
        assert_eq!(view.alert_type, "Panic Button");
        assert_eq!(view.location, "N/A");
        assert_eq!(view.timestamp, "10-May-2026 12:00:00");

        let orphan = Alert {
            tourist_id: TouristId(404),
            ..alert
        };
        assert_eq!(names.alert(&orphan).tourist_name, "Unknown");
    }
}
