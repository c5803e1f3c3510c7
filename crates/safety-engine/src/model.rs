//! Tourist, alert and anomaly records

use chrono::{DateTime, Duration, Utc};
use safety_zones::GeoPoint;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Initial and maximum safety score
pub const MAX_SAFETY_SCORE: u8 = 100;

/// Upper bound on a single visit, keeps date arithmetic in range
pub const MAX_VISIT_DAYS: u32 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TouristId(pub u64);

impl std::fmt::Display for TouristId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tourist {
    pub id: TouristId,
    /// Hex digest issued at registration
    pub digital_id: String,
    pub name: String,
    pub phone: String,
    pub kyc_id: String,
    /// e.g. Aadhaar, Passport
    pub kyc_type: String,
    pub visit_start_date: DateTime<Utc>,
    pub visit_end_date: DateTime<Utc>,
    pub safety_score: u8,
    pub last_known_location: Option<GeoPoint>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl Tourist {
    pub fn from_new(id: TouristId, new: NewTourist) -> Self {
        Self {
            id,
            digital_id: new.digital_id,
            name: new.name,
            phone: new.phone,
            kyc_id: new.kyc_id,
            kyc_type: new.kyc_type,
            visit_start_date: new.visit_start_date,
            visit_end_date: new.visit_end_date,
            safety_score: MAX_SAFETY_SCORE,
            last_known_location: None,
            last_updated_at: None,
        }
    }

    /// Still inside the visit window
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.visit_end_date > now
    }

    /// Location snapshot as stored on alerts
    pub fn location_label(&self) -> String {
        self.last_known_location
            .map(|p| p.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    /// Seconds since the last location write, or since the visit started
    /// for tourists that never reported.
    pub fn inactivity_secs(&self, now: DateTime<Utc>) -> i64 {
        let since = self.last_updated_at.unwrap_or(self.visit_start_date);
        (now - since).num_seconds().max(0)
    }
}

/// Registration payload from the inbound layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub phone: String,
    pub kyc_id: String,
    pub kyc_type: String,
    pub visit_duration_days: u32,
}

impl Registration {
    /// Trimmed copy, or the first field that fails validation
    pub fn normalized(&self) -> std::result::Result<Registration, String> {
        let field = |label: &str, value: &str| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(format!("{} is required", label))
            } else {
                Ok(trimmed.to_string())
            }
        };

        if self.visit_duration_days == 0 || self.visit_duration_days > MAX_VISIT_DAYS {
            return Err(format!(
                "visit_duration_days must be between 1 and {}",
                MAX_VISIT_DAYS
            ));
        }

        Ok(Registration {
            name: field("name", &self.name)?,
            phone: field("phone", &self.phone)?,
            kyc_id: field("kyc_id", &self.kyc_id)?,
            kyc_type: field("kyc_type", &self.kyc_type)?,
            visit_duration_days: self.visit_duration_days,
        })
    }
}

/// A tourist before the store assigns an id
#[derive(Debug, Clone)]
pub struct NewTourist {
    pub digital_id: String,
    pub name: String,
    pub phone: String,
    pub kyc_id: String,
    pub kyc_type: String,
    pub visit_start_date: DateTime<Utc>,
    pub visit_end_date: DateTime<Utc>,
}

impl NewTourist {
    /// Build from an already normalized registration
    pub fn from_registration(reg: Registration, now: DateTime<Utc>) -> Self {
        let unique = format!("{}:{}:{}", reg.name, reg.kyc_id, now.to_rfc3339());
        let digital_id = blake3::hash(unique.as_bytes()).to_hex().to_string();

        Self {
            digital_id,
            visit_start_date: now,
            visit_end_date: now + Duration::days(reg.visit_duration_days as i64),
            name: reg.name,
            phone: reg.phone,
            kyc_id: reg.kyc_id,
            kyc_type: reg.kyc_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    WarningInactivity,
    CriticalInactivity,
    ProlongedInactivity,
}

impl AnomalyKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::WarningInactivity => "Warning Inactivity",
            Self::CriticalInactivity => "Critical Inactivity",
            Self::ProlongedInactivity => "Prolonged Inactivity",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    PanicButton,
    /// Carries the zone name
    GeoFenceBreach(String),
    Anomaly(AnomalyKind),
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PanicButton => f.write_str("Panic Button"),
            Self::GeoFenceBreach(zone) => write!(f, "Geo-fence Breach: Entered {}", zone),
            Self::Anomaly(kind) => write!(f, "Anomaly: {}", kind),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: Uuid,
    pub tourist_id: TouristId,
    pub location: String,
    pub alert_type: AlertType,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(tourist: &Tourist, alert_type: AlertType, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tourist_id: tourist.id,
            location: tourist.location_label(),
            alert_type,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anomaly {
    pub id: Uuid,
    pub tourist_id: TouristId,
    pub anomaly_type: AnomalyKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub status: AnomalyStatus,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Anomaly {
    pub fn new(
        tourist_id: TouristId,
        anomaly_type: AnomalyKind,
        description: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tourist_id,
            anomaly_type,
            description,
            timestamp,
            status: AnomalyStatus::Active,
            resolved_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AnomalyStatus::Active
    }

    pub fn resolve(&mut self, at: DateTime<Utc>) {
        self.status = AnomalyStatus::Resolved;
        self.resolved_at = Some(at);
    }
}
