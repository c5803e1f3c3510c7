//! Safety Zones Library
//!
//! Great-circle geometry and the read-only index of geographic safety zones
//! that tourist locations are scored against.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

pub mod loader;

/// Mean Earth radius in km
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Error, Debug)]
pub enum ZoneError {
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("Invalid zone {name}: {reason}")]
    InvalidZone { name: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ZoneError>;

/// A validated latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !is_valid_latitude(latitude) {
            return Err(ZoneError::InvalidCoordinates(format!(
                "latitude {} outside [-90, 90]",
                latitude
            )));
        }
        if !is_valid_longitude(longitude) {
            return Err(ZoneError::InvalidCoordinates(format!(
                "longitude {} outside [-180, 180]",
                longitude
            )));
        }
        Ok(Self { latitude, longitude })
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lat: {}, Lon: {}", self.latitude, self.longitude)
    }
}

pub fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

pub fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && lon.is_finite()
}

/// Haversine distance between two points in km
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1 * PI / 180.0;
    let lat2_rad = lat2 * PI / 180.0;
    let dlat = (lat2 - lat1) * PI / 180.0;
    let dlon = (lon2 - lon1) * PI / 180.0;

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafetyZone {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in km
    pub radius: f64,
    /// 0-100, lower = more dangerous
    pub regional_score: u8,
}

impl SafetyZone {
    pub fn new(name: &str, latitude: f64, longitude: f64, radius: f64, regional_score: u8) -> Self {
        Self {
            name: name.to_string(),
            latitude,
            longitude,
            radius,
            regional_score,
        }
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Boundary is inclusive
    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.center().distance_km(point) <= self.radius
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ZoneError::InvalidZone {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("empty name".to_string()));
        }
        if !is_valid_latitude(self.latitude) || !is_valid_longitude(self.longitude) {
            return Err(invalid(format!(
                "center ({}, {}) out of range",
                self.latitude, self.longitude
            )));
        }
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(invalid(format!("radius {} must be a non-negative number", self.radius)));
        }
        if self.regional_score > 100 {
            return Err(invalid(format!("regional score {} above 100", self.regional_score)));
        }
        Ok(())
    }
}

/// Ordered, read-only collection of safety zones with linear membership scan
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    zones: Vec<SafetyZone>,
}

impl ZoneIndex {
    pub fn new(zones: Vec<SafetyZone>) -> Result<Self> {
        for zone in &zones {
            zone.validate()?;
        }
        Ok(Self { zones })
    }

    /// Zones of the initial deployment around Delhi
    pub fn with_seed_zones() -> Self {
        Self {
            zones: vec![
                SafetyZone::new("City Center", 28.6139, 77.2090, 50.0, 95),
                SafetyZone::new("Remote Hills", 28.7041, 77.1025, 100.0, 70),
                SafetyZone::new("Restricted Area", 28.5355, 77.3910, 80.0, 25),
            ],
        }
    }

    pub fn zones(&self) -> &[SafetyZone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zones_containing(&self, point: &GeoPoint) -> Vec<&SafetyZone> {
        self.zones.iter().filter(|z| z.contains(point)).collect()
    }
}
