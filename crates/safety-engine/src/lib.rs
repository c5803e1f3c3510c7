//! Tourist Safety Engine
//!
//! Converts location updates into zone membership decisions, safety score
//! transitions and deduplicated alerts, and sweeps active tourists for
//! inactivity anomalies.
//!
//! # Components
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | ScoreEngine | [`scoring`] | zone lookup, score policy, geo-fence breach alerts |
//! | AlertDeduper | [`dedup`] | time-windowed suppression per tourist and type |
//! | AnomalyScanner | [`scanner`] | periodic inactivity sweep |
//! | Detection strategies | [`detection`] | threshold and statistical outlier detectors |
//! | PanicHandler | [`panic`] | distress alert and score penalty |
//!
//! All state access goes through the [`store::SafetyStore`] and
//! [`store::StoreTx`] traits. Every mutation of one tourist happens inside a
//! single transaction that is committed as a unit.

use safety_zones::ZoneError;
use thiserror::Error;
use uuid::Uuid;

pub mod config;
pub mod dedup;
pub mod detection;
pub mod model;
pub mod panic;
pub mod scanner;
pub mod scoring;
pub mod service;
pub mod store;
pub mod views;

pub use config::{DetectionKind, EngineConfig, PanicPolicy, ScorePolicy};
pub use model::{
    Alert, AlertType, Anomaly, AnomalyKind, AnomalyStatus, NewTourist, Registration, Tourist,
    TouristId,
};
pub use scanner::{AnomalyScanner, ScanReport};
pub use service::SafetyService;
pub use store::{memory::MemoryStore, SafetyStore, StoreTx};

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Tourist not found: {0}")]
    TouristNotFound(TouristId),
    #[error("No tourist registered for phone {0}")]
    PhoneNotFound(String),
    #[error("Anomaly not found: {0}")]
    AnomalyNotFound(Uuid),
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),
    #[error("Phone or KYC ID already registered")]
    AlreadyRegistered,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Zone error: {0}")]
    Zone(#[from] ZoneError),
    #[error("Storage failure: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, SafetyError>;
