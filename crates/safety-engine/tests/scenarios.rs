//! End-to-end engine scenarios through `SafetyService`

use chrono::{DateTime, Duration, TimeZone, Utc};
use safety_engine::{
    AlertType, AnomalyKind, AnomalyStatus, DetectionKind, EngineConfig, MemoryStore, PanicPolicy,
    Registration, SafetyError, SafetyService, SafetyStore, ScorePolicy, TouristId,
};
use safety_zones::{SafetyZone, ZoneIndex};
use std::sync::Arc;

// Seed zones: City Center (95), Remote Hills (70), Restricted Area (25)
const RESTRICTED: (f64, f64) = (28.5355, 77.3910);
const MUMBAI: (f64, f64) = (19.0760, 72.8777);

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap()
}

fn service(config: EngineConfig) -> (Arc<MemoryStore>, SafetyService) {
    let store = Arc::new(MemoryStore::with_seed_zones());
    let service = SafetyService::new(store.clone(), config).unwrap();
    (store, service)
}

fn registration(n: u32) -> Registration {
    Registration {
        name: format!("Visitor {}", n),
        phone: format!("+91-98000-{:05}", n),
        kyc_id: format!("KYC-{}", n),
        kyc_type: "Aadhaar".to_string(),
        visit_duration_days: 5,
    }
}

fn set_score(store: &MemoryStore, id: TouristId, score: u8) {
    let mut tx = store.begin(id).unwrap();
    tx.tourist_mut().safety_score = score;
    tx.commit().unwrap();
}

#[test]
fn restricted_area_breach_from_full_score() {
    let (_, svc) = service(EngineConfig::default());
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();
    assert_eq!(tourist.safety_score, 100);

    // Restricted Area lies inside City Center and Remote Hills as well
    let outcome = svc
        .update_location(tourist.id, RESTRICTED.0, RESTRICTED.1, t0())
        .unwrap();
    assert_eq!(outcome.safety_score, 25);
    assert_eq!(outcome.issued_alerts.len(), 1);
    assert_eq!(
        outcome.issued_alerts[0].alert_type,
        AlertType::GeoFenceBreach("Restricted Area".to_string())
    );

    let alerts = svc.list_alerts(50).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].tourist_name, "Visitor 1");
    assert_eq!(alerts[0].alert_type, "Geo-fence Breach: Entered Restricted Area");
    assert_eq!(alerts[0].location, "Lat: 28.5355, Lon: 77.391");
}

// Synthetic zones far from the seed set: Harbor alone, and an overlapping pair
fn synthetic_service() -> (Arc<MemoryStore>, SafetyService) {
    let index = ZoneIndex::new(vec![
        SafetyZone::new("Harbor", 10.0, 10.0, 5.0, 95),
        SafetyZone::new("Meadow", 40.0, 40.0, 10.0, 90),
        SafetyZone::new("Ridge", 40.0, 40.05, 10.0, 70),
    ])
    .unwrap();
    let store = Arc::new(MemoryStore::new(&index));
    let service = SafetyService::new(store.clone(), EngineConfig::default()).unwrap();
    (store, service)
}

#[test]
fn safe_zone_recovers_one_point() {
    let (store, svc) = synthetic_service();
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();
    set_score(&store, tourist.id, 60);

    let outcome = svc.update_location(tourist.id, 10.0, 10.0, t0()).unwrap();
    assert_eq!(outcome.zones, vec!["Harbor".to_string()]);
    assert_eq!(outcome.safety_score, 61);
}

#[test]
fn overlapping_zone_pessimism() {
    let (_, svc) = synthetic_service();
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();

    let outcome = svc.update_location(tourist.id, 40.0, 40.02, t0()).unwrap();
    assert_eq!(outcome.zones.len(), 2);
    assert_eq!(outcome.safety_score, 70);
    assert!(outcome.issued_alerts.is_empty());
}

#[test]
fn repeated_update_is_idempotent_for_the_score() {
    let (_, svc) = synthetic_service();
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();

    let first = svc.update_location(tourist.id, 40.0, 40.02, t0()).unwrap();
    let second = svc
        .update_location(tourist.id, 40.0, 40.02, t0() + Duration::seconds(30))
        .unwrap();
    assert_eq!(first.safety_score, second.safety_score);
}

#[test]
fn neutral_area_leaves_score_untouched() {
    let (_, svc) = service(EngineConfig::default());
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();

    let outcome = svc.update_location(tourist.id, MUMBAI.0, MUMBAI.1, t0()).unwrap();
    assert_eq!(outcome.safety_score, 100);
    assert!(outcome.issued_alerts.is_empty());
}

#[test]
fn breach_dedup_nine_versus_eleven_minutes() {
    let (_, svc) = service(EngineConfig::default());
    let a = svc.register_tourist(registration(1), t0()).unwrap();
    let b = svc.register_tourist(registration(2), t0()).unwrap();

    svc.update_location(a.id, RESTRICTED.0, RESTRICTED.1, t0()).unwrap();
    svc.update_location(a.id, RESTRICTED.0, RESTRICTED.1, t0() + Duration::minutes(9))
        .unwrap();

    svc.update_location(b.id, RESTRICTED.0, RESTRICTED.1, t0()).unwrap();
    svc.update_location(b.id, RESTRICTED.0, RESTRICTED.1, t0() + Duration::minutes(11))
        .unwrap();

    let alerts = svc.list_alerts(50).unwrap();
    assert_eq!(alerts.iter().filter(|a| a.tourist_name == "Visitor 1").count(), 1);
    assert_eq!(alerts.iter().filter(|a| a.tourist_name == "Visitor 2").count(), 2);
}

#[test]
fn location_update_resolves_anomalies() {
    let (_, svc) = service(EngineConfig::default());
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();
    svc.update_location(tourist.id, MUMBAI.0, MUMBAI.1, t0()).unwrap();

    let report = svc.run_scan(t0() + Duration::seconds(700)).unwrap();
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].anomaly_type, AnomalyKind::CriticalInactivity);
    assert_eq!(svc.list_anomalies(true, 50).unwrap().len(), 1);

    // Score drops to 25 here; resolution does not depend on the score
    let outcome = svc
        .update_location(tourist.id, RESTRICTED.0, RESTRICTED.1, t0() + Duration::seconds(720))
        .unwrap();
    assert_eq!(outcome.resolved_anomalies.len(), 1);
    assert!(svc.list_anomalies(true, 50).unwrap().is_empty());

    let all = svc.list_anomalies(false, 50).unwrap();
    assert_eq!(all[0].status, AnomalyStatus::Resolved);
}

#[test]
fn warning_inactivity_below_critical() {
    let (_, svc) = service(EngineConfig::default());
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();
    svc.update_location(tourist.id, MUMBAI.0, MUMBAI.1, t0()).unwrap();

    let report = svc.run_scan(t0() + Duration::seconds(400)).unwrap();
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].anomaly_type, AnomalyKind::WarningInactivity);
}

#[test]
fn explicit_resolution() {
    let (_, svc) = service(EngineConfig::default());
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();
    svc.update_location(tourist.id, MUMBAI.0, MUMBAI.1, t0()).unwrap();
    let report = svc.run_scan(t0() + Duration::seconds(900)).unwrap();
    let anomaly_id = report.created[0].id;

    let resolved = svc.resolve_anomaly(anomaly_id, t0() + Duration::seconds(950)).unwrap();
    assert_eq!(resolved.status, AnomalyStatus::Resolved);
    assert!(svc.list_anomalies(true, 50).unwrap().is_empty());

    let missing = svc.resolve_anomaly(uuid::Uuid::nil(), t0());
    assert!(matches!(missing, Err(SafetyError::AnomalyNotFound(_))));
}

#[test]
fn panic_flat_penalty_twice() {
    let (store, svc) = service(EngineConfig::default());
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();
    set_score(&store, tourist.id, 50);

    let first = svc.trigger_panic(tourist.id, t0()).unwrap();
    assert_eq!(first.safety_score, 30);
    let second = svc.trigger_panic(tourist.id, t0() + Duration::minutes(1)).unwrap();
    assert_eq!(second.safety_score, 10);

    let alerts = svc.list_alerts(50).unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|a| a.alert_type == "Panic Button"));
}

#[test]
fn panic_hard_reset_policy() {
    let config = EngineConfig {
        panic_policy: PanicPolicy::HardReset,
        ..Default::default()
    };
    let (_, svc) = service(config);
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();

    let outcome = svc.trigger_panic(tourist.id, t0()).unwrap();
    assert_eq!(outcome.safety_score, 0);
}

#[test]
fn smoothing_policy_end_to_end() {
    let config = EngineConfig {
        score_policy: ScorePolicy::Smoothing,
        ..Default::default()
    };
    let (_, svc) = service(config);
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();

    let outcome = svc
        .update_location(tourist.id, RESTRICTED.0, RESTRICTED.1, t0())
        .unwrap();
    assert_eq!(outcome.safety_score, 93);
    let outcome = svc.update_location(tourist.id, MUMBAI.0, MUMBAI.1, t0()).unwrap();
    // round(0.9 * 93 + 0.1 * 70) = round(90.7)
    assert_eq!(outcome.safety_score, 91);
}

#[test]
fn statistical_strategy_flags_the_quiet_tourist() {
    let config = EngineConfig {
        detection: DetectionKind::Statistical,
        ..Default::default()
    };
    let (_, svc) = service(config);
    let quiet = svc.register_tourist(registration(1), t0()).unwrap();
    let active = svc.register_tourist(registration(2), t0()).unwrap();

    let now = t0() + Duration::hours(1);
    svc.update_location(quiet.id, MUMBAI.0, MUMBAI.1, t0()).unwrap();
    svc.update_location(active.id, MUMBAI.0, MUMBAI.1, now - Duration::seconds(5))
        .unwrap();

    let report = svc.run_scan(now).unwrap();
    assert_eq!(report.strategy, "statistical");
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].tourist_id, quiet.id);
    assert_eq!(report.created[0].anomaly_type, AnomalyKind::ProlongedInactivity);
}

#[test]
fn rejected_inputs_mutate_nothing() {
    let (store, svc) = service(EngineConfig::default());
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();

    let err = svc.update_location(tourist.id, 91.0, 10.0, t0()).unwrap_err();
    assert!(matches!(err, SafetyError::InvalidCoordinates(_)));
    let err = svc.update_location(tourist.id, f64::NAN, 10.0, t0()).unwrap_err();
    assert!(matches!(err, SafetyError::InvalidCoordinates(_)));

    let err = svc
        .update_location(TouristId(999), RESTRICTED.0, RESTRICTED.1, t0())
        .unwrap_err();
    assert!(matches!(err, SafetyError::TouristNotFound(TouristId(999))));
    assert!(matches!(
        svc.trigger_panic(TouristId(999), t0()),
        Err(SafetyError::TouristNotFound(_))
    ));

    let after = store.get_tourist(tourist.id).unwrap();
    assert_eq!(after.safety_score, 100);
    assert!(after.last_updated_at.is_none());
    assert!(svc.list_alerts(50).unwrap().is_empty());
}

#[test]
fn oversized_dedup_window_is_rejected_at_startup() {
    let config = EngineConfig {
        dedup_window_secs: 1_000_000_000_000_000,
        ..Default::default()
    };
    let store = Arc::new(MemoryStore::with_seed_zones());
    assert!(matches!(
        SafetyService::new(store, config),
        Err(SafetyError::InvalidConfig(_))
    ));
}

#[test]
fn registration_rules() {
    let (_, svc) = service(EngineConfig::default());
    svc.register_tourist(registration(1), t0()).unwrap();

    let mut dup_phone = registration(2);
    dup_phone.phone = registration(1).phone;
    assert!(matches!(
        svc.register_tourist(dup_phone, t0()),
        Err(SafetyError::AlreadyRegistered)
    ));

    let mut blank = registration(3);
    blank.name = "  ".to_string();
    assert!(matches!(
        svc.register_tourist(blank, t0()),
        Err(SafetyError::InvalidRegistration(_))
    ));

    assert_eq!(svc.tourist_by_phone(&registration(1).phone).unwrap().name, "Visitor 1");
    assert!(matches!(
        svc.tourist_by_phone("+00"),
        Err(SafetyError::PhoneNotFound(_))
    ));
}

#[test]
fn concurrent_updates_produce_one_breach_alert() {
    let (_, svc) = service(EngineConfig::default());
    let svc = Arc::new(svc);
    let tourist = svc.register_tourist(registration(1), t0()).unwrap();

    std::thread::scope(|scope| {
        for i in 0..8 {
            let svc = svc.clone();
            scope.spawn(move || {
                svc.update_location(
                    tourist.id,
                    RESTRICTED.0,
                    RESTRICTED.1,
                    t0() + Duration::seconds(i),
                )
                .unwrap();
            });
        }
    });

    assert_eq!(svc.list_alerts(50).unwrap().len(), 1);
    let view = &svc.list_tourists().unwrap()[0];
    assert_eq!(view.safety_score, 25);
}

#[test]
fn scanner_runs_alongside_updates() {
    let (_, svc) = service(EngineConfig::default());
    let svc = Arc::new(svc);
    let ids: Vec<TouristId> = (0..16)
        .map(|n| svc.register_tourist(registration(n), t0()).unwrap().id)
        .collect();

    std::thread::scope(|scope| {
        let scanner = svc.clone();
        scope.spawn(move || {
            for step in 0..20 {
                scanner.run_scan(t0() + Duration::seconds(700 + step)).unwrap();
            }
        });
        for id in ids.iter().copied() {
            let svc = svc.clone();
            scope.spawn(move || {
                svc.update_location(id, MUMBAI.0, MUMBAI.1, t0() + Duration::seconds(710))
                    .unwrap();
            });
        }
    });

    // Every tourist reported; at most one unresolved anomaly kind per tourist
    for view in svc.list_tourists().unwrap() {
        assert_eq!(view.last_known_location, format!("Lat: {}, Lon: {}", MUMBAI.0, MUMBAI.1));
    }
    let active = svc.list_anomalies(true, 1000).unwrap();
    assert!(active.len() <= ids.len());
}
