use std::f64::consts::PI;
use std::path::Path;

use stepdist::recording::{GravityReading, LocationReading, Reading};
use stepdist::{
    BackgroundStore, DistanceService, EngineConfig, EngineEvent, JsonFileStore, KeyValueStore,
    SessionLog,
};

const DT: f64 = 0.1;

/// One minute of walking at two steps per second and 1.4 m/s, with a fix every 2 s from t = 5.
fn recorded_walk() -> SessionLog {
    let mut readings = Vec::new();
    for k in 0..600 {
        let t = k as f64 * DT;
        let gravity = GravityReading {
            x: 3.0 * (2.0 * PI * t + 0.3).sin(),
            y: 0.0,
            z: 9.8,
        };
        let location = (k >= 50 && k % 20 == 10).then(|| {
            let n = ((k - 50) / 20) as f64;
            LocationReading {
                // 2.8 m north per fix
                latitude: 48.0 + 0.0000252 * n,
                longitude: 11.0,
                altitude: 500.0 + 0.1 * n,
                horizontal_accuracy: 4.0,
                vertical_accuracy: None,
            }
        });
        readings.push(Reading {
            timestamp: t,
            gravity: Some(gravity),
            location,
        });
    }
    SessionLog { readings }
}

fn spawn_service(store_path: &Path) -> DistanceService {
    let store = BackgroundStore::spawn(JsonFileStore::open(store_path).unwrap()).unwrap();
    DistanceService::spawn(Box::new(store)).unwrap()
}

#[test]
fn test_recorded_walk_calibrates_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("walk.json.gz");
    let store_path = dir.path().join("calibration.json");
    recorded_walk().save(&log_path).unwrap();

    let log = SessionLog::load(&log_path).unwrap();
    assert_eq!(log.sample_count(), 600);
    assert_eq!(log.fix_count(), 28);

    let service = spawn_service(&store_path);
    service.set_body_height(1.8).unwrap();
    service.start_localization(EngineConfig::default()).unwrap();
    service.start_measuring_distance(true).unwrap();
    log.replay(&service).unwrap();

    let snapshot = service.snapshot().unwrap();
    assert!(
        (110..=125).contains(&snapshot.distance.steps_taken),
        "counted {} steps",
        snapshot.distance.steps_taken
    );
    assert_eq!(snapshot.distance.relative_altitude_gain, 3);
    assert!((100..=130).contains(&snapshot.steps_per_minute));

    let step_length = snapshot.calibration.step_length;
    assert!((0.6..0.75).contains(&step_length), "step length {step_length}");
    assert_eq!(snapshot.calibration.last_calibrated_at, Some(59));
    assert!(snapshot.distance.distance_traveled > 0);

    service.stop_measuring_distance().unwrap();
    let events: Vec<EngineEvent> = service.events().try_iter().collect();
    service.shutdown().unwrap();

    let updates: Vec<_> = events.iter().filter_map(|e| e.as_distance()).collect();
    assert!(updates.windows(2).all(|w| w[0].steps_taken <= w[1].steps_taken));
    assert_eq!(
        updates.last().map(|u| u.steps_taken),
        Some(snapshot.distance.steps_taken)
    );
    assert!(events
        .iter()
        .filter_map(|e| e.as_status())
        .any(|s| s.debug_info.starts_with("Calibrated")));

    // Writes reached the file once the worker and its store shut down
    let stored = JsonFileStore::open(&store_path).unwrap();
    let persisted = stored.get("stepLength").unwrap().and_then(|v| v.as_f64());
    assert_eq!(persisted, Some(step_length));
    let height = stored.get("bodyHeight").unwrap().and_then(|v| v.as_f64());
    assert_eq!(height, Some(1.8));
}

#[test]
fn test_returning_user_is_ready_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("calibration.json");
    {
        let mut store = JsonFileStore::open(&store_path).unwrap();
        store.set("stepLength", serde_json::json!(0.72)).unwrap();
        store.set("lastCalibratedAt", serde_json::json!(1_700_000_000i64)).unwrap();
    }

    let service = spawn_service(&store_path);
    service.start_localization(EngineConfig::default()).unwrap();

    let status = service
        .events()
        .try_iter()
        .filter_map(|e| e.as_status().cloned())
        .last()
        .unwrap();
    assert!(status.is_ready_to_start);
    assert_eq!(status.step_length, 0.72);
    assert_eq!(status.last_calibrated_at, 1_700_000_000);
    assert_eq!(status.body_height, 0.0);
}

#[test]
fn test_samples_after_stop_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let service = spawn_service(&dir.path().join("calibration.json"));
    service.start_localization(EngineConfig::default()).unwrap();
    service.start_measuring_distance(false).unwrap();

    let walk = recorded_walk();
    for reading in &walk.readings[..100] {
        service.push_sample(reading.sample().unwrap()).unwrap();
    }
    service.stop_measuring_distance().unwrap();
    let steps = service.snapshot().unwrap().distance.steps_taken;
    assert!(steps > 0);

    for reading in &walk.readings[100..] {
        service.push_sample(reading.sample().unwrap()).unwrap();
    }
    assert_eq!(service.snapshot().unwrap().distance.steps_taken, steps);
}

#[test]
fn test_missing_option_refuses_start() {
    let dir = tempfile::tempdir().unwrap();
    let service = spawn_service(&dir.path().join("calibration.json"));

    let mut options = serde_json::to_value(EngineConfig::default()).unwrap();
    options.as_object_mut().unwrap().remove("deviationLength");
    let err = EngineConfig::from_value(options).unwrap_err();
    assert!(err.is_config_error());

    assert!(service.start_measuring_distance(true).is_err());
    assert!(!service.snapshot().unwrap().localizing);
}
