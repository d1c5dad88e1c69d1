//! Tests for config module

use tracestay::{ClusterConfig, PipelineConfig, StayError, StopConfig};

#[test]
fn test_defaults_are_valid() {
    assert!(PipelineConfig::default().validate().is_ok());
}

#[test]
fn test_partial_json_fills_defaults() {
    let json = r#"{
        "stops": { "minStopDurationMs": 600000 },
        "homeWork": { "homeMinDays": 2, "minHomeWorkDistanceMeters": 50.0 },
        "timezone": { "defaultTimezone": "America/Bogota" }
    }"#;
    let config = PipelineConfig::from_json_str(json).unwrap();
    assert_eq!(config.stops.min_stop_duration_ms, 600_000);
    assert_eq!(config.stops.distance_threshold_meters, 100.0);
    assert_eq!(config.home_work.home_min_days, 2);
    assert_eq!(config.home_work.work_start_hour, 9);
    assert_eq!(config.timezone.default_timezone, "America/Bogota");
    assert_eq!(config.clustering, ClusterConfig::default());
}

#[test]
fn test_hour_out_of_range() {
    let json = r#"{ "homeWork": { "homeEveningHour": 24 } }"#;
    let err = PipelineConfig::from_json_str(json).unwrap_err();
    match err {
        StayError::InvalidConfig { field, .. } => assert_eq!(field, "homeEveningHour"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_work_window_must_be_ordered() {
    let mut config = PipelineConfig::default();
    config.home_work.work_start_hour = 18;
    config.home_work.work_end_hour = 9;
    assert!(config.validate().is_err());
}

#[test]
fn test_min_points_at_least_one() {
    let config = ClusterConfig {
        dbscan_min_points: 0,
        ..ClusterConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(StayError::InvalidConfig { .. })
    ));
}

#[test]
fn test_negative_thresholds_rejected() {
    let stops = StopConfig {
        distance_threshold_meters: -1.0,
        ..StopConfig::default()
    };
    assert!(stops.validate().is_err());

    let stops = StopConfig {
        min_stop_duration_ms: -5,
        ..StopConfig::default()
    };
    assert!(stops.validate().is_err());

    let clustering = ClusterConfig {
        dbscan_eps_meters: f64::NAN,
        ..ClusterConfig::default()
    };
    assert!(clustering.validate().is_err());
}

#[test]
fn test_unknown_default_timezone() {
    let json = r#"{ "timezone": { "defaultTimezone": "Nowhere/Special" } }"#;
    assert!(matches!(
        PipelineConfig::from_json_str(json),
        Err(StayError::UnknownTimezone { .. })
    ));
}

#[test]
fn test_malformed_json() {
    assert!(matches!(
        PipelineConfig::from_json_str("{ not json"),
        Err(StayError::Json(_))
    ));
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        PipelineConfig::from_json_file("/nonexistent/tracestay.json"),
        Err(StayError::Io(_))
    ));
}
