//! Tests for home_work module

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracestay::geo_utils::offset_point;
use tracestay::home_work::{is_home_time, is_work_time, score_clusters, select_home, select_work};
use tracestay::{
    AnnotatedStop, ClusterVisits, GeoPoint, HomeWorkConfig, LocationType, NOISE_LABEL,
    NoTimezoneLookup, PlaceCluster, Stop, annotate_stop, classify_device,
};

const HOME: GeoPoint = GeoPoint {
    latitude: 4.6097,
    longitude: -74.0817,
};

fn config() -> HomeWorkConfig {
    HomeWorkConfig {
        home_min_days: 2,
        home_evening_hour: 19,
        home_morning_hour: 8,
        work_min_days: 2,
        work_start_hour: 9,
        work_end_hour: 18,
        min_home_work_distance_meters: 50.0,
    }
}

/// A one-hour stop at `point` in `cluster`, starting at the given UTC time.
fn visit(index: u32, cluster: i32, point: GeoPoint, ymd: (i32, u32, u32), hour: u32) -> AnnotatedStop {
    let start_ts = NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis();
    let stop = Stop {
        device_id: "u1".to_string(),
        stop_index: index,
        start_ts,
        end_ts: start_ts + 3_600_000,
        latitude: point.latitude,
        longitude: point.longitude,
    };
    let local = annotate_stop(&stop, &NoTimezoneLookup, Tz::UTC);
    AnnotatedStop {
        cluster: PlaceCluster {
            device_id: "u1".to_string(),
            cluster_label: cluster,
            centroid_latitude: point.latitude,
            centroid_longitude: point.longitude,
            member_count: 1,
        },
        stop,
        local,
    }
}

fn visits_row(label: i32, point: GeoPoint, home: (u32, u32), days: u32, work: (u32, u32)) -> ClusterVisits {
    ClusterVisits {
        cluster_label: label,
        latitude: point.latitude,
        longitude: point.longitude,
        home_time_visits: home.0,
        home_time_unique_days: home.1,
        unique_days_visited: days,
        work_time_visits: work.0,
        work_time_unique_days: work.1,
    }
}

#[test]
fn test_visit_windows() {
    let cfg = config();
    // 2024-03-04 is a Monday, 2024-03-09 a Saturday
    assert!(is_home_time(&visit(1, 0, HOME, (2024, 3, 4), 22).local, &cfg));
    assert!(is_home_time(&visit(1, 0, HOME, (2024, 3, 4), 7).local, &cfg));
    assert!(!is_home_time(&visit(1, 0, HOME, (2024, 3, 4), 8).local, &cfg));
    assert!(is_home_time(&visit(1, 0, HOME, (2024, 3, 9), 12).local, &cfg));

    assert!(is_work_time(&visit(1, 0, HOME, (2024, 3, 4), 9).local, &cfg));
    assert!(is_work_time(&visit(1, 0, HOME, (2024, 3, 4), 18).local, &cfg));
    assert!(!is_work_time(&visit(1, 0, HOME, (2024, 3, 4), 19).local, &cfg));
    assert!(!is_work_time(&visit(1, 0, HOME, (2024, 3, 9), 12).local, &cfg));
}

#[test]
fn test_scores_count_visits_and_distinct_days() {
    let stops = vec![
        visit(1, 0, HOME, (2024, 3, 4), 22),
        visit(2, 0, HOME, (2024, 3, 4), 23),
        visit(3, 0, HOME, (2024, 3, 5), 10),
        visit(4, NOISE_LABEL, HOME, (2024, 3, 5), 22),
    ];
    let scores = score_clusters(&stops, &config());

    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].home_time_visits, 2);
    assert_eq!(scores[0].home_time_unique_days, 1);
    assert_eq!(scores[0].unique_days_visited, 2);
    assert_eq!(scores[0].work_time_visits, 1);
    assert_eq!(scores[0].work_time_unique_days, 1);
}

#[test]
fn test_home_requires_min_days() {
    let scores = vec![
        visits_row(0, HOME, (9, 1), 1, (0, 0)),
        visits_row(1, HOME, (2, 2), 2, (0, 0)),
    ];
    let home = select_home(&scores, &config()).unwrap();
    assert_eq!(home.cluster_label, 1);

    let strict = HomeWorkConfig {
        home_min_days: 5,
        ..config()
    };
    assert!(select_home(&scores, &strict).is_none());
}

#[test]
fn test_home_ties_break_by_days_then_label() {
    let scores = vec![
        visits_row(2, HOME, (4, 3), 3, (0, 0)),
        visits_row(1, HOME, (4, 3), 3, (0, 0)),
        visits_row(0, HOME, (4, 2), 3, (0, 0)),
    ];
    assert_eq!(select_home(&scores, &config()).unwrap().cluster_label, 1);
}

#[test]
fn test_work_excludes_home_and_near_places() {
    let near = offset_point(&HOME, 10.0, 0.0);
    let far = offset_point(&HOME, 500.0, 0.0);
    let scores = vec![
        visits_row(0, HOME, (5, 5), 5, (9, 5)),
        visits_row(1, near, (0, 0), 4, (8, 4)),
        visits_row(2, far, (0, 0), 2, (2, 2)),
    ];
    let cfg = config();
    let home = select_home(&scores, &cfg);
    assert_eq!(home.map(|h| h.cluster_label), Some(0));

    let work = select_work(&scores, home, &cfg).unwrap();
    assert_eq!(work.cluster_label, 2);
}

#[test]
fn test_work_without_home_skips_distance_gate() {
    let scores = vec![
        visits_row(0, HOME, (0, 0), 1, (6, 3)),
        visits_row(1, offset_point(&HOME, 10.0, 0.0), (0, 0), 1, (4, 3)),
    ];
    let cfg = HomeWorkConfig {
        home_min_days: 10,
        ..config()
    };
    let home = select_home(&scores, &cfg);
    assert!(home.is_none());
    assert_eq!(select_work(&scores, home, &cfg).unwrap().cluster_label, 0);
}

#[test]
fn test_work_requires_min_days() {
    let far = offset_point(&HOME, 500.0, 0.0);
    let scores = vec![
        visits_row(0, HOME, (5, 5), 5, (0, 0)),
        visits_row(1, far, (0, 0), 1, (6, 1)),
    ];
    let cfg = config();
    let home = select_home(&scores, &cfg);
    assert!(select_work(&scores, home, &cfg).is_none());
}

#[test]
fn test_noise_is_never_home() {
    let stops: Vec<AnnotatedStop> = (0..5)
        .map(|d| visit(d + 1, NOISE_LABEL, HOME, (2024, 3, 4 + d), 22))
        .collect();
    let (profiles, labeled) = classify_device("u1", stops, &config());

    assert_eq!(profiles.len(), 1);
    assert!(profiles[0].home.is_none());
    assert!(labeled.iter().all(|s| s.location_type == LocationType::Other));
    assert!(labeled.iter().all(|s| s.location_label == -1));
}

#[test]
fn test_profiles_are_per_year() {
    let moved = offset_point(&HOME, 3_000.0, 0.0);
    let mut stops = Vec::new();
    for d in 0..3 {
        stops.push(visit(d + 1, 0, HOME, (2023, 6, 5 + d), 22));
        stops.push(visit(d + 4, 1, moved, (2024, 6, 3 + d), 22));
    }
    let (profiles, labeled) = classify_device("u1", stops, &config());

    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].year, 2023);
    assert_eq!(profiles[0].home_cluster_label(), Some(0));
    assert_eq!(profiles[1].year, 2024);
    assert_eq!(profiles[1].home_cluster_label(), Some(1));

    for stop in &labeled {
        assert_eq!(stop.location_type, LocationType::Home);
        let expected = if stop.local.year == 2023 { 1 } else { 2 };
        assert_eq!(stop.location_label, expected);
    }
}

#[test]
fn test_unchanged_home_keeps_label_across_years() {
    let mut stops = Vec::new();
    for d in 0..3 {
        stops.push(visit(d + 1, 0, HOME, (2023, 6, 5 + d), 22));
        stops.push(visit(d + 4, 0, HOME, (2024, 6, 3 + d), 22));
    }
    let (_, labeled) = classify_device("u1", stops, &config());
    assert!(labeled.iter().all(|s| s.location_label == 1));
}
