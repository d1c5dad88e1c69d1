//! Tests for geo_utils module

use tracestay::GeoPoint;
use tracestay::geo_utils::*;

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

#[test]
fn test_haversine_distance_same_point() {
    let p = GeoPoint::new(51.5074, -0.1278);
    assert_eq!(haversine_distance(&p, &p), 0.0);
}

#[test]
fn test_haversine_distance_known_value() {
    // London to Paris is approximately 344 km
    let london = GeoPoint::new(51.5074, -0.1278);
    let paris = GeoPoint::new(48.8566, 2.3522);
    let dist = haversine_distance(&london, &paris);
    assert!(approx_eq(dist, 343_560.0, 5000.0)); // Within 5km
}

#[test]
fn test_meters_to_degrees() {
    // At equator, 111km = 1 degree
    let deg = meters_to_degrees(111_320.0, 0.0);
    assert!(approx_eq(deg, 1.0, 0.01));

    // At higher latitude, same distance = more degrees
    let deg_45 = meters_to_degrees(111_320.0, 45.0);
    assert!(deg_45 > 1.0);

    // Capped at the pole
    assert_eq!(meters_to_degrees(10.0, 90.0), 360.0);
}

#[test]
fn test_median_odd_and_even() {
    assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
    assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    assert_eq!(median(&[]), None);
}

#[test]
fn test_mean() {
    assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
    assert_eq!(mean(&[]), None);
}

#[test]
fn test_offset_point_distance() {
    let origin = GeoPoint::new(4.6097, -74.0817);
    let north = offset_point(&origin, 120.0, 0.0);
    let east = offset_point(&origin, 0.0, 120.0);
    assert!(approx_eq(haversine_distance(&origin, &north), 120.0, 0.5));
    assert!(approx_eq(haversine_distance(&origin, &east), 120.0, 0.5));
}
