//! Geographic utilities: great-circle distance, degree conversions, medians.

use crate::GeoPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Meters per degree of latitude (approximately constant).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two points in meters (haversine formula).
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = (p2.latitude - p1.latitude).to_radians();
    let dlng = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Convert a distance in meters to degrees of longitude at the given latitude.
///
/// Near the poles the conversion diverges, so the result is capped at 360.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let meters_per_deg_lng = METERS_PER_DEGREE * latitude.to_radians().cos().abs();
    if meters_per_deg_lng < 1e-6 {
        return 360.0;
    }
    (meters / meters_per_deg_lng).min(360.0)
}

/// Convert a distance in meters to degrees of latitude.
pub fn meters_to_lat_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

/// Median of a set of values, interpolating between the two middle values
/// for even-sized inputs. Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Arithmetic mean. Returns `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Point displaced from `origin` by the given north/east offsets in meters.
pub fn offset_point(origin: &GeoPoint, north_meters: f64, east_meters: f64) -> GeoPoint {
    GeoPoint::new(
        origin.latitude + meters_to_lat_degrees(north_meters),
        origin.longitude + east_meters.signum() * meters_to_degrees(east_meters.abs(), origin.latitude),
    )
}
