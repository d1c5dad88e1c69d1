//! Synthetic ping generator for tests and benchmarking.
//!
//! Generates a device's daily routine with known ground truth: nights
//! spent at a home point, weekday working hours spent at a work point,
//! sampled at a fixed interval with optional Gaussian GPS noise.
//!
//! # Example
//!
//! ```rust
//! use tracestay::synthetic::RoutineScenario;
//!
//! let scenario = RoutineScenario::commuter("u1", 42);
//! let pings = scenario.generate();
//! assert!(!pings.is_empty());
//! ```

use chrono::{Datelike, NaiveDate, NaiveTime, TimeDelta, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geo_utils::offset_point;
use crate::{GeoPoint, Ping};

// ============================================================================
// Types
// ============================================================================

/// A recurring visit to one point.
#[derive(Debug, Clone)]
pub struct VisitPattern {
    pub location: GeoPoint,
    /// Local (UTC) time of arrival
    pub arrive: NaiveTime,
    /// Time of departure; earlier than `arrive` means the next day
    pub depart: NaiveTime,
    /// Days on which the visit starts
    pub dates: Vec<NaiveDate>,
}

/// Scenario configuration for generating a device's pings.
#[derive(Debug, Clone)]
pub struct RoutineScenario {
    pub device_id: String,
    pub visits: Vec<VisitPattern>,
    /// Seconds between consecutive pings during a visit.
    pub ping_interval_secs: i64,
    /// GPS noise standard deviation in meters.
    pub gps_noise_sigma_meters: f64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

/// Default origin (Bogota).
pub const BOGOTA: GeoPoint = GeoPoint {
    latitude: 4.6097,
    longitude: -74.0817,
};

// ============================================================================
// Generation
// ============================================================================

/// Consecutive dates starting at `first`.
pub fn consecutive_dates(first: NaiveDate, count: usize) -> Vec<NaiveDate> {
    first.iter_days().take(count).collect()
}

/// The first `count` weekdays on or after `first`.
pub fn weekdays_from(first: NaiveDate, count: usize) -> Vec<NaiveDate> {
    first
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(count)
        .collect()
}

/// Add Gaussian GPS noise to a point.
fn add_gps_noise(point: &GeoPoint, sigma_meters: f64, rng: &mut StdRng) -> GeoPoint {
    if sigma_meters <= 0.0 {
        return *point;
    }

    // Box-Muller transform for Gaussian noise
    let u1: f64 = rng.gen_range(0.0001..1.0);
    let u2: f64 = rng.r#gen();
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = 2.0 * std::f64::consts::PI * u2;
    offset_point(
        point,
        r * theta.cos() * sigma_meters,
        r * theta.sin() * sigma_meters,
    )
}

impl RoutineScenario {
    /// Generate chronologically ordered pings for every visit.
    pub fn generate(&self) -> Vec<Ping> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let interval_ms = self.ping_interval_secs.max(1) * 1000;
        let mut pings = Vec::new();

        for visit in &self.visits {
            for date in &visit.dates {
                let start = date.and_time(visit.arrive).and_utc().timestamp_millis();
                let mut end_date = *date;
                if visit.depart <= visit.arrive {
                    end_date += TimeDelta::days(1);
                }
                let end = end_date.and_time(visit.depart).and_utc().timestamp_millis();

                let mut ts = start;
                while ts <= end {
                    let p = add_gps_noise(&visit.location, self.gps_noise_sigma_meters, &mut rng);
                    pings.push(Ping::new(&self.device_id, ts, p.latitude, p.longitude));
                    ts += interval_ms;
                }
            }
        }

        pings.sort_by_key(|p| p.timestamp_ms);
        pings
    }

    /// Five nights at home and five weekdays at work 2 km away, starting
    /// on Monday 2024-03-04, with 3 m of GPS noise.
    pub fn commuter(device_id: &str, seed: u64) -> Self {
        let first = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap_or_default();
        let work = offset_point(&BOGOTA, 1_200.0, 1_600.0);
        Self {
            device_id: device_id.to_string(),
            visits: vec![
                night_visits(BOGOTA, consecutive_dates(first, 5)),
                work_visits(work, weekdays_from(first, 5)),
            ],
            ping_interval_secs: 300,
            gps_noise_sigma_meters: 3.0,
            seed,
        }
    }
}

/// Nights 22:00-06:00 at `location`.
pub fn night_visits(location: GeoPoint, dates: Vec<NaiveDate>) -> VisitPattern {
    VisitPattern {
        location,
        arrive: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
        depart: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
        dates,
    }
}

/// Working hours 09:00-17:00 at `location`.
pub fn work_visits(location: GeoPoint, dates: Vec<NaiveDate>) -> VisitPattern {
    VisitPattern {
        location,
        arrive: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
        depart: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
        dates,
    }
}

// ============================================================================
// Tests
// ============================================================================
