//! # Trace Stay
//!
//! Batch inference of stays, places and home/work locations from raw GPS pings.
//!
//! This library provides:
//! - Stop detection: collapsing a chronological ping stream into stationary intervals
//! - Place clustering: DBSCAN over a device's stops with deterministic labels
//! - Local time annotation through an injected timezone lookup
//! - Home/work classification per device and calendar year
//! - A data-parallel pipeline over devices
//!
//! ## Features
//!
//! - **`parallel`** - Process device partitions in parallel with rayon (default)
//! - **`cli`** - Build the `tracestay-cli` debug tool
//!
//! ## Quick Start
//!
//! ```rust
//! use tracestay::{NoTimezoneLookup, PipelineConfig, Ping, run_pipeline};
//!
//! let pings = vec![
//!     Ping::new("u1", 1_700_000_000_000, 4.6097, -74.0817),
//!     Ping::new("u1", 1_700_000_600_000, 4.6097, -74.0817),
//! ];
//!
//! let output = run_pipeline(pings, &PipelineConfig::default(), &NoTimezoneLookup).unwrap();
//! assert_eq!(output.summary.devices, 1);
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, StayError};

// Stage parameters and validation
pub mod config;
pub use config::{ClusterConfig, HomeWorkConfig, PipelineConfig, StopConfig, TimezoneConfig};

// Geographic utilities (distance, degree conversion, medians)
pub mod geo_utils;

// Stop detection from ping streams
pub mod stops;
pub use stops::{dedup_pings, detect_stops, renumber_stops};

// Density-based clustering with a pluggable metric
pub mod dbscan;
pub use dbscan::{Dbscan, DistanceMetric, Haversine};

// Per-device place clustering with deterministic labels
pub mod clustering;
pub use clustering::{cluster_stops, place_clusters};

// Local time annotation
pub mod timezone;
pub use timezone::{NoTimezoneLookup, TimezoneLookup, annotate_stop, annotate_stops};

// Home/work selection and location labels
pub mod home_work;
pub use home_work::{ClusterVisits, VisitRank, build_profiles, classify_device, label_stops};

// Orchestration over device partitions
pub mod pipeline;
pub use pipeline::{
    DeviceOutput, HomeWorkPair, PipelineOutput, PipelineSummary, home_work_pairs,
    partition_pings, process_device, process_devices, run_pipeline,
};

// CSV input/output
pub mod csv_io;

// Seeded synthetic routines for tests and benchmarks
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate in decimal degrees.
///
/// # Example
/// ```
/// use tracestay::GeoPoint;
/// let point = GeoPoint::new(4.6097, -74.0817); // Bogota
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A single raw observation of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    #[serde(alias = "uid")]
    pub device_id: String,
    /// Unix timestamp in milliseconds
    #[serde(alias = "timestamp")]
    pub timestamp_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
}

impl Ping {
    pub fn new(device_id: &str, timestamp_ms: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            device_id: device_id.to_string(),
            timestamp_ms,
            latitude,
            longitude,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Coordinates are in range and the timestamp is representable as a date.
    pub fn is_valid(&self) -> bool {
        self.point().is_valid()
            && chrono::DateTime::from_timestamp_millis(self.timestamp_ms).is_some()
    }

    /// Bitwise identity over all four fields, used for deduplication.
    pub(crate) fn identity(&self) -> (&str, i64, u64, u64) {
        (
            self.device_id.as_str(),
            self.timestamp_ms,
            self.latitude.to_bits(),
            self.longitude.to_bits(),
        )
    }
}

/// A stationary interval derived from a contiguous run of pings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub device_id: String,
    /// Dense, 1-based, ordered by `start_ts`
    pub stop_index: u32,
    /// First ping of the run (ms)
    pub start_ts: i64,
    /// Last ping of the run (ms)
    pub end_ts: i64,
    /// Median latitude of the run
    pub latitude: f64,
    /// Median longitude of the run
    pub longitude: f64,
}

impl Stop {
    pub fn duration_ms(&self) -> i64 {
        self.end_ts - self.start_ts
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Label carried by stops that joined no dense neighborhood.
pub const NOISE_LABEL: i32 = -1;

/// A recurring place of one device.
///
/// Noise stops become singleton places with label [`NOISE_LABEL`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCluster {
    pub device_id: String,
    pub cluster_label: i32,
    /// Median latitude of the members
    pub centroid_latitude: f64,
    /// Median longitude of the members
    pub centroid_longitude: f64,
    pub member_count: u32,
}

impl PlaceCluster {
    pub fn is_noise(&self) -> bool {
        self.cluster_label == NOISE_LABEL
    }

    pub fn centroid(&self) -> GeoPoint {
        GeoPoint::new(self.centroid_latitude, self.centroid_longitude)
    }
}

/// A stop joined to the place it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteredStop {
    pub stop: Stop,
    pub cluster: PlaceCluster,
}

/// Local calendar and clock fields of a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalTime {
    /// Lookup result, `None` when unresolved
    pub timezone: Option<String>,
    /// Timezone actually used: the lookup result or the configured default
    pub inputed_timezone: String,
    pub stop_datetime: NaiveDateTime,
    pub end_stop_datetime: NaiveDateTime,
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// 0-23
    pub hour: u32,
    /// ISO weekday, Monday = 1 .. Sunday = 7
    pub weekday: u32,
    pub weekend: bool,
    pub end_date: NaiveDate,
}

/// A clustered stop with its local time fields.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedStop {
    pub stop: Stop,
    pub cluster: PlaceCluster,
    pub local: LocalTime,
}

/// Semantic type of a stop's place within its device-year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LocationType {
    #[serde(rename = "H")]
    Home,
    #[serde(rename = "W")]
    Work,
    #[serde(rename = "O")]
    Other,
}

impl LocationType {
    pub fn code(&self) -> char {
        match self {
            LocationType::Home => 'H',
            LocationType::Work => 'W',
            LocationType::Other => 'O',
        }
    }
}

/// A place selected as home or work, with its published centroid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectedPlace {
    pub cluster_label: i32,
    pub latitude: f64,
    pub longitude: f64,
}

impl SelectedPlace {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Home and work selection for one device in one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceYearProfile {
    pub device_id: String,
    pub year: i32,
    pub home: Option<SelectedPlace>,
    pub work: Option<SelectedPlace>,
}

impl DeviceYearProfile {
    pub fn home_cluster_label(&self) -> Option<i32> {
        self.home.map(|h| h.cluster_label)
    }

    pub fn work_cluster_label(&self) -> Option<i32> {
        self.work.map(|w| w.cluster_label)
    }

    /// Location type of a cluster within this device-year.
    pub fn location_type(&self, cluster_label: i32) -> LocationType {
        if cluster_label == NOISE_LABEL {
            LocationType::Other
        } else if self.home_cluster_label() == Some(cluster_label) {
            LocationType::Home
        } else if self.work_cluster_label() == Some(cluster_label) {
            LocationType::Work
        } else {
            LocationType::Other
        }
    }
}

/// A fully classified stop.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStop {
    pub stop: Stop,
    pub cluster: PlaceCluster,
    pub local: LocalTime,
    pub location_type: LocationType,
    /// Cross-year index of the H or W place, -1 for other places
    pub location_label: i32,
}

/// Final output row, one per stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StayRecord {
    pub uid: String,
    pub stop_event: u32,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub stop_duration: i64,
    pub stop_latitude: f64,
    pub stop_longitude: f64,
    pub cluster_label: i32,
    pub cluster_counts: u32,
    pub cluster_latitude: f64,
    pub cluster_longitude: f64,
    pub timezone: Option<String>,
    pub inputed_timezone: String,
    pub stop_datetime: NaiveDateTime,
    pub end_stop_datetime: NaiveDateTime,
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub weekday: u32,
    pub weekend: bool,
    pub end_date: NaiveDate,
    pub location_type: LocationType,
    pub location_label: i32,
}

impl From<LabeledStop> for StayRecord {
    fn from(labeled: LabeledStop) -> Self {
        let LabeledStop {
            stop,
            cluster,
            local,
            location_type,
            location_label,
        } = labeled;

        Self {
            stop_duration: stop.duration_ms(),
            uid: stop.device_id,
            stop_event: stop.stop_index,
            start_timestamp: stop.start_ts,
            end_timestamp: stop.end_ts,
            stop_latitude: stop.latitude,
            stop_longitude: stop.longitude,
            cluster_label: cluster.cluster_label,
            cluster_counts: cluster.member_count,
            cluster_latitude: cluster.centroid_latitude,
            cluster_longitude: cluster.centroid_longitude,
            timezone: local.timezone,
            inputed_timezone: local.inputed_timezone,
            stop_datetime: local.stop_datetime,
            end_stop_datetime: local.end_stop_datetime,
            date: local.date,
            year: local.year,
            month: local.month,
            day: local.day,
            hour: local.hour,
            weekday: local.weekday,
            weekend: local.weekend,
            end_date: local.end_date,
            location_type,
            location_label,
        }
    }
}

impl StayRecord {
    /// Canonical output order: `(uid, year, date, start_timestamp)`.
    pub fn canonical_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.uid
            .cmp(&other.uid)
            .then(self.year.cmp(&other.year))
            .then(self.date.cmp(&other.date))
            .then(self.start_timestamp.cmp(&other.start_timestamp))
    }
}
