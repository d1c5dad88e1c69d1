//! Stage parameters.
//!
//! Each stage receives its own configuration struct; [`PipelineConfig`]
//! bundles them and is validated once before any partition is processed.

use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result, StayError};

/// Parameters for stop detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StopConfig {
    /// Maximum distance to the next ping for a ping to be stationary.
    /// Default: 100.0 meters
    pub distance_threshold_meters: f64,

    /// Maximum time to the next ping for a ping to be stationary.
    /// Default: 600 seconds
    pub time_threshold_seconds: f64,

    /// Minimum `end_ts - start_ts` for a run to be kept as a stop.
    /// Default: 300_000 ms (5 minutes)
    pub min_stop_duration_ms: i64,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            distance_threshold_meters: 100.0,
            time_threshold_seconds: 600.0,
            min_stop_duration_ms: 300_000,
        }
    }
}

impl StopConfig {
    /// Time threshold expressed in milliseconds.
    pub fn time_threshold_ms(&self) -> f64 {
        self.time_threshold_seconds * 1000.0
    }

    pub fn validate(&self) -> Result<()> {
        non_negative("distanceThresholdMeters", self.distance_threshold_meters)?;
        non_negative("timeThresholdSeconds", self.time_threshold_seconds)?;
        if self.min_stop_duration_ms < 0 {
            return Err(StayError::invalid_config(
                "minStopDurationMs",
                format!("must be non-negative, got {}", self.min_stop_duration_ms),
            ));
        }
        Ok(())
    }
}

/// Parameters for DBSCAN place clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterConfig {
    /// Neighborhood radius. Default: 50.0 meters
    pub dbscan_eps_meters: f64,

    /// Neighbors (including the point itself) required for a core point.
    /// Default: 2
    pub dbscan_min_points: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            dbscan_eps_meters: 50.0,
            dbscan_min_points: 2,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        non_negative("dbscanEpsMeters", self.dbscan_eps_meters)?;
        if self.dbscan_min_points < 1 {
            return Err(StayError::invalid_config(
                "dbscanMinPoints",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Fallback timezone for stops the lookup cannot resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimezoneConfig {
    /// IANA identifier, e.g. "America/Bogota". Default: "UTC"
    pub default_timezone: String,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".to_string(),
        }
    }
}

impl TimezoneConfig {
    /// Parse the default timezone.
    pub fn default_tz(&self) -> Result<Tz> {
        self.default_timezone
            .parse::<Tz>()
            .ok()
            .ok_or_unknown_timezone(&self.default_timezone)
    }

    pub fn validate(&self) -> Result<()> {
        self.default_tz().map(|_| ())
    }
}

/// Parameters for home/work selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HomeWorkConfig {
    /// Distinct visit days required for a home candidate. Default: 3
    pub home_min_days: u32,

    /// Weekday hours `>= home_evening_hour` count as home time. Default: 19
    pub home_evening_hour: u32,

    /// Weekday hours `< home_morning_hour` count as home time. Default: 8
    pub home_morning_hour: u32,

    /// Distinct work-time days required for a work candidate. Default: 3
    pub work_min_days: u32,

    /// First weekday work hour (inclusive). Default: 9
    pub work_start_hour: u32,

    /// Last weekday work hour (inclusive). Default: 18
    pub work_end_hour: u32,

    /// Minimum great-circle distance between home and work centroids.
    /// Default: 200.0 meters
    pub min_home_work_distance_meters: f64,
}

impl Default for HomeWorkConfig {
    fn default() -> Self {
        Self {
            home_min_days: 3,
            home_evening_hour: 19,
            home_morning_hour: 8,
            work_min_days: 3,
            work_start_hour: 9,
            work_end_hour: 18,
            min_home_work_distance_meters: 200.0,
        }
    }
}

impl HomeWorkConfig {
    pub fn validate(&self) -> Result<()> {
        hour("homeEveningHour", self.home_evening_hour)?;
        hour("homeMorningHour", self.home_morning_hour)?;
        hour("workStartHour", self.work_start_hour)?;
        hour("workEndHour", self.work_end_hour)?;
        if self.work_start_hour > self.work_end_hour {
            return Err(StayError::invalid_config(
                "workStartHour",
                format!(
                    "must not exceed workEndHour ({} > {})",
                    self.work_start_hour, self.work_end_hour
                ),
            ));
        }
        non_negative(
            "minHomeWorkDistanceMeters",
            self.min_home_work_distance_meters,
        )
    }
}

/// Configuration for the whole pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub stops: StopConfig,
    pub clustering: ClusterConfig,
    pub timezone: TimezoneConfig,
    pub home_work: HomeWorkConfig,
}

impl PipelineConfig {
    /// Validate every stage's parameters.
    pub fn validate(&self) -> Result<()> {
        self.stops.validate()?;
        self.clustering.validate()?;
        self.timezone.validate()?;
        self.home_work.validate()
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

fn non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(StayError::invalid_config(
            field,
            format!("must be a finite non-negative number, got {value}"),
        ));
    }
    Ok(())
}

fn hour(field: &str, value: u32) -> Result<()> {
    if value > 23 {
        return Err(StayError::invalid_config(
            field,
            format!("must be an hour in [0, 23], got {value}"),
        ));
    }
    Ok(())
}
