//! Pipeline orchestration.
//!
//! Configuration is validated before any partition is touched. Pings are
//! then deduplicated and partitioned by device, and every partition runs
//! the four stages on its own:
//! stops -> clusters -> local time -> home/work.
//! Partitions share no state, so with the `parallel` feature they are
//! processed on the rayon pool. Outputs are merged and sorted into the
//! canonical `(uid, year, date, start_timestamp)` order.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use log::info;
use serde::{Deserialize, Serialize};

use crate::clustering::{cluster_stops, place_clusters};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::home_work::classify_device;
use crate::stops::{dedup_pings, detect_stops};
use crate::timezone::{TimezoneLookup, annotate_stops};
use crate::{DeviceYearProfile, Ping, PlaceCluster, StayRecord, Stop};

/// Everything derived for one device.
#[derive(Debug, Clone)]
pub struct DeviceOutput {
    pub device_id: String,
    /// Pings after deduplication
    pub ping_count: usize,
    pub stops: Vec<Stop>,
    pub clusters: Vec<PlaceCluster>,
    pub profiles: Vec<DeviceYearProfile>,
    pub records: Vec<StayRecord>,
}

/// Batch-level counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub devices: usize,
    pub pings: usize,
    pub stops: usize,
    /// Non-noise places
    pub clusters: usize,
    pub device_years: usize,
    pub device_years_with_home: usize,
    pub device_years_with_work: usize,
}

/// Merged output of a batch run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Ordered by `(uid, year, date, start_timestamp)`
    pub records: Vec<StayRecord>,
    /// Ordered by `(device_id, year)`
    pub profiles: Vec<DeviceYearProfile>,
    pub summary: PipelineSummary,
}

/// Home and work coordinates of one device-year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeWorkPair {
    pub uid: String,
    pub home_latitude: f64,
    pub home_longitude: f64,
    pub work_latitude: Option<f64>,
    pub work_longitude: Option<f64>,
    pub year: i32,
}

/// Deduplicate pings and group them by device, each group in
/// chronological order.
pub fn partition_pings(pings: Vec<Ping>) -> BTreeMap<String, Vec<Ping>> {
    let mut partitions: BTreeMap<String, Vec<Ping>> = BTreeMap::new();
    for ping in dedup_pings(pings) {
        partitions
            .entry(ping.device_id.clone())
            .or_default()
            .push(ping);
    }
    partitions
}

/// Run all stages for one device.
///
/// `config` is assumed valid; `default_tz` is its parsed default timezone.
pub fn process_device<L: TimezoneLookup + ?Sized>(
    device_id: &str,
    pings: &[Ping],
    config: &PipelineConfig,
    default_tz: Tz,
    lookup: &L,
) -> DeviceOutput {
    let stops = detect_stops(device_id, pings, &config.stops);
    let clustered = cluster_stops(&stops, &config.clustering);
    let clusters = place_clusters(&clustered);
    let annotated = annotate_stops(clustered, lookup, default_tz);
    let (profiles, labeled) = classify_device(device_id, annotated, &config.home_work);

    let mut records: Vec<StayRecord> = labeled.into_iter().map(StayRecord::from).collect();
    records.sort_by(StayRecord::canonical_cmp);

    DeviceOutput {
        device_id: device_id.to_string(),
        ping_count: pings.len(),
        stops,
        clusters,
        profiles,
        records,
    }
}

/// Process every device of the batch.
///
/// Fails before any processing if the configuration is invalid.
pub fn process_devices<L: TimezoneLookup + ?Sized>(
    pings: Vec<Ping>,
    config: &PipelineConfig,
    lookup: &L,
) -> Result<Vec<DeviceOutput>> {
    config.validate()?;
    let default_tz = config.timezone.default_tz()?;

    let partitions = partition_pings(pings);

    #[cfg(feature = "parallel")]
    let outputs: Vec<DeviceOutput> = {
        use rayon::prelude::*;

        partitions
            .par_iter()
            .map(|(device_id, pings)| process_device(device_id, pings, config, default_tz, lookup))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let outputs: Vec<DeviceOutput> = partitions
        .iter()
        .map(|(device_id, pings)| process_device(device_id, pings, config, default_tz, lookup))
        .collect();

    Ok(outputs)
}

/// Run the full pipeline over a batch of pings.
pub fn run_pipeline<L: TimezoneLookup + ?Sized>(
    pings: Vec<Ping>,
    config: &PipelineConfig,
    lookup: &L,
) -> Result<PipelineOutput> {
    let received = pings.len();
    let outputs = process_devices(pings, config, lookup)?;

    let mut summary = PipelineSummary {
        devices: outputs.len(),
        ..Default::default()
    };
    let mut records = Vec::new();
    let mut profiles = Vec::new();

    for output in outputs {
        summary.stops += output.stops.len();
        summary.clusters += output.clusters.iter().filter(|c| !c.is_noise()).count();
        summary.device_years += output.profiles.len();
        summary.device_years_with_home +=
            output.profiles.iter().filter(|p| p.home.is_some()).count();
        summary.device_years_with_work +=
            output.profiles.iter().filter(|p| p.work.is_some()).count();
        summary.pings += output.ping_count;
        records.extend(output.records);
        profiles.extend(output.profiles);
    }

    records.sort_by(StayRecord::canonical_cmp);
    profiles.sort_by(|a, b| a.device_id.cmp(&b.device_id).then(a.year.cmp(&b.year)));

    info!(
        "[Pipeline] {} pings ({} after dedup), {} devices -> {} stops, {} places, {}/{} device-years with home/work",
        received,
        summary.pings,
        summary.devices,
        summary.stops,
        summary.clusters,
        summary.device_years_with_home,
        summary.device_years_with_work
    );

    Ok(PipelineOutput {
        records,
        profiles,
        summary,
    })
}

/// Home and work coordinates per device-year that has a home, ordered by
/// `(uid, year)`. With `require_work`, device-years without a work place
/// are omitted.
pub fn home_work_pairs(profiles: &[DeviceYearProfile], require_work: bool) -> Vec<HomeWorkPair> {
    let mut pairs: Vec<HomeWorkPair> = profiles
        .iter()
        .filter(|p| !require_work || p.work.is_some())
        .filter_map(|p| {
            let home = p.home?;
            Some(HomeWorkPair {
                uid: p.device_id.clone(),
                home_latitude: home.latitude,
                home_longitude: home.longitude,
                work_latitude: p.work.map(|w| w.latitude),
                work_longitude: p.work.map(|w| w.longitude),
                year: p.year,
            })
        })
        .collect();
    pairs.sort_by(|a, b| a.uid.cmp(&b.uid).then(a.year.cmp(&b.year)));
    pairs
}
