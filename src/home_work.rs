//! Home/work classification.
//!
//! For every device-year, each non-noise place is scored on two visit
//! windows:
//! - home time: weekends at any hour, and weekday hours at or after the
//!   evening hour or before the morning hour
//! - work time: weekday hours in `[work_start_hour, work_end_hour]`
//!
//! Home is the best-ranked place visited on enough distinct days. Work is
//! the best-ranked other place with enough work-time days that lies far
//! enough from home. Both rankings use [`VisitRank`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::debug;

use crate::config::HomeWorkConfig;
use crate::geo_utils::haversine_distance;
use crate::{
    AnnotatedStop, DeviceYearProfile, LabeledStop, LocalTime, LocationType, NOISE_LABEL,
    SelectedPlace,
};

/// Ranking key shared by home and work selection:
/// visits descending, then unique days descending, then label ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitRank {
    pub visits: u32,
    pub unique_days: u32,
    pub cluster_label: i32,
}

impl Ord for VisitRank {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .visits
            .cmp(&self.visits)
            .then(other.unique_days.cmp(&self.unique_days))
            .then(self.cluster_label.cmp(&other.cluster_label))
    }
}

impl PartialOrd for VisitRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Visit statistics of one place within one device-year.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterVisits {
    pub cluster_label: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub home_time_visits: u32,
    pub home_time_unique_days: u32,
    pub unique_days_visited: u32,
    pub work_time_visits: u32,
    pub work_time_unique_days: u32,
}

impl ClusterVisits {
    pub fn home_rank(&self) -> VisitRank {
        VisitRank {
            visits: self.home_time_visits,
            unique_days: self.home_time_unique_days,
            cluster_label: self.cluster_label,
        }
    }

    pub fn work_rank(&self) -> VisitRank {
        VisitRank {
            visits: self.work_time_visits,
            unique_days: self.work_time_unique_days,
            cluster_label: self.cluster_label,
        }
    }

    fn place(&self) -> SelectedPlace {
        SelectedPlace {
            cluster_label: self.cluster_label,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

pub fn is_home_time(local: &LocalTime, config: &HomeWorkConfig) -> bool {
    local.weekend
        || local.hour >= config.home_evening_hour
        || local.hour < config.home_morning_hour
}

pub fn is_work_time(local: &LocalTime, config: &HomeWorkConfig) -> bool {
    !local.weekend
        && local.hour >= config.work_start_hour
        && local.hour <= config.work_end_hour
}

#[derive(Default)]
struct Tally {
    latitude: f64,
    longitude: f64,
    home_visits: u32,
    home_days: BTreeSet<NaiveDate>,
    days: BTreeSet<NaiveDate>,
    work_visits: u32,
    work_days: BTreeSet<NaiveDate>,
}

/// Score every non-noise place among `stops`, which should all belong to
/// one device-year. Results are ordered by cluster label.
pub fn score_clusters(stops: &[AnnotatedStop], config: &HomeWorkConfig) -> Vec<ClusterVisits> {
    let mut tallies: BTreeMap<i32, Tally> = BTreeMap::new();

    for row in stops.iter().filter(|r| !r.cluster.is_noise()) {
        let tally = tallies.entry(row.cluster.cluster_label).or_default();
        tally.latitude = row.cluster.centroid_latitude;
        tally.longitude = row.cluster.centroid_longitude;
        tally.days.insert(row.local.date);

        if is_home_time(&row.local, config) {
            tally.home_visits += 1;
            tally.home_days.insert(row.local.date);
        }
        if is_work_time(&row.local, config) {
            tally.work_visits += 1;
            tally.work_days.insert(row.local.date);
        }
    }

    tallies
        .into_iter()
        .map(|(label, t)| ClusterVisits {
            cluster_label: label,
            latitude: t.latitude,
            longitude: t.longitude,
            home_time_visits: t.home_visits,
            home_time_unique_days: t.home_days.len() as u32,
            unique_days_visited: t.days.len() as u32,
            work_time_visits: t.work_visits,
            work_time_unique_days: t.work_days.len() as u32,
        })
        .collect()
}

/// Best home candidate, if any place was visited on enough distinct days.
pub fn select_home<'a>(
    scores: &'a [ClusterVisits],
    config: &HomeWorkConfig,
) -> Option<&'a ClusterVisits> {
    scores
        .iter()
        .filter(|c| c.unique_days_visited >= config.home_min_days)
        .min_by_key(|c| c.home_rank())
}

/// Best work candidate given the selected home.
///
/// Without a home, the distance gate is not applied.
pub fn select_work<'a>(
    scores: &'a [ClusterVisits],
    home: Option<&ClusterVisits>,
    config: &HomeWorkConfig,
) -> Option<&'a ClusterVisits> {
    scores
        .iter()
        .filter(|c| home.is_none_or(|h| h.cluster_label != c.cluster_label))
        .filter(|c| c.work_time_unique_days >= config.work_min_days)
        .filter(|c| {
            home.is_none_or(|h| {
                haversine_distance(&h.place().point(), &c.place().point())
                    >= config.min_home_work_distance_meters
            })
        })
        .min_by_key(|c| c.work_rank())
}

/// Select home and work for every year in which the device has stops.
pub fn build_profiles(
    device_id: &str,
    stops: &[AnnotatedStop],
    config: &HomeWorkConfig,
) -> Vec<DeviceYearProfile> {
    let mut by_year: BTreeMap<i32, Vec<AnnotatedStop>> = BTreeMap::new();
    for row in stops {
        by_year.entry(row.local.year).or_default().push(row.clone());
    }

    by_year
        .into_iter()
        .map(|(year, rows)| {
            let scores = score_clusters(&rows, config);
            let home = select_home(&scores, config);
            let work = select_work(&scores, home, config);
            DeviceYearProfile {
                device_id: device_id.to_string(),
                year,
                home: home.map(ClusterVisits::place),
                work: work.map(ClusterVisits::place),
            }
        })
        .collect()
}

/// Cross-year index of the selected place for one location type.
///
/// Starts at 1 and increases whenever the selected cluster differs from
/// the previous year's selection.
fn cross_year_labels(
    profiles: &[DeviceYearProfile],
    selected: impl Fn(&DeviceYearProfile) -> Option<i32>,
) -> BTreeMap<i32, i32> {
    let mut years: Vec<(i32, i32)> = profiles
        .iter()
        .filter_map(|p| selected(p).map(|label| (p.year, label)))
        .collect();
    years.sort_unstable();

    let mut labels = BTreeMap::new();
    let mut previous: Option<i32> = None;
    let mut index = 0;
    for (year, cluster) in years {
        if previous != Some(cluster) {
            index += 1;
            previous = Some(cluster);
        }
        labels.insert(year, index);
    }
    labels
}

/// Assign `location_type` and `location_label` to every stop.
///
/// `location_label` advances only when a year's selected home (or work)
/// cluster differs from the previous selected year; the same place in
/// consecutive years keeps its label. `O` stops carry -1.
pub fn label_stops(stops: Vec<AnnotatedStop>, profiles: &[DeviceYearProfile]) -> Vec<LabeledStop> {
    let by_year: BTreeMap<i32, &DeviceYearProfile> =
        profiles.iter().map(|p| (p.year, p)).collect();
    let home_labels = cross_year_labels(profiles, DeviceYearProfile::home_cluster_label);
    let work_labels = cross_year_labels(profiles, DeviceYearProfile::work_cluster_label);

    stops
        .into_iter()
        .map(|row| {
            let year = row.local.year;
            let location_type = by_year
                .get(&year)
                .map(|p| p.location_type(row.cluster.cluster_label))
                .unwrap_or(LocationType::Other);
            let location_label = match location_type {
                LocationType::Home => home_labels.get(&year).copied(),
                LocationType::Work => work_labels.get(&year).copied(),
                LocationType::Other => None,
            }
            .unwrap_or(NOISE_LABEL);

            LabeledStop {
                stop: row.stop,
                cluster: row.cluster,
                local: row.local,
                location_type,
                location_label,
            }
        })
        .collect()
}

/// Build profiles and label stops for one device.
pub fn classify_device(
    device_id: &str,
    stops: Vec<AnnotatedStop>,
    config: &HomeWorkConfig,
) -> (Vec<DeviceYearProfile>, Vec<LabeledStop>) {
    let profiles = build_profiles(device_id, &stops, config);
    debug!(
        "[HomeWork] {}: {} years, {} with home, {} with work",
        device_id,
        profiles.len(),
        profiles.iter().filter(|p| p.home.is_some()).count(),
        profiles.iter().filter(|p| p.work.is_some()).count()
    );
    let labeled = label_stops(stops, &profiles);
    (profiles, labeled)
}
