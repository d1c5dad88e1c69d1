//! Stop detection.
//!
//! A ping is stationary when the next ping of the same device lies within
//! the distance threshold AND arrives within the time threshold. The
//! terminal ping has no successor and is always stationary, but it only
//! extends a run already in progress. Each maximal run of stationary pings
//! is one candidate stop; a candidate survives if its duration reaches the
//! configured minimum.

use std::collections::HashSet;

use log::{debug, warn};

use crate::config::StopConfig;
use crate::geo_utils::{haversine_distance, median};
use crate::{Ping, Stop};

/// Drop invalid pings and exact duplicates, then sort by
/// `(device_id, timestamp_ms, latitude, longitude)`.
pub fn dedup_pings(mut pings: Vec<Ping>) -> Vec<Ping> {
    let before = pings.len();
    pings.retain(Ping::is_valid);
    let invalid = before - pings.len();
    if invalid > 0 {
        warn!("[Stops] Dropped {} pings with invalid coordinates or timestamps", invalid);
    }

    pings.sort_by(|a, b| {
        a.device_id
            .cmp(&b.device_id)
            .then(a.timestamp_ms.cmp(&b.timestamp_ms))
            .then(a.latitude.total_cmp(&b.latitude))
            .then(a.longitude.total_cmp(&b.longitude))
    });
    pings.dedup_by(|a, b| a.identity() == b.identity());

    let duplicates = before - invalid - pings.len();
    if duplicates > 0 {
        debug!("[Stops] Removed {} duplicate pings", duplicates);
    }
    pings
}

/// Flag each ping as stationary with respect to its successor.
///
/// The terminal ping is flagged stationary so that it can close a run in
/// progress; on its own it never forms a stop (see [`detect_stops`]).
/// `pings` must be chronologically ordered.
pub fn stationary_flags(pings: &[Ping], config: &StopConfig) -> Vec<bool> {
    let time_threshold_ms = config.time_threshold_ms();

    (0..pings.len())
        .map(|i| match pings.get(i + 1) {
            None => true,
            Some(next) => {
                let current = &pings[i];
                let distance = haversine_distance(&current.point(), &next.point());
                let elapsed = (next.timestamp_ms - current.timestamp_ms) as f64;
                distance <= config.distance_threshold_meters && elapsed <= time_threshold_ms
            }
        })
        .collect()
}

/// Detect the stops of one device.
///
/// The pings may arrive in any order and contain duplicates; they are
/// deduplicated and sorted first. Pings belonging to other devices are
/// ignored. Returns stops with a dense, 1-based `stop_index` ordered by
/// `start_ts`.
pub fn detect_stops(device_id: &str, pings: &[Ping], config: &StopConfig) -> Vec<Stop> {
    let own: Vec<Ping> = pings
        .iter()
        .filter(|p| p.device_id == device_id)
        .cloned()
        .collect();
    let pings = dedup_pings(own);

    if pings.len() < 2 {
        return vec![];
    }

    let flags = stationary_flags(&pings, config);

    let mut candidates = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &stationary) in flags.iter().enumerate() {
        match (stationary, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                candidates.extend(summarize_run(device_id, &pings[start..i], config));
                run_start = None;
            }
            _ => {}
        }
    }
    // A run holding only the terminal ping has no successor to dwell with
    if let Some(start) = run_start.filter(|&start| start + 1 < pings.len()) {
        candidates.extend(summarize_run(device_id, &pings[start..], config));
    }

    let stops = renumber_stops(candidates);
    debug!(
        "[Stops] {}: {} pings -> {} stops",
        device_id,
        pings.len(),
        stops.len()
    );
    stops
}

/// Collapse one stationary run into a stop if it lasts long enough.
fn summarize_run(device_id: &str, run: &[Ping], config: &StopConfig) -> Option<Stop> {
    let first = run.first()?;
    let last = run.last()?;
    if last.timestamp_ms - first.timestamp_ms < config.min_stop_duration_ms {
        return None;
    }

    let latitudes: Vec<f64> = run.iter().map(|p| p.latitude).collect();
    let longitudes: Vec<f64> = run.iter().map(|p| p.longitude).collect();

    Some(Stop {
        device_id: device_id.to_string(),
        stop_index: 0,
        start_ts: first.timestamp_ms,
        end_ts: last.timestamp_ms,
        latitude: median(&latitudes)?,
        longitude: median(&longitudes)?,
    })
}

/// Order stops by `start_ts`, drop repeated derivations of the same
/// interval, and assign dense 1-based indexes per device.
///
/// Among stops sharing `(device_id, start_ts, end_ts)` the earliest in the
/// input is kept.
pub fn renumber_stops(mut stops: Vec<Stop>) -> Vec<Stop> {
    stops.sort_by(|a, b| {
        a.device_id
            .cmp(&b.device_id)
            .then(a.start_ts.cmp(&b.start_ts))
            .then(a.end_ts.cmp(&b.end_ts))
    });

    let mut seen: HashSet<(String, i64, i64)> = HashSet::new();
    stops.retain(|s| seen.insert((s.device_id.clone(), s.start_ts, s.end_ts)));

    let mut current_device: Option<String> = None;
    let mut next_index = 1;
    for stop in &mut stops {
        if current_device.as_deref() != Some(stop.device_id.as_str()) {
            current_device = Some(stop.device_id.clone());
            next_index = 1;
        }
        stop.stop_index = next_index;
        next_index += 1;
    }
    stops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping(ts_secs: i64, lat: f64, lng: f64) -> Ping {
        Ping::new("d", ts_secs * 1000, lat, lng)
    }

    #[test]
    fn test_terminal_ping_is_stationary() {
        let pings = vec![ping(0, 0.0, 0.0), ping(60, 0.0, 0.0), ping(120, 1.0, 1.0)];
        let flags = stationary_flags(&pings, &StopConfig::default());
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn test_long_gap_breaks_stationarity() {
        let pings = vec![ping(0, 0.0, 0.0), ping(3600, 0.0, 0.0)];
        let flags = stationary_flags(&pings, &StopConfig::default());
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_summarize_run_uses_median() {
        let run = vec![
            ping(0, 10.0, 20.0),
            ping(300, 10.0002, 20.0002),
            ping(600, 10.9, 20.9),
        ];
        let stop = summarize_run("d", &run, &StopConfig::default()).unwrap();
        assert_eq!(stop.latitude, 10.0002);
        assert_eq!(stop.longitude, 20.0002);
        assert_eq!(stop.start_ts, 0);
        assert_eq!(stop.end_ts, 600_000);
    }

    #[test]
    fn test_summarize_run_rejects_short_runs() {
        let run = vec![ping(0, 0.0, 0.0), ping(60, 0.0, 0.0)];
        assert!(summarize_run("d", &run, &StopConfig::default()).is_none());
    }
}
