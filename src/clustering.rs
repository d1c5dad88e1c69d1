//! Place clustering of a device's stops.
//!
//! DBSCAN cluster ids depend on visitation order, so raw clusters are
//! relabeled: sorted by the mean of their member coordinates (latitude,
//! then longitude) and numbered densely from 0. The published centroid of
//! each cluster is the median of its members. Noise stops become singleton
//! places labeled [`NOISE_LABEL`].

use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::config::ClusterConfig;
use crate::dbscan::Dbscan;
use crate::geo_utils::{mean, median};
use crate::{ClusteredStop, GeoPoint, NOISE_LABEL, PlaceCluster, Stop};

/// A raw DBSCAN cluster before relabeling.
struct RawCluster {
    /// Positions into the ordered stop list, ascending
    members: Vec<usize>,
    mean_latitude: f64,
    mean_longitude: f64,
}

/// Cluster the stops of one device.
///
/// Stops are first put in `(start_ts, stop_index)` order and deduplicated
/// by `stop_index`, which makes the labels independent of input order.
/// Returns one row per stop in that order.
pub fn cluster_stops(stops: &[Stop], config: &ClusterConfig) -> Vec<ClusteredStop> {
    let mut ordered: Vec<Stop> = stops.to_vec();
    ordered.sort_by(|a, b| {
        a.start_ts
            .cmp(&b.start_ts)
            .then(a.stop_index.cmp(&b.stop_index))
    });
    let mut seen = HashSet::new();
    ordered.retain(|s| seen.insert((s.device_id.clone(), s.stop_index)));

    if ordered.len() < 2 {
        return ordered.into_iter().map(noise_row).collect();
    }

    let points: Vec<GeoPoint> = ordered.iter().map(Stop::point).collect();
    let raw_labels =
        Dbscan::haversine(config.dbscan_eps_meters, config.dbscan_min_points).fit(&points);

    let clusters = relabel(&points, &raw_labels);

    let mut label_of: Vec<Option<PlaceCluster>> = vec![None; ordered.len()];
    for (label, raw) in clusters.iter().enumerate() {
        let latitudes: Vec<f64> = raw.members.iter().map(|&i| points[i].latitude).collect();
        let longitudes: Vec<f64> = raw.members.iter().map(|&i| points[i].longitude).collect();
        let place = PlaceCluster {
            device_id: ordered[raw.members[0]].device_id.clone(),
            cluster_label: label as i32,
            centroid_latitude: median(&latitudes).unwrap_or(raw.mean_latitude),
            centroid_longitude: median(&longitudes).unwrap_or(raw.mean_longitude),
            member_count: raw.members.len() as u32,
        };
        for &i in &raw.members {
            label_of[i] = Some(place.clone());
        }
    }

    let rows: Vec<ClusteredStop> = ordered
        .into_iter()
        .zip(label_of)
        .map(|(stop, cluster)| match cluster {
            Some(cluster) => ClusteredStop { stop, cluster },
            None => noise_row(stop),
        })
        .collect();

    if let Some(first) = rows.first() {
        debug!(
            "[Clusters] {}: {} stops -> {} places, {} noise",
            first.stop.device_id,
            rows.len(),
            clusters.len(),
            rows.iter().filter(|r| r.cluster.is_noise()).count()
        );
    }
    rows
}

/// Group raw DBSCAN ids and order the clusters by mean centroid.
///
/// Identical mean centroids fall back to the position of the first member,
/// which is itself a function of `(start_ts, stop_index)`.
fn relabel(points: &[GeoPoint], raw_labels: &[Option<usize>]) -> Vec<RawCluster> {
    let mut members_by_raw: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, label) in raw_labels.iter().enumerate() {
        if let Some(raw) = label {
            members_by_raw.entry(*raw).or_default().push(i);
        }
    }

    let mut clusters: Vec<RawCluster> = members_by_raw
        .into_values()
        .filter(|members| !members.is_empty())
        .map(|members| {
            let latitudes: Vec<f64> = members.iter().map(|&i| points[i].latitude).collect();
            let longitudes: Vec<f64> = members.iter().map(|&i| points[i].longitude).collect();
            RawCluster {
                mean_latitude: mean(&latitudes).unwrap_or(0.0),
                mean_longitude: mean(&longitudes).unwrap_or(0.0),
                members,
            }
        })
        .collect();

    clusters.sort_by(|a, b| {
        a.mean_latitude
            .total_cmp(&b.mean_latitude)
            .then(a.mean_longitude.total_cmp(&b.mean_longitude))
            .then(a.members[0].cmp(&b.members[0]))
    });
    clusters
}

fn noise_row(stop: Stop) -> ClusteredStop {
    let cluster = PlaceCluster {
        device_id: stop.device_id.clone(),
        cluster_label: NOISE_LABEL,
        centroid_latitude: stop.latitude,
        centroid_longitude: stop.longitude,
        member_count: 1,
    };
    ClusteredStop { stop, cluster }
}

/// Distinct places of the clustered stops: non-noise clusters once each in
/// label order, followed by one singleton per noise stop.
pub fn place_clusters(rows: &[ClusteredStop]) -> Vec<PlaceCluster> {
    let mut clusters: BTreeMap<(String, i32), PlaceCluster> = BTreeMap::new();
    let mut noise = Vec::new();
    for row in rows {
        if row.cluster.is_noise() {
            noise.push(row.cluster.clone());
        } else {
            clusters
                .entry((row.cluster.device_id.clone(), row.cluster.cluster_label))
                .or_insert_with(|| row.cluster.clone());
        }
    }

    let mut places: Vec<PlaceCluster> = clusters.into_values().collect();
    places.extend(noise);
    places
}
