//! Density-based clustering (DBSCAN) over an in-memory point set.
//!
//! Neighborhood queries go through an R-tree: a degree-space envelope
//! around each point pre-filters candidates, and the configured
//! [`DistanceMetric`] decides membership.
//!
//! A point is a core point when at least `min_points` points, itself
//! included, lie within `eps` meters. Clusters grow from core points in
//! index order, so the output is a deterministic function of the input
//! order.

use rstar::{AABB, RTree, RTreeObject};

use crate::GeoPoint;
use crate::geo_utils::{haversine_distance, meters_to_degrees, meters_to_lat_degrees};

/// Distance between two points, in meters.
pub trait DistanceMetric {
    fn distance(&self, a: &GeoPoint, b: &GeoPoint) -> f64;

    /// Half-extent `(lat_degrees, lng_degrees)` of an envelope around
    /// `center` that contains every point within `radius_meters`.
    ///
    /// The default bound is valid for great-circle distances.
    fn search_extent(&self, center: &GeoPoint, radius_meters: f64) -> (f64, f64) {
        // Pad for the spherical vs. planar degree conversion
        let padded = radius_meters * 1.01 + 1e-6;
        let worst_lat = (center.latitude.abs() + meters_to_lat_degrees(padded)).min(90.0);
        (
            meters_to_lat_degrees(padded),
            meters_to_degrees(padded, worst_lat),
        )
    }
}

/// Spherical-earth great-circle distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl DistanceMetric for Haversine {
    fn distance(&self, a: &GeoPoint, b: &GeoPoint) -> f64 {
        haversine_distance(a, b)
    }
}

/// Input position tagged with its index in the fitted slice.
#[derive(Debug, Clone, Copy)]
pub struct IndexedPoint {
    pub index: usize,
    /// `[latitude, longitude]`
    pub position: [f64; 2],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Bulk-load an R-tree over `points`, keyed by their slice index.
pub fn build_rtree(points: &[GeoPoint]) -> RTree<IndexedPoint> {
    RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(index, p)| IndexedPoint {
                index,
                position: [p.latitude, p.longitude],
            })
            .collect(),
    )
}

/// DBSCAN parameters and metric.
#[derive(Debug, Clone)]
pub struct Dbscan<M = Haversine> {
    pub eps_meters: f64,
    pub min_points: usize,
    pub metric: M,
}

impl Dbscan<Haversine> {
    /// DBSCAN with great-circle distance.
    pub fn haversine(eps_meters: f64, min_points: usize) -> Self {
        Self::new(eps_meters, min_points, Haversine)
    }
}

impl<M: DistanceMetric> Dbscan<M> {
    pub fn new(eps_meters: f64, min_points: usize, metric: M) -> Self {
        Self {
            eps_meters,
            min_points: min_points.max(1),
            metric,
        }
    }

    /// Indexes of all points within `eps` of `points[idx]`, itself
    /// included, in ascending order.
    pub fn region_query(
        &self,
        tree: &RTree<IndexedPoint>,
        points: &[GeoPoint],
        idx: usize,
    ) -> Vec<usize> {
        let center = &points[idx];
        let (dlat, dlng) = self.metric.search_extent(center, self.eps_meters);
        let envelope = AABB::from_corners(
            [center.latitude - dlat, center.longitude - dlng],
            [center.latitude + dlat, center.longitude + dlng],
        );

        let mut neighbors: Vec<usize> = tree
            .locate_in_envelope(&envelope)
            .filter(|p| self.metric.distance(center, &points[p.index]) <= self.eps_meters)
            .map(|p| p.index)
            .collect();
        neighbors.sort_unstable();
        neighbors
    }

    /// Cluster the points. Returns one entry per input point: `Some(id)`
    /// for cluster members (ids dense from 0 in discovery order), `None`
    /// for noise.
    pub fn fit(&self, points: &[GeoPoint]) -> Vec<Option<usize>> {
        let n = points.len();
        let mut labels: Vec<Option<usize>> = vec![None; n];
        if n == 0 {
            return labels;
        }

        let tree = build_rtree(points);
        let mut visited = vec![false; n];
        let mut queued = vec![false; n];
        let mut next_cluster = 0;

        for i in 0..n {
            if visited[i] {
                continue;
            }
            visited[i] = true;

            let neighbors = self.region_query(&tree, points, i);
            if neighbors.len() < self.min_points {
                // Noise for now; may become a border point later
                continue;
            }

            labels[i] = Some(next_cluster);
            queued[i] = true;
            let mut state = Expansion {
                labels: &mut labels,
                visited: &mut visited,
                queued: &mut queued,
            };
            self.grow_cluster(&tree, points, next_cluster, neighbors, &mut state);
            next_cluster += 1;
        }

        labels
    }

    /// Breadth-first expansion of `cluster` from a core point's neighbors.
    ///
    /// Every point enters the queue at most once over the whole fit, so the
    /// queue stays linear in the cluster size. Returns the number of points
    /// enqueued.
    fn grow_cluster(
        &self,
        tree: &RTree<IndexedPoint>,
        points: &[GeoPoint],
        cluster: usize,
        seeds: Vec<usize>,
        state: &mut Expansion<'_>,
    ) -> usize {
        let mut queue = Vec::with_capacity(seeds.len());
        state.enqueue(&mut queue, seeds);

        let mut head = 0;
        while head < queue.len() {
            let j = queue[head];
            head += 1;

            // Border points keep their first cluster
            if state.labels[j].is_none() {
                state.labels[j] = Some(cluster);
            }
            if state.visited[j] {
                continue;
            }
            state.visited[j] = true;

            let expansion = self.region_query(tree, points, j);
            if expansion.len() >= self.min_points {
                state.enqueue(&mut queue, expansion);
            }
        }

        queue.len()
    }
}

/// Per-point bookkeeping shared across cluster expansions.
struct Expansion<'a> {
    labels: &'a mut [Option<usize>],
    visited: &'a mut [bool],
    queued: &'a mut [bool],
}

impl Expansion<'_> {
    fn enqueue(&mut self, queue: &mut Vec<usize>, candidates: Vec<usize>) {
        for k in candidates {
            if !self.queued[k] && self.labels[k].is_none() {
                self.queued[k] = true;
                queue.push(k);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::offset_point;

    #[test]
    fn test_region_query_includes_self() {
        let points = vec![GeoPoint::new(51.5, -0.12)];
        let dbscan = Dbscan::haversine(10.0, 1);
        let tree = build_rtree(&points);
        assert_eq!(dbscan.region_query(&tree, &points, 0), vec![0]);
    }

    #[test]
    fn test_rtree_indexes_every_point() {
        let points = vec![GeoPoint::new(4.6, -74.08), GeoPoint::new(51.5, -0.12)];
        let tree = build_rtree(&points);
        assert_eq!(tree.size(), 2);
        let found: Vec<usize> = tree
            .locate_in_envelope(&AABB::from_corners([51.0, -1.0], [52.0, 0.0]))
            .map(|p| p.index)
            .collect();
        assert_eq!(found, vec![1]);
    }

    #[test]
    fn test_dense_cluster_enqueues_each_point_once() {
        let n = 500;
        let points = vec![GeoPoint::new(4.6097, -74.0817); n];
        let dbscan = Dbscan::haversine(50.0, 2);
        let tree = build_rtree(&points);

        let mut labels = vec![None; n];
        let mut visited = vec![false; n];
        let mut queued = vec![false; n];
        visited[0] = true;
        labels[0] = Some(0);
        queued[0] = true;
        let seeds = dbscan.region_query(&tree, &points, 0);
        let mut state = Expansion {
            labels: &mut labels,
            visited: &mut visited,
            queued: &mut queued,
        };

        let enqueued = dbscan.grow_cluster(&tree, &points, 0, seeds, &mut state);
        assert_eq!(enqueued, n - 1);
        assert!(labels.iter().all(|l| *l == Some(0)));
    }

    #[test]
    fn test_search_extent_covers_eps_at_high_latitude() {
        let center = GeoPoint::new(70.0, 25.0);
        let east = offset_point(&center, 0.0, 99.0);
        let (_, dlng) = Haversine.search_extent(&center, 100.0);
        assert!((east.longitude - center.longitude).abs() <= dlng);
    }
}
