//! Spatial cohorts of concurrently reported entities.
//!
//! Centroid-based partitioning (k-means, k-means++ seeding) of a single
//! snapshot. Distance is squared Euclidean on (latitude, longitude) degrees.
//! Results are recomputed per snapshot and never persisted.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::CoreError;
use crate::trajectory::Trajectory;
use crate::types::{Coordinate, EntityId, Timestamp};

/// Default cap on Lloyd iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// Default convergence bound on the largest squared centroid shift (deg²).
pub const DEFAULT_TOLERANCE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One position per entity at a single point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    positions: BTreeMap<EntityId, Coordinate>,
}

impl Snapshot {
    /// Build from explicit positions. Duplicate entity ids are rejected.
    pub fn from_positions(
        positions: impl IntoIterator<Item = (EntityId, Coordinate)>,
    ) -> Result<Self, CoreError> {
        let mut map = BTreeMap::new();
        for (entity_id, coordinate) in positions {
            coordinate.validate()?;
            match map.entry(entity_id) {
                Entry::Occupied(e) => {
                    return Err(CoreError::Validation(format!(
                        "entity {} appears more than once in the snapshot",
                        e.key()
                    )));
                }
                Entry::Vacant(e) => {
                    e.insert(coordinate);
                }
            }
        }
        Ok(Self { positions: map })
    }

    /// Each entity's latest position at or before `instant`.
    ///
    /// Entities with no sample by then are left out.
    pub fn latest_at<'a>(
        trajectories: impl IntoIterator<Item = &'a Trajectory>,
        instant: Timestamp,
    ) -> Self {
        let positions = trajectories
            .into_iter()
            .filter_map(|t| {
                t.latest_at(instant)
                    .map(|s| (t.entity_id().to_string(), s.coordinate))
            })
            .collect();
        Self { positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Coordinate)> {
        self.positions.iter()
    }
}

// ---------------------------------------------------------------------------
// Clustering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    pub k: usize,
    pub seed: u64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl ClusterParams {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl From<&AnalysisConfig> for ClusterParams {
    fn from(config: &AnalysisConfig) -> Self {
        Self::new(config.num_clusters, config.cluster_seed)
    }
}

/// Output of a clustering run. Labels are opaque and carry no order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortAssignment {
    pub labels: BTreeMap<EntityId, usize>,
    pub centroids: Vec<Coordinate>,
    pub iterations: usize,
}

impl CohortAssignment {
    /// Number of entities per label, indexed by label.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in self.labels.values() {
            sizes[label] += 1;
        }
        sizes
    }
}

type Point2 = [f64; 2];

fn squared_distance(a: &Point2, b: &Point2) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Index of the closest centroid; ties go to the lower index.
fn nearest_centroid(point: &Point2, centroids: &[Point2]) -> usize {
    let mut best = 0;
    let mut best_d2 = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d2 = squared_distance(point, c);
        if d2 < best_d2 {
            best = i;
            best_d2 = d2;
        }
    }
    best
}

/// Pick an index with probability proportional to its weight.
fn pick_weighted(weights: &[f64], target: f64) -> usize {
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w > 0.0 {
            last_positive = i;
            cumulative += w;
            if cumulative > target {
                return i;
            }
        }
    }
    last_positive
}

/// k-means++ seeding. Stops early once every point coincides with a
/// chosen centroid, so fewer than `k` centroids come back when there are
/// fewer than `k` distinct positions.
fn seed_centroids(points: &[Point2], k: usize, rng: &mut StdRng) -> Vec<Point2> {
    let mut centroids = vec![points[rng.random_range(0..points.len())]];
    let mut weights: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            break;
        }
        let chosen = points[pick_weighted(&weights, rng.random::<f64>() * total)];
        for (w, p) in weights.iter_mut().zip(points) {
            *w = w.min(squared_distance(p, &chosen));
        }
        centroids.push(chosen);
    }
    centroids
}

/// Partition `snapshot` into at most `params.k` spatial cohorts.
///
/// Deterministic for a given seed. Every entity of the snapshot receives
/// exactly one label. An empty snapshot yields an empty assignment.
pub fn cluster(snapshot: &Snapshot, params: &ClusterParams) -> Result<CohortAssignment, CoreError> {
    if params.k == 0 {
        return Err(CoreError::Validation(
            "number of clusters must be at least 1".to_string(),
        ));
    }
    if snapshot.is_empty() {
        return Ok(CohortAssignment::default());
    }

    let ids: Vec<&EntityId> = snapshot.positions.keys().collect();
    let points: Vec<Point2> = snapshot
        .positions
        .values()
        .map(|c| [c.latitude, c.longitude])
        .collect();

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut centroids = seed_centroids(&points, params.k, &mut rng);
    let mut labels = vec![0usize; points.len()];
    let mut iterations = 0;

    while iterations < params.max_iterations {
        iterations += 1;

        for (label, point) in labels.iter_mut().zip(&points) {
            *label = nearest_centroid(point, &centroids);
        }

        let mut sums = vec![[0.0f64; 2]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (&label, point) in labels.iter().zip(&points) {
            sums[label][0] += point[0];
            sums[label][1] += point[1];
            counts[label] += 1;
        }

        let mut max_shift = 0.0f64;
        for ((centroid, sum), &count) in centroids.iter_mut().zip(&sums).zip(&counts) {
            // An emptied cluster keeps its previous centroid.
            if count == 0 {
                continue;
            }
            let updated = [sum[0] / count as f64, sum[1] / count as f64];
            max_shift = max_shift.max(squared_distance(centroid, &updated));
            *centroid = updated;
        }

        if max_shift <= params.tolerance {
            break;
        }
    }

    // Final assignment against the converged centroids.
    for (label, point) in labels.iter_mut().zip(&points) {
        *label = nearest_centroid(point, &centroids);
    }

    Ok(CohortAssignment {
        labels: ids.into_iter().cloned().zip(labels).collect(),
        centroids: centroids
            .into_iter()
            .map(|[latitude, longitude]| Coordinate {
                latitude,
                longitude,
            })
            .collect(),
        iterations,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeSet;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn two_groups() -> Snapshot {
        let mut positions = Vec::new();
        for i in 0..5 {
            let jitter = i as f64 * 0.01;
            positions.push((format!("north-{i}"), coord(53.5 + jitter, 10.0 - jitter)));
            positions.push((format!("south-{i}"), coord(48.1 - jitter, 11.5 + jitter)));
        }
        Snapshot::from_positions(positions).unwrap()
    }

    fn distinct_labels(assignment: &CohortAssignment) -> BTreeSet<usize> {
        assignment.labels.values().copied().collect()
    }

    // -- Snapshot ---------------------------------------------------------------

    #[test]
    fn duplicate_entity_is_rejected() {
        let result = Snapshot::from_positions(vec![
            ("P1".to_string(), coord(1.0, 1.0)),
            ("P1".to_string(), coord(2.0, 2.0)),
        ]);
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn latest_at_skips_entities_without_samples_yet() {
        let t0 = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
        let early = Trajectory::from_sorted(
            "early",
            vec![
                Sample::new(coord(1.0, 1.0), t0),
                Sample::new(coord(2.0, 2.0), t0 + Duration::hours(2)),
            ],
        )
        .unwrap();
        let late = Trajectory::from_sorted(
            "late",
            vec![Sample::new(coord(3.0, 3.0), t0 + Duration::hours(5))],
        )
        .unwrap();

        let snapshot = Snapshot::latest_at([&early, &late], t0 + Duration::hours(3));
        assert_eq!(snapshot.len(), 1);
        let (id, c) = snapshot.iter().next().unwrap();
        assert_eq!(id, "early");
        assert_eq!(*c, coord(2.0, 2.0));
    }

    // -- cluster ----------------------------------------------------------------

    #[test]
    fn every_entity_labelled_exactly_once() {
        let snapshot = two_groups();
        let assignment = cluster(&snapshot, &ClusterParams::new(3, 42)).unwrap();
        assert_eq!(assignment.labels.len(), snapshot.len());
        for (id, _) in snapshot.iter() {
            assert!(assignment.labels.contains_key(id));
        }
        assert!(distinct_labels(&assignment).len() <= 3);
    }

    #[test]
    fn separates_distant_groups() {
        let assignment = cluster(&two_groups(), &ClusterParams::new(2, 7)).unwrap();
        let north = assignment.labels["north-0"];
        let south = assignment.labels["south-0"];
        assert_ne!(north, south);
        for i in 0..5 {
            assert_eq!(assignment.labels[&format!("north-{i}")], north);
            assert_eq!(assignment.labels[&format!("south-{i}")], south);
        }
        assert_eq!(assignment.cluster_sizes().iter().sum::<usize>(), 10);
    }

    #[test]
    fn same_seed_same_partition() {
        let snapshot = two_groups();
        let a = cluster(&snapshot, &ClusterParams::new(4, 42)).unwrap();
        let b = cluster(&snapshot, &ClusterParams::new(4, 42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fewer_distinct_positions_than_k_terminates() {
        let snapshot = Snapshot::from_positions(vec![
            ("A".to_string(), coord(1.0, 1.0)),
            ("B".to_string(), coord(1.0, 1.0)),
            ("C".to_string(), coord(1.0, 1.0)),
        ])
        .unwrap();
        let assignment = cluster(&snapshot, &ClusterParams::new(5, 42)).unwrap();
        assert_eq!(assignment.labels.len(), 3);
        assert_eq!(distinct_labels(&assignment).len(), 1);
        assert_eq!(assignment.centroids.len(), 1);
    }

    #[test]
    fn empty_snapshot_yields_empty_assignment() {
        let assignment = cluster(&Snapshot::default(), &ClusterParams::new(3, 1)).unwrap();
        assert!(assignment.labels.is_empty());
    }

    #[test]
    fn zero_clusters_is_rejected() {
        assert_matches!(
            cluster(&two_groups(), &ClusterParams::new(0, 1)),
            Err(CoreError::Validation(_))
        );
    }
}
