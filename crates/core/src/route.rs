//! Reference routes and nearest-waypoint matching.
//!
//! Two interchangeable matchers implement [`NearestWaypoint`]:
//!
//! - [`LinearRouteMatcher`] scans every waypoint (O(route size) per lookup).
//! - [`IndexedRouteMatcher`] prunes candidates with an R-tree over geocentric
//!   unit vectors, then measures the survivors with the ellipsoidal geodesic.
//!
//! Both return the true minimum and break exact ties on the lowest waypoint
//! index, so their results are identical for any input.

use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::Serialize;

use crate::error::CoreError;
use crate::geodesy::{distance_m, geocentric_unit_vector, WGS84_SEMI_MINOR_M};
use crate::types::Coordinate;

/// Relative slack added to the pruning radius to absorb rounding error.
const PRUNE_RADIUS_SLACK: f64 = 1e-9;

/// Absolute slack on the pruning chord (unit sphere, ~6 µm on the ground).
///
/// Covers rounding in the unit vectors themselves, which dominates the
/// relative slack for very short distances and is the only margin left
/// when the seed distance is exactly zero (seam and pole twins).
const PRUNE_CHORD_FLOOR: f64 = 1e-12;

// ---------------------------------------------------------------------------
// ReferenceRoute
// ---------------------------------------------------------------------------

/// A named, non-empty, read-only set of waypoints.
///
/// Waypoint order is the canonical iteration order used for tie-breaking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceRoute {
    name: String,
    waypoints: Vec<Coordinate>,
}

impl ReferenceRoute {
    /// Build a route, failing fast on zero waypoints or invalid coordinates.
    pub fn new(name: impl Into<String>, waypoints: Vec<Coordinate>) -> Result<Self, CoreError> {
        if waypoints.is_empty() {
            return Err(CoreError::EmptyRoute);
        }
        for waypoint in &waypoints {
            waypoint.validate()?;
        }
        Ok(Self {
            name: name.into(),
            waypoints,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn waypoints(&self) -> &[Coordinate] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Always `false` for a constructed route.
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Result of a nearest-waypoint lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteMatch {
    /// Geodesic distance from the query position to the waypoint, in meters.
    pub distance_m: f64,
    /// Index of the waypoint in the route's canonical order.
    pub waypoint_index: usize,
    pub waypoint: Coordinate,
}

/// Nearest-neighbour lookup against a shared, immutable reference route.
///
/// Implementations are read-only after construction and safe to share
/// across threads without locking.
pub trait NearestWaypoint: Send + Sync {
    /// The route this matcher searches.
    fn route(&self) -> &ReferenceRoute;

    /// Find the waypoint closest to `position`.
    fn nearest(&self, position: &Coordinate) -> Result<RouteMatch, CoreError>;
}

/// Keep the closer candidate; on an exact tie keep the lower index.
fn closer(best: Option<RouteMatch>, candidate: RouteMatch) -> Option<RouteMatch> {
    match best {
        Some(b)
            if b.distance_m < candidate.distance_m
                || (b.distance_m == candidate.distance_m
                    && b.waypoint_index <= candidate.waypoint_index) =>
        {
            Some(b)
        }
        _ => Some(candidate),
    }
}

fn measure(
    route: &ReferenceRoute,
    position: &Coordinate,
    index: usize,
) -> Result<RouteMatch, CoreError> {
    let waypoint = route.waypoints[index];
    Ok(RouteMatch {
        distance_m: distance_m(position, &waypoint)?,
        waypoint_index: index,
        waypoint,
    })
}

// ---------------------------------------------------------------------------
// LinearRouteMatcher
// ---------------------------------------------------------------------------

/// Exhaustive scan over every waypoint.
#[derive(Debug, Clone)]
pub struct LinearRouteMatcher {
    route: ReferenceRoute,
}

impl LinearRouteMatcher {
    pub fn new(route: ReferenceRoute) -> Self {
        Self { route }
    }
}

impl NearestWaypoint for LinearRouteMatcher {
    fn route(&self) -> &ReferenceRoute {
        &self.route
    }

    fn nearest(&self, position: &Coordinate) -> Result<RouteMatch, CoreError> {
        position.validate()?;
        let mut best = None;
        for index in 0..self.route.len() {
            best = closer(best, measure(&self.route, position, index)?);
        }
        best.ok_or(CoreError::EmptyRoute)
    }
}

// ---------------------------------------------------------------------------
// IndexedRouteMatcher
// ---------------------------------------------------------------------------

type IndexedWaypoint = GeomWithData<[f64; 3], usize>;

/// R-tree accelerated matcher.
///
/// The tree stores each waypoint's geocentric unit vector. A lookup first
/// takes the chord-nearest waypoint to obtain an upper bound `d` on the
/// answer, then measures only waypoints whose central angle to the query is
/// at most `d / b` (b = polar radius), which provably contains every
/// waypoint at geodesic distance `<= d`.
#[derive(Debug)]
pub struct IndexedRouteMatcher {
    route: ReferenceRoute,
    tree: RTree<IndexedWaypoint>,
}

impl IndexedRouteMatcher {
    pub fn new(route: ReferenceRoute) -> Self {
        let entries = route
            .waypoints
            .iter()
            .enumerate()
            .map(|(index, waypoint)| GeomWithData::new(geocentric_unit_vector(waypoint), index))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            route,
        }
    }
}

/// Squared chord length on the unit sphere for a central angle.
fn squared_chord_for_angle(angle: f64) -> f64 {
    if angle >= std::f64::consts::PI {
        return 4.0;
    }
    let chord = 2.0 * (angle / 2.0).sin();
    chord * chord
}

impl NearestWaypoint for IndexedRouteMatcher {
    fn route(&self) -> &ReferenceRoute {
        &self.route
    }

    fn nearest(&self, position: &Coordinate) -> Result<RouteMatch, CoreError> {
        position.validate()?;
        let query = geocentric_unit_vector(position);

        let seed = self
            .tree
            .nearest_neighbor(&query)
            .ok_or(CoreError::EmptyRoute)?;
        let upper_bound = measure(&self.route, position, seed.data)?;

        let max_angle = upper_bound.distance_m / WGS84_SEMI_MINOR_M * (1.0 + PRUNE_RADIUS_SLACK);
        let chord = squared_chord_for_angle(max_angle).sqrt() * (1.0 + PRUNE_RADIUS_SLACK)
            + PRUNE_CHORD_FLOOR;
        let radius_2 = chord * chord;

        let mut best = Some(upper_bound);
        for candidate in self.tree.locate_within_distance(query, radius_2) {
            if candidate.data == upper_bound.waypoint_index {
                continue;
            }
            best = closer(best, measure(&self.route, position, candidate.data)?);
        }
        best.ok_or(CoreError::EmptyRoute)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
