//! Route deviation state machine.
//!
//! Each entity's trajectory is folded left to right through [`step`], a pure
//! `(state, observation) -> (state, flagged)` transition. A sample is flagged
//! once the current off-route episode has lasted at least the deviation time
//! threshold; the episode start is kept (never reset) until the entity comes
//! back within the adherence threshold.

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::CoreError;
use crate::route::NearestWaypoint;
use crate::trajectory::{check_order, TimeOrder, Trajectory};
use crate::types::{hours_between, Coordinate, EntityId, Timestamp};

/// Thresholds used by the deviation tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationThresholds {
    pub adherence_threshold_m: f64,
    pub deviation_time_hours: f64,
}

impl From<&AnalysisConfig> for DeviationThresholds {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            adherence_threshold_m: config.adherence_threshold_m,
            deviation_time_hours: config.deviation_time_hours,
        }
    }
}

/// Per-entity deviation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeviationState {
    #[default]
    OnRoute,
    /// Off route since `start`.
    Deviating { start: Timestamp },
}

impl DeviationState {
    /// Start of the open deviation window, if any.
    pub fn window_start(&self) -> Option<Timestamp> {
        match self {
            DeviationState::OnRoute => None,
            DeviationState::Deviating { start } => Some(*start),
        }
    }
}

/// Advance the state machine by one sample.
///
/// Returns the new state and whether this sample is a reported deviation.
/// The sample that opens a window is never itself flagged.
pub fn step(
    state: DeviationState,
    timestamp: Timestamp,
    distance_m: f64,
    thresholds: &DeviationThresholds,
) -> (DeviationState, bool) {
    if distance_m <= thresholds.adherence_threshold_m {
        return (DeviationState::OnRoute, false);
    }

    match state {
        DeviationState::OnRoute => (DeviationState::Deviating { start: timestamp }, false),
        DeviationState::Deviating { start } => {
            let duration_hours = hours_between(start, timestamp);
            (state, duration_hours >= thresholds.deviation_time_hours)
        }
    }
}

/// One output row per input sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviationRecord {
    pub entity_id: EntityId,
    pub timestamp: Timestamp,
    pub coordinate: Coordinate,
    /// Distance to the nearest reference waypoint, in meters.
    pub min_distance_m: f64,
    pub matched_waypoint: usize,
    /// Within the adherence threshold.
    pub adherent: bool,
    pub deviation_flag: bool,
    /// Start of the open deviation window after this sample, if any.
    pub deviation_window_start: Option<Timestamp>,
}

/// Runs the deviation state machine over whole trajectories.
pub struct DeviationTracker<'a, M: NearestWaypoint + ?Sized> {
    matcher: &'a M,
    thresholds: DeviationThresholds,
}

impl<'a, M: NearestWaypoint + ?Sized> DeviationTracker<'a, M> {
    pub fn new(matcher: &'a M, thresholds: DeviationThresholds) -> Self {
        Self {
            matcher,
            thresholds,
        }
    }

    /// Evaluate every sample of `trajectory`.
    ///
    /// Requires strictly increasing timestamps; duplicates make the
    /// duration math ambiguous and fail with `UnsortedTrajectory`. An empty
    /// trajectory yields no rows.
    pub fn track(&self, trajectory: &Trajectory) -> Result<Vec<DeviationRecord>, CoreError> {
        let samples = trajectory.samples();
        check_order(trajectory.entity_id(), samples, TimeOrder::StrictlyIncreasing)?;

        let mut state = DeviationState::OnRoute;
        let mut records = Vec::with_capacity(samples.len());

        for sample in samples {
            let nearest = self.matcher.nearest(&sample.coordinate)?;
            let (next, flagged) = step(state, sample.timestamp, nearest.distance_m, &self.thresholds);
            state = next;

            records.push(DeviationRecord {
                entity_id: trajectory.entity_id().to_string(),
                timestamp: sample.timestamp,
                coordinate: sample.coordinate,
                min_distance_m: nearest.distance_m,
                matched_waypoint: nearest.waypoint_index,
                adherent: nearest.distance_m <= self.thresholds.adherence_threshold_m,
                deviation_flag: flagged,
                deviation_window_start: state.window_start(),
            });
        }

        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{LinearRouteMatcher, ReferenceRoute};
    use crate::types::Sample;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    fn t(hours: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn thresholds() -> DeviationThresholds {
        DeviationThresholds {
            adherence_threshold_m: 100.0,
            deviation_time_hours: 6.0,
        }
    }

    fn origin_matcher() -> LinearRouteMatcher {
        let route =
            ReferenceRoute::new("origin", vec![Coordinate::new(0.0, 0.0).unwrap()]).unwrap();
        LinearRouteMatcher::new(route)
    }

    fn off_route(hours: i64) -> Sample {
        // ~1113 m east of the only waypoint.
        Sample::new(Coordinate::new(0.0, 0.01).unwrap(), t(hours))
    }

    fn on_route(hours: i64) -> Sample {
        Sample::new(Coordinate::new(0.0, 0.0001).unwrap(), t(hours))
    }

    fn flags(records: &[DeviationRecord]) -> Vec<bool> {
        records.iter().map(|r| r.deviation_flag).collect()
    }

    // -- step -------------------------------------------------------------------

    #[test]
    fn first_off_route_sample_opens_window_without_flag() {
        let (state, flagged) = step(DeviationState::OnRoute, t(0), 1113.0, &thresholds());
        assert_eq!(state, DeviationState::Deviating { start: t(0) });
        assert!(!flagged);
    }

    #[test]
    fn flag_at_exact_threshold_keeps_start() {
        let open = DeviationState::Deviating { start: t(0) };
        let (state, flagged) = step(open, t(6), 1113.0, &thresholds());
        assert!(flagged);
        assert_eq!(state, open);
    }

    #[test]
    fn returning_within_threshold_closes_window() {
        let open = DeviationState::Deviating { start: t(0) };
        let (state, flagged) = step(open, t(10), 100.0, &thresholds());
        assert_eq!(state, DeviationState::OnRoute);
        assert!(!flagged);
    }

    // -- DeviationTracker -------------------------------------------------------

    #[test]
    fn on_route_trajectory_never_flags() {
        let matcher = origin_matcher();
        let tracker = DeviationTracker::new(&matcher, thresholds());
        let traj = Trajectory::from_sorted("P1", (0..24).map(on_route).collect()).unwrap();
        let records = tracker.track(&traj).unwrap();
        assert!(records.iter().all(|r| !r.deviation_flag && r.adherent));
        assert!(records.iter().all(|r| r.deviation_window_start.is_none()));
    }

    #[test]
    fn flags_from_threshold_onwards() {
        let matcher = origin_matcher();
        let tracker = DeviationTracker::new(&matcher, thresholds());
        let traj = Trajectory::from_sorted("P1", (0..10).map(off_route).collect()).unwrap();
        let records = tracker.track(&traj).unwrap();

        let expected: Vec<bool> = (0..10).map(|h| h >= 6).collect();
        assert_eq!(flags(&records), expected);
        assert!(records.iter().all(|r| r.deviation_window_start == Some(t(0))));
    }

    #[test]
    fn zero_window_flags_from_second_off_route_sample() {
        let matcher = origin_matcher();
        let zero = DeviationThresholds {
            deviation_time_hours: 0.0,
            ..thresholds()
        };
        let tracker = DeviationTracker::new(&matcher, zero);
        let traj = Trajectory::from_sorted("P1", (0..4).map(off_route).collect()).unwrap();
        let records = tracker.track(&traj).unwrap();
        assert_eq!(flags(&records), vec![false, true, true, true]);
    }

    #[test]
    fn reported_flags_survive_return_to_route() {
        let matcher = origin_matcher();
        let tracker = DeviationTracker::new(&matcher, thresholds());
        let samples = vec![off_route(0), off_route(7), on_route(8), off_route(9), off_route(12)];
        let traj = Trajectory::from_sorted("P1", samples).unwrap();
        let records = tracker.track(&traj).unwrap();

        assert_eq!(flags(&records), vec![false, true, false, false, false]);
        assert_eq!(records[2].deviation_window_start, None);
        assert_eq!(records[3].deviation_window_start, Some(t(9)));
    }

    #[test]
    fn single_sample_never_deviates() {
        let matcher = origin_matcher();
        let tracker = DeviationTracker::new(&matcher, thresholds());
        let traj = Trajectory::from_sorted("P1", vec![off_route(0)]).unwrap();
        let records = tracker.track(&traj).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].deviation_flag);
        assert!((records[0].min_distance_m - 1113.19).abs() < 1.0);
        assert_eq!(records[0].deviation_window_start, Some(t(0)));
    }

    #[test]
    fn empty_trajectory_yields_no_rows() {
        let matcher = origin_matcher();
        let tracker = DeviationTracker::new(&matcher, thresholds());
        let traj = Trajectory::from_sorted("P1", vec![]).unwrap();
        assert!(tracker.track(&traj).unwrap().is_empty());
    }

    #[test]
    fn duplicate_timestamps_are_rejected() {
        let matcher = origin_matcher();
        let tracker = DeviationTracker::new(&matcher, thresholds());
        let traj = Trajectory::from_sorted("P1", vec![off_route(0), off_route(0)]).unwrap();
        assert_matches!(
            tracker.track(&traj),
            Err(CoreError::UnsortedTrajectory { index: 1, .. })
        );
    }
}
