//! Pairwise stationary detection.
//!
//! Every sample is compared only with its immediate predecessor. Nothing is
//! carried across more than two samples: a long dwell sampled at short
//! intervals is not flagged here (see [`crate::dwell`] for the first/last
//! variant).

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::CoreError;
use crate::geodesy::distance_m;
use crate::trajectory::Trajectory;
use crate::types::{hours_between, EntityId, Sample, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationaryThresholds {
    /// Maximum displacement between consecutive samples, inclusive.
    pub stationary_distance_m: f64,
    /// Minimum gap between consecutive samples, inclusive.
    pub stationary_time_hours: f64,
}

impl From<&AnalysisConfig> for StationaryThresholds {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            stationary_distance_m: config.stationary_distance_m,
            stationary_time_hours: config.stationary_time_hours,
        }
    }
}

/// Displacement and elapsed time between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleGap {
    pub distance_m: f64,
    pub hours: f64,
}

/// One output row per input sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationaryRecord {
    pub entity_id: EntityId,
    pub timestamp: Timestamp,
    /// `None` for the first sample, which has no predecessor.
    pub gap: Option<SampleGap>,
    pub stationary_flag: bool,
    /// Timestamp of the predecessor when flagged.
    pub stationary_window_start: Option<Timestamp>,
}

/// Evaluate one `(prev, curr)` pair. Returns the gap and whether `curr` is stationary.
pub fn evaluate_pair(
    prev: &Sample,
    curr: &Sample,
    thresholds: &StationaryThresholds,
) -> Result<(SampleGap, bool), CoreError> {
    let gap = SampleGap {
        distance_m: distance_m(&prev.coordinate, &curr.coordinate)?,
        hours: hours_between(prev.timestamp, curr.timestamp),
    };
    let stationary = gap.distance_m <= thresholds.stationary_distance_m
        && gap.hours >= thresholds.stationary_time_hours;
    Ok((gap, stationary))
}

/// Flag every sample that barely moved over a long enough gap since its predecessor.
pub fn detect_pairwise(
    trajectory: &Trajectory,
    thresholds: &StationaryThresholds,
) -> Result<Vec<StationaryRecord>, CoreError> {
    let samples = trajectory.samples();
    let mut records = Vec::with_capacity(samples.len());

    if let Some(first) = samples.first() {
        records.push(StationaryRecord {
            entity_id: trajectory.entity_id().to_string(),
            timestamp: first.timestamp,
            gap: None,
            stationary_flag: false,
            stationary_window_start: None,
        });
    }

    for pair in samples.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let (gap, stationary) = evaluate_pair(prev, curr, thresholds)?;
        records.push(StationaryRecord {
            entity_id: trajectory.entity_id().to_string(),
            timestamp: curr.timestamp,
            gap: Some(gap),
            stationary_flag: stationary,
            stationary_window_start: stationary.then_some(prev.timestamp),
        });
    }

    Ok(records)
}
