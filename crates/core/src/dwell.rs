//! Coarse dwell check over a whole trajectory.
//!
//! Only the first and last samples are compared. This is a separate signal
//! from [`crate::stationary`] and feeds the alert escalator.

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::CoreError;
use crate::geodesy::distance_m;
use crate::trajectory::Trajectory;
use crate::types::{hours_between, EntityId, Timestamp};

/// Default first-to-last displacement radius in meters.
pub const DEFAULT_DWELL_RADIUS_M: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellThresholds {
    /// Exclusive upper bound on first-to-last displacement.
    pub dwell_radius_m: f64,
    /// Inclusive lower bound on first-to-last elapsed time.
    pub stationary_time_hours: f64,
}

impl From<&AnalysisConfig> for DwellThresholds {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            dwell_radius_m: config.dwell_radius_m,
            stationary_time_hours: config.stationary_time_hours,
        }
    }
}

/// An entity judged stationary over its whole trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DwellSummary {
    pub entity_id: EntityId,
    pub last_timestamp: Timestamp,
    pub hours_stationary: f64,
    pub distance_travelled_m: f64,
}

/// Compare the first and last samples of `trajectory`.
///
/// Returns `Some` when the entity moved less than the dwell radius over at
/// least the stationary time. Empty trajectories yield `None`.
pub fn check_first_last(
    trajectory: &Trajectory,
    thresholds: &DwellThresholds,
) -> Result<Option<DwellSummary>, CoreError> {
    let (Some(first), Some(last)) = (trajectory.first(), trajectory.last()) else {
        return Ok(None);
    };

    let distance_travelled_m = distance_m(&first.coordinate, &last.coordinate)?;
    let time_spent = hours_between(first.timestamp, last.timestamp);

    if distance_travelled_m < thresholds.dwell_radius_m
        && time_spent >= thresholds.stationary_time_hours
    {
        Ok(Some(DwellSummary {
            entity_id: trajectory.entity_id().to_string(),
            last_timestamp: last.timestamp,
            hours_stationary: time_spent,
            distance_travelled_m,
        }))
    } else {
        Ok(None)
    }
}
