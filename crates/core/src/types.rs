use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Stable identifier of a tracked asset (pallet).
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// A WGS84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting NaN and out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoreError> {
        let coord = Self {
            latitude,
            longitude,
        };
        coord.validate()?;
        Ok(coord)
    }

    /// Check that latitude is in `[-90, 90]` and longitude in `[-180, 180]`.
    pub fn validate(&self) -> Result<(), CoreError> {
        let lat_ok = (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(CoreError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// One recorded GPS fix for an entity. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entity_id: EntityId,
    pub coordinate: Coordinate,
    pub timestamp: Timestamp,
}

/// A position stripped of its entity id, as stored inside a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub coordinate: Coordinate,
    pub timestamp: Timestamp,
}

impl Sample {
    pub fn new(coordinate: Coordinate, timestamp: Timestamp) -> Self {
        Self {
            coordinate,
            timestamp,
        }
    }
}

/// Signed elapsed time from `from` to `to`, in fractional hours.
pub fn hours_between(from: Timestamp, to: Timestamp) -> f64 {
    to.signed_duration_since(from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}
