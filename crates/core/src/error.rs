use crate::types::EntityId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Reference route has no waypoints")]
    EmptyRoute,

    #[error("Trajectory for entity {entity_id} is not sorted by timestamp at sample {index}")]
    UnsortedTrajectory { entity_id: EntityId, index: usize },

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Stable machine-readable code for structured failure records.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidCoordinate { .. } => "INVALID_COORDINATE",
            CoreError::EmptyRoute => "EMPTY_ROUTE",
            CoreError::UnsortedTrajectory { .. } => "UNSORTED_TRAJECTORY",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}
