//! Shared threshold validation helpers.
//!
//! Provides reusable range-checking functions used by the analysis
//! configuration and the individual detectors.

use crate::error::CoreError;

/// Validate that a threshold is finite and strictly positive.
///
/// Returns a `CoreError::Validation` naming the field otherwise.
pub fn validate_positive(value: f64, name: &str) -> Result<(), CoreError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CoreError::Validation(format!(
            "{name} must be a finite value > 0, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a threshold is finite and `>= 0`.
pub fn validate_non_negative(value: f64, name: &str) -> Result<(), CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::Validation(format!(
            "{name} must be a finite value >= 0, got {value}"
        )));
    }
    Ok(())
}
