//! Analysis parameters shared by every detector.
//!
//! All values are supplied by the caller. The core never reads the
//! environment; see the worker crate for env-driven loading.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::threshold_validation::{validate_non_negative, validate_positive};

/// Thresholds and tuning knobs for a single analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Distance (meters) above which a sample counts as off-route.
    pub adherence_threshold_m: f64,
    /// Minimum open deviation-window duration (hours) before samples are flagged.
    pub deviation_time_hours: f64,
    /// Maximum displacement (meters) between consecutive samples to count as "not moved".
    pub stationary_distance_m: f64,
    /// Minimum elapsed time (hours) for both stationary checks.
    pub stationary_time_hours: f64,
    /// First-to-last displacement (meters) under which the coarse dwell check
    /// considers an entity stationary.
    pub dwell_radius_m: f64,
    /// K for cohort clustering.
    pub num_clusters: usize,
    /// Seed for centroid initialisation.
    pub cluster_seed: u64,
}

impl AnalysisConfig {
    /// Reject non-finite thresholds and a zero cluster count.
    ///
    /// Distances must be `> 0`. Durations may be `0`: a zero deviation
    /// window flags from the second off-route sample, and a zero stationary
    /// time flags any pair that has not moved.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_positive(self.adherence_threshold_m, "adherence_threshold_m")?;
        validate_non_negative(self.deviation_time_hours, "deviation_time_hours")?;
        validate_positive(self.stationary_distance_m, "stationary_distance_m")?;
        validate_non_negative(self.stationary_time_hours, "stationary_time_hours")?;
        validate_positive(self.dwell_radius_m, "dwell_radius_m")?;
        if self.num_clusters == 0 {
            return Err(CoreError::Validation(
                "num_clusters must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_config() -> AnalysisConfig {
        AnalysisConfig {
            adherence_threshold_m: 2000.0,
            deviation_time_hours: 6.0,
            stationary_distance_m: 500.0,
            stationary_time_hours: 48.0,
            dwell_radius_m: 500.0,
            num_clusters: 5,
            cluster_seed: 42,
        }
    }

    #[test]
    fn sample_config_is_valid() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn rejects_zero_clusters() {
        let config = AnalysisConfig {
            num_clusters: 0,
            ..sample_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_threshold() {
        let config = AnalysisConfig {
            deviation_time_hours: -1.0,
            ..sample_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("deviation_time_hours"));
    }

    #[test]
    fn accepts_zero_durations() {
        let config = AnalysisConfig {
            deviation_time_hours: 0.0,
            stationary_time_hours: 0.0,
            ..sample_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_distance() {
        let config = AnalysisConfig {
            stationary_distance_m: 0.0,
            ..sample_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("stationary_distance_m"));
    }

    #[test]
    fn rejects_nan_threshold() {
        let config = AnalysisConfig {
            stationary_distance_m: f64::NAN,
            ..sample_config()
        };
        assert!(config.validate().is_err());
    }
}
