//! Output tables of an analysis run.

use serde::Serialize;
use uuid::Uuid;

use palletsense_core::adherence::AdherenceSummary;
use palletsense_core::alert::{AlertRecord, IntervalStats};
use palletsense_core::cohort::CohortAssignment;
use palletsense_core::config::AnalysisConfig;
use palletsense_core::deviation::DeviationRecord;
use palletsense_core::dwell::DwellSummary;
use palletsense_core::error::CoreError;
use palletsense_core::stationary::StationaryRecord;
use palletsense_core::types::{EntityId, Timestamp};

/// A per-entity failure, reported alongside successful results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityFailure {
    pub entity_id: EntityId,
    /// Stable code, see [`CoreError::code`].
    pub code: &'static str,
    pub message: String,
}

impl EntityFailure {
    pub fn new(entity_id: &str, error: &CoreError) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: Timestamp,
    pub route_name: String,
    pub config: AnalysisConfig,
    /// Entities whose analysis completed.
    pub entities_analysed: usize,
    /// One row per sample of every analysed entity.
    pub deviations: Vec<DeviationRecord>,
    /// One row per sample of every analysed entity.
    pub stationary: Vec<StationaryRecord>,
    /// Entities stationary between their first and last sample.
    pub dwell: Vec<DwellSummary>,
    pub alerts: Vec<AlertRecord>,
    /// Corpus-wide sampling interval statistics used for alert tiers.
    pub interval_stats: Option<IntervalStats>,
    pub adherence: AdherenceSummary,
    /// Instant of the cohort snapshot, if any entity was analysed.
    pub snapshot_at: Option<Timestamp>,
    pub cohorts: CohortAssignment,
    pub failures: Vec<EntityFailure>,
}

impl AnalysisReport {
    /// Deviation rows reported as deviations.
    pub fn flagged_deviations(&self) -> impl Iterator<Item = &DeviationRecord> {
        self.deviations.iter().filter(|r| r.deviation_flag)
    }

    /// Stationary rows flagged by the pairwise check.
    pub fn flagged_stationary(&self) -> impl Iterator<Item = &StationaryRecord> {
        self.stationary.iter().filter(|r| r.stationary_flag)
    }
}
