//! Tiered alerting for stationary entities.
//!
//! Pure logic. Tiers are evaluated independently and are cumulative: an
//! entity past the 3σ bound also holds the 2σ and 80% tiers.

use serde::Serialize;

use crate::dwell::DwellSummary;
use crate::types::{hours_between, EntityId, Timestamp};

/// Fraction of the stationary threshold that triggers the initial warning.
pub const INITIAL_WARNING_FRACTION: f64 = 0.8;

/// σ multiple above the stationary threshold for a critical alert.
pub const CRITICAL_SIGMA_MULTIPLE: f64 = 2.0;

/// σ multiple above the stationary threshold for an escalation.
pub const ESCALATION_SIGMA_MULTIPLE: f64 = 3.0;

// ---------------------------------------------------------------------------
// IntervalStats
// ---------------------------------------------------------------------------

/// Mean and population standard deviation of sampling intervals, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntervalStats {
    pub count: usize,
    pub mean_hours: f64,
    pub std_hours: f64,
}

impl IntervalStats {
    /// Statistics over raw gaps. `None` when there are no gaps.
    pub fn from_gaps_hours(gaps: &[f64]) -> Option<Self> {
        if gaps.is_empty() {
            return None;
        }
        let n = gaps.len() as f64;
        let mean = gaps.iter().sum::<f64>() / n;
        let variance = gaps.iter().map(|g| (g - mean) * (g - mean)).sum::<f64>() / n;
        Some(Self {
            count: gaps.len(),
            mean_hours: mean,
            std_hours: variance.sqrt(),
        })
    }

    /// Statistics over the differences between consecutive timestamps of the
    /// whole corpus, in ingestion order.
    ///
    /// Consecutive rows may belong to different entities, and the gap
    /// between them is counted like any other. Negative gaps are kept.
    pub fn from_corpus_timestamps(timestamps: &[Timestamp]) -> Option<Self> {
        let gaps: Vec<f64> = timestamps
            .windows(2)
            .map(|pair| hours_between(pair[0], pair[1]))
            .collect();
        Self::from_gaps_hours(&gaps)
    }
}

// ---------------------------------------------------------------------------
// AlertTier
// ---------------------------------------------------------------------------

/// Severity tier of a dwell alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTier {
    /// Dwell reached 80% of the stationary threshold.
    InitialWarning,
    /// Dwell reached the threshold plus 2σ.
    CriticalAlert,
    /// Dwell reached the threshold plus 3σ.
    Escalation,
}

impl AlertTier {
    pub fn label(&self) -> &'static str {
        match self {
            AlertTier::InitialWarning => "Initial Warning: Exceeded 80% dwell time",
            AlertTier::CriticalAlert => "Critical Alert: 2σ Deviation",
            AlertTier::Escalation => "Escalation: 3σ Deviation",
        }
    }
}

/// A single tier reached by a stationary entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub entity_id: EntityId,
    pub tier: AlertTier,
    pub label: &'static str,
    /// Dwell duration that triggered the alert.
    pub hours_stationary: f64,
    /// The bound that was reached.
    pub bound_hours: f64,
    /// Last sample of the dwell.
    pub timestamp: Timestamp,
}

// ---------------------------------------------------------------------------
// Escalation
// ---------------------------------------------------------------------------

/// Assign every tier `summary` reaches.
///
/// The σ tiers need corpus statistics; with `stats == None` (fewer than two
/// corpus rows) only the initial warning is evaluated.
pub fn escalate(
    summary: &DwellSummary,
    stationary_time_hours: f64,
    stats: Option<&IntervalStats>,
) -> Vec<AlertRecord> {
    let mut bounds = vec![(
        AlertTier::InitialWarning,
        INITIAL_WARNING_FRACTION * stationary_time_hours,
    )];
    if let Some(stats) = stats {
        bounds.push((
            AlertTier::CriticalAlert,
            stationary_time_hours + CRITICAL_SIGMA_MULTIPLE * stats.std_hours,
        ));
        bounds.push((
            AlertTier::Escalation,
            stationary_time_hours + ESCALATION_SIGMA_MULTIPLE * stats.std_hours,
        ));
    }

    bounds
        .into_iter()
        .filter(|(_, bound)| summary.hours_stationary >= *bound)
        .map(|(tier, bound_hours)| AlertRecord {
            entity_id: summary.entity_id.clone(),
            tier,
            label: tier.label(),
            hours_stationary: summary.hours_stationary,
            bound_hours,
            timestamp: summary.last_timestamp,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
