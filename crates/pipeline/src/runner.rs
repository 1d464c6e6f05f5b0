//! Batch analysis run.
//!
//! Flow:
//! 1. Validate configuration and build the reference route (global
//!    preconditions; failure aborts the run).
//! 2. Group rows into per-entity trajectories.
//! 3. Fan out per entity in parallel: deviation tracking, pairwise
//!    stationary detection, first/last dwell check.
//! 4. Barrier: corpus-wide interval statistics, then tiered alerts.
//! 5. Cohort clustering on the latest snapshot.
//!
//! Entities are independent; a failing entity is reported and skipped.

use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use palletsense_core::adherence::AdherenceSummary;
use palletsense_core::alert::{escalate, IntervalStats};
use palletsense_core::cohort::{cluster, ClusterParams, Snapshot};
use palletsense_core::config::AnalysisConfig;
use palletsense_core::deviation::{DeviationRecord, DeviationThresholds, DeviationTracker};
use palletsense_core::dwell::{check_first_last, DwellSummary, DwellThresholds};
use palletsense_core::error::CoreError;
use palletsense_core::route::{
    IndexedRouteMatcher, LinearRouteMatcher, NearestWaypoint, ReferenceRoute,
};
use palletsense_core::stationary::{detect_pairwise, StationaryRecord, StationaryThresholds};
use palletsense_core::trajectory::Trajectory;
use palletsense_core::types::Timestamp;

use crate::error::PipelineError;
use crate::ingest::{build_route, corpus_timestamps, group_trajectories, AnalysisBatch};
use crate::report::{AnalysisReport, EntityFailure};

/// Nearest-waypoint strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteIndex {
    /// Exhaustive scan.
    Linear,
    /// R-tree pruning.
    #[default]
    Rtree,
}

impl RouteIndex {
    fn build(self, route: ReferenceRoute) -> Box<dyn NearestWaypoint> {
        match self {
            RouteIndex::Linear => Box::new(LinearRouteMatcher::new(route)),
            RouteIndex::Rtree => Box::new(IndexedRouteMatcher::new(route)),
        }
    }
}

/// Run options that are not analysis thresholds.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub route_index: RouteIndex,
    /// Cohort snapshot instant. Defaults to the latest analysed timestamp.
    pub snapshot_at: Option<Timestamp>,
}

/// Per-entity results before merging.
struct EntityAnalysis {
    deviations: Vec<DeviationRecord>,
    stationary: Vec<StationaryRecord>,
    dwell: Option<DwellSummary>,
}

fn analyse_entity(
    trajectory: &Trajectory,
    tracker: &DeviationTracker<'_, dyn NearestWaypoint>,
    stationary: &StationaryThresholds,
    dwell: &DwellThresholds,
) -> Result<EntityAnalysis, CoreError> {
    Ok(EntityAnalysis {
        deviations: tracker.track(trajectory)?,
        stationary: detect_pairwise(trajectory, stationary)?,
        dwell: check_first_last(trajectory, dwell)?,
    })
}

/// Run every detector over `batch`.
///
/// Returns `Err` only for global failures (invalid configuration, empty
/// route, cancellation). Per-entity failures land in
/// [`AnalysisReport::failures`].
pub fn run_batch(
    batch: &AnalysisBatch,
    config: &AnalysisConfig,
    options: &RunOptions,
    cancel: &CancellationToken,
) -> Result<AnalysisReport, PipelineError> {
    let started = Instant::now();
    config.validate()?;

    let route = build_route(&batch.route_name, &batch.route)?;
    let route_name = route.name().to_string();
    let matcher = options.route_index.build(route);

    let (trajectories, mut failures) = group_trajectories(&batch.telemetry);
    tracing::info!(
        route = %route_name,
        waypoints = batch.route.len(),
        rows = batch.telemetry.len(),
        entities = trajectories.len(),
        rejected = failures.len(),
        route_index = ?options.route_index,
        "Starting analysis run",
    );

    let tracker = DeviationTracker::new(matcher.as_ref(), DeviationThresholds::from(config));
    let stationary_thresholds = StationaryThresholds::from(config);
    let dwell_thresholds = DwellThresholds::from(config);

    let outcomes: Vec<(&Trajectory, Result<EntityAnalysis, CoreError>)> = trajectories
        .par_iter()
        .map(|trajectory| {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let outcome =
                analyse_entity(trajectory, &tracker, &stationary_thresholds, &dwell_thresholds);
            Ok((trajectory, outcome))
        })
        .collect::<Result<_, _>>()?;

    let mut analysed = Vec::with_capacity(outcomes.len());
    let mut deviations = Vec::new();
    let mut stationary = Vec::new();
    let mut dwell = Vec::new();

    for (trajectory, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                tracing::debug!(
                    entity_id = trajectory.entity_id(),
                    samples = trajectory.len(),
                    "Entity analysed",
                );
                deviations.extend(result.deviations);
                stationary.extend(result.stationary);
                dwell.extend(result.dwell);
                analysed.push(trajectory);
            }
            Err(e) => failures.push(EntityFailure::new(trajectory.entity_id(), &e)),
        }
    }

    for failure in &failures {
        tracing::warn!(
            entity_id = %failure.entity_id,
            code = failure.code,
            error = %failure.message,
            "Entity excluded from analysis",
        );
    }

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    // σ must be known before any tier is evaluated.
    let interval_stats = IntervalStats::from_corpus_timestamps(&corpus_timestamps(&batch.telemetry));
    let alerts = dwell
        .par_iter()
        .flat_map_iter(|summary| {
            escalate(summary, config.stationary_time_hours, interval_stats.as_ref())
        })
        .collect::<Vec<_>>();

    let snapshot_at = options
        .snapshot_at
        .or_else(|| analysed.iter().filter_map(|t| t.last()).map(|s| s.timestamp).max());
    let cohorts = match snapshot_at {
        Some(instant) => {
            let snapshot = Snapshot::latest_at(analysed.iter().copied(), instant);
            cluster(&snapshot, &ClusterParams::from(config))?
        }
        None => Default::default(),
    };

    let report = AnalysisReport {
        run_id: Uuid::now_v7(),
        generated_at: Utc::now(),
        route_name,
        config: config.clone(),
        entities_analysed: analysed.len(),
        adherence: AdherenceSummary::from_records(&deviations),
        deviations,
        stationary,
        dwell,
        alerts,
        interval_stats,
        snapshot_at,
        cohorts,
        failures,
    };

    tracing::info!(
        run_id = %report.run_id,
        entities = report.entities_analysed,
        failed = report.failures.len(),
        deviations = report.flagged_deviations().count(),
        stationary = report.flagged_stationary().count(),
        dwelling = report.dwell.len(),
        alerts = report.alerts.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Analysis run complete",
    );

    Ok(report)
}
