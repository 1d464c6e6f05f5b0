//! Shared fixtures for pipeline integration tests.

use chrono::{Duration, TimeZone, Utc};
use palletsense_core::config::AnalysisConfig;
use palletsense_core::types::Timestamp;
use palletsense_pipeline::{AnalysisBatch, RouteRow, TelemetryRow};

pub fn t(hours: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}

pub fn config() -> AnalysisConfig {
    AnalysisConfig {
        adherence_threshold_m: 2000.0,
        deviation_time_hours: 6.0,
        stationary_distance_m: 500.0,
        stationary_time_hours: 48.0,
        dwell_radius_m: 500.0,
        num_clusters: 2,
        cluster_seed: 42,
    }
}

pub fn row(entity_id: &str, latitude: f64, longitude: f64, hours: i64) -> TelemetryRow {
    TelemetryRow {
        entity_id: entity_id.to_string(),
        latitude,
        longitude,
        timestamp: t(hours),
    }
}

/// Equator corridor from (0, 0) to (0, 0.1), one waypoint every 0.01 degrees.
pub fn equator_route() -> Vec<RouteRow> {
    (0..=10)
        .map(|i| RouteRow {
            latitude: 0.0,
            longitude: i as f64 * 0.01,
        })
        .collect()
}

/// Telemetry with one entity per behaviour:
///
/// - `on-route`: hourly along the corridor for 10 hours.
/// - `detour`: ~11 km north of the corridor for 11 hours.
/// - `parked`: two fixes at the same spot 50 hours apart.
/// - `broken`: an impossible latitude.
/// - `stutter`: two fixes with the same timestamp.
pub fn mixed_telemetry() -> Vec<TelemetryRow> {
    let mut rows = Vec::new();
    for h in 0..10 {
        rows.push(row("on-route", 0.0, h as f64 * 0.01, h));
    }
    for h in 0..=10 {
        rows.push(row("detour", 0.1, 0.05, h));
    }
    rows.push(row("parked", 0.0, 0.05, 0));
    rows.push(row("parked", 0.0, 0.05, 50));
    rows.push(row("broken", 120.0, 0.0, 3));
    rows.push(row("stutter", 0.0, 0.02, 4));
    rows.push(row("stutter", 0.0, 0.03, 4));
    rows
}

pub fn mixed_batch() -> AnalysisBatch {
    AnalysisBatch {
        route_name: "equator".to_string(),
        route: equator_route(),
        telemetry: mixed_telemetry(),
    }
}
