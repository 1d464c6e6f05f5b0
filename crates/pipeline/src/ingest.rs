//! Tabular input rows and their conversion into core types.
//!
//! The loading layer (CSV parsing, column normalisation) lives outside this
//! crate; rows arrive here already typed, either constructed directly or
//! deserialised from a JSON batch document.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use palletsense_core::error::CoreError;
use palletsense_core::route::ReferenceRoute;
use palletsense_core::trajectory::Trajectory;
use palletsense_core::types::{Coordinate, EntityId, Sample, Timestamp};

use crate::error::PipelineError;
use crate::report::EntityFailure;

/// One waypoint row of the reference route table. Extra columns are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RouteRow {
    pub latitude: f64,
    pub longitude: f64,
}

/// One row of the trajectory table. Extra columns are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TelemetryRow {
    #[serde(deserialize_with = "entity_id_from_string_or_int")]
    pub entity_id: EntityId,
    pub latitude: f64,
    pub longitude: f64,
    /// ISO-8601 instant.
    pub timestamp: Timestamp,
}

/// Both input tables of a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisBatch {
    #[serde(default = "default_route_name")]
    pub route_name: String,
    pub route: Vec<RouteRow>,
    pub telemetry: Vec<TelemetryRow>,
}

fn default_route_name() -> String {
    "reference".to_string()
}

impl AnalysisBatch {
    /// Parse a JSON batch document.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, PipelineError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntityId {
    Text(String),
    Integer(i64),
}

fn entity_id_from_string_or_int<'de, D>(deserializer: D) -> Result<EntityId, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawEntityId::deserialize(deserializer)? {
        RawEntityId::Text(s) => s,
        RawEntityId::Integer(n) => n.to_string(),
    })
}

/// Build the reference route. Fails on zero rows or an invalid waypoint.
pub fn build_route(name: &str, rows: &[RouteRow]) -> Result<ReferenceRoute, CoreError> {
    let waypoints = rows
        .iter()
        .map(|r| Coordinate {
            latitude: r.latitude,
            longitude: r.longitude,
        })
        .collect();
    ReferenceRoute::new(name, waypoints)
}

/// Group rows by entity and sort each group stably by timestamp.
///
/// Returns trajectories ordered by entity id. An entity with any invalid
/// coordinate is excluded as a whole and reported as a failure.
pub fn group_trajectories(rows: &[TelemetryRow]) -> (Vec<Trajectory>, Vec<EntityFailure>) {
    let mut grouped: BTreeMap<&str, Vec<Sample>> = BTreeMap::new();
    for row in rows {
        let sample = Sample::new(
            Coordinate {
                latitude: row.latitude,
                longitude: row.longitude,
            },
            row.timestamp,
        );
        grouped.entry(row.entity_id.as_str()).or_default().push(sample);
    }

    let mut trajectories = Vec::with_capacity(grouped.len());
    let mut failures = Vec::new();
    for (entity_id, samples) in grouped {
        match Trajectory::from_unsorted(entity_id, samples) {
            Ok(t) => trajectories.push(t),
            Err(e) => failures.push(EntityFailure::new(entity_id, &e)),
        }
    }
    (trajectories, failures)
}

/// Timestamps of every row in ingestion order.
pub fn corpus_timestamps(rows: &[TelemetryRow]) -> Vec<Timestamp> {
    rows.iter().map(|r| r.timestamp).collect()
}
