use std::path::PathBuf;
use std::str::FromStr;

use palletsense_core::config::AnalysisConfig;
use palletsense_pipeline::RouteIndex;

/// Default adherence threshold in meters.
pub const DEFAULT_ADHERENCE_THRESHOLD_M: f64 = 2000.0;
/// Default deviation window in hours.
pub const DEFAULT_DEVIATION_TIME_HOURS: f64 = 6.0;
/// Default "not moved" distance in meters.
pub const DEFAULT_STATIONARY_DISTANCE_M: f64 = 500.0;
/// Default stationary duration in hours.
pub const DEFAULT_STATIONARY_TIME_HOURS: f64 = 48.0;
/// Default first-to-last dwell radius in meters.
pub const DEFAULT_DWELL_RADIUS_M: f64 = palletsense_core::dwell::DEFAULT_DWELL_RADIUS_M;
pub const DEFAULT_NUM_CLUSTERS: usize = 5;
pub const DEFAULT_CLUSTER_SEED: u64 = 42;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Batch document to analyse.
    pub input_path: PathBuf,
    /// Report destination. `None` writes to stdout.
    pub output_path: Option<PathBuf>,
    pub analysis: AnalysisConfig,
    pub route_index: RouteIndex,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Required | Default  |
    /// |-------------------------|----------|----------|
    /// | `INPUT_PATH`            | yes      | --       |
    /// | `OUTPUT_PATH`           | no       | stdout   |
    /// | `ADHERENCE_THRESHOLD_M` | no       | `2000`   |
    /// | `DEVIATION_TIME_HOURS`  | no       | `6`      |
    /// | `STATIONARY_DISTANCE_M` | no       | `500`    |
    /// | `STATIONARY_TIME_HOURS` | no       | `48`     |
    /// | `DWELL_RADIUS_M`        | no       | `500`    |
    /// | `NUM_CLUSTERS`          | no       | `5`      |
    /// | `CLUSTER_SEED`          | no       | `42`     |
    /// | `ROUTE_INDEX`           | no       | `rtree`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`WorkerConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let input_path = lookup("INPUT_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("INPUT_PATH"))?;

        let output_path = lookup("OUTPUT_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let analysis = AnalysisConfig {
            adherence_threshold_m: parse_or(
                &lookup,
                "ADHERENCE_THRESHOLD_M",
                "number",
                DEFAULT_ADHERENCE_THRESHOLD_M,
            )?,
            deviation_time_hours: parse_or(
                &lookup,
                "DEVIATION_TIME_HOURS",
                "number",
                DEFAULT_DEVIATION_TIME_HOURS,
            )?,
            stationary_distance_m: parse_or(
                &lookup,
                "STATIONARY_DISTANCE_M",
                "number",
                DEFAULT_STATIONARY_DISTANCE_M,
            )?,
            stationary_time_hours: parse_or(
                &lookup,
                "STATIONARY_TIME_HOURS",
                "number",
                DEFAULT_STATIONARY_TIME_HOURS,
            )?,
            dwell_radius_m: parse_or(&lookup, "DWELL_RADIUS_M", "number", DEFAULT_DWELL_RADIUS_M)?,
            num_clusters: parse_or(&lookup, "NUM_CLUSTERS", "usize", DEFAULT_NUM_CLUSTERS)?,
            cluster_seed: parse_or(&lookup, "CLUSTER_SEED", "u64", DEFAULT_CLUSTER_SEED)?,
        };

        let route_index = match lookup("ROUTE_INDEX") {
            None => RouteIndex::default(),
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "rtree" => RouteIndex::Rtree,
                "linear" => RouteIndex::Linear,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "ROUTE_INDEX",
                        expected: "route index (rtree or linear)",
                        value: v,
                    })
                }
            },
        };

        Ok(Self {
            input_path,
            output_path,
            analysis,
            route_index,
        })
    }
}

fn parse_or<F, T>(
    lookup: &F,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_input_is_set() {
        let config = WorkerConfig::from_lookup(lookup_from(&[("INPUT_PATH", "batch.json")])).unwrap();

        assert_eq!(config.input_path, PathBuf::from("batch.json"));
        assert!(config.output_path.is_none());
        assert_eq!(config.route_index, RouteIndex::Rtree);
        assert_eq!(config.analysis.adherence_threshold_m, 2000.0);
        assert_eq!(config.analysis.deviation_time_hours, 6.0);
        assert_eq!(config.analysis.stationary_distance_m, 500.0);
        assert_eq!(config.analysis.stationary_time_hours, 48.0);
        assert_eq!(config.analysis.dwell_radius_m, 500.0);
        assert_eq!(config.analysis.num_clusters, 5);
        assert_eq!(config.analysis.cluster_seed, 42);
        assert!(config.analysis.validate().is_ok());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("INPUT_PATH", "in.json"),
            ("OUTPUT_PATH", "out.json"),
            ("ADHERENCE_THRESHOLD_M", "750.5"),
            ("NUM_CLUSTERS", " 3 "),
            ("ROUTE_INDEX", "Linear"),
        ]))
        .unwrap();

        assert_eq!(config.output_path, Some(PathBuf::from("out.json")));
        assert_eq!(config.analysis.adherence_threshold_m, 750.5);
        assert_eq!(config.analysis.num_clusters, 3);
        assert_eq!(config.route_index, RouteIndex::Linear);
    }

    #[test]
    fn missing_input_path_is_an_error() {
        assert_matches!(
            WorkerConfig::from_lookup(lookup_from(&[])),
            Err(ConfigError::Missing("INPUT_PATH"))
        );
    }

    #[test]
    fn malformed_number_names_the_variable() {
        let result = WorkerConfig::from_lookup(lookup_from(&[
            ("INPUT_PATH", "in.json"),
            ("CLUSTER_SEED", "-1"),
        ]));
        assert_matches!(result, Err(ConfigError::Invalid { name: "CLUSTER_SEED", .. }));
    }

    #[test]
    fn unknown_route_index_is_rejected() {
        let result = WorkerConfig::from_lookup(lookup_from(&[
            ("INPUT_PATH", "in.json"),
            ("ROUTE_INDEX", "kdtree"),
        ]));
        assert_matches!(result, Err(ConfigError::Invalid { name: "ROUTE_INDEX", .. }));
    }
}
