//! Batch orchestration around `palletsense-core`.
//!
//! Turns typed input rows into trajectories, runs every detector per entity
//! in parallel, and assembles a single [`report::AnalysisReport`].

pub mod error;
pub mod ingest;
pub mod report;
pub mod runner;

pub use error::PipelineError;
pub use ingest::{AnalysisBatch, RouteRow, TelemetryRow};
pub use report::{AnalysisReport, EntityFailure};
pub use runner::{run_batch, RouteIndex, RunOptions};
