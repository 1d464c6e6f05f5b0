//! Geospatial anomaly detection for tracked pallets.
//!
//! Pure domain logic. No I/O and no logging. Callers (see the pipeline
//! crate) own grouping, fan-out and reporting.
//!
//! - [`geodesy`]: ellipsoidal distance.
//! - [`route`]: nearest reference waypoint.
//! - [`deviation`]: off-route state machine.
//! - [`stationary`]: pairwise immobility check.
//! - [`dwell`]: first/last immobility check.
//! - [`alert`]: σ-tiered alerts for dwelling entities.
//! - [`cohort`]: spatial cohorts of a snapshot.

pub mod adherence;
pub mod alert;
pub mod cohort;
pub mod config;
pub mod deviation;
pub mod dwell;
pub mod error;
pub mod geodesy;
pub mod route;
pub mod stationary;
pub mod threshold_validation;
pub mod trajectory;
pub mod types;
