//! `palletsense-worker` -- one-shot batch runner.
//!
//! Reads an analysis batch document, runs every detector, and writes the
//! JSON report.

pub mod config;
