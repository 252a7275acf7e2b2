//! Periodic financial snapshots, change detection, and client update
//! drafting for connected accounting platforms.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
