//! Read-optimized CCTray status cache for CI pipelines, stages and jobs.
//!
//! The cache is rebuilt on every topology change by merging the previous
//! cache content, the persisted stage history and placeholders for entities
//! that never ran. See [`cctray::ReconciliationEngine`].

pub mod cctray;
pub mod config;
pub mod error;
