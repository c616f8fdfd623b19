//! Cloudtrim Library
//!
//! Core modules for the cloud-waste optimization engine: detection,
//! recommendation lifecycle, execution and the drift simulation.

use sqlx::SqlitePool;
use std::sync::Arc;

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::Config;
pub use services::{
    AuditLogService, DetectionService, DriftService, ExecutionModeService, ExecutionService,
    RecommendationService, ResourceStore, ScanCache,
};

/// Application shared state
///
/// Rust's type system is the DI container: every service is wrapped in Arc
/// for cheap cloning and thread safety, no dynamic lookup involved.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,

    pub resource_store: Arc<ResourceStore>,
    pub scan_cache: Arc<ScanCache>,

    pub detection_service: Arc<DetectionService>,
    pub recommendation_service: Arc<RecommendationService>,
    pub execution_service: Arc<ExecutionService>,
    pub audit_log_service: Arc<AuditLogService>,
    pub execution_mode_service: Arc<ExecutionModeService>,
    pub drift_service: Arc<DriftService>,
}
