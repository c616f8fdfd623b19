pub mod audit_log_service;
pub mod background_tasks;
pub mod detection;
pub mod drift_service;
pub mod execution_mode_service;
pub mod execution_service;
pub mod pricing;
pub mod recommendation_service;
pub mod resource_store;
pub mod scan_cache;

pub use audit_log_service::AuditLogService;
pub use background_tasks::{start_drift_tick_task, start_scheduled_execution_task};
pub use detection::{DetectionOptions, DetectionService, ResourceSnapshot};
pub use drift_service::DriftService;
pub use execution_mode_service::ExecutionModeService;
pub use execution_service::ExecutionService;
pub use recommendation_service::{IngestOutcome, RecommendationService};
pub use resource_store::ResourceStore;
pub use scan_cache::{DEFAULT_SCOPE, ScanCache};
