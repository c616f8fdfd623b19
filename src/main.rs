use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use cloudtrim::config::Config;
use cloudtrim::db;
use cloudtrim::models;
use cloudtrim::services::{
    self, AuditLogService, DetectionOptions, DetectionService, DriftService, ExecutionModeService,
    ExecutionService, RecommendationService, ResourceStore, ScanCache,
};
use cloudtrim::{AppState, handlers};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::detection::detect_waste,

        handlers::recommendation::list_recommendations,
        handlers::recommendation::generate_recommendations,
        handlers::recommendation::action_recommendation,
        handlers::recommendation::delete_recommendation,

        handlers::execution::execute_action,
        handlers::execution::get_execution_mode,
        handlers::execution::set_execution_mode,

        handlers::drift::drift_tick,
        handlers::audit::list_audit_log,
    ),
    components(
        schemas(
            models::Detection,
            models::DetectionResult,
            models::DetectionSummary,
            models::ResourceCounts,
            models::ImpactLevel,
            models::Recommendation,
            models::RecommendationStatus,
            models::RecommendationActionRequest,
            models::RecommendationSummary,
            models::SavingsRollup,
            models::ExecuteActionParams,
            models::ActionResult,
            models::AuditEntry,
            models::ResourceChangeEvent,
            models::ExecutionMode,
            models::DriftTickRequest,
            models::DriftTickResult,
            models::DriftDetectionStats,
            models::DriftExecutionStats,
            models::DriftExecutionItem,
            models::DriftAdvanceStats,
            models::DriftTiming,
            models::Instance,
            models::AutoscalingGroup,
            models::RdsInstance,
            models::CacheCluster,
            models::LoadBalancer,
            models::LambdaFunction,
            models::Volume,
            models::Snapshot,
            models::S3Bucket,
            models::LogGroup,
            models::ElasticIp,
            models::LifecycleRule,
            models::LifecycleTransition,
            models::NoncurrentVersionExpiration,
            services::IngestOutcome,
            handlers::detection::DetectWasteRequest,
            handlers::detection::DetectWasteResponse,
            handlers::recommendation::RecommendationListData,
            handlers::recommendation::RecommendationListResponse,
            handlers::recommendation::GenerateRecommendationsRequest,
            handlers::recommendation::GenerateRecommendationsResponse,
            handlers::recommendation::RecommendationActionResponse,
            handlers::recommendation::DeleteRecommendationResponse,
            handlers::execution::ExecuteActionResponse,
            handlers::execution::SetExecutionModeRequest,
            handlers::execution::ExecutionModeResponse,
            handlers::drift::DriftTickResponse,
            handlers::audit::AuditLogResponse,
        )
    ),
    tags(
        (name = "Detection", description = "Waste detection scans"),
        (name = "Recommendations", description = "Recommendation lifecycle"),
        (name = "Execution", description = "Action execution and execution mode"),
        (name = "Drift", description = "Simulated world advance"),
        (name = "Audit", description = "Audit trail"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("cloudtrim.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::info!("Cloudtrim starting up");

    let pool = db::create_pool(&config.database.url).await?;
    tracing::info!("Database pool created and migrations applied");

    let resource_store = Arc::new(ResourceStore::new(pool.clone()));
    let scan_cache = Arc::new(ScanCache::new(Duration::from_secs(
        config.detection.cache_ttl_secs,
    )));
    let audit_log_service = Arc::new(AuditLogService::new(pool.clone()));

    let detection_service = Arc::new(DetectionService::new(
        Arc::clone(&resource_store),
        Arc::clone(&scan_cache),
        DetectionOptions {
            treat_missing_metrics_as_idle: config.detection.treat_missing_metrics_as_idle,
        },
    ));

    let execution_service = Arc::new(ExecutionService::new(
        Arc::clone(&resource_store),
        Arc::clone(&audit_log_service),
        Arc::clone(&scan_cache),
    ));

    let recommendation_service = Arc::new(RecommendationService::new(
        pool.clone(),
        Arc::clone(&execution_service),
    ));

    let execution_mode_service = Arc::new(ExecutionModeService::new(pool.clone()));

    let drift_service = Arc::new(DriftService::new(
        pool.clone(),
        Arc::clone(&resource_store),
        Arc::clone(&detection_service),
        Arc::clone(&execution_service),
        Arc::clone(&execution_mode_service),
        Arc::clone(&audit_log_service),
    ));

    let app_state = AppState {
        db: pool.clone(),
        resource_store: Arc::clone(&resource_store),
        scan_cache: Arc::clone(&scan_cache),
        detection_service: Arc::clone(&detection_service),
        recommendation_service: Arc::clone(&recommendation_service),
        execution_service: Arc::clone(&execution_service),
        audit_log_service: Arc::clone(&audit_log_service),
        execution_mode_service: Arc::clone(&execution_mode_service),
        drift_service: Arc::clone(&drift_service),
    };

    if config.drift.enabled {
        let _drift_handle = services::start_drift_tick_task(
            Arc::clone(&drift_service),
            config.drift.interval_secs,
        );
    } else {
        tracing::warn!("Drift tick disabled by configuration");
    }

    if config.scheduler.enabled {
        let _scheduler_handle = services::start_scheduled_execution_task(
            Arc::clone(&recommendation_service),
            config.scheduler.interval_secs,
        );
    }

    let app_state_arc = Arc::new(app_state);

    let api_routes = Router::new()
        .route("/api/detect-waste", post(handlers::detection::detect_waste))
        .route(
            "/api/recommendations",
            get(handlers::recommendation::list_recommendations)
                .post(handlers::recommendation::generate_recommendations)
                .patch(handlers::recommendation::action_recommendation)
                .delete(handlers::recommendation::delete_recommendation),
        )
        .route("/api/execute-action", post(handlers::execution::execute_action))
        .route("/api/drift-tick", post(handlers::drift::drift_tick))
        .route(
            "/api/execution-mode",
            get(handlers::execution::get_execution_mode)
                .put(handlers::execution::set_execution_mode),
        )
        .route("/api/audit-log", get(handlers::audit::list_audit_log))
        .with_state(Arc::clone(&app_state_arc));

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check));

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes)
        .merge(health_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);
    tracing::info!("Cloudtrim is ready to serve requests");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ready_check() -> &'static str {
    "READY"
}
