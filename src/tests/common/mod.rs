// Common test utilities and helpers

use crate::services::detection::{DetectionOptions, DetectionService};
use crate::services::{
    AuditLogService, DriftService, ExecutionModeService, ExecutionService, RecommendationService,
    ResourceStore, ScanCache,
};
use chrono::NaiveDate;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::sync::Arc;
use std::time::Duration;

/// Create an in-memory SQLite database for testing
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(3))
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Fully wired engine over an in-memory store
pub struct TestHarness {
    pub pool: SqlitePool,
    pub store: Arc<ResourceStore>,
    pub cache: Arc<ScanCache>,
    pub detection: Arc<DetectionService>,
    pub executor: Arc<ExecutionService>,
    pub recommendations: Arc<RecommendationService>,
    pub modes: Arc<ExecutionModeService>,
    pub audit: Arc<AuditLogService>,
    pub drift: Arc<DriftService>,
}

pub async fn harness() -> TestHarness {
    harness_with_cache_ttl(Duration::from_secs(30)).await
}

pub async fn harness_with_cache_ttl(ttl: Duration) -> TestHarness {
    let pool = create_test_db().await;

    let store = Arc::new(ResourceStore::new(pool.clone()));
    let cache = Arc::new(ScanCache::new(ttl));
    let audit = Arc::new(AuditLogService::new(pool.clone()));

    let detection = Arc::new(DetectionService::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        DetectionOptions::default(),
    ));
    let executor = Arc::new(ExecutionService::new(
        Arc::clone(&store),
        Arc::clone(&audit),
        Arc::clone(&cache),
    ));
    let recommendations = Arc::new(RecommendationService::new(pool.clone(), Arc::clone(&executor)));
    let modes = Arc::new(ExecutionModeService::new(pool.clone()));
    let drift = Arc::new(DriftService::new(
        pool.clone(),
        Arc::clone(&store),
        Arc::clone(&detection),
        Arc::clone(&executor),
        Arc::clone(&modes),
        Arc::clone(&audit),
    ));

    TestHarness { pool, store, cache, detection, executor, recommendations, modes, audit, drift }
}

/// Seed one daily metric row so the drift tick has history to advance from
pub async fn seed_daily_metric(
    pool: &SqlitePool,
    account_id: &str,
    resource_id: &str,
    date: NaiveDate,
    daily_cost: f64,
) {
    sqlx::query(
        "INSERT INTO daily_resource_metrics (account_id, resource_type, resource_id, date, daily_cost)
         VALUES (?, 'instance', ?, ?, ?)",
    )
    .bind(account_id)
    .bind(resource_id)
    .bind(date)
    .bind(daily_cost)
    .execute(pool)
    .await
    .expect("Failed to seed daily metric");
}

/// Latest virtual date recorded for an account
pub async fn max_metric_date(pool: &SqlitePool, account_id: &str) -> Option<NaiveDate> {
    sqlx::query_scalar("SELECT MAX(date) FROM daily_resource_metrics WHERE account_id = ?")
        .bind(account_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read max metric date")
}
