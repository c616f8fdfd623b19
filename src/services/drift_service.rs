//! Drift tick: advances the simulated world one virtual day per invocation
//! and, in automated execution mode, auto-executes every auto-safe
//! detection found in the new state.
//!
//! The advance is not transactional. Per-account failures are caught and
//! reported; the tick succeeds as long as at least one account progressed.

use crate::models::{
    AccountDriftSummary, AutoscalingGroup, CacheCluster, DriftAdvanceStats, DriftDetectionStats,
    DriftExecutionItem, DriftExecutionStats, DriftTickResult, DriftTiming, ElasticIp,
    ExecuteActionParams, ExecutionMode, Instance, LambdaFunction, LoadBalancer, LogGroup,
    MODE_AUTO_SAFE, RdsInstance, ResourceChangeEvent, S3Bucket, Snapshot, Volume, is_non_prod,
};
use crate::services::audit_log_service::AuditLogService;
use crate::services::detection::DetectionService;
use crate::services::execution_mode_service::ExecutionModeService;
use crate::services::execution_service::ExecutionService;
use crate::services::pricing::{
    S3_GLACIER_GIB_MONTH, S3_IA_GIB_MONTH, S3_STANDARD_GIB_MONTH, instance_hourly_cost,
};
use crate::services::resource_store::ResourceStore;
use crate::services::scan_cache::DEFAULT_SCOPE;
use crate::utils::ApiResult;
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use rand::Rng;
use serde_json::json;
use sqlx::SqlitePool;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const DATA_TRANSFER_KINDS: &[(&str, f64, f64, f64)] = &[
    // (transfer_type, min GiB, max GiB, $/GiB)
    ("cross_region", 1.0, 50.0, 0.02),
    ("egress_internet", 5.0, 100.0, 0.09),
    ("cross_az", 10.0, 80.0, 0.01),
];

// Random draws happen in plain functions so no RNG handle is ever held
// across an await point.
fn uniform(lo: f64, hi: f64) -> f64 {
    rand::thread_rng().gen_range(lo..hi)
}

fn chance(p: f64) -> bool {
    rand::thread_rng().gen_bool(p)
}

fn pick(lo: i64, hi: i64) -> i64 {
    rand::thread_rng().gen_range(lo..=hi)
}

fn short_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub struct DriftService {
    pool: SqlitePool,
    store: Arc<ResourceStore>,
    detection: Arc<DetectionService>,
    executor: Arc<ExecutionService>,
    mode_service: Arc<ExecutionModeService>,
    audit: Arc<AuditLogService>,
}

impl DriftService {
    pub fn new(
        pool: SqlitePool,
        store: Arc<ResourceStore>,
        detection: Arc<DetectionService>,
        executor: Arc<ExecutionService>,
        mode_service: Arc<ExecutionModeService>,
        audit: Arc<AuditLogService>,
    ) -> Self {
        Self { pool, store, detection, executor, mode_service, audit }
    }

    pub async fn tick(&self, auto_execute: Option<bool>) -> ApiResult<DriftTickResult> {
        let started = Instant::now();
        let mut advance = DriftAdvanceStats::default();

        let accounts = self.store.list_account_ids().await?;
        for account_id in &accounts {
            match self.advance_account(account_id).await {
                Ok(summary) => {
                    if summary.date.is_some() {
                        advance.accounts_processed += 1;
                        advance.injected_scenarios.extend(summary.injected.clone());
                        tracing::info!(
                            "Drift advanced account {} to {:?}: {} instances, {} buckets, {} log groups, {} injections",
                            account_id,
                            summary.date,
                            summary.instances_updated,
                            summary.buckets_updated,
                            summary.log_groups_updated,
                            summary.injected.len()
                        );
                    } else {
                        tracing::debug!("Account {} has no metric history, skipped", account_id);
                    }
                },
                Err(e) => {
                    advance.accounts_failed += 1;
                    tracing::warn!("Drift failed for account {}: {}", account_id, e);
                },
            }
        }

        // The world changed under the cache
        self.detection.invalidate_cache();

        let detect_started = Instant::now();
        let scan = self.detection.detect_all(true).await?;
        let detection_ms = detect_started.elapsed().as_millis() as i64;

        let detection = DriftDetectionStats {
            total_detections: scan.summary.total_detections,
            auto_safe_detections: scan.summary.auto_safe_detections,
            total_savings: scan.summary.total_potential_savings,
            auto_safe_savings: scan.summary.auto_optimizable_savings,
        };

        let persisted_mode = self.mode_service.get_mode(DEFAULT_SCOPE).await?;
        let auto = auto_execute.unwrap_or(false) || persisted_mode == ExecutionMode::Automated;

        let mut execution = DriftExecutionStats {
            mode: if auto { "automated".to_string() } else { "manual".to_string() },
            ..Default::default()
        };

        if auto {
            // Strictly sequential: preserves audit ordering and lets each
            // action's cache invalidation settle before the next detection
            // is acted on.
            for d in scan.detections.iter().filter(|d| d.mode == MODE_AUTO_SAFE) {
                let params = ExecuteActionParams {
                    action: d.recommended_action.clone(),
                    resource_type: d.resource_type.clone(),
                    resource_id: d.resource_id.clone(),
                    resource_name: Some(d.resource_name.clone()),
                    detection_id: Some(d.detection_id.clone()),
                    scenario_id: Some(d.scenario_id.clone()),
                    details: Some(d.details.clone()),
                    executed_by: Some("auto_optimizer".to_string()),
                };
                let result = self.executor.execute_action(&params).await?;

                execution.executed += 1;
                if result.success {
                    execution.success += 1;
                } else {
                    execution.failed += 1;
                }
                execution.results.push(DriftExecutionItem {
                    resource_id: d.resource_id.clone(),
                    resource_name: d.resource_name.clone(),
                    action: d.recommended_action.clone(),
                    success: result.success,
                    message: result.message,
                    duration_ms: result.duration_ms,
                });
            }
            tracing::info!(
                "Auto-execution pass: {} executed, {} succeeded, {} failed",
                execution.executed,
                execution.success,
                execution.failed
            );
        }

        Ok(DriftTickResult {
            detection,
            execution,
            drift: advance,
            timing: DriftTiming {
                detection_ms,
                total_ms: started.elapsed().as_millis() as i64,
            },
        })
    }

    /// Advance one account by one virtual day. Returns a summary with
    /// date=None when the account has no metric history to advance from.
    async fn advance_account(&self, account_id: &str) -> ApiResult<AccountDriftSummary> {
        let mut summary = AccountDriftSummary { account_id: account_id.to_string(), ..Default::default() };

        let last: Option<NaiveDate> = sqlx::query_scalar(
            "SELECT MAX(date) FROM daily_resource_metrics WHERE account_id = ?",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        let Some(last) = last else {
            return Ok(summary);
        };
        let next = last + Duration::days(1);
        summary.date = Some(next);
        let weekend = is_weekend(next);

        summary.instances_updated = self.drift_instance_costs(account_id, last, next, weekend).await?;
        summary.buckets_updated = self.drift_s3_usage(account_id, last, next).await?;
        summary.log_groups_updated = self.drift_log_usage(account_id, last, next, weekend).await?;
        self.record_data_transfer(account_id, next).await?;
        self.refresh_live_metrics(account_id, weekend).await?;
        summary.injected = self.inject_scenarios(account_id, weekend).await?;

        Ok(summary)
    }

    /// Random-walk daily instance cost: -3%..+5% of yesterday, +2% prod
    /// bias, weekend discount for non-prod.
    async fn drift_instance_costs(
        &self,
        account_id: &str,
        last: NaiveDate,
        next: NaiveDate,
        weekend: bool,
    ) -> ApiResult<i64> {
        let mut updated = 0;
        for inst in self.store.list_instances_by_account(account_id).await? {
            if !inst.is_running() {
                continue;
            }

            let yesterday: Option<f64> = sqlx::query_scalar(
                "SELECT daily_cost FROM daily_resource_metrics
                 WHERE resource_type = 'instance' AND resource_id = ? AND date = ?",
            )
            .bind(&inst.id)
            .bind(last)
            .fetch_optional(&self.pool)
            .await?;
            let base = yesterday.unwrap_or(inst.hourly_cost * 24.0);

            let mut factor = 1.0 + uniform(-0.03, 0.05);
            if !is_non_prod(&inst.env) {
                factor += 0.02;
            } else if weekend {
                factor *= uniform(0.70, 0.85);
            }

            self.upsert_daily_metric(account_id, "instance", &inst.id, next, base * factor)
                .await?;
            updated += 1;
        }
        Ok(updated)
    }

    async fn upsert_daily_metric(
        &self,
        account_id: &str,
        resource_type: &str,
        resource_id: &str,
        date: NaiveDate,
        daily_cost: f64,
    ) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO daily_resource_metrics (account_id, resource_type, resource_id, date, daily_cost)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(resource_type, resource_id, date) DO NOTHING",
        )
        .bind(account_id)
        .bind(resource_type)
        .bind(resource_id)
        .bind(date)
        .bind(daily_cost)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Standard tier grows daily; buckets with lifecycle rules bleed data
    /// into IA and Glacier.
    async fn drift_s3_usage(
        &self,
        account_id: &str,
        last: NaiveDate,
        next: NaiveDate,
    ) -> ApiResult<i64> {
        let mut updated = 0;
        for bucket in self.store.list_s3_buckets_by_account(account_id).await? {
            let yesterday: Option<(f64, f64, f64)> = sqlx::query_as(
                "SELECT standard_gib, ia_gib, glacier_gib FROM s3_daily_usage
                 WHERE bucket_name = ? AND date = ?",
            )
            .bind(&bucket.name)
            .bind(last)
            .fetch_optional(&self.pool)
            .await?;

            let (mut standard, mut ia, mut glacier) =
                yesterday.unwrap_or_else(|| (uniform(20.0, 200.0), 0.0, 0.0));

            let growth = if is_non_prod(&bucket.env) {
                uniform(0.003, 0.015)
            } else {
                uniform(0.01, 0.03)
            };
            standard *= 1.0 + growth;

            if bucket.has_lifecycle_rules() {
                let to_ia = standard * 0.005;
                standard -= to_ia;
                ia += to_ia;
                let to_glacier = ia * 0.003;
                ia -= to_glacier;
                glacier += to_glacier;
            }

            let daily_cost = (standard * S3_STANDARD_GIB_MONTH
                + ia * S3_IA_GIB_MONTH
                + glacier * S3_GLACIER_GIB_MONTH)
                / 30.0;

            sqlx::query(
                "INSERT INTO s3_daily_usage (account_id, bucket_name, date, standard_gib, ia_gib, glacier_gib, daily_cost)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(bucket_name, date) DO NOTHING",
            )
            .bind(account_id)
            .bind(&bucket.name)
            .bind(next)
            .bind(standard)
            .bind(ia)
            .bind(glacier)
            .bind(daily_cost)
            .execute(&self.pool)
            .await?;
            updated += 1;
        }
        Ok(updated)
    }

    async fn drift_log_usage(
        &self,
        account_id: &str,
        last: NaiveDate,
        next: NaiveDate,
        weekend: bool,
    ) -> ApiResult<i64> {
        let mut updated = 0;
        for group in self.store.list_log_groups_by_account(account_id).await? {
            let mut ingested = if is_non_prod(&group.env) {
                uniform(0.1, 0.8)
            } else {
                uniform(0.5, 3.0)
            };
            if weekend && !group.env.contains("preview") {
                ingested *= 0.70;
            }

            let previous_stored: Option<f64> = sqlx::query_scalar(
                "SELECT stored_gib FROM log_daily_usage WHERE log_group_name = ? AND date = ?",
            )
            .bind(&group.name)
            .bind(last)
            .fetch_optional(&self.pool)
            .await?;

            let mut stored = previous_stored.unwrap_or(0.0) + ingested;
            // Retention caps storage at roughly retention-days worth of the
            // current ingestion rate
            if let Some(days) = group.effective_retention_days() {
                stored = stored.min(ingested * days as f64);
            }

            let daily_cost = stored * crate::services::pricing::LOG_STORAGE_GIB_MONTH / 30.0
                + ingested * crate::services::pricing::LOG_INGESTION_PER_GIB;

            sqlx::query(
                "INSERT INTO log_daily_usage (account_id, log_group_name, date, ingested_gib, stored_gib, daily_cost)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(log_group_name, date) DO NOTHING",
            )
            .bind(account_id)
            .bind(&group.name)
            .bind(next)
            .bind(ingested)
            .bind(stored)
            .bind(daily_cost)
            .execute(&self.pool)
            .await?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Three fixed transfer records per account per day
    async fn record_data_transfer(&self, account_id: &str, next: NaiveDate) -> ApiResult<()> {
        for &(kind, lo, hi, rate) in DATA_TRANSFER_KINDS {
            let gib = uniform(lo, hi);
            sqlx::query(
                "INSERT INTO data_transfer_daily (account_id, transfer_type, date, gib, daily_cost)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(account_id, transfer_type, date) DO NOTHING",
            )
            .bind(account_id)
            .bind(kind)
            .bind(next)
            .bind(gib)
            .bind(gib * rate)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Overwrite live CPU/memory/utilization from env-conditional
    /// distributions. Last-writer-wins; the drift engine is the only writer
    /// to these fields.
    async fn refresh_live_metrics(&self, account_id: &str, weekend: bool) -> ApiResult<()> {
        for inst in self.store.list_instances_by_account(account_id).await? {
            if !inst.is_running() {
                continue;
            }
            let (cpu, memory) = match inst.env.as_str() {
                "prod" | "production" => (uniform(40.0, 85.0), uniform(45.0, 80.0)),
                "preview" => (uniform(1.0, 10.0), uniform(5.0, 15.0)),
                "dev" | "staging" if weekend => (uniform(1.0, 8.0), uniform(5.0, 20.0)),
                "dev" | "staging" => (uniform(5.0, 30.0), uniform(10.0, 40.0)),
                _ => (uniform(10.0, 50.0), uniform(15.0, 50.0)),
            };
            self.store.update_instance_live_metrics(&inst.id, cpu, memory).await?;
        }

        for asg in self.store.list_autoscaling_groups_by_account(account_id).await? {
            self.store
                .update_asg_utilization(&asg.id, uniform(30.0, 70.0))
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scenario injection
    // ------------------------------------------------------------------

    /// Independent probabilistic emissions introducing new waste rows.
    /// Every injection also lands in the resource-change event stream.
    async fn inject_scenarios(&self, account_id: &str, weekend: bool) -> ApiResult<Vec<String>> {
        let mut injected = Vec::new();

        if chance(0.05) {
            let name = format!("preview-{}", short_id());
            let asg = self.make_asg(account_id, &name, "preview", pick(1, 2), uniform(1.0, 8.0));
            self.store.insert_autoscaling_group(&asg).await?;
            self.record_injection(account_id, "autoscaling_group", &asg.id, &name, "forgotten_preview_env")
                .await?;
            injected.push("forgotten_preview_env".to_string());
        }

        if chance(0.05) {
            let name = format!("batch-{}", short_id());
            let mut asg = self.make_asg(account_id, &name, "prod", pick(4, 8), uniform(5.0, 25.0));
            asg.max_size = 10;
            self.store.insert_autoscaling_group(&asg).await?;
            self.record_injection(account_id, "autoscaling_group", &asg.id, &name, "over_provisioned_asg")
                .await?;
            injected.push("over_provisioned_asg".to_string());
        }

        if chance(0.04) {
            let name = format!("ci-runner-{}", short_id());
            let inst = self.make_instance(account_id, &name, "dev", "t3.large", uniform(0.5, 4.0));
            self.store.insert_instance(&inst).await?;
            self.record_injection(account_id, "instance", &inst.id, &name, "idle_ci_runner")
                .await?;
            injected.push("idle_ci_runner".to_string());
        }

        if chance(0.05) {
            let name = format!("data-{}", short_id());
            let bucket = S3Bucket {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                region: "us-east-1".to_string(),
                env: "prod".to_string(),
                tags: Json(HashMap::new()),
                name: name.clone(),
                versioning_enabled: false,
                lifecycle_rules: Json(vec![]),
                updated_at: Utc::now(),
            };
            self.store.insert_s3_bucket(&bucket).await?;
            self.record_injection(account_id, "s3_bucket", &bucket.id, &name, "unoptimized_s3_bucket")
                .await?;
            injected.push("unoptimized_s3_bucket".to_string());
        }

        if chance(0.06) {
            let name = format!("/app/{}", short_id());
            let group = LogGroup {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                region: "us-east-1".to_string(),
                env: "prod".to_string(),
                tags: Json(HashMap::new()),
                name: name.clone(),
                retention_days: None,
                retention_in_days: None,
                updated_at: Utc::now(),
            };
            self.store.insert_log_group(&group).await?;
            self.record_injection(account_id, "log_group", &group.id, &name, "retentionless_log_group")
                .await?;
            injected.push("retentionless_log_group".to_string());
        }

        if weekend && chance(0.08) {
            let name = format!("dev-box-{}", short_id());
            let inst = self.make_instance(account_id, &name, "dev", "t3.medium", uniform(1.0, 10.0));
            self.store.insert_instance(&inst).await?;
            self.record_injection(account_id, "instance", &inst.id, &name, "off_hours_dev_instance")
                .await?;
            injected.push("off_hours_dev_instance".to_string());
        }

        if chance(0.04) {
            let name = format!("feature-{}", short_id());
            let asg = self.make_asg(account_id, &name, "dev", pick(1, 2), uniform(2.0, 15.0));
            self.store.insert_autoscaling_group(&asg).await?;
            self.record_injection(account_id, "autoscaling_group", &asg.id, &name, "stale_feature_env")
                .await?;
            injected.push("stale_feature_env".to_string());
        }

        if chance(0.05) {
            let eip = ElasticIp {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                region: "us-east-1".to_string(),
                env: "prod".to_string(),
                tags: Json(HashMap::new()),
                allocation_id: format!("eipalloc-{}", short_id()),
                public_ip: format!("198.51.100.{}", pick(1, 254)),
                associated_instance_id: None,
                state: "unassociated".to_string(),
                updated_at: Utc::now(),
            };
            self.store.insert_elastic_ip(&eip).await?;
            self.record_injection(account_id, "elastic_ip", &eip.id, &eip.public_ip, "orphaned_eip")
                .await?;
            injected.push("orphaned_eip".to_string());
        }

        if chance(0.03) {
            // Orphan an existing association instead of minting a new address
            let candidates: Vec<ElasticIp> = self
                .store
                .list_elastic_ips_by_account(account_id)
                .await?
                .into_iter()
                .filter(|e| e.associated_instance_id.is_some())
                .collect();
            if let Some(eip) = candidates.first() {
                self.store.orphan_elastic_ip(&eip.id).await?;
                let event = ResourceChangeEvent {
                    id: Uuid::new_v4().to_string(),
                    account_id: account_id.to_string(),
                    change_type: "resource_modified".to_string(),
                    resource_type: "elastic_ip".to_string(),
                    resource_id: eip.id.clone(),
                    resource_name: eip.public_ip.clone(),
                    change_source: "drift_engine".to_string(),
                    details: Json(json!({ "scenario": "orphaned_existing_eip" })),
                    created_at: Utc::now(),
                };
                self.audit.append_change_event(&event).await?;
                injected.push("orphaned_existing_eip".to_string());
            }
        }

        if chance(0.05) {
            let vol = Volume {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                region: "us-east-1".to_string(),
                env: "prod".to_string(),
                tags: Json(HashMap::new()),
                volume_id: format!("vol-{}", short_id()),
                volume_type: if chance(0.5) { "gp2" } else { "gp3" }.to_string(),
                size_gib: pick(50, 500),
                state: "available".to_string(),
                attached_instance_id: None,
                updated_at: Utc::now(),
            };
            self.store.insert_volume(&vol).await?;
            self.record_injection(account_id, "volume", &vol.id, &vol.volume_id, "unattached_volume")
                .await?;
            injected.push("unattached_volume".to_string());
        }

        if chance(0.04) {
            let snap = Snapshot {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                region: "us-east-1".to_string(),
                env: "prod".to_string(),
                tags: Json(HashMap::new()),
                snapshot_id: format!("snap-{}", short_id()),
                source_volume_id: None,
                size_gib: pick(20, 200),
                retention_policy: None,
                created_at: Utc::now() - Duration::days(pick(100, 400)),
                updated_at: Utc::now(),
            };
            self.store.insert_snapshot(&snap).await?;
            self.record_injection(account_id, "snapshot", &snap.id, &snap.snapshot_id, "old_snapshot")
                .await?;
            injected.push("old_snapshot".to_string());
        }

        if chance(0.03) {
            let db = RdsInstance {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                region: "us-east-1".to_string(),
                env: "staging".to_string(),
                tags: Json(HashMap::new()),
                db_instance_id: format!("db-{}", short_id()),
                instance_class: "db.t3.medium".to_string(),
                engine: "postgres".to_string(),
                state: "available".to_string(),
                multi_az: false,
                avg_cpu_7d: Some(uniform(0.1, 5.0)),
                avg_connections_7d: Some(0.0),
                updated_at: Utc::now(),
            };
            self.store.insert_rds_instance(&db).await?;
            self.record_injection(account_id, "rds_instance", &db.id, &db.db_instance_id, "idle_rds")
                .await?;
            injected.push("idle_rds".to_string());
        }

        if chance(0.03) {
            let cluster = CacheCluster {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                region: "us-east-1".to_string(),
                env: "staging".to_string(),
                tags: Json(HashMap::new()),
                cluster_id: format!("cache-{}", short_id()),
                node_type: "cache.t3.small".to_string(),
                num_nodes: pick(1, 3),
                avg_cpu_7d: Some(uniform(0.1, 5.0)),
                avg_connections_7d: Some(0.0),
                updated_at: Utc::now(),
            };
            self.store.insert_cache_cluster(&cluster).await?;
            self.record_injection(account_id, "cache_cluster", &cluster.id, &cluster.cluster_id, "idle_cache")
                .await?;
            injected.push("idle_cache".to_string());
        }

        if chance(0.03) {
            let name = format!("lb-{}", short_id());
            let lb = LoadBalancer {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                region: "us-east-1".to_string(),
                env: "prod".to_string(),
                tags: Json(HashMap::new()),
                lb_arn: format!("arn:lb/{}", name),
                name: name.clone(),
                lb_type: "application".to_string(),
                target_count: pick(0, 2),
                healthy_target_count: Some(0),
                avg_request_count_7d: Some(uniform(0.0, 500.0)),
                updated_at: Utc::now(),
            };
            self.store.insert_load_balancer(&lb).await?;
            self.record_injection(account_id, "load_balancer", &lb.id, &name, "idle_load_balancer")
                .await?;
            injected.push("idle_load_balancer".to_string());
        }

        if chance(0.04) {
            let name = format!("fn-{}", short_id());
            let func = LambdaFunction {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                region: "us-east-1".to_string(),
                env: "prod".to_string(),
                tags: Json(HashMap::new()),
                name: name.clone(),
                memory_mb: 1024,
                timeout_seconds: 30,
                invocations_7d: Some(pick(1_000, 50_000)),
                avg_duration_ms_7d: Some(uniform(200.0, 2_000.0)),
                avg_memory_used_mb_7d: Some(uniform(100.0, 300.0)),
                updated_at: Utc::now(),
            };
            self.store.insert_lambda_function(&func).await?;
            self.record_injection(account_id, "lambda_function", &func.id, &name, "over_provisioned_lambda")
                .await?;
            injected.push("over_provisioned_lambda".to_string());
        }

        Ok(injected)
    }

    fn make_instance(
        &self,
        account_id: &str,
        name: &str,
        env: &str,
        instance_type: &str,
        cpu: f64,
    ) -> Instance {
        let mut tags = HashMap::new();
        tags.insert("Name".to_string(), name.to_string());
        Instance {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            region: "us-east-1".to_string(),
            env: env.to_string(),
            tags: Json(tags),
            instance_id: format!("i-{}", short_id()),
            instance_type: instance_type.to_string(),
            state: "running".to_string(),
            hourly_cost: instance_hourly_cost(instance_type),
            avg_cpu_7d: Some(cpu),
            current_cpu: Some(cpu),
            current_memory: Some(uniform(10.0, 30.0)),
            autoscaling_group_id: None,
            launch_time: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn make_asg(
        &self,
        account_id: &str,
        name: &str,
        env: &str,
        desired: i64,
        utilization: f64,
    ) -> AutoscalingGroup {
        AutoscalingGroup {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            region: "us-east-1".to_string(),
            env: env.to_string(),
            tags: Json(HashMap::new()),
            name: name.to_string(),
            instance_type: "t3.medium".to_string(),
            min_size: 1,
            max_size: desired.max(4),
            desired_capacity: desired,
            current_utilization: Some(utilization),
            updated_at: Utc::now(),
        }
    }

    async fn record_injection(
        &self,
        account_id: &str,
        resource_type: &str,
        resource_id: &str,
        resource_name: &str,
        scenario: &str,
    ) -> ApiResult<()> {
        let event = ResourceChangeEvent {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            change_type: "resource_created".to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            resource_name: resource_name.to_string(),
            change_source: "drift_engine".to_string(),
            details: Json(json!({ "scenario": scenario })),
            created_at: Utc::now(),
        };
        self.audit.append_change_event(&event).await
    }
}
