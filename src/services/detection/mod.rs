//! Detection engine: batch snapshot fetch, scenario rule evaluation and
//! short-TTL memoization.
//!
//! `detect_all` is the single entry point. The eleven resource tables are
//! fetched concurrently in one fan-out; rule evaluation is pure and
//! single-threaded over the snapshot.

pub mod rules;

use crate::models::{
    AutoscalingGroup, CacheCluster, Detection, DetectionResult, DetectionSummary, ElasticIp,
    Instance, LambdaFunction, LoadBalancer, LogGroup, MODE_AUTO_SAFE, RdsInstance, ResourceCounts,
    S3Bucket, Snapshot, Volume,
};
use crate::services::resource_store::ResourceStore;
use crate::services::scan_cache::{DEFAULT_SCOPE, ScanCache};
use crate::utils::ApiResult;
use chrono::Utc;
use rules::{RuleContext, WasteRule, all_rules};
use std::collections::HashSet;
use std::sync::Arc;

/// Everything a scan needs, fetched once up front. Rules never go back to
/// the store.
#[derive(Debug, Default)]
pub struct ResourceSnapshot {
    pub instances: Vec<Instance>,
    pub autoscaling_groups: Vec<AutoscalingGroup>,
    pub rds_instances: Vec<RdsInstance>,
    pub cache_clusters: Vec<CacheCluster>,
    pub load_balancers: Vec<LoadBalancer>,
    pub lambda_functions: Vec<LambdaFunction>,
    pub volumes: Vec<Volume>,
    pub snapshots: Vec<Snapshot>,
    pub s3_buckets: Vec<S3Bucket>,
    pub log_groups: Vec<LogGroup>,
    pub elastic_ips: Vec<ElasticIp>,
}

impl ResourceSnapshot {
    pub fn resource_counts(&self) -> ResourceCounts {
        let counts = ResourceCounts {
            instances: self.instances.len() as i64,
            autoscaling_groups: self.autoscaling_groups.len() as i64,
            rds_instances: self.rds_instances.len() as i64,
            cache_clusters: self.cache_clusters.len() as i64,
            load_balancers: self.load_balancers.len() as i64,
            lambda_functions: self.lambda_functions.len() as i64,
            volumes: self.volumes.len() as i64,
            snapshots: self.snapshots.len() as i64,
            s3_buckets: self.s3_buckets.len() as i64,
            log_groups: self.log_groups.len() as i64,
            elastic_ips: self.elastic_ips.len() as i64,
            total: 0,
        };
        ResourceCounts {
            total: counts.instances
                + counts.autoscaling_groups
                + counts.rds_instances
                + counts.cache_clusters
                + counts.load_balancers
                + counts.lambda_functions
                + counts.volumes
                + counts.snapshots
                + counts.s3_buckets
                + counts.log_groups
                + counts.elastic_ips,
            ..counts
        }
    }
}

/// Detection engine settings (see config::DetectionConfig for the source)
#[derive(Debug, Clone)]
pub struct DetectionOptions {
    pub treat_missing_metrics_as_idle: bool,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self { treat_missing_metrics_as_idle: true }
    }
}

pub struct DetectionService {
    store: Arc<ResourceStore>,
    cache: Arc<ScanCache>,
    options: DetectionOptions,
    rules: Vec<Box<dyn WasteRule>>,
}

impl DetectionService {
    pub fn new(store: Arc<ResourceStore>, cache: Arc<ScanCache>, options: DetectionOptions) -> Self {
        Self { store, cache, options, rules: all_rules() }
    }

    /// Run (or replay) a full detection scan.
    ///
    /// With `refresh` false a memoized result within the cache TTL is
    /// returned as-is; `refresh` true always re-scans.
    pub async fn detect_all(&self, refresh: bool) -> ApiResult<DetectionResult> {
        if !refresh && let Some(cached) = self.cache.get(DEFAULT_SCOPE) {
            tracing::debug!("Returning cached detection result");
            return Ok(cached);
        }

        let snapshot = self.fetch_snapshot().await?;
        let ctx = RuleContext {
            snapshot: &snapshot,
            now: Utc::now(),
            treat_missing_metrics_as_idle: self.options.treat_missing_metrics_as_idle,
        };

        let mut detections = Vec::new();
        for rule in &self.rules {
            detections.extend(rule.evaluate(&ctx));
        }
        let detections = Self::deduplicate(detections);

        let summary = Self::summarize(&detections);
        let result = DetectionResult {
            resource_counts: snapshot.resource_counts(),
            summary,
            detections,
            timestamp: ctx.now,
        };

        self.cache.put(DEFAULT_SCOPE, result.clone());
        tracing::info!(
            "Detection scan complete: {} detections, ${:.2}/mo potential savings",
            result.summary.total_detections,
            result.summary.total_potential_savings
        );

        Ok(result)
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// One concurrent fan-out over the eleven tables
    async fn fetch_snapshot(&self) -> ApiResult<ResourceSnapshot> {
        let (
            instances,
            autoscaling_groups,
            rds_instances,
            cache_clusters,
            load_balancers,
            lambda_functions,
            volumes,
            snapshots,
            s3_buckets,
            log_groups,
            elastic_ips,
        ) = tokio::try_join!(
            self.store.list_instances(),
            self.store.list_autoscaling_groups(),
            self.store.list_rds_instances(),
            self.store.list_cache_clusters(),
            self.store.list_load_balancers(),
            self.store.list_lambda_functions(),
            self.store.list_volumes(),
            self.store.list_snapshots(),
            self.store.list_s3_buckets(),
            self.store.list_log_groups(),
            self.store.list_elastic_ips(),
        )?;

        Ok(ResourceSnapshot {
            instances,
            autoscaling_groups,
            rds_instances,
            cache_clusters,
            load_balancers,
            lambda_functions,
            volumes,
            snapshots,
            s3_buckets,
            log_groups,
            elastic_ips,
        })
    }

    /// Keep the first detection per detection_id
    fn deduplicate(detections: Vec<Detection>) -> Vec<Detection> {
        let mut seen = HashSet::new();
        detections
            .into_iter()
            .filter(|d| seen.insert(d.detection_id.clone()))
            .collect()
    }

    fn summarize(detections: &[Detection]) -> DetectionSummary {
        let mut summary = DetectionSummary::default();
        for d in detections {
            summary.total_detections += 1;
            summary.total_monthly_cost += d.monthly_cost;
            summary.total_potential_savings += d.potential_savings;
            if d.mode == MODE_AUTO_SAFE {
                summary.auto_safe_detections += 1;
                summary.auto_optimizable_savings += d.potential_savings;
            }
            *summary.by_scenario.entry(d.scenario_id.clone()).or_insert(0) += 1;
            *summary
                .by_impact
                .entry(d.impact_level.as_str().to_string())
                .or_insert(0) += 1;
        }
        summary
    }
}

/// Baseline healthy fixtures used by the rule unit tests. Each returns a
/// resource that triggers no scenario; tests tweak the fields under test.
#[cfg(test)]
pub mod fixtures {
    use super::*;
    use sqlx::types::Json;
    use std::collections::HashMap;

    pub fn instance(id: &str) -> Instance {
        Instance {
            id: format!("res-{}", id),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "prod".to_string(),
            tags: Json(HashMap::new()),
            instance_id: format!("i-{}", id),
            instance_type: "t3.small".to_string(),
            state: "running".to_string(),
            hourly_cost: 0.0208,
            avg_cpu_7d: Some(55.0),
            current_cpu: Some(60.0),
            current_memory: Some(70.0),
            autoscaling_group_id: None,
            launch_time: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn asg(name: &str) -> AutoscalingGroup {
        AutoscalingGroup {
            id: format!("res-{}", name),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "prod".to_string(),
            tags: Json(HashMap::new()),
            name: name.to_string(),
            instance_type: "t3.medium".to_string(),
            min_size: 1,
            max_size: 6,
            desired_capacity: 3,
            current_utilization: Some(55.0),
            updated_at: Utc::now(),
        }
    }

    pub fn rds(id: &str) -> RdsInstance {
        RdsInstance {
            id: format!("res-{}", id),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "prod".to_string(),
            tags: Json(HashMap::new()),
            db_instance_id: format!("db-{}", id),
            instance_class: "db.t3.medium".to_string(),
            engine: "postgres".to_string(),
            state: "available".to_string(),
            multi_az: false,
            avg_cpu_7d: Some(45.0),
            avg_connections_7d: Some(30.0),
            updated_at: Utc::now(),
        }
    }

    pub fn cache(id: &str) -> CacheCluster {
        CacheCluster {
            id: format!("res-{}", id),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "prod".to_string(),
            tags: Json(HashMap::new()),
            cluster_id: format!("cache-{}", id),
            node_type: "cache.t3.small".to_string(),
            num_nodes: 2,
            avg_cpu_7d: Some(40.0),
            avg_connections_7d: Some(50.0),
            updated_at: Utc::now(),
        }
    }

    pub fn load_balancer(name: &str) -> LoadBalancer {
        LoadBalancer {
            id: format!("res-{}", name),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "prod".to_string(),
            tags: Json(HashMap::new()),
            lb_arn: format!("arn:lb/{}", name),
            name: name.to_string(),
            lb_type: "application".to_string(),
            target_count: 4,
            healthy_target_count: Some(4),
            avg_request_count_7d: Some(250_000.0),
            updated_at: Utc::now(),
        }
    }

    pub fn lambda(name: &str) -> LambdaFunction {
        LambdaFunction {
            id: format!("res-{}", name),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "prod".to_string(),
            tags: Json(HashMap::new()),
            name: name.to_string(),
            memory_mb: 512,
            timeout_seconds: 6,
            invocations_7d: Some(70_000),
            avg_duration_ms_7d: Some(2500.0),
            avg_memory_used_mb_7d: Some(400.0),
            updated_at: Utc::now(),
        }
    }

    pub fn volume(id: &str) -> Volume {
        Volume {
            id: format!("res-{}", id),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "prod".to_string(),
            tags: Json(HashMap::new()),
            volume_id: format!("vol-{}", id),
            volume_type: "gp3".to_string(),
            size_gib: 100,
            state: "in-use".to_string(),
            attached_instance_id: Some("i-attached".to_string()),
            updated_at: Utc::now(),
        }
    }

    pub fn snapshot_row(id: &str) -> Snapshot {
        Snapshot {
            id: format!("res-{}", id),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "prod".to_string(),
            tags: Json(HashMap::new()),
            snapshot_id: format!("snap-{}", id),
            source_volume_id: None,
            size_gib: 50,
            retention_policy: Some("30d".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn bucket(name: &str) -> S3Bucket {
        S3Bucket {
            id: format!("res-{}", name),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "prod".to_string(),
            tags: Json(HashMap::new()),
            name: name.to_string(),
            versioning_enabled: false,
            lifecycle_rules: Json(vec![crate::models::LifecycleRule {
                id: "archive".to_string(),
                status: "Enabled".to_string(),
                transitions: vec![],
                noncurrent_version_expiration: Some(crate::models::NoncurrentVersionExpiration {
                    days: 30,
                }),
            }]),
            updated_at: Utc::now(),
        }
    }

    pub fn log_group(name: &str) -> LogGroup {
        LogGroup {
            id: format!("res-{}", name),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "prod".to_string(),
            tags: Json(HashMap::new()),
            name: name.to_string(),
            retention_days: None,
            retention_in_days: Some(30),
            updated_at: Utc::now(),
        }
    }

    pub fn eip(id: &str) -> ElasticIp {
        ElasticIp {
            id: format!("res-{}", id),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "prod".to_string(),
            tags: Json(HashMap::new()),
            allocation_id: format!("eipalloc-{}", id),
            public_ip: "203.0.113.10".to_string(),
            associated_instance_id: Some("i-attached".to_string()),
            state: "associated".to_string(),
            updated_at: Utc::now(),
        }
    }

    pub fn context(snapshot: &ResourceSnapshot) -> RuleContext<'_> {
        RuleContext { snapshot, now: Utc::now(), treat_missing_metrics_as_idle: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_rules_have_unique_scenarios() {
        let rules = all_rules();
        let mut seen = HashSet::new();
        for rule in &rules {
            assert!(seen.insert(rule.scenario_id()), "duplicate scenario {}", rule.scenario_id());
        }
        assert_eq!(rules.len(), 24);
    }

    #[test]
    fn test_summary_counts_auto_safe() {
        let snapshot = ResourceSnapshot::default();
        let counts = snapshot.resource_counts();
        assert_eq!(counts.total, 0);
    }
}
