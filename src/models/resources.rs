//! Resource entities for the simulated multi-account cloud inventory.
//!
//! Each entity is a row in one of eleven tables. All share the common header
//! fields (id, account_id, region, env, tags, updated_at); identifiers are
//! unique within (account_id, table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::HashMap;
use utoipa::ToSchema;

/// Free-form resource tags (string -> string)
pub type Tags = Json<HashMap<String, String>>;

/// Environments considered non-production for safety heuristics
pub const NON_PROD_ENVS: &[&str] = &["dev", "staging", "test", "preview", "development", "qa"];

pub fn is_non_prod(env: &str) -> bool {
    !matches!(env, "prod" | "production")
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Instance {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    #[schema(value_type = HashMap<String, String>)]
    pub tags: Tags,
    pub instance_id: String,
    pub instance_type: String,
    pub state: String,
    pub hourly_cost: f64,
    pub avg_cpu_7d: Option<f64>,
    pub current_cpu: Option<f64>,
    pub current_memory: Option<f64>,
    pub autoscaling_group_id: Option<String>,
    pub launch_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }

    /// Best-effort CPU signal: the 7-day average when present, the live
    /// reading otherwise.
    pub fn effective_cpu(&self) -> Option<f64> {
        self.avg_cpu_7d.or(self.current_cpu)
    }

    pub fn display_name(&self) -> String {
        self.tags
            .get("Name")
            .cloned()
            .unwrap_or_else(|| self.instance_id.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AutoscalingGroup {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    #[schema(value_type = HashMap<String, String>)]
    pub tags: Tags,
    pub name: String,
    pub instance_type: String,
    pub min_size: i64,
    pub max_size: i64,
    pub desired_capacity: i64,
    pub current_utilization: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RdsInstance {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    #[schema(value_type = HashMap<String, String>)]
    pub tags: Tags,
    pub db_instance_id: String,
    pub instance_class: String,
    pub engine: String,
    pub state: String,
    pub multi_az: bool,
    pub avg_cpu_7d: Option<f64>,
    pub avg_connections_7d: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CacheCluster {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    #[schema(value_type = HashMap<String, String>)]
    pub tags: Tags,
    pub cluster_id: String,
    pub node_type: String,
    pub num_nodes: i64,
    pub avg_cpu_7d: Option<f64>,
    pub avg_connections_7d: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoadBalancer {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    #[schema(value_type = HashMap<String, String>)]
    pub tags: Tags,
    pub lb_arn: String,
    pub name: String,
    /// application, network or classic
    #[serde(rename = "type")]
    pub lb_type: String,
    pub target_count: i64,
    pub healthy_target_count: Option<i64>,
    pub avg_request_count_7d: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LambdaFunction {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    #[schema(value_type = HashMap<String, String>)]
    pub tags: Tags,
    pub name: String,
    pub memory_mb: i64,
    pub timeout_seconds: i64,
    pub invocations_7d: Option<i64>,
    pub avg_duration_ms_7d: Option<f64>,
    pub avg_memory_used_mb_7d: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Volume {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    #[schema(value_type = HashMap<String, String>)]
    pub tags: Tags,
    pub volume_id: String,
    /// gp2, gp3, io1, io2, st1 or sc1
    pub volume_type: String,
    pub size_gib: i64,
    /// in-use, available or deleted
    pub state: String,
    pub attached_instance_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Snapshot {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    #[schema(value_type = HashMap<String, String>)]
    pub tags: Tags,
    pub snapshot_id: String,
    pub source_volume_id: Option<String>,
    pub size_gib: i64,
    pub retention_policy: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

/// A single S3 lifecycle rule. Rules preserve insertion order and do not
/// overlap by id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LifecycleRule {
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<LifecycleTransition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noncurrent_version_expiration: Option<NoncurrentVersionExpiration>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LifecycleTransition {
    pub days: i64,
    pub storage_class: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoncurrentVersionExpiration {
    pub days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct S3Bucket {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    #[schema(value_type = HashMap<String, String>)]
    pub tags: Tags,
    pub name: String,
    pub versioning_enabled: bool,
    #[schema(value_type = Vec<LifecycleRule>)]
    pub lifecycle_rules: Json<Vec<LifecycleRule>>,
    pub updated_at: DateTime<Utc>,
}

impl S3Bucket {
    pub fn has_lifecycle_rules(&self) -> bool {
        !self.lifecycle_rules.is_empty()
    }

    pub fn has_noncurrent_version_expiration(&self) -> bool {
        self.lifecycle_rules
            .iter()
            .any(|r| r.noncurrent_version_expiration.is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LogGroup {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    #[schema(value_type = HashMap<String, String>)]
    pub tags: Tags,
    pub name: String,
    // The inventory carries both spellings of the retention field; a log
    // group only counts as retention-less when both are null.
    pub retention_days: Option<i64>,
    pub retention_in_days: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl LogGroup {
    pub fn effective_retention_days(&self) -> Option<i64> {
        self.retention_in_days.or(self.retention_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ElasticIp {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    #[schema(value_type = HashMap<String, String>)]
    pub tags: Tags,
    pub allocation_id: String,
    pub public_ip: String,
    pub associated_instance_id: Option<String>,
    /// associated or unassociated
    pub state: String,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_cpu_prefers_weekly_average() {
        let mut inst = test_instance();
        inst.avg_cpu_7d = Some(3.0);
        inst.current_cpu = Some(50.0);
        assert_eq!(inst.effective_cpu(), Some(3.0));

        inst.avg_cpu_7d = None;
        assert_eq!(inst.effective_cpu(), Some(50.0));

        inst.current_cpu = None;
        assert_eq!(inst.effective_cpu(), None);
    }

    #[test]
    fn test_is_non_prod() {
        assert!(is_non_prod("dev"));
        assert!(is_non_prod("staging"));
        assert!(!is_non_prod("prod"));
        assert!(!is_non_prod("production"));
    }

    #[test]
    fn test_bucket_version_expiration_lookup() {
        let mut bucket = test_bucket();
        assert!(!bucket.has_noncurrent_version_expiration());

        bucket.lifecycle_rules.0.push(LifecycleRule {
            id: "expire-noncurrent-versions".to_string(),
            status: "Enabled".to_string(),
            transitions: vec![],
            noncurrent_version_expiration: Some(NoncurrentVersionExpiration { days: 30 }),
        });
        assert!(bucket.has_noncurrent_version_expiration());
    }

    fn test_instance() -> Instance {
        Instance {
            id: "r-1".to_string(),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "dev".to_string(),
            tags: Json(HashMap::new()),
            instance_id: "i-abc".to_string(),
            instance_type: "t3.small".to_string(),
            state: "running".to_string(),
            hourly_cost: 0.0208,
            avg_cpu_7d: None,
            current_cpu: None,
            current_memory: None,
            autoscaling_group_id: None,
            launch_time: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_bucket() -> S3Bucket {
        S3Bucket {
            id: "r-2".to_string(),
            account_id: "acct-1".to_string(),
            region: "us-east-1".to_string(),
            env: "dev".to_string(),
            tags: Json(HashMap::new()),
            name: "assets".to_string(),
            versioning_enabled: true,
            lifecycle_rules: Json(vec![]),
            updated_at: Utc::now(),
        }
    }
}
