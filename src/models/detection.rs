//! Transient waste detections emitted by scenario rules.
//!
//! Detections are created in memory on each scan and discarded; only the
//! deterministic detection_id survives, as the idempotency key against the
//! recommendation store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use utoipa::ToSchema;

/// Detections that may be auto-executed in automated execution mode
pub const MODE_AUTO_SAFE: i64 = 2;
/// Detections that require human approval before execution
pub const MODE_APPROVAL_REQUIRED: i64 = 3;

/// Severity bucket derived from the monthly savings at stake
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ImpactLevel {
    pub fn from_monthly_savings(savings: f64) -> Self {
        if savings >= 500.0 {
            Self::Critical
        } else if savings >= 100.0 {
            Self::High
        } else if savings >= 25.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::str::FromStr for ImpactLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown impact level '{}'", other)),
        }
    }
}

/// One waste finding from one scenario rule on one resource
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Detection {
    /// Deterministic: "{scenario_id}-{resource row id}"
    pub detection_id: String,
    pub scenario_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub resource_name: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    /// 0..=100
    pub confidence: i64,
    /// 2 = auto-safe, 3 = approval required
    pub mode: i64,
    pub monthly_cost: f64,
    pub potential_savings: f64,
    pub impact_level: ImpactLevel,
    pub recommended_action: String,
    pub can_auto_optimize: bool,
    pub title: String,
    pub description: String,
    /// UI payload; also input to executor alternative actions
    #[schema(value_type = Object)]
    pub details: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Detection {
    pub fn detection_id_for(scenario_id: &str, resource_row_id: &str) -> String {
        format!("{}-{}", scenario_id, resource_row_id)
    }

    /// Typed accessor for the executor-consumed detail key
    pub fn recommended_instance_type(&self) -> Option<&str> {
        self.details.get("recommendedInstanceType").and_then(Value::as_str)
    }

    /// Typed accessor for the executor-consumed detail key
    pub fn recommended_timeout(&self) -> Option<i64> {
        self.details.get("recommendedTimeout").and_then(Value::as_i64)
    }
}

/// Aggregates over one scan
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DetectionSummary {
    pub total_detections: i64,
    pub auto_safe_detections: i64,
    pub total_monthly_cost: f64,
    pub total_potential_savings: f64,
    pub auto_optimizable_savings: f64,
    pub by_scenario: HashMap<String, i64>,
    pub by_impact: HashMap<String, i64>,
}

/// Snapshot length vector, computed directly from the fetched tables
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ResourceCounts {
    pub instances: i64,
    pub autoscaling_groups: i64,
    pub rds_instances: i64,
    pub cache_clusters: i64,
    pub load_balancers: i64,
    pub lambda_functions: i64,
    pub volumes: i64,
    pub snapshots: i64,
    pub s3_buckets: i64,
    pub log_groups: i64,
    pub elastic_ips: i64,
    pub total: i64,
}

/// Result of one full detection scan; memoized by the scan cache
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub summary: DetectionSummary,
    pub resource_counts: ResourceCounts,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impact_level_thresholds() {
        assert_eq!(ImpactLevel::from_monthly_savings(3.0), ImpactLevel::Low);
        assert_eq!(ImpactLevel::from_monthly_savings(25.0), ImpactLevel::Medium);
        assert_eq!(ImpactLevel::from_monthly_savings(120.0), ImpactLevel::High);
        assert_eq!(ImpactLevel::from_monthly_savings(800.0), ImpactLevel::Critical);
    }

    #[test]
    fn test_impact_level_ordering() {
        assert!(ImpactLevel::Critical > ImpactLevel::High);
        assert!(ImpactLevel::High > ImpactLevel::Medium);
        assert!(ImpactLevel::Medium > ImpactLevel::Low);
    }

    #[test]
    fn test_detection_id_is_deterministic() {
        assert_eq!(Detection::detection_id_for("idle_instance", "r-42"), "idle_instance-r-42");
    }
}
