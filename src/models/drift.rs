//! Drift-tick request/response types.
//!
//! Field names follow the wire format consumed by the dashboard, hence the
//! camelCase serialization on the result blocks.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DriftTickRequest {
    /// Force the auto-execution pass regardless of the persisted mode
    #[serde(default, rename = "autoExecute")]
    pub auto_execute: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriftDetectionStats {
    pub total_detections: i64,
    pub auto_safe_detections: i64,
    pub total_savings: f64,
    pub auto_safe_savings: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriftExecutionItem {
    pub resource_id: String,
    pub resource_name: String,
    pub action: String,
    pub success: bool,
    pub message: String,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriftExecutionStats {
    /// manual or automated (the mode that governed this tick)
    pub mode: String,
    pub executed: i64,
    pub success: i64,
    pub failed: i64,
    pub results: Vec<DriftExecutionItem>,
}

/// World-advance summary; additive to the detection/execution blocks
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriftAdvanceStats {
    pub accounts_processed: i64,
    pub accounts_failed: i64,
    pub injected_scenarios: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriftTiming {
    pub detection_ms: i64,
    pub total_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DriftTickResult {
    pub detection: DriftDetectionStats,
    pub execution: DriftExecutionStats,
    pub drift: DriftAdvanceStats,
    pub timing: DriftTiming,
}

/// Per-account progress, logged and folded into DriftAdvanceStats
#[derive(Debug, Clone, Default)]
pub struct AccountDriftSummary {
    pub account_id: String,
    pub date: Option<chrono::NaiveDate>,
    pub instances_updated: i64,
    pub buckets_updated: i64,
    pub log_groups_updated: i64,
    pub injected: Vec<String>,
    pub error: Option<String>,
}
