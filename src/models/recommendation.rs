//! Durable recommendation records and their lifecycle types.

use crate::models::detection::ImpactLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::HashMap;
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Pending,
    Approved,
    Rejected,
    Snoozed,
    Scheduled,
    Executed,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Snoozed => "snoozed",
            Self::Scheduled => "scheduled",
            Self::Executed => "executed",
        }
    }

    /// Executed and rejected records accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Rejected)
    }
}

impl std::str::FromStr for RecommendationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "snoozed" => Ok(Self::Snoozed),
            "scheduled" => Ok(Self::Scheduled),
            "executed" => Ok(Self::Executed),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Recommendation {
    pub id: String,
    /// Uniqueness key against the detection stream
    pub detection_id: String,
    pub scenario_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub resource_name: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
    pub confidence: i64,
    pub mode: i64,
    pub monthly_cost: f64,
    pub potential_savings: f64,
    pub impact_level: ImpactLevel,
    pub status: RecommendationStatus,
    pub recommended_action: String,
    pub can_auto_optimize: bool,
    pub title: String,
    pub description: String,
    #[schema(value_type = Object)]
    pub details: Json<Map<String, Value>>,
    pub actioned_by: Option<String>,
    pub actioned_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub rejection_reason: Option<String>,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List filter; all fields combine conjunctively
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RecommendationFilter {
    /// One or more statuses; None lists every status
    pub status: Option<Vec<RecommendationStatus>>,
    pub scenario_id: Option<String>,
    pub resource_type: Option<String>,
    pub impact_level: Option<ImpactLevel>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Per-group rollup used by the summary
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SavingsRollup {
    pub count: i64,
    pub potential_savings: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RecommendationSummary {
    pub total: i64,
    pub by_status: HashMap<String, i64>,
    /// Savings across every non-terminal recommendation
    pub total_potential_savings: f64,
    /// Savings across pending recommendations only
    pub pending_savings: f64,
    pub by_resource_type: HashMap<String, SavingsRollup>,
    pub by_scenario: HashMap<String, SavingsRollup>,
}

/// PATCH /api/recommendations body
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecommendationActionRequest {
    pub id: String,
    /// approve | reject | snooze | schedule | execute
    pub action: String,
    /// Snooze duration; required for snooze, must be > 0
    pub days: Option<i64>,
    /// Target date; required for schedule, must be in the future
    pub date: Option<DateTime<Utc>>,
    /// Optional rejection reason
    pub reason: Option<String>,
    /// Recorded as actioned_by / audit executed_by; defaults to "manual"
    pub actioned_by: Option<String>,
}
