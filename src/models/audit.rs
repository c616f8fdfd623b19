//! Audit trail rows and the per-account execution mode record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::ToSchema;

/// Append-only record of one executor invocation. Rows are never modified.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditEntry {
    pub id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub resource_name: String,
    pub scenario_id: Option<String>,
    pub detection_id: Option<String>,
    pub success: bool,
    pub message: String,
    /// Fields about to change, captured before the mutation
    #[schema(value_type = Option<Object>)]
    pub previous_state: Option<Json<Value>>,
    #[schema(value_type = Option<Object>)]
    pub new_state: Option<Json<Value>>,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub executed_by: String,
}

/// Drift-engine change stream row (change_source = "drift_engine")
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ResourceChangeEvent {
    pub id: String,
    pub account_id: String,
    pub change_type: String,
    pub resource_type: String,
    pub resource_id: String,
    pub resource_name: String,
    pub change_source: String,
    #[schema(value_type = Object)]
    pub details: Json<Value>,
    pub created_at: DateTime<Utc>,
}

/// Only the drift tick consults this; manual mode never auto-executes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ExecutionMode {
    Manual,
    Automated,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automated => "automated",
        }
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Manual
    }
}
